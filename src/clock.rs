//! Per-game, per-side time accounting. Mirrors `monitors::play::player`'s time
//! handling but pulled out into its own small state machine, since here a game's
//! two clocks belong to the Supervisor rather than to each `Player`.

use std::time::{Duration, Instant};

use rules::Color;
use serde::{Deserialize, Serialize};

/// One game's time control. `Standard` is the classic moves-per-control /
/// increment / sudden-death family; the others are single-parameter modes that
/// never consult `timeLeft`.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TimeControl {
    Infinite,
    Depth(u32),
    MoveTime(Duration),
    Standard {
        moves_per_control: u32,
        base: Duration,
        increment: Duration,
        margin: Duration,
    },
}

impl TimeControl {
    fn margin(&self) -> Duration {
        match self {
            TimeControl::Standard { margin, .. } => *margin,
            _ => Duration::ZERO,
        }
    }
}

#[derive(Debug)]
pub struct Clock {
    tc: TimeControl,
    time_left: [Duration; 2],
    move_start: Option<Instant>,
}

fn idx(side: Color) -> usize {
    if side.is_white() { 0 } else { 1 }
}

impl Clock {
    pub fn new(tc: TimeControl) -> Self {
        let start = match tc {
            TimeControl::Standard { base, .. } => base,
            TimeControl::MoveTime(t) => t,
            _ => Duration::ZERO,
        };
        Self { tc, time_left: [start; 2], move_start: None }
    }

    /// Resets both sides' budgets to the game's starting allotment; called once
    /// per new game, before the first `startMove`.
    pub fn reset(&mut self) {
        let start = match self.tc {
            TimeControl::Standard { base, .. } => base,
            TimeControl::MoveTime(t) => t,
            _ => Duration::ZERO,
        };
        self.time_left = [start; 2];
        self.move_start = None;
    }

    pub fn time_left(&self, side: Color) -> Duration {
        self.time_left[idx(side)]
    }

    pub fn start_move(&mut self) {
        self.move_start = Some(Instant::now());
    }

    pub fn consumed(&self) -> Duration {
        self.move_start.map_or(Duration::ZERO, |t| t.elapsed())
    }

    /// False unconditionally outside `MoveTime`/`Standard`, matching §4.2.
    pub fn is_time_over(&self, side: Color) -> bool {
        match self.tc {
            TimeControl::MoveTime(t) => self.consumed() > t + self.tc.margin(),
            TimeControl::Standard { .. } => {
                self.consumed() > self.time_left[idx(side)] + self.tc.margin()
            }
            _ => false,
        }
    }

    /// A no-op outside `Standard`; for `Standard`, subtracts `elapsed - increment`
    /// from the mover's clock and adds `base` back once every `moves_per_control`
    /// half-moves, per §4.2's formula.
    pub fn update_after_move(&mut self, elapsed: Duration, side: Color, half_move_count: u32) {
        if let TimeControl::Standard { moves_per_control, base, increment, .. } = self.tc {
            let i = idx(side);
            let delta = elapsed.saturating_sub(increment);
            self.time_left[i] = self.time_left[i].saturating_sub(delta);
            if moves_per_control > 0 && (half_move_count + 1) / 2 % moves_per_control == 0 {
                self.time_left[i] += base;
            }
        }
    }

    pub fn time_control(&self) -> TimeControl {
        self.tc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_mode_decrements_by_elapsed_minus_increment() {
        let tc = TimeControl::Standard {
            moves_per_control: 0,
            base: Duration::from_secs(60),
            increment: Duration::from_secs(2),
            margin: Duration::ZERO,
        };
        let mut clock = Clock::new(tc);
        clock.update_after_move(Duration::from_secs(10), Color::White, 0);
        assert_eq!(clock.time_left(Color::White), Duration::from_secs(52));
    }

    #[test]
    fn moves_per_control_replenishes_the_base_allotment() {
        let tc = TimeControl::Standard {
            moves_per_control: 2,
            base: Duration::from_secs(30),
            increment: Duration::ZERO,
            margin: Duration::ZERO,
        };
        let mut clock = Clock::new(tc);
        // half_move_count is 0-indexed before the move that just completed;
        // (0+1)/2 = 0 -> no bonus, (3+1)/2 = 2 -> bonus on the second full move.
        clock.update_after_move(Duration::from_secs(5), Color::White, 0);
        assert_eq!(clock.time_left(Color::White), Duration::from_secs(25));
        clock.update_after_move(Duration::from_secs(5), Color::White, 3);
        assert_eq!(clock.time_left(Color::White), Duration::from_secs(50));
    }

    #[test]
    fn infinite_and_depth_never_time_out() {
        let mut clock = Clock::new(TimeControl::Infinite);
        clock.start_move();
        assert!(!clock.is_time_over(Color::White));
        let mut clock = Clock::new(TimeControl::Depth(20));
        clock.start_move();
        assert!(!clock.is_time_over(Color::Black));
    }
}
