//! The Game Supervisor (§4.3): drives two Engine Adapters through the
//! opening → play → result lifecycle, enforcing legality and adjudication.
//! Grounded in `monitors::play::ugi_client::Client`/`ClientState`, generalized
//! from one hardcoded board type to any `Board` implementation and from the
//! UGI-only adapter to either protocol dialect.

use std::time::{Duration, Instant};

use rules::board::{Board, Tablebase, Terminal, Wdl};
use rules::color::Color;
use rules::result::{
    AdjudicationReason, GameOver, GameOverReason, GameResult, MatchResult, MatchResultHandle,
    MatchStatus, PlayerResult, player_res_to_match_res,
};
use rules::search::GoLimits;

use crate::adapter::{AdapterEvent, AdapterState, ComputingState, EngineAdapter};
use crate::clock::{Clock, TimeControl};

pub struct AdjudicationConfig {
    pub max_game_length: Option<u32>,
    pub max_pieces: u32,
    pub tablebase_enabled: bool,
}

impl Default for AdjudicationConfig {
    fn default() -> Self {
        Self { max_game_length: None, max_pieces: 0, tablebase_enabled: false }
    }
}

/// Grace window the Supervisor waits, during `ending`, for both adapters to
/// become safely detachable (§4.3).
const DETACH_GRACE: Duration = Duration::from_secs(5);

/// Running per-player totals assembled opportunistically from `AdapterEvent::Info`
/// lines, folded in on every accepted move (§4.6).
#[derive(Default, Clone, Copy)]
struct GameMetrics {
    node_sum: u64,
    depth_sum: u64,
    elapsed: Duration,
    move_count: u64,
}

pub struct Supervisor<B: Board, T: Tablebase<B>> {
    board: B,
    hash_history: Vec<u64>,
    move_history: Vec<B::Move>,
    /// SAN text of each move in `move_history`, parallel by index; fed to
    /// Winboard adapters that negotiated feature `san` (§4.1).
    move_sans: Vec<String>,
    white: EngineAdapter,
    black: EngineAdapter,
    clock: Clock,
    state: MatchStatus,
    start_fen: String,
    start_moves: Vec<String>,
    adjudication: AdjudicationConfig,
    tablebase: Option<T>,
    ponder_enabled: bool,
    pending_ponder_move: Option<String>,
    /// Which side's adapter is currently running a background ponder search,
    /// if any (§4.1/§4.3 ponder-hit flow).
    pondering_side: Option<Color>,
    ending_since: Option<Instant>,
    /// Set once, in `game_over`; survives the `Stopped` -> `Ending` -> `Ended`
    /// transitions so the Scheduler can still read it after calling `begin_ending`.
    final_result: Option<MatchResult>,
    /// [white, black] running totals, folded in as moves are accepted.
    metrics: [GameMetrics; 2],
    /// [white, black] most recent unfolded `Info` line, cleared once folded.
    latest_info: [Option<rules::search::SearchInfo>; 2],
}

impl<B: Board, T: Tablebase<B>> Supervisor<B, T> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        white: EngineAdapter,
        black: EngineAdapter,
        time_control: TimeControl,
        start_fen: String,
        start_moves: Vec<String>,
        adjudication: AdjudicationConfig,
        tablebase: Option<T>,
        ponder_enabled: bool,
    ) -> Self {
        Self {
            board: B::startpos(),
            hash_history: Vec::new(),
            move_history: Vec::new(),
            move_sans: Vec::new(),
            white,
            black,
            clock: Clock::new(time_control),
            state: MatchStatus::Begin,
            start_fen,
            start_moves,
            adjudication,
            tablebase,
            ponder_enabled,
            pending_ponder_move: None,
            pondering_side: None,
            ending_since: None,
            final_result: None,
            metrics: [GameMetrics::default(); 2],
            latest_info: [None, None],
        }
    }

    pub fn state(&self) -> &MatchStatus {
        &self.state
    }

    pub fn result(&self) -> Option<&MatchResult> {
        self.final_result.as_ref()
    }

    /// `[white, black]` totals of (node sum, depth sum, elapsed, move count),
    /// for `stats::Standings::record_game` once the game has ended.
    pub fn metrics(&self) -> [(u64, u64, Duration, u64); 2] {
        [
            (self.metrics[0].node_sum, self.metrics[0].depth_sum, self.metrics[0].elapsed, self.metrics[0].move_count),
            (self.metrics[1].node_sum, self.metrics[1].depth_sum, self.metrics[1].elapsed, self.metrics[1].move_count),
        ]
    }

    /// Consumes the Supervisor once `Ended`, handing its two adapters back to
    /// the Scheduler for disposal (`quit()` then draining until `Stopped`).
    pub fn into_adapters(self) -> (EngineAdapter, EngineAdapter) {
        (self.white, self.black)
    }

    /// The move history in coordinate notation, for PGN rendering and resumable
    /// persistence.
    pub fn coordinate_moves(&self) -> Vec<String> {
        let mut board = B::from_fen(&self.start_fen).unwrap_or_else(|_| B::startpos());
        let mut out = Vec::with_capacity(self.move_history.len());
        for mv in &self.move_history {
            out.push(board.to_coordinate_text(*mv));
            if let Some(next) = board.make_move(*mv) {
                board = next;
            }
        }
        out
    }

    fn adapter(&mut self, side: Color) -> &mut EngineAdapter {
        if side.is_white() { &mut self.white } else { &mut self.black }
    }

    /// Spawns both engines. A spawn failure on one side is not propagated: the
    /// failed adapter stays `stopped`, and `tick_begin` turns that into a
    /// `crash` loss for the right side instead of aborting the whole match.
    pub fn begin(&mut self) -> rules::Res<()> {
        let _ = self.white.start();
        let _ = self.black.start();
        Ok(())
    }

    /// Advances the lifecycle by one scheduler tick. Returns `true` once the
    /// Supervisor has reached `ended` and can be dropped.
    pub fn tick(&mut self) -> bool {
        self.white.tick();
        self.black.tick();

        match self.state {
            MatchStatus::Begin => self.tick_begin(),
            MatchStatus::Playing => self.tick_playing(),
            MatchStatus::Ending => self.tick_ending(),
            _ => {}
        }
        matches!(self.state, MatchStatus::Ended)
    }

    fn tick_begin(&mut self) {
        let w = self.white.state();
        let b = self.black.state();
        match (w, b) {
            (AdapterState::Ready, AdapterState::Ready) => self.enter_ready_and_play(),
            (AdapterState::Stopped, AdapterState::Stopped) => {
                self.game_over(MatchResult::new(GameResult::Draw, GameOverReason::Crash));
            }
            (AdapterState::Stopped, _) => {
                self.game_over(MatchResult::new(GameResult::BlackWin, GameOverReason::Crash));
            }
            (_, AdapterState::Stopped) => {
                self.game_over(MatchResult::new(GameResult::WhiteWin, GameOverReason::Crash));
            }
            _ => {}
        }
    }

    fn enter_ready_and_play(&mut self) {
        self.state = MatchStatus::Ready;
        let time_control = self.clock.time_control();
        let _ = self.white.new_game(time_control);
        let _ = self.black.new_game(time_control);
        self.white.mark_playing();
        self.black.mark_playing();

        self.board = B::from_fen(&self.start_fen).unwrap_or_else(|_| B::startpos());
        self.hash_history.clear();
        self.move_history.clear();
        self.move_sans.clear();
        self.clock.reset();
        self.pending_ponder_move = None;
        self.pondering_side = None;

        for text in self.start_moves.clone() {
            if let Ok(mv) = self.board.parse_coordinate_move(&text) {
                let san = self.board.to_san_text(mv);
                if let Some(next) = self.board.make_move(mv) {
                    self.board = next;
                    self.hash_history.push(self.board.zobrist_hash());
                    self.move_history.push(mv);
                    self.move_sans.push(san);
                }
            }
        }

        self.state = MatchStatus::Playing;
        self.start_thinking(None);
    }

    fn start_thinking(&mut self, previous_ponder_move: Option<String>) {
        let side = self.board.side_to_move();
        self.clock.start_move();
        let fen = self.start_fen.clone();
        let moves: Vec<String> = self
            .move_history
            .iter()
            .map(|mv| self.board.to_coordinate_text(*mv))
            .collect();
        let sans: Vec<String> = self.move_sans.clone();
        let limits = self.go_limits(side);
        let (my_time, opp_time) = self.wb_time_fields(side);

        if self.ponder_enabled {
            if let Some(expected) = previous_ponder_move {
                let other_side = side.other();
                let other = self.adapter(other_side);
                let _ = other.ponder(Some(&fen), &moves, &expected, &limits);
                if other.computing() == ComputingState::Pondering {
                    self.pending_ponder_move = Some(expected);
                    self.pondering_side = Some(other_side);
                }
            }
        }
        let adapter = self.adapter(side);
        let _ = adapter.think(Some(&fen), &moves, &sans, &limits, my_time, opp_time);
    }

    /// `(my_time, opponent_time)` for Winboard's per-move `time`/`otim` (§4.1),
    /// reported from whichever side's clock view `side` is; `None` for
    /// `Infinite`/`Depth`, which never consult `timeLeft` (§4.2).
    fn wb_time_fields(&self, side: Color) -> (Option<Duration>, Option<Duration>) {
        match self.clock.time_control() {
            TimeControl::Infinite | TimeControl::Depth(_) => (None, None),
            TimeControl::MoveTime(_) | TimeControl::Standard { .. } => {
                (Some(self.clock.time_left(side)), Some(self.clock.time_left(side.other())))
            }
        }
    }

    fn go_limits(&self, side: Color) -> GoLimits {
        match self.clock.time_control() {
            TimeControl::Infinite => GoLimits::infinite(),
            TimeControl::Depth(d) => GoLimits { depth: Some(rules::search::Depth(d)), ..GoLimits::infinite() },
            TimeControl::MoveTime(t) => GoLimits { move_time: Some(t), ..GoLimits::infinite() },
            TimeControl::Standard { increment, .. } => GoLimits {
                infinite: false,
                wtime: Some(self.clock.time_left(Color::White)),
                btime: Some(self.clock.time_left(Color::Black)),
                winc: if side.is_white() { increment } else { Duration::ZERO },
                binc: if side.is_white() { Duration::ZERO } else { increment },
                ..GoLimits::infinite()
            },
        }
    }

    fn tick_playing(&mut self) {
        if self.clock.is_time_over(self.board.side_to_move()) {
            let side = self.board.side_to_move();
            self.lose_on_time(side);
            return;
        }
        self.drain_events(Color::White);
        if !matches!(self.state, MatchStatus::Playing) {
            return;
        }
        self.drain_events(Color::Black);
    }

    /// Drains one adapter's events. `origin` is the adapter's fixed colour for
    /// the whole game (colours never swap mid-game), so `Info` lines are
    /// attributed correctly even while the other side is pondering.
    fn drain_events(&mut self, origin: Color) {
        let events: Vec<AdapterEvent> = self.adapter(origin).events().try_iter().collect();
        for event in events {
            if !matches!(self.state, MatchStatus::Playing) {
                break;
            }
            match event {
                AdapterEvent::BestMove { mv, ponder, elapsed, prior_computing } => {
                    self.handle_move_received(mv, ponder, elapsed, prior_computing);
                }
                AdapterEvent::Info(info) => {
                    self.latest_info[idx(origin)] = Some(info);
                }
                _ => {}
            }
        }
    }

    fn lose_on_time(&mut self, side: Color) {
        let winner = if side.is_white() { GameResult::BlackWin } else { GameResult::WhiteWin };
        self.game_over(MatchResult::new(winner, GameOverReason::Timeout));
    }

    fn handle_move_received(
        &mut self,
        mv_text: String,
        ponder: Option<String>,
        elapsed: Duration,
        prior_computing: ComputingState,
    ) {
        if !matches!(self.state, MatchStatus::Playing) {
            return;
        }
        let side = self.board.side_to_move();
        if prior_computing == ComputingState::Pondering {
            // Missed ponder-hit: the opponent didn't play the expected move.
            self.start_thinking(None);
            return;
        }

        if self.clock.is_time_over(side) {
            self.lose_on_time(side);
            return;
        }

        let Ok(mv) = self.board.parse_coordinate_move(&mv_text) else {
            self.illegal_move(side);
            return;
        };
        let Some(next_board) = self.board.make_move(mv) else {
            self.illegal_move(side);
            return;
        };

        let san = self.board.to_san_text(mv);
        self.board = next_board;
        self.move_history.push(mv);
        self.move_sans.push(san.clone());
        self.hash_history.push(self.board.zobrist_hash());
        let half_move_count = self.move_history.len() as u32;

        let m = &mut self.metrics[idx(side)];
        if let Some(info) = self.latest_info[idx(side)].take() {
            m.node_sum += info.nodes.unwrap_or(0);
            m.depth_sum += info.depth.map(|d| d.0 as u64).unwrap_or(0);
        }
        m.elapsed += elapsed;
        m.move_count += 1;

        if let Some(terminal) = self.board.terminal() {
            self.game_over(terminal_result(terminal, side));
            return;
        }
        if self.board.is_repetition(&self.hash_history) {
            self.game_over(MatchResult::new(GameResult::Draw, GameOverReason::Repetition));
            return;
        }
        if let Some(result) = self.check_adjudication(half_move_count) {
            self.game_over(result);
            return;
        }

        let opponent_side = side.other();
        if self.pondering_side == Some(opponent_side) && self.pending_ponder_move.as_deref() == Some(mv_text.as_str())
        {
            // Ponder hit: the opponent played exactly the move we speculated on.
            // The pondering search continues in place, no new position/go.
            self.pending_ponder_move = None;
            self.pondering_side = None;
            let _ = self.adapter(opponent_side).ponder_hit();
            self.clock.update_after_move(elapsed, side, half_move_count);
            self.clock.start_move();
            return;
        }
        if self.pondering_side == Some(opponent_side) {
            // Ponder miss: abort the stale speculative search before informing it
            // of the real move; its bestmove will surface with prior_computing ==
            // Pondering and get re-dispatched through the branch above.
            let _ = self.adapter(opponent_side).stop();
            self.pending_ponder_move = None;
            self.pondering_side = None;
        }
        self.adapter(opponent_side).on_opponent_move(&mv_text, &san).ok();
        self.clock.update_after_move(elapsed, side, half_move_count);
        self.start_thinking(ponder);
    }

    fn illegal_move(&mut self, offender: Color) {
        let winner = if offender.is_white() { GameResult::BlackWin } else { GameResult::WhiteWin };
        self.game_over(MatchResult::new(winner, GameOverReason::IllegalMove));
    }

    fn check_adjudication(&self, half_move_count: u32) -> Option<MatchResult> {
        if let Some(max) = self.adjudication.max_game_length {
            if max > 0 && half_move_count >= max {
                return Some(MatchResult::new(
                    GameResult::Draw,
                    GameOverReason::Adjudication(AdjudicationReason::MaxGameLength),
                ));
            }
        }
        if self.adjudication.tablebase_enabled && self.board.piece_count() <= self.adjudication.max_pieces {
            if let Some(tb) = &self.tablebase {
                if let Some(wdl) = tb.probe_wdl(&self.board) {
                    let mover = self.board.side_to_move();
                    let outcome = match wdl {
                        Wdl::Win => if mover.is_white() { GameResult::WhiteWin } else { GameResult::BlackWin },
                        Wdl::Loss => if mover.is_white() { GameResult::BlackWin } else { GameResult::WhiteWin },
                        Wdl::Draw => GameResult::Draw,
                    };
                    return Some(MatchResult::new(
                        outcome,
                        GameOverReason::Adjudication(AdjudicationReason::Tablebase),
                    ));
                }
            }
        }
        None
    }

    /// Idempotent: tells both adapters to stop their search and stores the
    /// result, entering `Stopped`.
    fn game_over(&mut self, result: MatchResult) {
        if matches!(self.state, MatchStatus::Stopped(_) | MatchStatus::Ending | MatchStatus::Ended) {
            return;
        }
        let _ = self.white.stop();
        let _ = self.black.stop();
        self.final_result = Some(result.clone());
        self.state = MatchStatus::Stopped(MatchResultHandle(result));
    }

    /// Called by the Scheduler once it has read the Result; waits up to
    /// `DETACH_GRACE` for both adapters to become idle or stopped.
    pub fn begin_ending(&mut self) {
        if matches!(self.state, MatchStatus::Stopped(_)) {
            self.ending_since = Some(Instant::now());
            self.pending_ponder_move = None;
            self.pondering_side = None;
            self.state = MatchStatus::Ending;
        }
    }

    fn tick_ending(&mut self) {
        let detachable = |a: &EngineAdapter| {
            a.computing() == ComputingState::Idle || a.state() == AdapterState::Stopped
        };
        let both_detachable = detachable(&self.white) && detachable(&self.black);
        let grace_elapsed = self.ending_since.is_some_and(|t| t.elapsed() > DETACH_GRACE);
        if both_detachable || grace_elapsed {
            self.state = MatchStatus::Ended;
        }
    }
}

fn idx(side: Color) -> usize {
    if side.is_white() { 0 } else { 1 }
}

fn terminal_result(terminal: Terminal, mover: Color) -> MatchResult {
    let winner_of_mate = if mover.is_white() { GameResult::WhiteWin } else { GameResult::BlackWin };
    match terminal {
        Terminal::Checkmate => MatchResult::new(winner_of_mate, GameOverReason::Mate),
        Terminal::Stalemate => MatchResult::new(GameResult::Draw, GameOverReason::Stalemate),
        Terminal::InsufficientMaterial => {
            MatchResult::new(GameResult::Draw, GameOverReason::InsufficientMaterial)
        }
        Terminal::FiftyMoveRule => MatchResult::new(GameResult::Draw, GameOverReason::FiftyMoves),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rules::board::NoTablebase;
    use rules::chess::Chessboard;

    #[test]
    fn terminal_result_attributes_mate_to_the_side_that_just_moved() {
        let result = terminal_result(Terminal::Checkmate, Color::White);
        assert_eq!(result.outcome, GameResult::WhiteWin);
        assert_eq!(result.reason, GameOverReason::Mate);
    }

    #[test]
    fn stalemate_is_always_a_draw() {
        let result = terminal_result(Terminal::Stalemate, Color::Black);
        assert_eq!(result.outcome, GameResult::Draw);
    }

    // Exercises the type checker more than runtime behavior: a Supervisor must be
    // constructible for a concrete Board with no tablebase configured.
    fn _assert_supervisor_is_constructible(w: EngineAdapter, b: EngineAdapter) {
        let _s: Supervisor<Chessboard, NoTablebase> = Supervisor::new(
            w,
            b,
            TimeControl::Infinite,
            Chessboard::startpos().to_fen(),
            Vec::new(),
            AdjudicationConfig::default(),
            None,
            false,
        );
    }
}
