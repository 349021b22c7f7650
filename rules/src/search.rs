//! The small amount of search-adjacent vocabulary shared between the tourney core
//! and the engine protocols: the "go" parameters sent to an engine and the "info"
//! reply it's parsed from. Named and shaped after `gears::search`, trimmed to what
//! a match supervisor (rather than a searching engine) needs.

use std::fmt::{Display, Formatter};
use std::num::NonZeroU64;
use std::time::Duration;

use crate::score::Score;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
#[must_use]
pub struct Depth(pub u32);

impl Depth {
    pub const MAX: Depth = Depth(u32::MAX);
}

pub type NodesLimit = Option<NonZeroU64>;

/// What gets translated into the engine's "go" line. Exactly one "mode" is active,
/// matching the time control modes: `Infinite`, `Depth(d)`, `MoveTime(t)`, or the
/// per-side clock values of `Standard` (passed in as `wtime`/`btime`).
#[derive(Copy, Clone, Debug)]
#[must_use]
pub struct GoLimits {
    pub infinite: bool,
    pub depth: Option<Depth>,
    pub move_time: Option<Duration>,
    pub wtime: Option<Duration>,
    pub btime: Option<Duration>,
    pub winc: Duration,
    pub binc: Duration,
    pub moves_to_go: Option<u32>,
}

impl GoLimits {
    pub fn infinite() -> Self {
        Self {
            infinite: true,
            depth: None,
            move_time: None,
            wtime: None,
            btime: None,
            winc: Duration::ZERO,
            binc: Duration::ZERO,
            moves_to_go: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
#[must_use]
pub struct SearchInfo {
    pub depth: Option<Depth>,
    pub seldepth: Option<Depth>,
    pub time: Duration,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<String>,
}

impl Display for SearchInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "depth {:?} score {:?} pv {}", self.depth, self.score, self.pv.join(" "))
    }
}
