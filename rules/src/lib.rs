//! Chess-rule and opening-book collaborator. Everything the tourney core needs
//! from the rule engine is expressed through the `Board`/`Tablebase`/`Book`
//! interfaces in this crate; `chess` is the only concrete `Board` implementation
//! today, backed by `shakmaty`.

pub mod board;
pub mod book;
pub mod chess;
pub mod color;
pub mod common;
pub mod option;
pub mod output;
pub mod result;
pub mod score;
pub mod search;

#[cfg(feature = "syzygy")]
pub mod syzygy;

pub use board::{Board, Tablebase, Terminal, Wdl};
pub use book::{Book, BookFormat, Opening};
pub use chess::Chessboard;
pub use color::Color;
pub use common::{NamedEntity, Res};
pub use option::{EngineOption, EngineOptionType, UgiCheck, UgiCombo, UgiSpin, UgiString};
pub use result::{
    AdjudicationReason, GameOver, GameOverReason, GameResult, MatchResult, MatchResultHandle,
    MatchStatus, PlayerResult, player_res_to_match_res,
};
pub use score::Score;
pub use search::{Depth, GoLimits, NodesLimit, SearchInfo};
