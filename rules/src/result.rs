//! Match status and result types, analogous to the top-level enums in `gears::lib`.
//! Kept here rather than re-derived by the core because both the rule collaborator
//! and the tourney core need to agree on what a finished game looks like.

use std::fmt::{Display, Formatter};

use crate::color::Color;

/// Result of a game from a single player's perspective.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[must_use]
pub enum PlayerResult {
    Win,
    Lose,
    Draw,
}

impl PlayerResult {
    pub fn flip(self) -> Self {
        match self {
            PlayerResult::Win => PlayerResult::Lose,
            PlayerResult::Lose => PlayerResult::Win,
            PlayerResult::Draw => PlayerResult::Draw,
        }
    }
}

/// A `PlayerResult` together with the reason it happened.
#[derive(Clone, Eq, PartialEq, Debug)]
#[must_use]
pub struct GameOver {
    pub result: PlayerResult,
    pub reason: GameOverReason,
}

/// The two-sided outcome of a finished game.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[must_use]
pub enum GameResult {
    WhiteWin,
    BlackWin,
    Draw,
}

impl Display for GameResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GameResult::WhiteWin => write!(f, "1-0"),
            GameResult::BlackWin => write!(f, "0-1"),
            GameResult::Draw => write!(f, "1/2-1/2"),
        }
    }
}

impl From<GameResult> for f64 {
    fn from(value: GameResult) -> Self {
        match value {
            GameResult::WhiteWin => 1.0,
            GameResult::BlackWin => 0.0,
            GameResult::Draw => 0.5,
        }
    }
}

/// Why a game ended.
#[derive(Clone, Eq, PartialEq, Debug)]
#[must_use]
pub enum GameOverReason {
    Mate,
    Stalemate,
    Repetition,
    FiftyMoves,
    InsufficientMaterial,
    IllegalMove,
    Timeout,
    Resign,
    Adjudication(AdjudicationReason),
    Crash,
}

impl Display for GameOverReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GameOverReason::Mate => write!(f, "Checkmate"),
            GameOverReason::Stalemate => write!(f, "Stalemate"),
            GameOverReason::Repetition => write!(f, "Draw by threefold repetition"),
            GameOverReason::FiftyMoves => write!(f, "Draw by fifty-move rule"),
            GameOverReason::InsufficientMaterial => write!(f, "Draw by insufficient material"),
            GameOverReason::IllegalMove => write!(f, "Illegal move"),
            GameOverReason::Timeout => write!(f, "Time forfeit"),
            GameOverReason::Resign => write!(f, "Resignation"),
            GameOverReason::Adjudication(a) => write!(f, "Adjudication: {a}"),
            GameOverReason::Crash => write!(f, "Engine crashed"),
        }
    }
}

/// Why an `Adjudicator` (or the user) ended a game instead of the rules.
#[derive(Clone, Eq, PartialEq, Debug)]
#[must_use]
pub enum AdjudicationReason {
    ScoreThreshold(String),
    MaxGameLength,
    Tablebase,
    AbortedByUser,
}

impl Display for AdjudicationReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AdjudicationReason::ScoreThreshold(msg) => write!(f, "{msg}"),
            AdjudicationReason::MaxGameLength => write!(f, "maximum game length reached"),
            AdjudicationReason::Tablebase => write!(f, "tablebase result"),
            AdjudicationReason::AbortedByUser => write!(f, "aborted by user"),
        }
    }
}

/// A finished game's outcome, reason, and a free-text comment for the PGN/log.
#[derive(Clone, PartialEq, Debug)]
#[must_use]
pub struct MatchResult {
    pub outcome: GameResult,
    pub reason: GameOverReason,
    pub comment: String,
}

impl MatchResult {
    pub fn new(outcome: GameResult, reason: GameOverReason) -> Self {
        Self { outcome, reason, comment: String::new() }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }
}

/// Converts a one-sided `GameOver` into the two-sided `MatchResult`, given which
/// color the reporting player was playing.
pub fn player_res_to_match_res(game_over: GameOver, color: Color) -> MatchResult {
    let outcome = match game_over.result {
        PlayerResult::Draw => GameResult::Draw,
        PlayerResult::Win => {
            if color.is_white() {
                GameResult::WhiteWin
            } else {
                GameResult::BlackWin
            }
        }
        PlayerResult::Lose => {
            if color.is_white() {
                GameResult::BlackWin
            } else {
                GameResult::WhiteWin
            }
        }
    };
    MatchResult::new(outcome, game_over.reason)
}

/// The Supervisor's lifecycle state for one game.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
#[must_use]
pub enum MatchStatus {
    #[default]
    None,
    Begin,
    Ready,
    Playing,
    Stopped(MatchResultHandle),
    Ending,
    Ended,
}

/// `MatchResult` isn't `Eq`/`Copy` (it holds an owned comment), so `MatchStatus`
/// stores it behind a small wrapper to keep deriving `PartialEq` cheap and to make
/// the "a Stopped status always carries its result" invariant explicit in the type.
#[derive(Clone, Debug)]
pub struct MatchResultHandle(pub MatchResult);

impl PartialEq for MatchResultHandle {
    fn eq(&self, other: &Self) -> bool {
        self.0.outcome == other.0.outcome && self.0.reason == other.0.reason
    }
}
