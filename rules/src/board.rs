//! The boundary to the chess-rule engine: make a move, undo, generate legal moves,
//! test legality of a proposed move, produce/parse FEN, produce/parse SAN and
//! coordinate move strings, hash the position, detect terminal conditions, and
//! probe an optional endgame tablebase.
//!
//! Boards are cheap-to-copy value types (mirroring `gears::general::board::Board`,
//! which requires `Copy`); "undo" is therefore not a method on `Board` itself, it's
//! the caller keeping the previous value around instead of mutating in place.

use std::fmt::{Debug, Display};

use crate::color::Color;
use crate::common::Res;

/// Outcome of testing a position against the rule engine's end-of-game conditions.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Terminal {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
}

/// Win/draw/loss from the side-to-move's perspective, as reported by a tablebase probe.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Wdl {
    Win,
    Draw,
    Loss,
}

pub trait Board: Clone + Debug + Display + Send + 'static {
    type Move: Copy + Clone + Eq + Debug + Display + Send;

    fn startpos() -> Self;
    fn from_fen(fen: &str) -> Res<Self>;
    fn to_fen(&self) -> String;

    fn side_to_move(&self) -> Color;
    fn halfmove_clock(&self) -> u32;
    fn fullmove_number(&self) -> u32;
    fn piece_count(&self) -> u32;

    fn legal_moves(&self) -> Vec<Self::Move>;
    fn is_legal(&self, mv: Self::Move) -> bool {
        self.legal_moves().contains(&mv)
    }
    /// Returns `None` if `mv` is illegal in this position, exactly like
    /// `gears::general::board::Board::make_move`.
    fn make_move(&self, mv: Self::Move) -> Option<Self>;

    fn parse_coordinate_move(&self, text: &str) -> Res<Self::Move>;
    fn parse_san_move(&self, text: &str) -> Res<Self::Move>;
    fn to_coordinate_text(&self, mv: Self::Move) -> String;
    fn to_san_text(&self, mv: Self::Move) -> String;

    fn zobrist_hash(&self) -> u64;

    fn terminal(&self) -> Option<Terminal>;

    /// Threefold repetition needs the position history, which only the Supervisor
    /// keeps; `hash_history` is every position hash played so far, including the
    /// current one.
    fn is_repetition(&self, hash_history: &[u64]) -> bool {
        let current = self.zobrist_hash();
        hash_history.iter().filter(|h| **h == current).count() >= 3
    }

    /// True if there's at least a theoretical chance that `side` can still win,
    /// i.e. mating material exists. Used by human-adjacent draw adjudication;
    /// kept here since it's a pure rule-engine query.
    fn can_reasonably_win(&self, side: Color) -> bool;
}

/// The optional Syzygy-style endgame tablebase collaborator.
pub trait Tablebase<B: Board> {
    fn max_pieces(&self) -> u32;
    fn probe_wdl(&self, board: &B) -> Option<Wdl>;
}

/// A tablebase that's never configured; `probe_wdl` always returns `None` so
/// adjudication silently skips the tablebase step.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTablebase;

impl<B: Board> Tablebase<B> for NoTablebase {
    fn max_pieces(&self) -> u32 {
        0
    }

    fn probe_wdl(&self, _board: &B) -> Option<Wdl> {
        None
    }
}
