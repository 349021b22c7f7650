//! The `Board` implementation backing real games: a thin adapter over `shakmaty`,
//! which does the actual move generation, FEN/SAN parsing, and Zobrist hashing.

use std::fmt::{Display, Formatter};

use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::uci::UciMove;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, Color as ShakColor, EnPassantMode, Position};

use crate::board::{Board, Terminal};
use crate::color::Color;
use crate::common::Res;

impl From<ShakColor> for Color {
    fn from(value: ShakColor) -> Self {
        match value {
            ShakColor::White => Color::White,
            ShakColor::Black => Color::Black,
        }
    }
}

/// A standard chess position, playable through the `Board` interface.
#[derive(Clone, Debug)]
pub struct Chessboard {
    pos: Chess,
}

impl Chessboard {
    pub fn inner(&self) -> &Chess {
        &self.pos
    }
}

impl Display for Chessboard {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_fen())
    }
}

impl Board for Chessboard {
    type Move = shakmaty::Move;

    fn startpos() -> Self {
        Self { pos: Chess::default() }
    }

    fn from_fen(fen: &str) -> Res<Self> {
        let setup = Fen::from_ascii(fen.as_bytes())
            .map_err(|e| anyhow::anyhow!("invalid FEN '{fen}': {e}"))?;
        let pos = setup
            .into_position(CastlingMode::Standard)
            .map_err(|e| anyhow::anyhow!("FEN '{fen}' is not a legal position: {e}"))?;
        Ok(Self { pos })
    }

    fn to_fen(&self) -> String {
        Fen::from_position(self.pos.clone(), EnPassantMode::Legal).to_string()
    }

    fn side_to_move(&self) -> Color {
        self.pos.turn().into()
    }

    fn halfmove_clock(&self) -> u32 {
        self.pos.halfmoves()
    }

    fn fullmove_number(&self) -> u32 {
        self.pos.fullmoves().get()
    }

    fn piece_count(&self) -> u32 {
        self.pos.board().occupied().count() as u32
    }

    fn legal_moves(&self) -> Vec<Self::Move> {
        self.pos.legal_moves().into_iter().collect()
    }

    fn make_move(&self, mv: Self::Move) -> Option<Self> {
        self.pos.clone().play(&mv).ok().map(|pos| Self { pos })
    }

    fn parse_coordinate_move(&self, text: &str) -> Res<Self::Move> {
        let uci: UciMove = text
            .parse()
            .map_err(|e| anyhow::anyhow!("'{text}' is not a coordinate move: {e}"))?;
        uci.to_move(&self.pos)
            .map_err(|e| anyhow::anyhow!("'{text}' is illegal here: {e}"))
    }

    fn parse_san_move(&self, text: &str) -> Res<Self::Move> {
        let san: San = text
            .parse()
            .map_err(|e| anyhow::anyhow!("'{text}' is not a SAN move: {e}"))?;
        san.to_move(&self.pos)
            .map_err(|e| anyhow::anyhow!("'{text}' is illegal here: {e}"))
    }

    fn to_coordinate_text(&self, mv: Self::Move) -> String {
        UciMove::from_standard(&mv).to_string()
    }

    fn to_san_text(&self, mv: Self::Move) -> String {
        San::from_move(&self.pos, &mv).to_string()
    }

    fn zobrist_hash(&self) -> u64 {
        let hash: Zobrist64 = self.pos.zobrist_hash(EnPassantMode::Legal);
        hash.0
    }

    fn terminal(&self) -> Option<Terminal> {
        if self.pos.is_checkmate() {
            Some(Terminal::Checkmate)
        } else if self.pos.is_stalemate() {
            Some(Terminal::Stalemate)
        } else if self.pos.is_insufficient_material() {
            Some(Terminal::InsufficientMaterial)
        } else if self.pos.halfmoves() >= 100 {
            Some(Terminal::FiftyMoveRule)
        } else {
            None
        }
    }

    fn can_reasonably_win(&self, side: Color) -> bool {
        let shak_color = match side {
            Color::White => ShakColor::White,
            Color::Black => ShakColor::Black,
        };
        let non_king_material = self.pos.board().by_color(shak_color)
            & !self.pos.board().kings();
        !non_king_material.is_empty() && !self.pos.is_insufficient_material()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn startpos_has_twenty_legal_moves() {
        let board = Chessboard::startpos();
        assert_eq!(board.legal_moves().len(), 20);
        assert_eq!(board.side_to_move(), Color::White);
    }

    #[test]
    fn fen_round_trips() {
        let board = Chessboard::startpos();
        let fen = board.to_fen();
        let back = Chessboard::from_fen(&fen).unwrap();
        assert_eq!(back.to_fen(), fen);
    }

    #[test]
    fn fools_mate_is_detected() {
        let mut board = Chessboard::startpos();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            let parsed = board.parse_coordinate_move(mv).unwrap();
            board = board.make_move(parsed).expect("legal move");
        }
        assert_eq!(board.terminal(), Some(Terminal::Checkmate));
    }
}
