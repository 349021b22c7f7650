//! Opening-book loading, grounded in the original `BookEdp`/`BookPgn` pair: an EPD
//! book is just a list of FEN lines, a PGN book is a list of move sequences played
//! out from the standard initial position. Polyglot is out of scope for now; a
//! malformed or empty book falls back to the standard initial position, same as
//! the source's `getRandomFEN` returning an empty string on failure.

use std::fs;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::board::Board;
use crate::chess::Chessboard;
use crate::common::Res;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BookFormat {
    Epd,
    Pgn,
}

/// One opening: a starting FEN plus the moves (in coordinate notation) to replay
/// on top of it, matching `Book.sample() -> (startFen, startMoves)`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Opening {
    pub start_fen: String,
    pub start_moves: Vec<String>,
}

impl Opening {
    pub fn standard() -> Self {
        Self { start_fen: Chessboard::startpos().to_fen(), start_moves: Vec::new() }
    }
}

#[derive(Clone, Debug, Default)]
pub struct Book {
    format: Option<BookFormat>,
    fens: Vec<String>,
    lines: Vec<Vec<String>>,
}

impl Book {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn load(path: &Path, format: BookFormat) -> Res<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("can't read book '{}': {e}", path.display()))?;
        match format {
            BookFormat::Epd => Ok(Self::from_epd(&text)),
            BookFormat::Pgn => Ok(Self::from_pgn(&text)),
        }
    }

    fn from_epd(text: &str) -> Self {
        let fens = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        Self { format: Some(BookFormat::Epd), fens, lines: Vec::new() }
    }

    fn from_pgn(text: &str) -> Self {
        let mut lines = Vec::new();
        let mut move_text = String::new();
        for line in text.lines() {
            if line.starts_with('[') {
                continue;
            }
            if line.trim().is_empty() {
                if let Some(moves) = Self::parse_san_line(&move_text) {
                    lines.push(moves);
                }
                move_text.clear();
            } else {
                move_text.push(' ');
                move_text.push_str(line);
            }
        }
        if let Some(moves) = Self::parse_san_line(&move_text) {
            lines.push(moves);
        }
        Self { format: Some(BookFormat::Pgn), fens: Vec::new(), lines }
    }

    fn parse_san_line(move_text: &str) -> Option<Vec<String>> {
        let mut board = Chessboard::startpos();
        let mut coords = Vec::new();
        for word in move_text.split_whitespace() {
            let word = word.trim_end_matches(|c: char| "!?+#".contains(c));
            if word.is_empty() || word.ends_with('.') || matches!(word, "1-0" | "0-1" | "1/2-1/2" | "*") {
                continue;
            }
            let word = word.rsplit('.').next().unwrap_or(word);
            if word.is_empty() {
                continue;
            }
            let Ok(mv) = board.parse_san_move(word) else {
                break;
            };
            coords.push(board.to_coordinate_text(mv));
            board = board.make_move(mv).expect("just-parsed move is legal");
        }
        if coords.is_empty() {
            None
        } else {
            Some(coords)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fens.is_empty() && self.lines.is_empty()
    }

    pub fn size(&self) -> usize {
        self.fens.len() + self.lines.len()
    }

    /// Draws a random opening; falls back to the standard start position if the
    /// book is empty or every sampled entry turns out to be invalid.
    pub fn sample(&self, seed: u64) -> Opening {
        let mut rng = StdRng::seed_from_u64(seed);
        for _ in 0..5 {
            match self.format {
                Some(BookFormat::Epd) if !self.fens.is_empty() => {
                    let idx = rng.random_range(0..self.fens.len());
                    let fen = &self.fens[idx];
                    if Chessboard::from_fen(fen).is_ok() {
                        return Opening { start_fen: fen.clone(), start_moves: Vec::new() };
                    }
                }
                Some(BookFormat::Pgn) if !self.lines.is_empty() => {
                    let idx = rng.random_range(0..self.lines.len());
                    return Opening {
                        start_fen: Chessboard::startpos().to_fen(),
                        start_moves: self.lines[idx].clone(),
                    };
                }
                _ => break,
            }
        }
        Opening::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_book_falls_back_to_standard() {
        let book = Book::empty();
        let opening = book.sample(1);
        assert_eq!(opening.start_fen, Chessboard::startpos().to_fen());
        assert!(opening.start_moves.is_empty());
    }

    #[test]
    fn epd_book_samples_a_loaded_fen() {
        let book = Book::from_epd("r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3\n");
        let opening = book.sample(42);
        assert_eq!(opening.start_fen, "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3");
    }

    #[test]
    fn pgn_book_yields_coordinate_moves() {
        let book = Book::from_pgn("[Event \"test\"]\n\n1. e4 e5 2. Nf3 *\n");
        let opening = book.sample(7);
        assert_eq!(opening.start_moves, vec!["e2e4", "e7e5", "g1f3"]);
    }
}
