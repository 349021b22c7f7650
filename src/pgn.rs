//! PGN rendering (§6): a passive observer of a finished match, producing the
//! seven-tag roster plus `TimeControl`/`Time`/optional `Termination`/`FEN`/`SetUp`,
//! followed by SAN moves with optional per-move comments. Adapted from
//! `gears::output::pgn::match_to_pgn_string`, generalized from one in-process
//! game to a tournament record with its own players/round/openings.

use std::fmt::Write as _;

use rules::board::Board;
use rules::color::Color;
use rules::result::{GameOverReason, MatchResult};

/// A per-move annotation, attached when the adapter reported `info` alongside
/// the move that produced it.
#[derive(Clone, Debug, Default)]
pub struct MoveComment {
    pub score_cp: Option<i32>,
    pub depth: Option<u32>,
    pub elapsed_ms: Option<u64>,
}

impl MoveComment {
    fn render(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(cp) = self.score_cp {
            parts.push(format!("{:+.2}/", cp as f64 / 100.0));
        }
        if let Some(d) = self.depth {
            if let Some(last) = parts.last_mut() {
                last.push_str(&d.to_string());
            } else {
                parts.push(d.to_string());
            }
        }
        if let Some(ms) = self.elapsed_ms {
            parts.push(format!("{:.1}s", ms as f64 / 1000.0));
        }
        if parts.is_empty() { None } else { Some(parts.join(" ")) }
    }
}

pub struct PgnGame<'a> {
    pub event: &'a str,
    pub site: &'a str,
    pub round: u32,
    pub white: &'a str,
    pub black: &'a str,
    pub time_control: &'a str,
    pub start_fen: Option<&'a str>,
    pub moves: &'a [String],
    pub comments: &'a [MoveComment],
    pub result: &'a MatchResult,
}

fn termination_tag(reason: &GameOverReason) -> &'static str {
    match reason {
        GameOverReason::Mate
        | GameOverReason::Stalemate
        | GameOverReason::Repetition
        | GameOverReason::FiftyMoves
        | GameOverReason::InsufficientMaterial => "normal",
        GameOverReason::Timeout => "time forfeit",
        GameOverReason::IllegalMove => "rules infraction",
        GameOverReason::Resign => "normal",
        GameOverReason::Crash => "emergency",
        GameOverReason::Adjudication(_) => "adjudication",
    }
}

/// Renders one game as a standalone PGN text, replaying `moves` on a fresh
/// `B` to recover SAN from the coordinate-format history the Supervisor stored.
pub fn render<B: Board>(game: &PgnGame, date: &str) -> rules::Res<String> {
    let mut out = String::new();
    writeln!(out, "[Event \"{}\"]", game.event)?;
    writeln!(out, "[Site \"{}\"]", game.site)?;
    writeln!(out, "[Date \"{date}\"]")?;
    writeln!(out, "[Round \"{}\"]", game.round)?;
    writeln!(out, "[White \"{}\"]", game.white)?;
    writeln!(out, "[Black \"{}\"]", game.black)?;
    writeln!(out, "[Result \"{}\"]", game.result.outcome)?;
    writeln!(out, "[TimeControl \"{}\"]", game.time_control)?;
    if let Some(fen) = game.start_fen {
        if fen != "startpos" {
            writeln!(out, "[SetUp \"1\"]")?;
            writeln!(out, "[FEN \"{fen}\"]")?;
        }
    }
    writeln!(out, "[Termination \"{}\"]", termination_tag(&game.result.reason))?;
    writeln!(out)?;

    let mut board = match game.start_fen {
        Some(fen) if fen != "startpos" => B::from_fen(fen)?,
        _ => B::startpos(),
    };
    let mut body = String::new();
    for (ply, text) in game.moves.iter().enumerate() {
        let mv = board.parse_coordinate_move(text)?;
        let san = board.to_san_text(mv);
        if board.side_to_move() == Color::White {
            write!(body, "{}. ", ply / 2 + 1)?;
        } else if ply == 0 {
            write!(body, "1... ")?;
        }
        write!(body, "{san} ")?;
        if let Some(comment) = game.comments.get(ply).and_then(MoveComment::render) {
            write!(body, "{{{comment}}} ")?;
        }
        board = board.make_move(mv).ok_or_else(|| anyhow::anyhow!("stored move '{text}' made an illegal position"))?;
    }
    out.push_str(body.trim_end());
    write!(out, " {}", game.result.outcome)?;
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rules::chess::Chessboard;
    use rules::result::GameResult;

    #[test]
    fn renders_a_short_decisive_game() {
        let game = PgnGame {
            event: "Test Event",
            site: "localhost",
            round: 1,
            white: "EngineA",
            black: "EngineB",
            time_control: "40/60+0.5",
            start_fen: None,
            moves: &["f2f3".to_string(), "e7e5".to_string(), "g2g4".to_string(), "d8h4".to_string()],
            comments: &[],
            result: &MatchResult::new(GameResult::BlackWin, GameOverReason::Mate),
        };
        let pgn = render::<Chessboard>(&game, "2026.07.27").unwrap();
        assert!(pgn.contains("[White \"EngineA\"]"));
        assert!(pgn.contains("1. f3 e5 2. g4 Qh4#"));
        assert!(pgn.contains("0-1"));
    }

    #[test]
    fn non_standard_start_gets_fen_and_setup_tags() {
        let fen = "6k1/6pp/8/8/8/8/5PPP/4R1K1 w - - 0 1";
        let game = PgnGame {
            event: "Test Event",
            site: "localhost",
            round: 1,
            white: "A",
            black: "B",
            time_control: "movetime 500",
            start_fen: Some(fen),
            moves: &["e1e8".to_string()],
            comments: &[],
            result: &MatchResult::new(GameResult::WhiteWin, GameOverReason::Mate),
        };
        let pgn = render::<Chessboard>(&game, "2026.07.27").unwrap();
        assert!(pgn.contains("[SetUp \"1\"]"));
        assert!(pgn.contains(&format!("[FEN \"{fen}\"]")));
    }
}
