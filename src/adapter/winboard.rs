//! Winboard/XBoard v2 wire format, grounded in `original_source/src/base/comm.cpp`
//! and `src/game/wbengine.cpp`: feature negotiation, ping/pong serialization,
//! `usermove`, SAN-vs-coordinate moves, and `level`/`st`/`sd`/`time`/`otim`.
//! Written in the same free-function, string-in-string-out style as `uci.rs`
//! so the two dialects plug into `adapter::mod` identically.

use std::time::Duration;

use rules::score::Score;
use rules::search::{Depth, SearchInfo};

pub const HANDSHAKE_XBOARD: &str = "xboard";
pub const HANDSHAKE_PROTOVER: &str = "protover 2";
pub const NEW_GAME: &str = "new";
pub const FORCE: &str = "force";
pub const GO: &str = "go";
pub const QUIT: &str = "quit";
pub const PONDERHIT: &str = "hint"; // xboard has no ponderhit; continuing is implicit

/// Features negotiated during `begin`, per §4.1.
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub ping: bool,
    pub usermove: bool,
    pub san: bool,
    pub setboard: bool,
    pub reuse: bool,
    pub memory: bool,
    pub smp: bool,
    pub variants: Vec<String>,
    pub myname: Option<String>,
    /// `done=0` extends the init window; `done=1` (or silence past the grace
    /// window) ends negotiation.
    pub done: Option<bool>,
}

pub fn setboard_command(fen: &str) -> String {
    format!("setboard {fen}")
}

pub fn ping_command(n: u32) -> String {
    format!("ping {n}")
}

pub fn accepted_command(feature: &str) -> String {
    format!("accepted {feature}")
}

/// `level <moves> <base-minutes[:seconds]> <increment-seconds>`.
pub fn level_command(moves_per_control: u32, base: Duration, increment: Duration) -> String {
    let mins = base.as_secs() / 60;
    let secs = base.as_secs() % 60;
    let base_field = if secs == 0 { format!("{mins}") } else { format!("{mins}:{secs:02}") };
    format!("level {moves_per_control} {base_field} {}", increment.as_secs())
}

pub fn st_command(move_time: Duration) -> String {
    format!("st {}", move_time.as_secs())
}

pub fn sd_command(depth: u32) -> String {
    format!("sd {depth}")
}

/// `time`/`otim` are in centiseconds, per §4.1.
pub fn time_command(my_time: Duration) -> String {
    format!("time {}", my_time.as_millis() / 10)
}

pub fn otim_command(opp_time: Duration) -> String {
    format!("otim {}", opp_time.as_millis() / 10)
}

/// Moves to the engine are prefixed with `usermove` and encoded SAN or coordinate
/// depending on the negotiated features.
pub fn move_command(text: &str, features: &Features) -> String {
    if features.usermove {
        format!("usermove {text}")
    } else {
        text.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WbLine {
    Feature(Vec<(String, String)>),
    Move(String),
    Resign,
    OfferDraw,
    Illegal(String),
    Pong(u32),
    Unrecognized,
}

pub fn parse_line(line: &str) -> WbLine {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("feature ") {
        return WbLine::Feature(parse_feature_pairs(rest));
    }
    if let Some(rest) = line.strip_prefix("move ") {
        return WbLine::Move(rest.trim().to_string());
    }
    if line == "resign" {
        return WbLine::Resign;
    }
    if line.starts_with("offer draw") {
        return WbLine::OfferDraw;
    }
    if let Some(rest) = line.strip_prefix("Illegal move") {
        return WbLine::Illegal(rest.trim_start_matches([':', ' ']).to_string());
    }
    if let Some(rest) = line.strip_prefix("pong ") {
        if let Ok(n) = rest.trim().parse() {
            return WbLine::Pong(n);
        }
    }
    WbLine::Unrecognized
}

/// `feature name1=value1 name2="quoted value" ...`, one or more per line.
fn parse_feature_pairs(rest: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut chars = rest.chars().peekable();
    loop {
        let mut name = String::new();
        while let Some(&c) = chars.peek() {
            if c == '=' {
                break;
            }
            name.push(c);
            chars.next();
        }
        if chars.next().is_none() {
            break; // no '=' left, done
        }
        let mut value = String::new();
        if chars.peek() == Some(&'"') {
            chars.next();
            for c in chars.by_ref() {
                if c == '"' {
                    break;
                }
                value.push(c);
            }
        } else {
            while let Some(&c) = chars.peek() {
                if c.is_whitespace() {
                    break;
                }
                value.push(c);
                chars.next();
            }
        }
        pairs.push((name.trim().to_string(), value));
        while chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }
    }
    pairs
}

/// A thinking-output line: `score depth time nodes [pv ...]`, time in
/// centiseconds. `None` if the line isn't shaped like one (caller only tries
/// this on lines starting with an ASCII digit).
pub fn parse_thinking_line(line: &str) -> Option<SearchInfo> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.len() < 4 {
        return None;
    }
    let score_cp: i32 = tokens[0].parse().ok()?;
    let depth: u32 = tokens[1].parse().ok()?;
    let centis: u64 = tokens[2].parse().ok()?;
    let nodes: u64 = tokens[3].parse().ok()?;
    let pv = tokens[4..].iter().map(|s| s.to_string()).collect();
    Some(SearchInfo {
        depth: Some(Depth(depth)),
        seldepth: None,
        time: Duration::from_millis(centis * 10),
        nodes: Some(nodes),
        score: Some(Score(score_cp)),
        pv,
    })
}

pub fn apply_feature(features: &mut Features, name: &str, value: &str) {
    match name {
        "ping" => features.ping = value == "1",
        "usermove" => features.usermove = value == "1",
        "san" => features.san = value == "1",
        "setboard" => features.setboard = value == "1",
        "reuse" => features.reuse = value == "1",
        "memory" => features.memory = value == "1",
        "smp" => features.smp = value == "1",
        "myname" => features.myname = Some(value.to_string()),
        "variants" => features.variants = value.split(',').map(str::to_string).collect(),
        "done" => features.done = Some(value == "1"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_features_on_one_line() {
        match parse_line(r#"feature ping=1 usermove=1 myname="Stub Engine" done=1"#) {
            WbLine::Feature(pairs) => {
                assert_eq!(pairs, vec![
                    ("ping".to_string(), "1".to_string()),
                    ("usermove".to_string(), "1".to_string()),
                    ("myname".to_string(), "Stub Engine".to_string()),
                    ("done".to_string(), "1".to_string()),
                ]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn level_with_fractional_minutes_includes_seconds() {
        assert_eq!(level_command(40, Duration::from_secs(90), Duration::ZERO), "level 40 1:30 0");
        assert_eq!(level_command(0, Duration::from_secs(300), Duration::from_secs(5)), "level 0 5 5");
    }

    #[test]
    fn move_is_prefixed_only_when_usermove_is_negotiated() {
        let mut features = Features::default();
        assert_eq!(move_command("e2e4", &features), "e2e4");
        features.usermove = true;
        assert_eq!(move_command("e2e4", &features), "usermove e2e4");
    }

    #[test]
    fn pong_is_parsed() {
        assert_eq!(parse_line("pong 7"), WbLine::Pong(7));
    }
}
