//! UCI wire format: building outbound command strings and parsing inbound lines.
//! The state machine that drives these is in `adapter::mod`; this module only
//! knows the text, the way `monitors::play::player::limit_to_ugi` and
//! `monitors::play::ugi_input::handle_*` are pure functions over strings.

use std::time::Duration;

use rules::option::{EngineOption, EngineOptionType};
use rules::score::Score;
use rules::search::{Depth, GoLimits, SearchInfo};

pub const HANDSHAKE: &str = "uci";
pub const ISREADY: &str = "isready";
pub const NEW_GAME: &str = "ucinewgame";
pub const STOP: &str = "stop";
pub const QUIT: &str = "quit";
pub const PONDERHIT: &str = "ponderhit";

pub fn set_option_command(opt: &EngineOption) -> String {
    let value = opt.value.value_to_str();
    if matches!(opt.value, EngineOptionType::Button) {
        format!("setoption name {}", opt.name)
    } else {
        format!("setoption name {} value {}", opt.name, value)
    }
}

pub fn position_command(fen: Option<&str>, moves: &[String]) -> String {
    let mut s = match fen {
        Some(fen) => format!("position fen {fen}"),
        None => "position startpos".to_string(),
    };
    if !moves.is_empty() {
        s.push_str(" moves ");
        s.push_str(&moves.join(" "));
    }
    s
}

pub fn go_command(limits: &GoLimits) -> String {
    if limits.infinite {
        return "go infinite".to_string();
    }
    if let Some(Depth(d)) = limits.depth {
        return format!("go depth {d}");
    }
    if let Some(t) = limits.move_time {
        return format!("go movetime {}", t.as_millis());
    }
    let mut s = String::from("go");
    if let Some(w) = limits.wtime {
        s.push_str(&format!(" wtime {}", w.as_millis()));
    }
    if let Some(b) = limits.btime {
        s.push_str(&format!(" btime {}", b.as_millis()));
    }
    s.push_str(&format!(" winc {}", limits.winc.as_millis()));
    s.push_str(&format!(" binc {}", limits.binc.as_millis()));
    if let Some(m) = limits.moves_to_go {
        s.push_str(&format!(" movestogo {m}"));
    }
    s
}

/// Outcome of parsing one inbound line.
#[derive(Debug, Clone, PartialEq)]
pub enum UciLine {
    Id { name: Option<String>, author: Option<String> },
    Option(EngineOption),
    UciOk,
    ReadyOk,
    BestMove { mv: String, ponder: Option<String> },
    Info(SearchInfo),
    Unrecognized,
}

pub fn parse_line(line: &str) -> UciLine {
    let mut words = line.split_whitespace();
    match words.next() {
        Some("id") => {
            let rest: Vec<&str> = words.collect();
            if rest.first() == Some(&"name") {
                UciLine::Id { name: Some(rest[1..].join(" ")), author: None }
            } else if rest.first() == Some(&"author") {
                UciLine::Id { name: None, author: Some(rest[1..].join(" ")) }
            } else {
                UciLine::Unrecognized
            }
        }
        Some("uciok") => UciLine::UciOk,
        Some("readyok") => UciLine::ReadyOk,
        Some("option") => parse_option_line(line).map_or(UciLine::Unrecognized, UciLine::Option),
        Some("bestmove") => {
            let rest: Vec<&str> = words.collect();
            let mv = rest.first().map(|s| s.to_string()).unwrap_or_default();
            let ponder = rest
                .iter()
                .position(|w| *w == "ponder")
                .and_then(|i| rest.get(i + 1))
                .map(|s| s.to_string());
            UciLine::BestMove { mv, ponder }
        }
        Some("info") => UciLine::Info(parse_info_line(line)),
        _ => UciLine::Unrecognized,
    }
}

fn parse_option_line(line: &str) -> Option<EngineOption> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let name_pos = tokens.iter().position(|t| *t == "name")? + 1;
    let type_pos = tokens.iter().position(|t| *t == "type")?;
    let name = tokens[name_pos..type_pos].join(" ");
    let kind = *tokens.get(type_pos + 1)?;

    let find_after = |keyword: &str| -> Option<String> {
        let i = tokens.iter().position(|t| *t == keyword)?;
        let mut end = tokens.len();
        for k in ["default", "min", "max", "var"] {
            if k == keyword {
                continue;
            }
            if let Some(j) = tokens[i + 1..].iter().position(|t| *t == k) {
                end = end.min(i + 1 + j);
            }
        }
        Some(tokens[i + 1..end].join(" "))
    };

    let value = match kind {
        "check" => EngineOptionType::Check(rules::option::UgiCheck {
            val: find_after("default").as_deref() == Some("true"),
            default: find_after("default").map(|s| s == "true"),
        }),
        "spin" => EngineOptionType::Spin(rules::option::UgiSpin {
            val: find_after("default").and_then(|s| s.parse().ok()).unwrap_or(0),
            default: find_after("default").and_then(|s| s.parse().ok()),
            min: find_after("min").and_then(|s| s.parse().ok()),
            max: find_after("max").and_then(|s| s.parse().ok()),
        }),
        "combo" => {
            let options: Vec<String> = tokens
                .iter()
                .enumerate()
                .filter(|(_, t)| **t == "var")
                .filter_map(|(i, _)| tokens.get(i + 1))
                .map(|s| s.to_string())
                .collect();
            EngineOptionType::Combo(rules::option::UgiCombo {
                val: find_after("default").unwrap_or_default(),
                default: find_after("default"),
                options,
            })
        }
        "button" => EngineOptionType::Button,
        "string" => EngineOptionType::UString(rules::option::UgiString {
            val: find_after("default").unwrap_or_default(),
            default: find_after("default"),
        }),
        _ => return None,
    };
    Some(EngineOption { name, value, overridable: true })
}

fn parse_info_line(line: &str) -> SearchInfo {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let mut info = SearchInfo::default();
    let mut i = 1;
    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                info.depth = tokens.get(i + 1).and_then(|s| s.parse().ok()).map(Depth);
                i += 2;
            }
            "seldepth" => {
                info.seldepth = tokens.get(i + 1).and_then(|s| s.parse().ok()).map(Depth);
                i += 2;
            }
            "time" => {
                info.time = tokens
                    .get(i + 1)
                    .and_then(|s| s.parse().ok())
                    .map(Duration::from_millis)
                    .unwrap_or_default();
                i += 2;
            }
            "nodes" => {
                info.nodes = tokens.get(i + 1).and_then(|s| s.parse().ok());
                i += 2;
            }
            "score" => {
                if tokens.get(i + 1) == Some(&"cp") {
                    info.score = tokens.get(i + 2).and_then(|s| s.parse().ok()).map(Score);
                    i += 3;
                } else if tokens.get(i + 1) == Some(&"mate") {
                    let n: i32 = tokens.get(i + 2).and_then(|s| s.parse().ok()).unwrap_or(0);
                    info.score = Some(Score(rules::score::SCORE_WON.0 - n.unsigned_abs() as i32));
                    i += 3;
                } else {
                    i += 1;
                }
            }
            "pv" => {
                info.pv = tokens[i + 1..].iter().map(|s| s.to_string()).collect();
                break;
            }
            _ => i += 1,
        }
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn go_movetime_is_in_milliseconds() {
        let limits = GoLimits {
            move_time: Some(Duration::from_millis(500)),
            ..GoLimits::infinite()
        };
        assert_eq!(go_command(&limits), "go movetime 500");
    }

    #[test]
    fn bestmove_with_ponder_parses_both_moves() {
        match parse_line("bestmove e2e4 ponder e7e5") {
            UciLine::BestMove { mv, ponder } => {
                assert_eq!(mv, "e2e4");
                assert_eq!(ponder.as_deref(), Some("e7e5"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn option_spin_parses_bounds() {
        match parse_option_line("option name Hash type spin default 16 min 1 max 33554432") {
            Some(EngineOption { value: EngineOptionType::Spin(spin), .. }) => {
                assert_eq!(spin.default, Some(16));
                assert_eq!(spin.min, Some(1));
                assert_eq!(spin.max, Some(33554432));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
