//! Tournament JSON and engine-catalogue JSON parsing (§6). Grounded in
//! `original_source/src/game/tourmng.cpp`'s `ConfigMng::loadOverrideOptions` and
//! `TourMng::load*` (key names: "base", "time control", "players", "inclusive
//! players", "game adjudication", "openings", "override options") and
//! `src/game/jsonengine.cpp`/`engineprofile.cpp` for the engine-catalogue shape
//! (`app`/`options`). Neither `monitors` nor `gears` has a JSON config layer of
//! its own (a single GUI match needs none), so this is new surface, written in
//! the same "small function per key, `serde_json::Value` in, typed struct out"
//! style `rules::common::parse_seconds` already established.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::Value;

use rules::Res;
use rules::book::BookFormat;
use rules::option::{EngineOption, EngineOptionType, UgiCheck, UgiCombo, UgiSpin, UgiString};

use crate::adapter::{EngineAdapterConfig, Protocol};
use crate::clock::TimeControl;
use crate::pairing::{Format, InclusiveFilter, InclusiveSide, PairingConfig};
use crate::supervisor::AdjudicationConfig;

fn secs(value: &Value, name: &str) -> Res<Duration> {
    Ok(Duration::from_secs_f64(rules::common::parse_seconds(value, name)?.max(0.0)))
}

fn member<'a>(v: &'a Value, key: &str) -> Option<&'a Value> {
    v.get(key)
}

fn str_field(v: &Value, key: &str) -> Option<String> {
    member(v, key).and_then(Value::as_str).map(str::to_string)
}

fn bool_field(v: &Value, key: &str, default: bool) -> bool {
    member(v, key).and_then(Value::as_bool).unwrap_or(default)
}

fn u32_field(v: &Value, key: &str, default: u32) -> u32 {
    member(v, key).and_then(Value::as_u64).map(|n| n as u32).unwrap_or(default)
}

/// Opening-selection policy (§4.6): how a drawn opening is shared across the
/// records of one pairing round.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum OpeningPolicy {
    /// Both games of a pair use one opening.
    #[default]
    SamePair,
    /// Each record gets a freshly sampled opening.
    AllNew,
    /// Every record in the tournament shares one opening.
    AllOne,
}

impl OpeningPolicy {
    fn parse(s: &str) -> Self {
        match s {
            "allnew" => OpeningPolicy::AllNew,
            "allone" => OpeningPolicy::AllOne,
            _ => OpeningPolicy::SamePair,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OpeningsConfig {
    pub book_path: Option<PathBuf>,
    pub book_format: BookFormat,
    pub policy: OpeningPolicy,
    pub seed: u64,
}

impl Default for OpeningsConfig {
    fn default() -> Self {
        Self { book_path: None, book_format: BookFormat::Epd, policy: OpeningPolicy::default(), seed: 0 }
    }
}

/// The tournament-wide config consumed by the Scheduler, assembled from the
/// `base`/`time control`/`players`/`inclusive players`/`game adjudication`/
/// `openings`/`override options` top-level keys of §6.
#[derive(Clone, Debug)]
pub struct TournamentConfig {
    pub pairing: PairingConfig,
    pub resumable: bool,
    pub concurrency: usize,
    pub ponder: bool,
    pub event: String,
    pub site: String,
    pub time_control: TimeControl,
    pub players: Vec<String>,
    pub adjudication: AdjudicationConfig,
    pub openings: OpeningsConfig,
    pub override_options: Vec<EngineOption>,
    pub tablebase_dir: Option<PathBuf>,
}

fn parse_time_control(v: &Value) -> Res<TimeControl> {
    let mode = str_field(v, "mode").unwrap_or_else(|| "infinite".to_string());
    Ok(match mode.as_str() {
        "infinite" => TimeControl::Infinite,
        "depth" => {
            let d = member(v, "depth").and_then(Value::as_u64).unwrap_or(1).max(1) as u32;
            TimeControl::Depth(d)
        }
        "movetime" => {
            let t = member(v, "movetime")
                .ok_or_else(|| anyhow::anyhow!("movetime mode requires a 'movetime' field"))?;
            TimeControl::MoveTime(secs(t, "movetime")?)
        }
        "standard" => {
            let base = member(v, "base seconds")
                .or_else(|| member(v, "base"))
                .ok_or_else(|| anyhow::anyhow!("standard mode requires 'base seconds'"))?;
            let base = secs(base, "base seconds")?;
            if base.is_zero() {
                anyhow::bail!("standard mode's base time must be > 0");
            }
            let increment = match member(v, "increment seconds") {
                Some(inc) => secs(inc, "increment seconds")?,
                None => Duration::ZERO,
            };
            let margin = match member(v, "margin seconds") {
                Some(m) => secs(m, "margin seconds")?,
                None => Duration::ZERO,
            };
            let moves_per_control = u32_field(v, "moves per control", 0);
            TimeControl::Standard { moves_per_control, base, increment, margin }
        }
        other => anyhow::bail!("unrecognized time control mode '{other}'"),
    })
}

fn parse_inclusive(v: &Value) -> Option<InclusiveFilter> {
    let v = v;
    if !bool_field(v, "mode", false) {
        return None;
    }
    let side = match str_field(v, "side").as_deref() {
        Some("white") => InclusiveSide::White,
        Some("black") => InclusiveSide::Black,
        _ => InclusiveSide::Any,
    };
    let players: std::collections::HashSet<String> = member(v, "players")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    Some(InclusiveFilter { side, players })
}

fn parse_openings(v: &Value) -> OpeningsConfig {
    let book_path = str_field(v, "file").map(PathBuf::from);
    let book_format = match str_field(v, "format").as_deref() {
        Some("pgn") => BookFormat::Pgn,
        _ => BookFormat::Epd,
    };
    let policy = str_field(v, "policy").map(|s| OpeningPolicy::parse(&s)).unwrap_or_default();
    let seed = member(v, "seed").and_then(Value::as_u64).unwrap_or(0);
    OpeningsConfig { book_path, book_format, policy, seed }
}

fn parse_override_options(v: &Value) -> Vec<EngineOption> {
    let Some(arr) = member(v, "options").and_then(Value::as_array) else { return Vec::new() };
    arr.iter().filter_map(parse_option_value).collect()
}

fn parse_option_value(v: &Value) -> Option<EngineOption> {
    let name = str_field(v, "name")?;
    let kind = str_field(v, "type")?;
    let value = match kind.as_str() {
        "check" => EngineOptionType::Check(UgiCheck {
            val: member(v, "value").and_then(Value::as_bool).unwrap_or(false),
            default: None,
        }),
        "spin" => EngineOptionType::Spin(UgiSpin {
            val: member(v, "value").and_then(Value::as_i64).unwrap_or(0),
            default: None,
            min: None,
            max: None,
        }),
        "combo" => EngineOptionType::Combo(UgiCombo {
            val: str_field(v, "value").unwrap_or_default(),
            default: None,
            options: Vec::new(),
        }),
        "button" => EngineOptionType::Button,
        _ => EngineOptionType::UString(UgiString {
            val: str_field(v, "value").unwrap_or_default(),
            default: None,
        }),
    };
    Some(EngineOption { name, value, overridable: true })
}

pub fn load_tournament_config(path: &Path) -> Res<TournamentConfig> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("can't read tournament config {}: {e}", path.display()))?;
    let root: Value = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("malformed tournament JSON {}: {e}", path.display()))?;

    let base = member(&root, "base")
        .ok_or_else(|| anyhow::anyhow!("tournament config is missing the 'base' section"))?;
    let format = match str_field(base, "type").as_deref() {
        Some("roundrobin") => Format::RoundRobin,
        Some("knockout") => Format::Knockout,
        Some("swiss") => Format::Swiss,
        other => anyhow::bail!("unrecognized tournament type {other:?}; expected roundrobin/knockout/swiss"),
    };
    let games_per_pair = u32_field(base, "games per pair", 1).max(1);
    let swap_pair_sides = bool_field(base, "swap pair sides", true);
    let swiss_rounds = u32_field(base, "swiss rounds", 1).max(1);
    let resumable = bool_field(base, "resumable", true);
    let shuffle_players = bool_field(base, "shuffle players", false);
    let concurrency = u32_field(base, "concurrency", 1).max(1) as usize;
    let ponder = bool_field(base, "ponder", false);
    let event = str_field(base, "event").unwrap_or_else(|| "?".to_string());
    let site = str_field(base, "site").unwrap_or_else(|| "?".to_string());

    let tc = member(&root, "time control")
        .ok_or_else(|| anyhow::anyhow!("tournament config is missing the 'time control' section"))?;
    let time_control = parse_time_control(tc)?;

    let players = member(&root, "players")
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("tournament config is missing the 'players' array"))?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect::<Vec<_>>();
    if players.len() < 2 {
        anyhow::bail!("a tournament needs at least 2 players, got {}", players.len());
    }

    let inclusive = member(&root, "inclusive players").and_then(parse_inclusive);

    let adjudication = member(&root, "game adjudication")
        .map(|v| AdjudicationConfig {
            max_game_length: {
                let n = u32_field(v, "draw if game length over", 0);
                if n > 0 { Some(n) } else { None }
            },
            tablebase_enabled: bool_field(v, "tablebase", false),
            max_pieces: u32_field(v, "tablebase max pieces", 6),
        })
        .unwrap_or_default();

    let openings = member(&root, "openings").map(parse_openings).unwrap_or_default();
    let override_options =
        member(&root, "override options").map(parse_override_options).unwrap_or_default();
    let tablebase_dir = member(&root, "game adjudication")
        .and_then(|v| str_field(v, "tablebase path"))
        .map(PathBuf::from);

    Ok(TournamentConfig {
        pairing: PairingConfig {
            format,
            games_per_pair,
            swap_pair_sides,
            swiss_rounds,
            shuffle_players,
            inclusive,
        },
        resumable,
        concurrency,
        ponder,
        event,
        site,
        time_control,
        players,
        adjudication,
        openings,
        override_options,
        tablebase_dir,
    })
}

/// Resolved engine definition (§3 `EngineConfig`), one entry per name in the
/// engine catalogue.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub name: String,
    pub protocol: Protocol,
    pub command: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub arguments: Vec<String>,
    pub init_strings: Vec<String>,
    pub options: Vec<EngineOption>,
    pub ponderable: bool,
    pub elo: Option<f64>,
}

fn parse_engine_entry(v: &Value) -> Res<EngineConfig> {
    let app = member(v, "app").ok_or_else(|| anyhow::anyhow!("engine entry is missing 'app'"))?;
    let name = str_field(app, "name").ok_or_else(|| anyhow::anyhow!("engine entry is missing 'app.name'"))?;
    let protocol = match str_field(app, "protocol").as_deref() {
        Some("winboard") | Some("xboard") => Protocol::Winboard,
        _ => Protocol::Uci,
    };
    let command = str_field(app, "command")
        .ok_or_else(|| anyhow::anyhow!("engine '{name}' is missing 'app.command'"))?;
    let working_dir = str_field(app, "working folder").map(PathBuf::from);
    let arguments = member(app, "arguments")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let init_strings = member(app, "initStrings")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default();
    let ponderable = bool_field(app, "ponderable", false);
    let elo = member(app, "elo").and_then(Value::as_f64);
    let options = member(v, "options")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(parse_option_value).collect())
        .unwrap_or_default();

    Ok(EngineConfig {
        name,
        protocol,
        command: PathBuf::from(command),
        working_dir,
        arguments,
        init_strings,
        options,
        ponderable,
        elo,
    })
}

/// Loads the catalogue and indexes it by engine name; §3: "`name` is unique
/// within a tournament" — a duplicate overwrites the earlier entry, with a
/// warning left to the caller (mirrors `ConfigMng::insert`'s override-with-warning).
pub fn load_engine_catalogue(path: &Path) -> Res<HashMap<String, EngineConfig>> {
    let text = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("can't read engine catalogue {}: {e}", path.display()))?;
    let root: Value = serde_json::from_str(&text)
        .map_err(|e| anyhow::anyhow!("malformed engine catalogue {}: {e}", path.display()))?;
    let arr = root
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("engine catalogue {} must be a JSON array", path.display()))?;
    let mut map = HashMap::new();
    for entry in arr {
        let cfg = parse_engine_entry(entry)?;
        map.insert(cfg.name.clone(), cfg);
    }
    Ok(map)
}

/// Builds one adapter's static config, applying any `overridable` options from
/// `overrides` on top of the engine's own declared options (§6 "override
/// options"; only overridable options are replaced, matching
/// `ConfigMng::checkOverrideOption`).
pub fn adapter_config_for(
    engine: &EngineConfig,
    overrides: &[EngineOption],
    stderr_log: Option<PathBuf>,
) -> EngineAdapterConfig {
    let mut options = engine.options.clone();
    for ov in overrides {
        if let Some(existing) = options.iter_mut().find(|o| o.name == ov.name && o.overridable) {
            existing.value = ov.value.clone();
        }
    }
    EngineAdapterConfig {
        display_name: engine.name.clone(),
        protocol: engine.protocol,
        command: engine.command.clone(),
        working_dir: engine.working_dir.clone(),
        arguments: engine.arguments.clone(),
        init_strings: engine.init_strings.clone(),
        options,
        ponderable: engine.ponderable,
        stderr_log,
        idle_dead_threshold: Duration::from_secs(30),
        kill_timeout: Duration::from_secs(5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_temp(text: &str) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parses_a_minimal_roundrobin_config() {
        let json = r#"{
            "base": {"type": "roundrobin", "games per pair": 2, "concurrency": 4},
            "time control": {"mode": "movetime", "movetime": "0.5"},
            "players": ["A", "B", "C"]
        }"#;
        let f = write_temp(json);
        let cfg = load_tournament_config(f.path()).unwrap();
        assert_eq!(cfg.pairing.format, Format::RoundRobin);
        assert_eq!(cfg.pairing.games_per_pair, 2);
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.time_control, TimeControl::MoveTime(Duration::from_millis(500)));
        assert_eq!(cfg.players, vec!["A", "B", "C"]);
    }

    #[test]
    fn standard_time_control_parses_hms_strings() {
        let json = r#"{
            "base": {"type": "swiss", "swiss rounds": 3},
            "time control": {"mode": "standard", "base seconds": "0:5:0", "increment seconds": 2},
            "players": ["A", "B"]
        }"#;
        let f = write_temp(json);
        let cfg = load_tournament_config(f.path()).unwrap();
        match cfg.time_control {
            TimeControl::Standard { base, increment, .. } => {
                assert_eq!(base, Duration::from_secs(300));
                assert_eq!(increment, Duration::from_secs(2));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn missing_players_is_a_configuration_error() {
        let json = r#"{"base": {"type": "roundrobin"}, "time control": {"mode": "infinite"}}"#;
        let f = write_temp(json);
        assert!(load_tournament_config(f.path()).is_err());
    }

    #[test]
    fn loads_an_engine_catalogue_entry() {
        let json = r#"[{
            "app": {"protocol": "uci", "name": "Stub", "command": "/bin/stub", "ponderable": true},
            "options": [{"name": "Hash", "type": "spin", "value": 64}]
        }]"#;
        let f = write_temp(json);
        let catalogue = load_engine_catalogue(f.path()).unwrap();
        let stub = catalogue.get("Stub").unwrap();
        assert_eq!(stub.protocol, Protocol::Uci);
        assert!(stub.ponderable);
        assert_eq!(stub.options.len(), 1);
    }
}
