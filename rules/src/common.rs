//! Small helpers shared across the crate. Kept separate from the game-specific
//! modules the way `gears::general::common` separates generic utilities from
//! `gears::games`.

use std::str::SplitWhitespace;

pub use anyhow::{Context, Result as Res};

pub type Tokens<'a> = SplitWhitespace<'a>;

pub fn tokens(s: &str) -> Tokens<'_> {
    s.split_whitespace()
}

/// Implemented by anything that can be listed and picked by name on the command line
/// or in a config file (engines, pairing formats, outputs).
pub trait NamedEntity {
    fn short_name(&self) -> String;
    fn long_name(&self) -> String {
        self.short_name()
    }
    fn description(&self) -> Option<String> {
        None
    }
}

pub fn parse_int_from_str<T: std::str::FromStr>(s: &str, name: &str) -> Res<T> {
    s.parse::<T>()
        .map_err(|_| anyhow::anyhow!("'{s}' is not a valid value for {name}"))
}

/// The source parses time either as a plain number of seconds or as an `h:m:s` string;
/// both normalize to seconds-as-f64 before reaching the `Clock`.
pub fn parse_seconds(value: &serde_json::Value, name: &str) -> Res<f64> {
    match value {
        serde_json::Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("{name} is not a valid number")),
        serde_json::Value::String(s) => parse_hms(s, name),
        other => anyhow::bail!("{name} must be a number or a 'h:m:s' string, got {other}"),
    }
}

fn parse_hms(s: &str, name: &str) -> Res<f64> {
    let parts: Vec<&str> = s.split(':').collect();
    let nums: Res<Vec<f64>> = parts
        .iter()
        .map(|p| parse_int_from_str::<f64>(p.trim(), name))
        .collect();
    let nums = nums?;
    let secs = match nums.as_slice() {
        [s] => *s,
        [m, s] => m * 60.0 + s,
        [h, m, s] => h * 3600.0 + m * 60.0 + s,
        _ => anyhow::bail!("{name} has too many ':'-separated parts: '{s}'"),
    };
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_seconds() {
        let v = serde_json::json!(90.5);
        assert_eq!(parse_seconds(&v, "base").unwrap(), 90.5);
    }

    #[test]
    fn parses_hms_string() {
        let v = serde_json::json!("2:10:30");
        assert_eq!(parse_seconds(&v, "base").unwrap(), 2.0 * 3600.0 + 10.0 * 60.0 + 30.0);
        let v = serde_json::json!("1:30");
        assert_eq!(parse_seconds(&v, "base").unwrap(), 90.0);
    }
}
