//! Engine option descriptors, ported from `gears::ugi::EngineOption` and friends.
//! An option is a `{name, kind, value, default, overridable}` tuple negotiated
//! over the protocol and optionally overridden by the tournament config.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Default, Debug, Clone)]
pub struct UgiCheck {
    pub val: bool,
    pub default: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UgiSpin {
    pub val: i64,
    pub default: Option<i64>,
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl UgiSpin {
    /// A spin's value always lies within `[min, max]`.
    pub fn clamp_value(&mut self) {
        if let Some(min) = self.min {
            self.val = self.val.max(min);
        }
        if let Some(max) = self.max {
            self.val = self.val.min(max);
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UgiCombo {
    pub val: String,
    pub default: Option<String>,
    pub options: Vec<String>,
}

impl UgiCombo {
    /// A combo's value always lies in its choice list.
    pub fn is_valid(&self) -> bool {
        self.options.is_empty() || self.options.iter().any(|o| o == &self.val)
    }
}

#[derive(Debug, Clone, Default)]
pub struct UgiString {
    pub val: String,
    pub default: Option<String>,
}

#[derive(Debug, Clone)]
pub enum EngineOptionType {
    Check(UgiCheck),
    Spin(UgiSpin),
    Combo(UgiCombo),
    Button,
    UString(UgiString),
}

impl EngineOptionType {
    pub fn type_name(&self) -> &'static str {
        match self {
            EngineOptionType::Check(_) => "check",
            EngineOptionType::Spin(_) => "spin",
            EngineOptionType::Combo(_) => "combo",
            EngineOptionType::Button => "button",
            EngineOptionType::UString(_) => "string",
        }
    }

    /// Whether `val` matches `default`; buttons have no persistent value and are
    /// never considered default (pressing one is always an explicit act).
    pub fn is_default(&self) -> bool {
        match self {
            EngineOptionType::Check(c) => c.default == Some(c.val),
            EngineOptionType::Spin(s) => s.default == Some(s.val),
            EngineOptionType::Combo(c) => c.default.as_deref() == Some(c.val.as_str()),
            EngineOptionType::UString(s) => s.default.as_deref() == Some(s.val.as_str()),
            EngineOptionType::Button => false,
        }
    }

    pub fn value_to_str(&self) -> String {
        match self {
            EngineOptionType::Check(c) => c.val.to_string(),
            EngineOptionType::Spin(s) => s.val.to_string(),
            EngineOptionType::Combo(c) => c.val.clone(),
            EngineOptionType::Button => String::new(),
            EngineOptionType::UString(s) => s.val.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineOption {
    pub name: String,
    pub value: EngineOptionType,
    /// An engine config's `overridable` flag is per-engine, but each option is also
    /// individually overridable: `override options` in the tournament config only
    /// applies to options for which this is true.
    pub overridable: bool,
}

impl Display for EngineOption {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "name {} type {}", self.name, self.value.type_name())?;
        match &self.value {
            EngineOptionType::Check(c) => {
                if let Some(d) = c.default {
                    write!(f, " default {d}")?;
                }
            }
            EngineOptionType::Spin(s) => {
                if let Some(d) = s.default {
                    write!(f, " default {d}")?;
                }
                if let Some(m) = s.min {
                    write!(f, " min {m}")?;
                }
                if let Some(m) = s.max {
                    write!(f, " max {m}")?;
                }
            }
            EngineOptionType::Combo(c) => {
                if let Some(d) = &c.default {
                    write!(f, " default {d}")?;
                }
                for o in &c.options {
                    write!(f, " var {o}")?;
                }
            }
            EngineOptionType::Button => {}
            EngineOptionType::UString(s) => {
                if let Some(d) = &s.default {
                    write!(f, " default {d}")?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for EngineOptionType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "check" => EngineOptionType::Check(UgiCheck::default()),
            "spin" => EngineOptionType::Spin(UgiSpin::default()),
            "combo" => EngineOptionType::Combo(UgiCombo::default()),
            "button" => EngineOptionType::Button,
            "string" => EngineOptionType::UString(UgiString::default()),
            x => anyhow::bail!("unrecognized option type '{x}'"),
        })
    }
}
