//! Message/Output vocabulary shared by every consumer of a match's events (PGN
//! writer, console UI, file logger). Trimmed down from `gears::output`: the tourney
//! core builds its own concrete outputs, so only the trait boundary lives here.

use std::fmt::Debug;

use crate::common::{NamedEntity, Tokens};
use crate::result::MatchResult;

#[derive(Debug, Eq, PartialEq, Copy, Clone)]
pub enum Message {
    Info,
    Warning,
    /// Printed to `stderr` by text-based outputs, same as `Error`.
    Debug,
    Error,
}

impl Message {
    pub fn prefix(self) -> &'static str {
        match self {
            Message::Info => "",
            Message::Warning => "Warning:",
            Message::Debug => "Debug:",
            Message::Error => "Error:",
        }
    }
}

pub fn game_over_message(result: &MatchResult) -> String {
    use std::fmt::Write;
    let mut msg = String::new();
    writeln!(msg, "{} {{{}}}", result.outcome, result.reason).unwrap();
    msg
}

/// The part of an output that doesn't depend on knowing which game is being played:
/// where protocol traffic and log messages go.
pub trait AbstractOutput: NamedEntity + Debug + Send + 'static {
    fn is_logger(&self) -> bool {
        false
    }

    fn write_protocol_output(&mut self, _message: &str, _player: Option<&str>) {}

    fn write_protocol_input(&mut self, _message: Tokens, _player: Option<&str>) {}

    fn display_message(&mut self, typ: Message, message: &str);
}

pub type OutputBox = Box<dyn AbstractOutput>;
