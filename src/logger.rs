//! Concrete `AbstractOutput` sinks: a colour console logger and a plain-text
//! file logger, both timestamped with `chrono`. Grounded in
//! `gears::output::text_output`'s `ColoredOutput`/file-sink pattern, trimmed to
//! the tourney core's needs (no board rendering, just protocol traffic and
//! status messages).

use std::fs::{File, OpenOptions};
use std::io::Write;

use colored::Colorize;

use rules::common::{NamedEntity, Tokens};
use rules::output::{AbstractOutput, Message};

/// Writes every protocol line and status message to stdout, colouring by
/// severity the way an interactive terminal session would expect.
#[derive(Debug)]
pub struct ConsoleLogger {
    verbose: bool,
}

impl ConsoleLogger {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl NamedEntity for ConsoleLogger {
    fn short_name(&self) -> String {
        "console".to_string()
    }
}

impl AbstractOutput for ConsoleLogger {
    fn is_logger(&self) -> bool {
        true
    }

    fn write_protocol_output(&mut self, message: &str, player: Option<&str>) {
        if !self.verbose {
            return;
        }
        let who = player.unwrap_or("?");
        println!("{} {}", format!("[{who} <]").dimmed(), message);
    }

    fn write_protocol_input(&mut self, message: Tokens, player: Option<&str>) {
        if !self.verbose {
            return;
        }
        let who = player.unwrap_or("?");
        let text: Vec<&str> = message.collect();
        println!("{} {}", format!("[{who} >]").dimmed(), text.join(" "));
    }

    fn display_message(&mut self, typ: Message, message: &str) {
        let line = format!("{} {message}", typ.prefix());
        match typ {
            Message::Error => eprintln!("{}", line.red().bold()),
            Message::Warning => println!("{}", line.yellow()),
            Message::Debug => {
                if self.verbose {
                    println!("{}", line.dimmed());
                }
            }
            Message::Info => println!("{line}"),
        }
    }
}

/// Appends every message (not raw protocol traffic, which would be unreadably
/// large) to a plain-text file with a timestamp prefix, one line per call.
#[derive(Debug)]
pub struct FileLogger {
    file: File,
}

impl FileLogger {
    pub fn open(path: &std::path::Path) -> rules::Res<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| anyhow::anyhow!("can't open log file {}: {e}", path.display()))?;
        Ok(Self { file })
    }
}

impl NamedEntity for FileLogger {
    fn short_name(&self) -> String {
        "file".to_string()
    }
}

impl AbstractOutput for FileLogger {
    fn is_logger(&self) -> bool {
        true
    }

    fn display_message(&mut self, typ: Message, message: &str) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let _ = writeln!(self.file, "[{now}] {} {message}", typ.prefix());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn file_logger_appends_timestamped_lines() {
        let tmp = NamedTempFile::new().unwrap();
        let mut logger = FileLogger::open(tmp.path()).unwrap();
        logger.display_message(Message::Warning, "low time");
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert!(contents.contains("Warning:"));
        assert!(contents.contains("low time"));
    }

    #[test]
    fn console_logger_is_a_logger() {
        assert!(ConsoleLogger::new(false).is_logger());
    }
}
