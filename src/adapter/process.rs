//! Subprocess plumbing: spawning the engine, framing its stdout into lines, and
//! watching for a stalled process. Grounded in `monitors::play::player::PlayerBuilder::build_engine`
//! (spawn + piped stdio + a named reader thread) and the line-framing rules of §4.1.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};

use rules::Res;

/// Ceiling on buffered partial-tail bytes before they're flushed as a line anyway
/// (§4.1: "if the buffer exceeds an implementation-defined ceiling without a
/// newline, the buffered content is flushed as a single line").
const PARTIAL_LINE_CEILING: usize = 1 << 16;

pub struct ChildProcess {
    child: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    reader_handle: Option<JoinHandle<()>>,
    last_line_at: Instant,
}

impl ChildProcess {
    pub fn spawn(
        display_name: &str,
        command: &Path,
        working_dir: Option<&Path>,
        arguments: &[String],
        stderr_log: Option<&Path>,
    ) -> Res<Self> {
        let mut cmd = Command::new(command);
        cmd.args(arguments).stdin(Stdio::piped()).stdout(Stdio::piped());
        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }
        match stderr_log {
            Some(path) => {
                let file = std::fs::File::create(path)
                    .map_err(|e| anyhow::anyhow!("can't create stderr log {}: {e}", path.display()))?;
                cmd.stderr(file);
            }
            None => {
                cmd.stderr(Stdio::null());
            }
        }
        let mut child = cmd
            .spawn()
            .map_err(|e| anyhow::anyhow!("can't launch '{}': {e}", command.display()))?;
        let stdin = child.stdin.take().expect("piped stdin");
        let stdout = child.stdout.take().expect("piped stdout");

        let (tx, rx) = unbounded();
        let name = display_name.to_string();
        let reader_handle = std::thread::Builder::new()
            .name(format!("adapter-reader-{name}"))
            .spawn(move || run_reader(BufReader::new(stdout), tx))
            .expect("spawning the stdout reader thread");

        Ok(Self {
            child,
            stdin,
            lines: rx,
            reader_handle: Some(reader_handle),
            last_line_at: Instant::now(),
        })
    }

    pub fn write_line(&mut self, line: &str) -> Res<()> {
        writeln!(self.stdin, "{line}")
            .map_err(|e| anyhow::anyhow!("failed writing to engine stdin: {e}"))?;
        self.stdin
            .flush()
            .map_err(|e| anyhow::anyhow!("failed flushing engine stdin: {e}"))
    }

    /// Drains every line currently buffered, without blocking; resets the idle
    /// watchdog if at least one line arrived.
    pub fn poll_lines(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(line) = self.lines.try_recv() {
            out.push(line);
        }
        if !out.is_empty() {
            self.last_line_at = Instant::now();
        }
        out
    }

    pub fn idle_for(&self) -> Duration {
        self.last_line_at.elapsed()
    }

    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    pub fn kill(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        if let Some(handle) = self.reader_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ChildProcess {
    fn drop(&mut self) {
        if !self.has_exited() {
            self.kill();
        }
    }
}

/// Reads `stdout` byte-stream-wise: splits on line endings, normalizes tabs to
/// spaces, trims, and ships each complete line to the adapter's poll queue.
/// Partial tail bytes are buffered across reads and force-flushed past the
/// ceiling, matching §4.1's line-framing contract.
fn run_reader(mut reader: BufReader<std::process::ChildStdout>, tx: Sender<String>) {
    let mut pending = String::new();
    loop {
        let mut raw = String::new();
        match reader.read_line(&mut raw) {
            Ok(0) => {
                if !pending.is_empty() {
                    let _ = tx.send(normalize(&pending));
                }
                return;
            }
            Ok(_) => {
                pending.push_str(&raw);
                if pending.ends_with('\n') {
                    let line = pending.trim_end_matches(['\n', '\r']).to_string();
                    let _ = tx.send(normalize(&line));
                    pending.clear();
                } else if pending.len() > PARTIAL_LINE_CEILING {
                    let _ = tx.send(normalize(&pending));
                    pending.clear();
                }
            }
            Err(_) => return,
        }
    }
}

fn normalize(line: &str) -> String {
    line.replace('\t', " ").trim().to_string()
}

pub fn resolve_working_dir(path: Option<&str>) -> Option<PathBuf> {
    path.map(PathBuf::from)
}
