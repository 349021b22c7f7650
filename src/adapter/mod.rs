//! The Engine Adapter: a bidirectional bridge between the
//! Supervisor's uniform commands and one subprocess speaking UCI or Winboard.
//! Grounded in `monitors::play::player::EnginePlayer`/`PlayerBuilder` for process
//! lifecycle and `monitors::play::ugi_input::InputThread` for the event-producing
//! read loop, generalized to dispatch on `Protocol` instead of assuming UCI/UGI.

pub mod process;
pub mod uci;
pub mod winboard;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, unbounded};

use rules::Res;
use rules::option::EngineOption;
use rules::search::{GoLimits, SearchInfo};

use crate::clock::TimeControl;
use process::ChildProcess;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Protocol {
    Uci,
    Winboard,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AdapterState {
    Starting,
    Ready,
    Playing,
    Stopping,
    Stopped,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ComputingState {
    Idle,
    Thinking,
    Pondering,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AdapterEvent {
    BestMove {
        mv: String,
        ponder: Option<String>,
        elapsed: Duration,
        prior_computing: ComputingState,
    },
    /// A thinking-output line, opportunistically parsed for per-move statistics
    /// (§4.6): node/depth sums and per-player elapsed time.
    Info(SearchInfo),
    Resign,
    StateChanged(AdapterState),
    LineLogged { from_engine: bool, text: String },
}

pub struct EngineAdapterConfig {
    pub display_name: String,
    pub protocol: Protocol,
    pub command: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub arguments: Vec<String>,
    pub init_strings: Vec<String>,
    pub options: Vec<EngineOption>,
    pub ponderable: bool,
    pub stderr_log: Option<PathBuf>,
    /// Order of 30s, per §4.1.
    pub idle_dead_threshold: Duration,
    /// Order of a few seconds, per §4.1.
    pub kill_timeout: Duration,
}

/// One subprocess, its protocol state, and the event channel the Supervisor
/// drains on each tick.
pub struct EngineAdapter {
    config: EngineAdapterConfig,
    process: Option<ChildProcess>,
    state: AdapterState,
    computing: ComputingState,
    think_started: Option<Instant>,
    events_tx: Sender<AdapterEvent>,
    events_rx: Receiver<AdapterEvent>,
    wb_features: winboard::Features,
    wb_ping_seq: u32,
    wb_pending_ping: Option<u32>,
    /// State-changing commands queued behind an outstanding Winboard `ping`.
    wb_queue: Vec<String>,
    /// How many plies of the game this Winboard engine has already been told
    /// about, either via `think()`'s catch-up push or `on_opponent_move()`.
    /// Unused for UCI, which re-sends the whole `position` line every time.
    wb_moves_sent: usize,
    quit_sent_at: Option<Instant>,
    handshake_started_at: Option<Instant>,
}

impl EngineAdapter {
    pub fn new(config: EngineAdapterConfig) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            config,
            process: None,
            state: AdapterState::Stopped,
            computing: ComputingState::Idle,
            think_started: None,
            events_tx,
            events_rx,
            wb_features: winboard::Features::default(),
            wb_ping_seq: 0,
            wb_pending_ping: None,
            wb_queue: Vec::new(),
            wb_moves_sent: 0,
            quit_sent_at: None,
            handshake_started_at: None,
        }
    }

    pub fn state(&self) -> AdapterState {
        self.state
    }

    /// Called by the Supervisor once a game has actually started, so the
    /// idle-death watchdog (§4.1, checked only while `Playing`) is armed.
    pub fn mark_playing(&mut self) {
        if self.state == AdapterState::Ready {
            self.set_state(AdapterState::Playing);
        }
    }

    pub fn computing(&self) -> ComputingState {
        self.computing
    }

    pub fn events(&self) -> &Receiver<AdapterEvent> {
        &self.events_rx
    }

    fn set_state(&mut self, state: AdapterState) {
        if self.state != state {
            self.state = state;
            let _ = self.events_tx.send(AdapterEvent::StateChanged(state));
        }
    }

    fn write(&mut self, line: &str) -> Res<()> {
        let _ = self.events_tx.send(AdapterEvent::LineLogged {
            from_engine: false,
            text: line.to_string(),
        });
        self.process
            .as_mut()
            .ok_or_else(|| anyhow::anyhow!("adapter has no running process"))?
            .write_line(line)
    }

    /// Spawn the subprocess and write the protocol handshake; transitions to
    /// `Starting`.
    pub fn start(&mut self) -> Res<()> {
        let process = ChildProcess::spawn(
            &self.config.display_name,
            &self.config.command,
            self.config.working_dir.as_deref(),
            &self.config.arguments,
            self.config.stderr_log.as_deref(),
        )?;
        self.process = Some(process);
        self.set_state(AdapterState::Starting);
        self.handshake_started_at = Some(Instant::now());
        match self.config.protocol {
            Protocol::Uci => self.write(uci::HANDSHAKE)?,
            Protocol::Winboard => {
                self.write(winboard::HANDSHAKE_XBOARD)?;
                self.write(winboard::HANDSHAKE_PROTOVER)?;
            }
        }
        Ok(())
    }

    /// Sends the protocol-specific new-game preamble, applies non-default
    /// options, sends `initStrings`, then synchronizes. Completion is observed
    /// by `tick()` transitioning the state to `Ready`. `time_control` is only
    /// consulted on the Winboard branch, to announce `level`/`st`/`sd` (§4.1);
    /// UCI communicates the time control per-search via `go`'s `wtime`/`btime`/
    /// `movetime`/`depth` instead and ignores it here.
    pub fn new_game(&mut self, time_control: TimeControl) -> Res<()> {
        match self.config.protocol {
            Protocol::Uci => {
                self.write(uci::NEW_GAME)?;
                let opts: Vec<_> = self.config.options.clone();
                for opt in opts.iter().filter(|o| !o.value.is_default()) {
                    self.write(&uci::set_option_command(opt))?;
                }
                let inits: Vec<_> = self.config.init_strings.clone();
                for line in &inits {
                    self.write(line)?;
                }
                self.write(uci::ISREADY)
            }
            Protocol::Winboard => {
                self.wb_moves_sent = 0;
                self.write(winboard::NEW_GAME)?;
                self.send_wb_time_control(time_control)?;
                let inits: Vec<_> = self.config.init_strings.clone();
                for line in &inits {
                    self.enqueue_or_send_wb(line.clone())?;
                }
                Ok(())
            }
        }
    }

    /// Announces the game's time control once, right after `new` (§4.1: "Time
    /// is communicated with `level`, `st`, `sd`..."). `Infinite` needs none of
    /// these — the engine is left to search under its own default.
    fn send_wb_time_control(&mut self, time_control: TimeControl) -> Res<()> {
        match time_control {
            TimeControl::Standard { moves_per_control, base, increment, .. } => {
                self.enqueue_or_send_wb(winboard::level_command(moves_per_control, base, increment))
            }
            TimeControl::MoveTime(t) => self.enqueue_or_send_wb(winboard::st_command(t)),
            TimeControl::Depth(d) => self.enqueue_or_send_wb(winboard::sd_command(d)),
            TimeControl::Infinite => Ok(()),
        }
    }

    /// Writes a state-changing command. If feature `ping=1` is negotiated, the
    /// write is immediately followed by a `ping N` that marks a synchronization
    /// point: any further state-changing command issued before the matching
    /// `pong N` is queued instead of written, per §4.1/§5.
    fn enqueue_or_send_wb(&mut self, line: String) -> Res<()> {
        if self.wb_pending_ping.is_some() {
            self.wb_queue.push(line);
            return Ok(());
        }
        self.write(&line)?;
        if self.wb_features.ping {
            self.wb_ping_seq += 1;
            let n = self.wb_ping_seq;
            self.write(&winboard::ping_command(n))?;
            self.wb_pending_ping = Some(n);
        }
        Ok(())
    }

    /// Instructs the engine to search under `limits` from `fen`/`moves`. `sans`
    /// parallels `moves` one-for-one; Winboard uses whichever encoding feature
    /// `san` negotiated, UCI ignores it (it only ever speaks coordinate text).
    /// `my_time`/`opp_time` are Winboard's per-move `time`/`otim` (§4.1); `None`
    /// when the time control has no clock-tracked budget to report (`Infinite`/
    /// `Depth`). UCI ignores them — it already carries `wtime`/`btime` in `limits`.
    pub fn think(
        &mut self,
        fen: Option<&str>,
        moves: &[String],
        sans: &[String],
        limits: &GoLimits,
        my_time: Option<Duration>,
        opp_time: Option<Duration>,
    ) -> Res<()> {
        self.computing = ComputingState::Thinking;
        self.think_started = Some(Instant::now());
        match self.config.protocol {
            Protocol::Uci => {
                self.write(&uci::position_command(fen, moves))?;
                self.write(&uci::go_command(limits))
            }
            Protocol::Winboard => {
                self.catch_up_wb_moves(moves, sans)?;
                if let (Some(my), Some(opp)) = (my_time, opp_time) {
                    self.enqueue_or_send_wb(winboard::time_command(my))?;
                    self.enqueue_or_send_wb(winboard::otim_command(opp))?;
                }
                self.enqueue_or_send_wb(winboard::GO.to_string())
            }
        }
    }

    /// Pushes every move since `wb_moves_sent` that this Winboard engine
    /// hasn't been told about yet: the opening's book moves on the very first
    /// `think()` of a game, normally just the single reply `on_opponent_move`
    /// didn't already cover (§4.1: "Moves to the engine are prefixed with
    /// `usermove`... encoded in SAN if feature `san` is on, else coordinate").
    fn catch_up_wb_moves(&mut self, moves: &[String], sans: &[String]) -> Res<()> {
        while self.wb_moves_sent < moves.len() {
            let i = self.wb_moves_sent;
            let text = if self.wb_features.san { sans.get(i).unwrap_or(&moves[i]) } else { &moves[i] };
            let cmd = winboard::move_command(text, &self.wb_features);
            self.enqueue_or_send_wb(cmd)?;
            self.wb_moves_sent += 1;
        }
        Ok(())
    }

    /// UCI-only: speculate on `expected_move` while the opponent is to move.
    pub fn ponder(&mut self, fen: Option<&str>, moves: &[String], expected_move: &str, limits: &GoLimits) -> Res<()> {
        if !self.config.ponderable || self.config.protocol != Protocol::Uci {
            return Ok(());
        }
        self.computing = ComputingState::Pondering;
        self.think_started = Some(Instant::now());
        let mut full_moves = moves.to_vec();
        full_moves.push(expected_move.to_string());
        self.write(&uci::position_command(fen, &full_moves))?;
        let mut ponder_limits = *limits;
        ponder_limits.infinite = true;
        self.write(&uci::go_command(&ponder_limits))
    }

    pub fn ponder_hit(&mut self) -> Res<()> {
        if self.config.protocol == Protocol::Uci && self.computing == ComputingState::Pondering {
            self.computing = ComputingState::Thinking;
            self.write(uci::PONDERHIT)?;
        }
        Ok(())
    }

    pub fn stop(&mut self) -> Res<()> {
        match self.config.protocol {
            Protocol::Uci => self.write(uci::STOP),
            Protocol::Winboard => Ok(()), // xboard engines stop on `force`/the next `move`
        }
    }

    /// Informs the engine of the opponent's reply. UCI re-sends the full
    /// position on the next `think()`; Winboard needs the move pushed now, in
    /// whichever encoding the `san` feature negotiated.
    pub fn on_opponent_move(&mut self, coordinate: &str, san: &str) -> Res<()> {
        if self.config.protocol == Protocol::Winboard {
            let text = if self.wb_features.san { san } else { coordinate };
            let cmd = winboard::move_command(text, &self.wb_features);
            self.enqueue_or_send_wb(cmd)?;
            self.wb_moves_sent += 1;
        }
        Ok(())
    }

    pub fn quit(&mut self) -> Res<()> {
        self.set_state(AdapterState::Stopping);
        self.quit_sent_at = Some(Instant::now());
        match self.config.protocol {
            Protocol::Uci => self.write(uci::QUIT),
            Protocol::Winboard => self.write(winboard::QUIT),
        }
    }

    /// Drains buffered stdout lines, advances the protocol state machine, and
    /// checks the idle-death watchdog and the kill timeout. Call this once per
    /// scheduler tick.
    pub fn tick(&mut self) {
        if self.process.is_none() {
            return;
        }
        let lines = self.process.as_mut().unwrap().poll_lines();
        for line in lines {
            let _ = self.events_tx.send(AdapterEvent::LineLogged { from_engine: true, text: line.clone() });
            self.handle_line(&line);
        }

        if self.process.as_mut().unwrap().has_exited() {
            if self.state != AdapterState::Stopped {
                self.set_state(AdapterState::Stopped);
            }
            return;
        }

        if self.state == AdapterState::Starting {
            let grace = Duration::from_secs(5);
            if self.handshake_started_at.is_some_and(|t| t.elapsed() > grace)
                && self.config.protocol == Protocol::Winboard
                && self.wb_features.done != Some(false)
            {
                self.set_state(AdapterState::Ready);
            }
        }

        if self.state == AdapterState::Stopping {
            if self.quit_sent_at.is_some_and(|t| t.elapsed() > self.config.kill_timeout) {
                self.process.as_mut().unwrap().kill();
                self.set_state(AdapterState::Stopped);
            }
            return;
        }

        if self.process.as_ref().unwrap().idle_for() > self.config.idle_dead_threshold
            && self.state == AdapterState::Playing
        {
            self.process.as_mut().unwrap().kill();
            self.set_state(AdapterState::Stopped);
        }
    }

    fn handle_line(&mut self, line: &str) {
        match self.config.protocol {
            Protocol::Uci => self.handle_uci_line(line),
            Protocol::Winboard => self.handle_wb_line(line),
        }
    }

    fn handle_uci_line(&mut self, line: &str) {
        match uci::parse_line(line) {
            uci::UciLine::UciOk => {
                if self.state == AdapterState::Starting {
                    self.set_state(AdapterState::Ready);
                }
            }
            uci::UciLine::ReadyOk => {
                // Only the initial handshake's readyok should move Starting -> Ready;
                // once a game is under way `new_game()`'s own isready sync must not
                // downgrade the adapter back out of `Playing`.
                if self.state == AdapterState::Starting {
                    self.set_state(AdapterState::Ready);
                }
            }
            uci::UciLine::BestMove { mv, ponder } => {
                let elapsed = self.think_started.map_or(Duration::ZERO, |t| t.elapsed());
                let prior = self.computing;
                self.computing = ComputingState::Idle;
                let _ = self.events_tx.send(AdapterEvent::BestMove {
                    mv,
                    ponder,
                    elapsed,
                    prior_computing: prior,
                });
            }
            uci::UciLine::Info(info) => {
                let _ = self.events_tx.send(AdapterEvent::Info(info));
            }
            _ => {}
        }
    }

    fn handle_wb_line(&mut self, line: &str) {
        if line.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            if let Some(info) = winboard::parse_thinking_line(line) {
                let _ = self.events_tx.send(AdapterEvent::Info(info));
            }
            return;
        }
        match winboard::parse_line(line) {
            winboard::WbLine::Feature(pairs) => {
                for (name, value) in pairs {
                    if name == "done" {
                        let done = value == "1";
                        self.wb_features.done = Some(done);
                        if done && self.state == AdapterState::Starting {
                            self.set_state(AdapterState::Ready);
                        }
                        continue;
                    }
                    winboard::apply_feature(&mut self.wb_features, &name, &value);
                    let accepted = winboard::accepted_command(&name);
                    let _ = self.write(&accepted);
                }
            }
            winboard::WbLine::Move(mv) => {
                let elapsed = self.think_started.map_or(Duration::ZERO, |t| t.elapsed());
                let prior = self.computing;
                self.computing = ComputingState::Idle;
                let _ = self.events_tx.send(AdapterEvent::BestMove {
                    mv,
                    ponder: None,
                    elapsed,
                    prior_computing: prior,
                });
            }
            winboard::WbLine::Resign => {
                let _ = self.events_tx.send(AdapterEvent::Resign);
            }
            winboard::WbLine::Pong(n) => {
                if self.wb_pending_ping == Some(n) {
                    self.wb_pending_ping = None;
                    let queued = std::mem::take(&mut self.wb_queue);
                    for line in queued {
                        let _ = self.write(&line);
                    }
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_and_go_are_built_correctly_for_movetime() {
        let limits = GoLimits { move_time: Some(Duration::from_millis(500)), ..GoLimits::infinite() };
        assert_eq!(uci::position_command(None, &[]), "position startpos");
        assert_eq!(uci::go_command(&limits), "go movetime 500");
    }
}
