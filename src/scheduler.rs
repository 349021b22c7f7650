//! The Tournament Scheduler (§4.6): the top-level driver that advances live
//! Supervisors on a fixed-period tick, dispatches round transitions through
//! the Pairing Engine, maintains aggregate statistics, and persists the Match
//! Record Store. Grounded in `original_source/src/game/tourmng.cpp`'s
//! `TourMng::tick`/`nextGames`/`resumeMatches`; `monitors::play::ugi_client`
//! drives exactly one match, so this generalizes that tick-driven shape from
//! one Supervisor to many plus the record-lifecycle bookkeeping the single-match
//! case never needed.

use std::collections::HashMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use rules::Res;
use rules::board::NoTablebase;
use rules::chess::Chessboard;
use rules::output::{Message, OutputBox};
use rules::result::{GameOverReason, GameResult, MatchResult, MatchStatus};

use crate::config::{EngineConfig, OpeningPolicy, TournamentConfig};
use crate::pairing::{PairingEngine, BYE};
use crate::pgn::{self, PgnGame};
use crate::store::{MatchRecord, MatchRecordStore, RecordState};
use crate::stats::Standings;
use crate::supervisor::{AdjudicationConfig, Supervisor};

#[cfg(feature = "syzygy")]
pub type ActiveTablebase = rules::syzygy::SyzygyTablebase;
#[cfg(not(feature = "syzygy"))]
pub type ActiveTablebase = NoTablebase;

/// Default steady-period tick (§5).
pub const TICK_PERIOD: Duration = Duration::from_millis(500);

struct LiveGame {
    record_index: usize,
    supervisor: Supervisor<Chessboard, ActiveTablebase>,
    /// Set the first time the Supervisor is observed `stopped`, so the result
    /// is ingested into the store/standings exactly once.
    ingested: bool,
}

/// Drives a whole tournament: bootstraps from (or discards) a prior
/// `playing.json`, launches Supervisors up to `concurrency`, and rounds the
/// Pairing Engine until it refuses to produce another round.
pub struct Scheduler {
    config: TournamentConfig,
    catalogue: HashMap<String, EngineConfig>,
    pairing: PairingEngine,
    store: MatchRecordStore,
    book: rules::book::Book,
    standings: Standings,
    tablebase: Option<ActiveTablebase>,
    live: Vec<LiveGame>,
    disposing: Vec<crate::adapter::EngineAdapter>,
    log_dir: PathBuf,
    pgn_path: Option<PathBuf>,
    output: OutputBox,
    /// One drawn opening per pair id, under the *samepair* policy.
    pair_openings: HashMap<u32, rules::book::Opening>,
    /// One drawn opening for the whole tournament, under the *allone* policy.
    shared_opening: Option<rules::book::Opening>,
}

impl Scheduler {
    pub fn new(
        config: TournamentConfig,
        catalogue: HashMap<String, EngineConfig>,
        store_path: PathBuf,
        log_dir: PathBuf,
        pgn_path: Option<PathBuf>,
        mut output: OutputBox,
    ) -> Res<Self> {
        for name in &config.players {
            if !catalogue.contains_key(name) {
                anyhow::bail!("player '{name}' is not present in the engine catalogue");
            }
        }

        let tournament_type = match config.pairing.format {
            crate::pairing::Format::RoundRobin => "roundrobin",
            crate::pairing::Format::Knockout => "knockout",
            crate::pairing::Format::Swiss => "swiss",
        };

        let book = match &config.openings.book_path {
            Some(path) => match rules::book::Book::load(path, config.openings.book_format) {
                Ok(book) => book,
                Err(e) => {
                    output.display_message(Message::Warning, &format!("opening book unavailable ({e}); falling back to the standard start position"));
                    rules::book::Book::empty()
                }
            },
            None => rules::book::Book::empty(),
        };

        #[cfg(feature = "syzygy")]
        let tablebase = match (&config.tablebase_dir, config.adjudication.tablebase_enabled) {
            (Some(dir), true) => Some(ActiveTablebase::open(dir)?),
            _ => None,
        };
        #[cfg(not(feature = "syzygy"))]
        let tablebase = if config.adjudication.tablebase_enabled {
            output.display_message(Message::Warning, "tablebase adjudication requested but the 'syzygy' feature is not enabled; ignoring");
            Some(NoTablebase)
        } else {
            None
        };

        Ok(Self {
            pairing: PairingEngine::new(config.pairing.clone(), config.openings.seed),
            store: MatchRecordStore::new(store_path, tournament_type, config.time_control),
            book,
            standings: Standings::new(),
            tablebase,
            live: Vec::new(),
            disposing: Vec::new(),
            log_dir,
            pgn_path,
            output,
            pair_openings: HashMap::new(),
            shared_opening: None,
            config,
            catalogue,
        })
    }

    /// Checks for a prior `playing.json` and either adopts it (after asking,
    /// unless `auto_answer` is given) or discards it, per §4.4's resume prompt.
    /// Any record left `playing` by a killed process is reset to `none` so the
    /// Scheduler reschedules it — it has no running Supervisor to resume into.
    pub fn resume_or_start(&mut self, auto_answer: Option<bool>) -> Res<()> {
        let Some(state) = MatchRecordStore::load_if_present(self.store.path())? else {
            return Ok(());
        };
        if !MatchRecordStore::has_uncompleted_records(&state) {
            MatchRecordStore::discard_existing(self.store.path());
            return Ok(());
        }
        let resume = auto_answer.unwrap_or_else(prompt_resume);
        if !resume {
            MatchRecordStore::discard_existing(self.store.path());
            return Ok(());
        }
        self.store.adopt(state);
        for record in self.store.records_mut() {
            if record.state == RecordState::Playing {
                record.state = RecordState::None;
            }
        }
        self.output.display_message(Message::Info, "resuming the interrupted tournament");
        Ok(())
    }

    /// Runs the tick loop to completion, sleeping `TICK_PERIOD` between ticks.
    pub fn run(&mut self) -> Res<()> {
        loop {
            if self.tick()? {
                return Ok(());
            }
            std::thread::sleep(TICK_PERIOD);
        }
    }

    /// Advances the Scheduler by one tick; returns `true` once the tournament
    /// has finished and the store has been finalized.
    pub fn tick(&mut self) -> Res<bool> {
        self.advance_live()?;
        self.launch_new_games()?;
        if self.live.is_empty() && !self.has_uncompleted() {
            return self.advance_round_or_finish();
        }
        Ok(false)
    }

    fn has_uncompleted(&self) -> bool {
        self.store.records().iter().any(MatchRecord::is_uncompleted)
    }

    fn advance_live(&mut self) -> Res<()> {
        for i in 0..self.live.len() {
            self.live[i].supervisor.tick();
            if !self.live[i].ingested && matches!(self.live[i].supervisor.state(), MatchStatus::Stopped(_)) {
                self.ingest_completed(i)?;
                self.live[i].ingested = true;
                self.live[i].supervisor.begin_ending();
            }
        }

        let mut finished = Vec::new();
        for (i, game) in self.live.iter().enumerate() {
            if matches!(game.supervisor.state(), MatchStatus::Ended) {
                finished.push(i);
            }
        }
        for i in finished.into_iter().rev() {
            let game = self.live.remove(i);
            let (white, black) = game.supervisor.into_adapters();
            self.disposing.push(white);
            self.disposing.push(black);
        }

        self.drain_disposing();
        Ok(())
    }

    /// Ticks adapters still shutting down after their Supervisor disbanded;
    /// drops them once their process has exited.
    fn drain_disposing(&mut self) {
        use crate::adapter::AdapterState;
        for adapter in &mut self.disposing {
            if !matches!(adapter.state(), AdapterState::Stopping | AdapterState::Stopped) {
                let _ = adapter.quit();
            }
            adapter.tick();
        }
        self.disposing.retain(|a| a.state() != AdapterState::Stopped);
    }

    fn ingest_completed(&mut self, i: usize) -> Res<()> {
        let record_index = self.live[i].record_index;
        let result = self.live[i].supervisor.result().cloned().unwrap_or_else(|| {
            MatchResult::new(GameResult::Draw, GameOverReason::Crash)
        });
        let metrics = self.live[i].supervisor.metrics();
        let moves = self.live[i].supervisor.coordinate_moves();

        self.store.records_mut()[record_index].mark_completed(&result);
        self.standings.record_game(&self.store.records()[record_index], metrics);
        self.store.add_elapsed(metrics[0].2 + metrics[1].2);

        if let Err(e) = self.write_pgn(record_index, &moves, &result) {
            self.output.display_message(Message::Warning, &format!("failed to append PGN record: {e}"));
        }

        let pair_id = self.store.records()[record_index].pair_id;
        let snapshot = self.store.records().to_vec();
        if let Some(extension) = self.pairing.maybe_extend(&snapshot, pair_id) {
            self.store.records_mut().push(extension);
        }

        if let Err(e) = self.store.save() {
            self.output.display_message(Message::Warning, &format!("failed to persist tournament store: {e}"));
        }
        Ok(())
    }

    fn write_pgn(&self, record_index: usize, moves: &[String], result: &MatchResult) -> Res<()> {
        let Some(path) = &self.pgn_path else { return Ok(()) };
        let record = &self.store.records()[record_index];
        let standard_fen = Chessboard::startpos().to_fen();
        let start_fen = (record.start_fen != standard_fen).then_some(record.start_fen.as_str());
        let date = current_date_tag();
        let game = PgnGame {
            event: &self.config.event,
            site: &self.config.site,
            round: record.round_index,
            white: &record.players[0],
            black: &record.players[1],
            time_control: &time_control_tag(&self.config.time_control),
            start_fen,
            moves,
            comments: &[],
            result,
        };
        let text = pgn::render::<Chessboard>(&game, &date)?;
        let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(text.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }

    fn launch_new_games(&mut self) -> Res<()> {
        while self.live.len() < self.config.concurrency {
            let Some(record_index) = self.store.records().iter().position(MatchRecord::is_uncompleted) else {
                break;
            };
            self.store.records_mut()[record_index].mark_playing();
            if let Err(e) = self.store.save() {
                self.output.display_message(Message::Warning, &format!("failed to persist tournament store: {e}"));
            }
            let mut supervisor = match self.build_supervisor(record_index) {
                Ok(s) => s,
                Err(e) => {
                    self.output.display_message(Message::Warning, &format!("could not start game {record_index}: {e}"));
                    self.store.records_mut()[record_index].mark_error();
                    continue;
                }
            };
            supervisor.begin()?;
            self.live.push(LiveGame { record_index, supervisor, ingested: false });
        }
        Ok(())
    }

    fn build_supervisor(&self, record_index: usize) -> Res<Supervisor<Chessboard, ActiveTablebase>> {
        let record = self.store.records()[record_index].clone();
        let white_cfg = self.engine_config(&record.players[0])?;
        let black_cfg = self.engine_config(&record.players[1])?;

        let white_log = self.log_dir.join(format!("{}.stderr.log", sanitize(&white_cfg.name)));
        let black_log = self.log_dir.join(format!("{}.stderr.log", sanitize(&black_cfg.name)));
        let white_adapter = crate::adapter::EngineAdapter::new(crate::config::adapter_config_for(
            white_cfg,
            &self.config.override_options,
            Some(white_log),
        ));
        let black_adapter = crate::adapter::EngineAdapter::new(crate::config::adapter_config_for(
            black_cfg,
            &self.config.override_options,
            Some(black_log),
        ));

        let start_fen = if record.start_fen.is_empty() {
            Chessboard::startpos().to_fen()
        } else {
            record.start_fen.clone()
        };
        let adjudication = AdjudicationConfig {
            max_game_length: self.config.adjudication.max_game_length,
            max_pieces: self.config.adjudication.max_pieces,
            tablebase_enabled: self.config.adjudication.tablebase_enabled,
        };

        Ok(Supervisor::new(
            white_adapter,
            black_adapter,
            self.config.time_control,
            start_fen,
            record.start_moves.clone(),
            adjudication,
            self.tablebase.clone(),
            self.config.ponder,
        ))
    }

    fn engine_config(&self, name: &str) -> Res<&EngineConfig> {
        self.catalogue.get(name).ok_or_else(|| anyhow::anyhow!("engine '{name}' is not in the catalogue"))
    }

    fn advance_round_or_finish(&mut self) -> Res<bool> {
        let snapshot = self.store.records().to_vec();
        match self.pairing.next_round(&self.config.players, &snapshot) {
            Some(mut new_records) => {
                self.assign_openings(&mut new_records);
                self.store.records_mut().extend(new_records);
                if let Err(e) = self.store.save() {
                    self.output.display_message(Message::Warning, &format!("failed to persist tournament store: {e}"));
                }
                Ok(false)
            }
            None => {
                self.finalize()?;
                Ok(true)
            }
        }
    }

    /// Draws an opening for every two-sided record in a freshly generated
    /// round, per the configured policy (§4.6). Byes and tie-break extension
    /// games are never passed here — extensions inherit their opening from
    /// `PairingEngine::maybe_extend` directly.
    fn assign_openings(&mut self, records: &mut [MatchRecord]) {
        if self.book.is_empty() {
            return;
        }
        let mut next_seed = self.config.openings.seed.wrapping_add(self.pair_openings.len() as u64 + 1);
        for record in records.iter_mut() {
            if record.players[1] == BYE {
                continue;
            }
            let opening = match self.config.openings.policy {
                OpeningPolicy::AllOne => {
                    self.shared_opening
                        .get_or_insert_with(|| self.book.sample(self.config.openings.seed))
                        .clone()
                }
                OpeningPolicy::SamePair => {
                    if let Some(o) = self.pair_openings.get(&record.pair_id) {
                        o.clone()
                    } else {
                        let o = self.book.sample(next_seed);
                        next_seed = next_seed.wrapping_add(1);
                        self.pair_openings.insert(record.pair_id, o.clone());
                        o
                    }
                }
                OpeningPolicy::AllNew => {
                    let o = self.book.sample(next_seed);
                    next_seed = next_seed.wrapping_add(1);
                    o
                }
            };
            record.start_fen = opening.start_fen;
            record.start_moves = opening.start_moves;
        }
    }

    fn finalize(&mut self) -> Res<()> {
        if let Err(e) = self.store.save() {
            self.output.display_message(Message::Warning, &format!("failed to persist tournament store: {e}"));
        }
        self.print_standings();
        self.store.finalize();
        Ok(())
    }

    fn print_standings(&mut self) {
        let mut rows: Vec<(String, crate::stats::PlayerStats)> =
            self.standings.players().map(|(n, s)| (n.clone(), s.clone())).collect();
        rows.sort_by(|a, b| b.1.score().partial_cmp(&a.1.score()).unwrap());

        self.output.display_message(Message::Info, "Final standings:");
        for (name, s) in &rows {
            let elo = s.elo_diff().map(|e| format!("{e:+.1}")).unwrap_or_else(|| "n/a".to_string());
            let los = s.los().map(|l| format!("{:.1}%", l * 100.0)).unwrap_or_else(|| "n/a".to_string());
            let line = format!(
                "{name:<20} {games:>3} games  +{w} ={d} -{l}  score {score:.1}  elo {elo}  los {los}  white {wc} bye {bc} abnormal {ac}",
                games = s.games,
                w = s.wins,
                d = s.draws,
                l = s.losses,
                score = s.score(),
                wc = s.white_count,
                bc = s.bye_count,
                ac = s.abnormal_count,
            );
            self.output.display_message(Message::Info, &line);
        }

        let elapsed = self.store.elapsed();
        self.output.display_message(
            Message::Info,
            &format!("Total elapsed time: {:.1}s", elapsed.as_secs_f64()),
        );
    }
}

fn sanitize(name: &str) -> String {
    name.chars().map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' }).collect()
}

fn time_control_tag(tc: &crate::clock::TimeControl) -> String {
    match tc {
        crate::clock::TimeControl::Infinite => "-".to_string(),
        crate::clock::TimeControl::Depth(d) => format!("depth {d}"),
        crate::clock::TimeControl::MoveTime(t) => format!("{:.2}", t.as_secs_f64()),
        crate::clock::TimeControl::Standard { moves_per_control, base, increment, .. } => {
            format!("{moves_per_control}/{}+{}", base.as_secs_f64(), increment.as_secs_f64())
        }
    }
}

/// Stamped at PGN-write time rather than threaded in from outside; accurate
/// enough for a `[Date]` tag and kept isolated to this one call site.
fn current_date_tag() -> String {
    chrono::Local::now().format("%Y.%m.%d").to_string()
}

fn prompt_resume() -> bool {
    print!("an interrupted tournament was found in the working folder; resume it? [y/N] ");
    let _ = std::io::stdout().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return false;
    }
    matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
