//! The Match Record Store (§4.4): durably records the sequence of matches and
//! their outcomes so a tournament survives a crash or shutdown. Grounded in
//! `original_source/src/game/tourmng.cpp`'s JSON save/load and resume-prompt
//! logic, which `monitors` has no equivalent of at all.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rules::result::{GameOverReason, GameResult, MatchResult};
use serde::{Deserialize, Serialize};

use crate::clock::TimeControl;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordState {
    None,
    Playing,
    Completed,
    Error,
}

/// One scheduled or played game (§3 `MatchRecord`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MatchRecord {
    pub players: [String; 2],
    pub start_fen: String,
    pub start_moves: Vec<String>,
    pub result: Option<StoredResult>,
    pub state: RecordState,
    pub game_index: u32,
    pub round_index: u32,
    pub pair_id: u32,
}

/// `MatchResult` serialized form; kept separate from the in-memory type so the
/// on-disk schema doesn't have to track every core-side refactor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredResult {
    pub outcome: String,
    pub reason: String,
    pub comment: String,
}

impl From<&MatchResult> for StoredResult {
    fn from(r: &MatchResult) -> Self {
        Self { outcome: r.outcome.to_string(), reason: r.reason.to_string(), comment: r.comment.clone() }
    }
}

impl MatchRecord {
    pub fn is_uncompleted(&self) -> bool {
        self.state == RecordState::None
    }

    pub fn mark_completed(&mut self, result: &MatchResult) {
        self.result = Some(StoredResult::from(result));
        self.state = RecordState::Completed;
    }

    pub fn mark_playing(&mut self) {
        self.state = RecordState::Playing;
    }

    pub fn mark_error(&mut self) {
        self.state = RecordState::Error;
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TournamentState {
    pub tournament_type: String,
    pub time_control: TimeControl,
    pub elapsed_seconds: f64,
    pub records: Vec<MatchRecord>,
}

pub struct MatchRecordStore {
    path: PathBuf,
    state: TournamentState,
}

impl MatchRecordStore {
    pub fn new(path: impl Into<PathBuf>, tournament_type: &str, time_control: TimeControl) -> Self {
        Self {
            path: path.into(),
            state: TournamentState {
                tournament_type: tournament_type.to_string(),
                time_control,
                elapsed_seconds: 0.0,
                records: Vec::new(),
            },
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[MatchRecord] {
        &self.state.records
    }

    pub fn records_mut(&mut self) -> &mut Vec<MatchRecord> {
        &mut self.state.records
    }

    /// Total wall time spent playing games so far this tournament, including
    /// any prior run's total adopted via `adopt` on resume (§4.4/§8 scenario 6).
    pub fn elapsed(&self) -> Duration {
        Duration::from_secs_f64(self.state.elapsed_seconds)
    }

    /// Folds one more completed game's wall time into the running total.
    pub fn add_elapsed(&mut self, delta: Duration) {
        self.state.elapsed_seconds += delta.as_secs_f64();
    }

    /// Loads an existing store if present. Returns `None` if the file doesn't
    /// exist (a fresh tournament); a parse error is a configuration error and
    /// propagates.
    pub fn load_if_present(path: &Path) -> rules::Res<Option<TournamentState>> {
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("can't read {}: {e}", path.display()))?;
        let state: TournamentState = serde_json::from_str(&text)
            .map_err(|e| anyhow::anyhow!("malformed tournament store {}: {e}", path.display()))?;
        Ok(Some(state))
    }

    pub fn has_uncompleted_records(state: &TournamentState) -> bool {
        state.records.iter().any(MatchRecord::is_uncompleted)
    }

    /// Adopts a loaded state wholesale: the loaded records replace whatever
    /// (empty) set this store started with, and the file is removed — it will
    /// be rewritten on the next `save`.
    pub fn adopt(&mut self, state: TournamentState) {
        self.state = state;
        let _ = fs::remove_file(&self.path);
    }

    /// Discards a loaded-but-rejected state and starts fresh by deleting the
    /// file outright.
    pub fn discard_existing(path: &Path) {
        let _ = fs::remove_file(path);
    }

    /// Rewritten after every record state change (§4.4). Never reorders
    /// existing records; new records may only be appended by the caller before
    /// this is invoked, preserving the prefix-stable-extension contract (§8).
    pub fn save(&self) -> rules::Res<()> {
        let text = serde_json::to_string_pretty(&self.state)
            .map_err(|e| anyhow::anyhow!("failed to serialize tournament store: {e}"))?;
        fs::write(&self.path, text)
            .map_err(|e| anyhow::anyhow!("failed to write {}: {e}", self.path.display()))
    }

    /// Called once every scheduled record is `Completed`; removes the file so a
    /// future run starts a fresh tournament.
    pub fn finalize(&self) {
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_record(index: u32) -> MatchRecord {
        MatchRecord {
            players: ["A".to_string(), "B".to_string()],
            start_fen: "startpos".to_string(),
            start_moves: Vec::new(),
            result: None,
            state: RecordState::None,
            game_index: index,
            round_index: 1,
            pair_id: index,
        }
    }

    #[test]
    fn save_then_load_round_trips_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("playing.json");
        let mut store = MatchRecordStore::new(&path, "roundrobin", TimeControl::Infinite);
        store.records_mut().push(sample_record(0));
        store.save().unwrap();

        let loaded = MatchRecordStore::load_if_present(&path).unwrap().unwrap();
        assert_eq!(loaded.records.len(), 1);
        assert!(MatchRecordStore::has_uncompleted_records(&loaded));
        assert_eq!(loaded.time_control, TimeControl::Infinite);
    }

    #[test]
    fn elapsed_accumulates_and_survives_a_save_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("playing.json");
        let mut store = MatchRecordStore::new(&path, "roundrobin", TimeControl::Infinite);
        store.add_elapsed(Duration::from_secs(30));
        store.add_elapsed(Duration::from_secs(12));
        store.save().unwrap();

        let loaded = MatchRecordStore::load_if_present(&path).unwrap().unwrap();
        assert_eq!(loaded.elapsed_seconds, 42.0);
    }

    #[test]
    fn completed_records_are_not_uncompleted() {
        let mut record = sample_record(0);
        record.mark_completed(&MatchResult::new(GameResult::WhiteWin, GameOverReason::Mate));
        assert!(!record.is_uncompleted());
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nonexistent.json");
        assert!(MatchRecordStore::load_if_present(&path).unwrap().is_none());
    }
}
