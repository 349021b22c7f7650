//! Syzygy endgame tablebase probing, behind the `syzygy` feature so a build that
//! doesn't need it never links `shakmaty-syzygy` or touches disk for table files.

use std::path::Path;
use std::sync::Arc;

use shakmaty_syzygy::{Tablebase as ShakTablebase, Wdl as ShakWdl};

use crate::board::{Tablebase, Wdl};
use crate::chess::Chessboard;
use crate::common::Res;

/// Cheap to clone: many concurrent `Supervisor`s probe the same set of loaded
/// table files read-only, so the underlying `ShakTablebase` is shared behind
/// an `Arc` rather than reopened per game.
#[derive(Clone)]
pub struct SyzygyTablebase {
    inner: Arc<ShakTablebase<shakmaty::Chess>>,
    max_pieces: u32,
}

impl SyzygyTablebase {
    pub fn open(dir: &Path) -> Res<Self> {
        let mut inner = ShakTablebase::new();
        let max_pieces = inner
            .add_directory(dir)
            .map_err(|e| anyhow::anyhow!("failed to load tablebase directory {}: {e}", dir.display()))?
            as u32;
        Ok(Self { inner: Arc::new(inner), max_pieces })
    }
}

impl Tablebase<Chessboard> for SyzygyTablebase {
    fn max_pieces(&self) -> u32 {
        self.max_pieces
    }

    fn probe_wdl(&self, board: &Chessboard) -> Option<Wdl> {
        if board.piece_count() > self.max_pieces {
            return None;
        }
        match self.inner.probe_wdl(board.inner()).ok()? {
            ShakWdl::Win | ShakWdl::CursedWin => Some(Wdl::Win),
            ShakWdl::Draw => Some(Wdl::Draw),
            ShakWdl::Loss | ShakWdl::BlessedLoss => Some(Wdl::Loss),
        }
    }
}
