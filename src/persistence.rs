//! Checkpointing: the full world state plus the RNG stream, written as JSON
//! at day rollover so a resumed run replays byte-identically.
//!
//! An advisory lock file guards the checkpoint directory against two engine
//! processes writing over each other.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::state::WorldState;

const CHECKPOINT_FILE: &str = "checkpoint.json";
const LOCK_FILE: &str = "checkpoint.lock";
const SAVE_ATTEMPTS: u32 = 3;

/// Everything needed to resume: the world and the exact RNG position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub world: WorldState,
    pub rng: ChaCha20Rng,
}

/// Advisory lock, released when dropped. `create_new` makes acquisition
/// atomic on every platform we care about.
#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf) -> Result<Self, EngineError> {
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => Ok(LockFile { path }),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(EngineError::CheckpointLocked(path.display().to_string()))
            }
            Err(e) => Err(EngineError::persistence(
                format!("creating lock {}", path.display()),
                e,
            )),
        }
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

/// Locked handle to a checkpoint directory.
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
    _lock: LockFile,
}

impl CheckpointStore {
    /// Create the directory if needed and take the advisory lock. Fails with
    /// `CheckpointLocked` when another process holds it.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, EngineError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| EngineError::persistence(format!("creating {}", dir.display()), e))?;
        let lock = LockFile::acquire(dir.join(LOCK_FILE))?;
        Ok(CheckpointStore { dir, _lock: lock })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(CHECKPOINT_FILE)
    }

    /// Write the checkpoint atomically (temp file + rename), retrying
    /// transient IO errors a few times before giving up.
    pub fn save(&self, checkpoint: &Checkpoint) -> Result<(), EngineError> {
        let mut last_err = None;
        for attempt in 1..=SAVE_ATTEMPTS {
            match self.try_save(checkpoint) {
                Ok(()) => {
                    debug!(path = %self.path().display(), attempt, "checkpoint saved");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, error = %e, "checkpoint save failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.expect("at least one attempt was made"))
    }

    fn try_save(&self, checkpoint: &Checkpoint) -> Result<(), EngineError> {
        let tmp = self.dir.join(format!("{CHECKPOINT_FILE}.tmp"));
        let file = File::create(&tmp)
            .map_err(|e| EngineError::persistence(format!("creating {}", tmp.display()), e))?;
        serde_json::to_writer(file, checkpoint)?;
        fs::rename(&tmp, self.path())
            .map_err(|e| EngineError::persistence("renaming checkpoint into place", e))?;
        Ok(())
    }

    /// Load the latest checkpoint, or `None` when the directory has never
    /// been checkpointed.
    pub fn load(&self) -> Result<Option<Checkpoint>, EngineError> {
        load_from(&self.path())
    }
}

fn load_from(path: &Path) -> Result<Option<Checkpoint>, EngineError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(EngineError::persistence(format!("reading {}", path.display()), e));
        }
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::master::Catalog;

    fn checkpoint() -> Checkpoint {
        let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        Checkpoint {
            world: WorldState::bootstrap(&Catalog::canonical(), start),
            rng: ChaCha20Rng::seed_from_u64(42),
        }
    }

    #[test]
    fn round_trip_preserves_world_and_rng_position() {
        let dir = tempfile::tempdir().unwrap();
        let mut original = checkpoint();
        // Burn some of the stream so the saved position is mid-stream.
        for _ in 0..100 {
            original.rng.random::<f64>();
        }
        original.world.clock.advance_hour();

        {
            let store = CheckpointStore::open(dir.path()).unwrap();
            store.save(&original).unwrap();
        }

        let store = CheckpointStore::open(dir.path()).unwrap();
        let mut restored = store.load().unwrap().expect("checkpoint present");
        assert_eq!(restored.world.clock, original.world.clock);
        assert_eq!(restored.world.part_stock, original.world.part_stock);
        // Identical continuation of the random stream.
        let a: Vec<f64> = (0..10).map(|_| original.rng.random()).collect();
        let b: Vec<f64> = (0..10).map(|_| restored.rng.random()).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_directory_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn second_open_fails_while_lock_held() {
        let dir = tempfile::tempdir().unwrap();
        let _store = CheckpointStore::open(dir.path()).unwrap();
        let err = CheckpointStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, EngineError::CheckpointLocked(_)));
    }

    #[test]
    fn lock_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        {
            let _store = CheckpointStore::open(dir.path()).unwrap();
        }
        CheckpointStore::open(dir.path()).expect("lock should be released");
    }

    #[test]
    fn garbled_checkpoint_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::open(dir.path()).unwrap();
        fs::write(store.path(), b"{not json").unwrap();
        assert!(matches!(store.load(), Err(EngineError::Serialization(_))));
    }
}
