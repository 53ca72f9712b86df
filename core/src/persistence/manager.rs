use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};

use crate::database::Database;
use crate::error::EngineError;

use super::PersistenceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutosaveTrigger {
    Interval,
    MutationCount,
}

impl AutosaveTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Interval => "interval",
            Self::MutationCount => "mutation_count",
        }
    }
}

/// Where state is persisted and when it is saved or reloaded automatically.
/// Both autosave triggers may be active at once; `None` disables one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistencePolicy {
    pub path: PathBuf,
    pub save_interval: Option<Duration>,
    pub save_every_mutations: Option<u64>,
    pub auto_reload: bool,
}

impl PersistencePolicy {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            save_interval: None,
            save_every_mutations: None,
            auto_reload: false,
        }
    }

    pub fn with_save_interval(mut self, interval: Duration) -> Self {
        self.save_interval = (!interval.is_zero()).then_some(interval);
        self
    }

    pub fn with_save_every_mutations(mut self, mutations: u64) -> Self {
        self.save_every_mutations = (mutations > 0).then_some(mutations);
        self
    }

    pub fn with_auto_reload(mut self, enabled: bool) -> Self {
        self.auto_reload = enabled;
        self
    }

    pub fn autosave_enabled(&self) -> bool {
        self.save_interval.is_some() || self.save_every_mutations.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveSummary {
    pub series: usize,
    pub points: usize,
    pub bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    pub series: usize,
    pub points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadOutcome {
    Disabled,
    Missing,
    Unchanged,
    Reloaded(LoadSummary),
}

/// Identity of a persisted file as of the last time this process wrote or
/// read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFingerprint {
    pub modified: Option<SystemTime>,
    pub len: u64,
    pub checksum: u32,
}

impl FileFingerprint {
    /// Returns `None` when the file does not exist.
    pub fn capture(path: &Path) -> Result<Option<Self>, PersistenceError> {
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(error) => return Err(error.into()),
        };

        Ok(Some(Self {
            modified: metadata.modified().ok(),
            len: metadata.len(),
            checksum: checksum_file(path)?,
        }))
    }

    fn same_metadata(&self, metadata: &fs::Metadata) -> bool {
        self.len == metadata.len()
            && self.modified.is_some()
            && self.modified == metadata.modified().ok()
    }
}

fn checksum_file(path: &Path) -> Result<u32, PersistenceError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = crc32fast::Hasher::new();
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        hasher.update(&chunk[..read]);
    }
    Ok(hasher.finalize())
}

#[derive(Debug)]
struct ManagerState {
    saved_mutations: u64,
    last_save_at: Instant,
    fingerprint: Option<FileFingerprint>,
}

/// Applies a [`PersistencePolicy`] to one [`Database`]. Saves and loads
/// through the manager are serialized with each other. When a reload races
/// with inserts, the last load wins.
#[derive(Debug)]
pub struct PersistenceManager {
    policy: PersistencePolicy,
    state: Mutex<ManagerState>,
}

impl PersistenceManager {
    pub fn new(policy: PersistencePolicy) -> Self {
        Self {
            policy,
            state: Mutex::new(ManagerState {
                saved_mutations: 0,
                last_save_at: Instant::now(),
                fingerprint: None,
            }),
        }
    }

    pub fn policy(&self) -> &PersistencePolicy {
        &self.policy
    }

    pub fn save_now(&self, database: &Database) -> Result<SaveSummary, EngineError> {
        let mut state = self.lock_state()?;
        self.save_locked(database, &mut state)
    }

    pub fn load_now(&self, database: &Database) -> Result<LoadSummary, EngineError> {
        let mut state = self.lock_state()?;
        self.load_locked(database, &mut state)
    }

    /// Startup load: a missing file is not an error.
    pub fn load_if_exists(&self, database: &Database) -> Result<Option<LoadSummary>, EngineError> {
        if !self.policy.path.exists() {
            return Ok(None);
        }
        self.load_now(database).map(Some)
    }

    /// Saves to an arbitrary path. When `path` is the managed file the
    /// bookkeeping is updated so our own write is not taken for a foreign one.
    pub fn save_to(&self, database: &Database, path: &Path) -> Result<SaveSummary, EngineError> {
        if path == self.policy.path {
            return self.save_now(database);
        }
        database.save(path)
    }

    pub fn load_from(&self, database: &Database, path: &Path) -> Result<LoadSummary, EngineError> {
        if path == self.policy.path {
            return self.load_now(database);
        }
        database.load(path)
    }

    pub fn is_dirty(&self, database: &Database) -> Result<bool, EngineError> {
        let state = self.lock_state()?;
        Ok(database.mutation_count() != state.saved_mutations)
    }

    /// Which trigger, if any, calls for a save given the current mutation
    /// count. Nothing is due while state is unchanged since the last save.
    pub fn autosave_due(
        &self,
        mutations: u64,
        now: Instant,
    ) -> Result<Option<AutosaveTrigger>, EngineError> {
        let state = self.lock_state()?;
        if mutations == state.saved_mutations {
            return Ok(None);
        }
        let pending = mutations.saturating_sub(state.saved_mutations);

        if let Some(every) = self.policy.save_every_mutations {
            if pending >= every {
                return Ok(Some(AutosaveTrigger::MutationCount));
            }
        }
        if let Some(interval) = self.policy.save_interval {
            if now.saturating_duration_since(state.last_save_at) >= interval {
                return Ok(Some(AutosaveTrigger::Interval));
            }
        }
        Ok(None)
    }

    pub fn maybe_autosave(
        &self,
        database: &Database,
    ) -> Result<Option<(AutosaveTrigger, SaveSummary)>, EngineError> {
        let Some(trigger) = self.autosave_due(database.mutation_count(), Instant::now())? else {
            return Ok(None);
        };

        let mut state = self.lock_state()?;
        // Another caller may have saved between the check and the lock.
        if database.mutation_count() == state.saved_mutations {
            return Ok(None);
        }
        let summary = self.save_locked(database, &mut state)?;
        Ok(Some((trigger, summary)))
    }

    /// Reloads the managed file when its fingerprint differs from the one
    /// recorded at our last save or load. Length and mtime are compared first;
    /// the checksum is only computed when they differ.
    pub fn check_reload(&self, database: &Database) -> Result<ReloadOutcome, EngineError> {
        if !self.policy.auto_reload {
            return Ok(ReloadOutcome::Disabled);
        }

        let mut state = self.lock_state()?;
        let metadata = match fs::metadata(&self.policy.path) {
            Ok(metadata) => metadata,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(ReloadOutcome::Missing)
            }
            Err(error) => return Err(PersistenceError::from(error).into()),
        };
        if state
            .fingerprint
            .is_some_and(|recorded| recorded.same_metadata(&metadata))
        {
            return Ok(ReloadOutcome::Unchanged);
        }

        let Some(current) = FileFingerprint::capture(&self.policy.path)? else {
            return Ok(ReloadOutcome::Missing);
        };
        if let Some(recorded) = state.fingerprint {
            if recorded.len == current.len && recorded.checksum == current.checksum {
                state.fingerprint = Some(current);
                return Ok(ReloadOutcome::Unchanged);
            }
        }

        let summary = database.load(&self.policy.path)?;
        state.fingerprint = Some(current);
        state.saved_mutations = database.mutation_count();
        state.last_save_at = Instant::now();
        Ok(ReloadOutcome::Reloaded(summary))
    }

    fn save_locked(
        &self,
        database: &Database,
        state: &mut ManagerState,
    ) -> Result<SaveSummary, EngineError> {
        let mutations = database.mutation_count();
        let summary = database.save(&self.policy.path)?;
        state.saved_mutations = mutations;
        state.last_save_at = Instant::now();
        state.fingerprint = FileFingerprint::capture(&self.policy.path)?;
        Ok(summary)
    }

    fn load_locked(
        &self,
        database: &Database,
        state: &mut ManagerState,
    ) -> Result<LoadSummary, EngineError> {
        let fingerprint = FileFingerprint::capture(&self.policy.path)?;
        let summary = database.load(&self.policy.path)?;
        state.fingerprint = fingerprint;
        state.saved_mutations = database.mutation_count();
        state.last_save_at = Instant::now();
        Ok(summary)
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, ManagerState>, EngineError> {
        self.state
            .lock()
            .map_err(|_| EngineError::lock_poisoned("persistence manager"))
    }
}
