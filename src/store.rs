//! Day Store Module
//!
//! Key-value storage partitioned by day. The disk implementation lays entries
//! out as `<root>/<YYYYMMDD>/<hex-key>`; the memory implementation keeps the
//! same shape in a map and backs the tests.
use crate::canonical::CanonicalKey;
use crate::error::{GeoError, Result};
use nix::fcntl::{Flock, FlockArg};
use nix::unistd::User;
use std::collections::BTreeMap;
use std::fs::{self, DirBuilder, OpenOptions};
use std::io::{ErrorKind, Write};
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Permissions applied to newly created day-directories.
pub const DAY_DIR_MODE: u32 = 0o775;

/// Storage keyed by day name and canonical key.
pub trait DayStore: Send + Sync {
    /// Names of all day partitions, in no particular order. Hidden entries are omitted.
    fn list_days(&self) -> Result<Vec<String>>;
    /// Stored value, or `None` when the day or key is absent.
    fn get(&self, day: &str, key: &CanonicalKey) -> Result<Option<String>>;
    /// Stores a value, creating the day partition when needed.
    fn put(&self, day: &str, key: &CanonicalKey, value: &str) -> Result<()>;
    /// Removes a day partition and everything in it.
    fn delete_day(&self, day: &str) -> Result<()>;
}

/// Filesystem-backed store rooted at the cache directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
    owner_uid: Option<u32>,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            owner_uid: None,
        }
    }

    /// Hands new directories and files to `owner` when the process may do so.
    pub fn with_owner(mut self, owner: &str) -> Self {
        self.owner_uid = lookup_uid(owner);
        if self.owner_uid.is_none() {
            warn!("Cache owner {} not found; ownership will not be changed", owner);
        }
        self
    }

    fn ensure_day_dir(&self, dir: &Path) -> Result<()> {
        if !dir.exists() {
            match DirBuilder::new().recursive(true).mode(DAY_DIR_MODE).create(dir) {
                Ok(()) => {
                    // mode() is filtered by the umask
                    if let Err(e) = fs::set_permissions(dir, fs::Permissions::from_mode(DAY_DIR_MODE)) {
                        debug!("chmod {} failed: {}", dir.display(), e);
                    }
                    self.chown_best_effort(dir);
                }
                Err(e) => warn!("Failed to create cache directory {}: {}", dir.display(), e),
            }
        }
        if !dir.is_dir() {
            return Err(GeoError::CacheUnwritable(dir.display().to_string()));
        }
        Ok(())
    }

    fn chown_best_effort(&self, path: &Path) {
        if let Some(uid) = self.owner_uid {
            if let Err(e) = std::os::unix::fs::chown(path, Some(uid), None) {
                debug!("chown {} failed: {}", path.display(), e);
            }
        }
    }
}

impl DayStore for FsStore {
    fn list_days(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut days = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') {
                    days.push(name.to_string());
                }
            }
        }
        Ok(days)
    }

    fn get(&self, day: &str, key: &CanonicalKey) -> Result<Option<String>> {
        let path = self.root.join(day).join(key.as_str());
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn put(&self, day: &str, key: &CanonicalKey, value: &str) -> Result<()> {
        let dir = self.root.join(day);
        self.ensure_day_dir(&dir)?;
        let path = dir.join(key.as_str());
        write_locked(&path, value)?;
        self.chown_best_effort(&path);
        Ok(())
    }

    fn delete_day(&self, day: &str) -> Result<()> {
        match fs::remove_dir_all(self.root.join(day)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Replaces the file contents while holding an exclusive `flock`. The lock is
/// released when the guard is dropped.
fn write_locked(path: &Path, value: &str) -> std::io::Result<()> {
    let file = OpenOptions::new().write(true).create(true).open(path)?;
    let mut file = Flock::lock(file, FlockArg::LockExclusive)
        .map_err(|(_, errno)| std::io::Error::from(errno))?;
    file.set_len(0)?;
    file.write_all(value.as_bytes())?;
    file.flush()
}

fn lookup_uid(name: &str) -> Option<u32> {
    match User::from_name(name) {
        Ok(user) => user.map(|user| user.uid.as_raw()),
        Err(e) => {
            debug!("User lookup for {} failed: {}", name, e);
            None
        }
    }
}

/// In-memory store with the same contract as [`FsStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    days: Mutex<BTreeMap<String, BTreeMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, BTreeMap<String, String>>>> {
        self.days
            .lock()
            .map_err(|_| GeoError::Store("memory store lock poisoned".to_string()))
    }
}

impl DayStore for MemoryStore {
    fn list_days(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn get(&self, day: &str, key: &CanonicalKey) -> Result<Option<String>> {
        Ok(self
            .lock()?
            .get(day)
            .and_then(|entries| entries.get(key.as_str()))
            .cloned())
    }

    fn put(&self, day: &str, key: &CanonicalKey, value: &str) -> Result<()> {
        self.lock()?
            .entry(day.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_day(&self, day: &str) -> Result<()> {
        self.lock()?.remove(day);
        Ok(())
    }
}
