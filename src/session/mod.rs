//! Durable user profile and restoration history.
//!
//! Two named entries are kept: one for the signed-in [`User`] and one for the [`History`]
//! array. Every mutation rewrites the whole entry.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::foundation::error::{MemoraError, MemoraResult};
use crate::model::{History, User};

/// Entry holding the serialized user.
pub const USER_ENTRY: &str = "memora_user";
/// Entry holding the serialized history array.
pub const HISTORY_ENTRY: &str = "memora_history";

/// State reconstructed at startup.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub user: Option<User>,
    pub history: History,
}

/// Persistence boundary for the session.
///
/// Missing entries load as empty state. Saves replace the whole entry and are atomic from
/// the caller's point of view.
pub trait SessionStore {
    fn load(&self) -> MemoraResult<SessionSnapshot>;

    /// Persist the user; `None` removes the entry.
    fn save_user(&mut self, user: Option<&User>) -> MemoraResult<()>;

    fn save_history(&mut self, history: &History) -> MemoraResult<()>;
}

/// JSON files under a directory, one per entry.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    root: PathBuf,
}

impl FileSessionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn entry_path(&self, entry: &str) -> PathBuf {
        self.root.join(format!("{entry}.json"))
    }

    fn read_entry(&self, entry: &str) -> MemoraResult<Option<String>> {
        let path = self.entry_path(entry);
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(MemoraError::storage(format!(
                "read '{}': {e}",
                path.display()
            ))),
        }
    }

    fn write_entry(&self, entry: &str, json: &[u8]) -> MemoraResult<()> {
        std::fs::create_dir_all(&self.root)
            .with_context(|| format!("create session dir '{}'", self.root.display()))?;

        let path = self.entry_path(entry);
        let tmp = self.root.join(format!(".{entry}.json.tmp"));
        let mut f = std::fs::File::create(&tmp)
            .with_context(|| format!("create '{}'", tmp.display()))?;
        f.write_all(json)
            .and_then(|()| f.sync_all())
            .with_context(|| format!("write '{}'", tmp.display()))?;
        drop(f);

        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replace '{}'", path.display()))?;
        Ok(())
    }

    fn remove_entry(&self, entry: &str) -> MemoraResult<()> {
        let path = self.entry_path(entry);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MemoraError::storage(format!(
                "remove '{}': {e}",
                path.display()
            ))),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> MemoraResult<SessionSnapshot> {
        let user = match self.read_entry(USER_ENTRY)? {
            Some(s) => parse_entry::<Option<User>>(USER_ENTRY, &s)?,
            None => None,
        };
        let history = match self.read_entry(HISTORY_ENTRY)? {
            Some(s) => parse_entry::<History>(HISTORY_ENTRY, &s)?,
            None => History::new(),
        };
        tracing::debug!(
            root = %self.root.display(),
            signed_in = user.is_some(),
            history = history.len(),
            "session loaded"
        );
        Ok(SessionSnapshot { user, history })
    }

    fn save_user(&mut self, user: Option<&User>) -> MemoraResult<()> {
        match user {
            Some(user) => {
                let json = serde_json::to_vec(user).map_err(|e| MemoraError::serde(e.to_string()))?;
                self.write_entry(USER_ENTRY, &json)
            }
            None => self.remove_entry(USER_ENTRY),
        }
    }

    fn save_history(&mut self, history: &History) -> MemoraResult<()> {
        let json = serde_json::to_vec(history).map_err(|e| MemoraError::serde(e.to_string()))?;
        self.write_entry(HISTORY_ENTRY, &json)
    }
}

fn parse_entry<T: serde::de::DeserializeOwned>(entry: &str, s: &str) -> MemoraResult<T> {
    serde_json::from_str(s).map_err(|e| MemoraError::corrupt_store(entry, e.to_string()))
}

/// Session kept in memory, for tests and throwaway runs.
#[derive(Clone, Debug, Default)]
pub struct InMemorySessionStore {
    user: Option<User>,
    history: History,
    saves: usize,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a snapshot.
    pub fn with_snapshot(snapshot: SessionSnapshot) -> Self {
        Self {
            user: snapshot.user,
            history: snapshot.history,
            saves: 0,
        }
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Number of save calls received.
    pub fn save_count(&self) -> usize {
        self.saves
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self) -> MemoraResult<SessionSnapshot> {
        Ok(SessionSnapshot {
            user: self.user.clone(),
            history: self.history.clone(),
        })
    }

    fn save_user(&mut self, user: Option<&User>) -> MemoraResult<()> {
        self.user = user.cloned();
        self.saves += 1;
        Ok(())
    }

    fn save_history(&mut self, history: &History) -> MemoraResult<()> {
        self.history = history.clone();
        self.saves += 1;
        Ok(())
    }
}
