use std::path::{Path, PathBuf};

use hashbrown::HashMap;
use parking_lot::Mutex;

/// Per-chat working directory.
///
/// A plain keyed cache: callers validate paths through the sandbox before
/// calling [`WorkingDirectoryStore::set`]. Concurrent updates for the same
/// chat are last-write-wins.
#[derive(Debug)]
pub struct WorkingDirectoryStore {
    root: PathBuf,
    dirs: Mutex<HashMap<i64, PathBuf>>,
}

impl WorkingDirectoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dirs: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current directory for `chat_id`, initialized to the root on first use.
    pub fn get(&self, chat_id: i64) -> PathBuf {
        self.dirs
            .lock()
            .entry(chat_id)
            .or_insert_with(|| self.root.clone())
            .clone()
    }

    pub fn set(&self, chat_id: i64, dir: impl Into<PathBuf>) {
        self.dirs.lock().insert(chat_id, dir.into());
    }

    pub fn reset(&self, chat_id: i64) {
        self.set(chat_id, self.root.clone());
    }
}
