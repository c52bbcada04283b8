use directories::ProjectDirs;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::stats::CompletedStat;

/// Where finished sessions go. The tracker calls `append` exactly once per
/// session, at the moment it ends.
pub trait HistoryStore {
    fn append(&self, stat: &CompletedStat) -> io::Result<()>;

    /// Oldest first. Missing or unreadable history is simply empty.
    fn load(&self) -> Vec<CompletedStat>;
}

/// Append-only session history kept as one JSON array on disk.
#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "klack") {
            pd.data_local_dir().join("history.json")
        } else {
            PathBuf::from("klack_history.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    /// Overwrites the whole history. `append` is built on this; it is also
    /// the hook for pruning old sessions.
    pub fn replace(&self, stats: &[CompletedStat]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(stats).unwrap_or_default();
        fs::write(&self.path, data)
    }
}

impl Default for FileHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryStore for FileHistoryStore {
    fn append(&self, stat: &CompletedStat) -> io::Result<()> {
        let mut stats = self.load();
        stats.push(stat.clone());
        self.replace(&stats)
    }

    fn load(&self) -> Vec<CompletedStat> {
        fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok())
            .unwrap_or_default()
    }
}
