//! Per-thread checkpoints.
//!
//! The executor saves a checkpoint after every step, so an interrupted
//! conversation resumes exactly where it stopped. File-backed threads live
//! under the state directory:
//!
//! ```text
//! <state_dir>/threads/<thread>/
//! ├── checkpoints.jsonl   # Append-only step history
//! └── latest.json         # Most recent checkpoint
//! ```

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};
use crate::graph::Node;
use crate::state::WorkflowState;

/// State of a thread after a given step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub thread_id: String,
    /// Steps executed so far.
    pub step: usize,
    /// Node to run next; `None` once the thread has reached END.
    pub next: Option<Node>,
    pub state: WorkflowState,
    pub saved_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(thread_id: impl Into<String>, step: usize, next: Option<Node>, state: WorkflowState) -> Self {
        Self {
            thread_id: thread_id.into(),
            step,
            next,
            state,
            saved_at: Utc::now(),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.next.is_none()
    }
}

/// Storage for checkpoints, keyed by thread.
pub trait CheckpointStore: Send + Sync {
    fn save(&self, checkpoint: &Checkpoint) -> CoreResult<()>;

    fn load_latest(&self, thread_id: &str) -> CoreResult<Option<Checkpoint>>;

    /// Every checkpoint of a thread, oldest first.
    fn history(&self, thread_id: &str) -> CoreResult<Vec<Checkpoint>>;

    /// Known thread identifiers, sorted.
    fn threads(&self) -> CoreResult<Vec<String>>;
}

/// In-process store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    threads: RwLock<HashMap<String, Vec<Checkpoint>>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> CoreResult<()> {
        self.threads
            .write()
            .entry(checkpoint.thread_id.clone())
            .or_default()
            .push(checkpoint.clone());
        Ok(())
    }

    fn load_latest(&self, thread_id: &str) -> CoreResult<Option<Checkpoint>> {
        Ok(self
            .threads
            .read()
            .get(thread_id)
            .and_then(|history| history.last().cloned()))
    }

    fn history(&self, thread_id: &str) -> CoreResult<Vec<Checkpoint>> {
        Ok(self.threads.read().get(thread_id).cloned().unwrap_or_default())
    }

    fn threads(&self) -> CoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.threads.read().keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Store backed by one directory per thread.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    root: PathBuf,
}

impl FileCheckpointStore {
    /// Store rooted at `state_dir`.
    pub fn new(state_dir: impl AsRef<Path>) -> Self {
        Self {
            root: state_dir.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn threads_dir(&self) -> PathBuf {
        self.root.join("threads")
    }

    fn thread_dir(&self, thread_id: &str) -> CoreResult<PathBuf> {
        validate_thread_id(thread_id)?;
        Ok(self.threads_dir().join(thread_id))
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn save(&self, checkpoint: &Checkpoint) -> CoreResult<()> {
        let dir = self.thread_dir(&checkpoint.thread_id)?;
        fs::create_dir_all(&dir)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("checkpoints.jsonl"))?;
        writeln!(file, "{}", serde_json::to_string(checkpoint)?)?;

        fs::write(dir.join("latest.json"), serde_json::to_string_pretty(checkpoint)?)?;
        debug!(thread = %checkpoint.thread_id, step = checkpoint.step, "Saved checkpoint");
        Ok(())
    }

    fn load_latest(&self, thread_id: &str) -> CoreResult<Option<Checkpoint>> {
        let path = self.thread_dir(thread_id)?.join("latest.json");
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let checkpoint = serde_json::from_str(&content).map_err(|e| {
            CoreError::Checkpoint(format!("corrupt checkpoint {}: {}", path.display(), e))
        })?;
        Ok(Some(checkpoint))
    }

    fn history(&self, thread_id: &str) -> CoreResult<Vec<Checkpoint>> {
        let path = self.thread_dir(thread_id)?.join("checkpoints.jsonl");
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(fs::File::open(&path)?);
        let mut history = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            history.push(serde_json::from_str(&line)?);
        }
        Ok(history)
    }

    fn threads(&self) -> CoreResult<Vec<String>> {
        let dir = self.threads_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.path().join("latest.json").exists() {
                ids.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Thread ids become directory names, so only a safe character set is allowed.
pub fn validate_thread_id(thread_id: &str) -> CoreResult<()> {
    let valid = !thread_id.is_empty()
        && thread_id != "."
        && thread_id != ".."
        && thread_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(CoreError::Checkpoint(format!("invalid thread id '{}'", thread_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn checkpoint(thread: &str, step: usize, next: Option<Node>) -> Checkpoint {
        let mut state = WorkflowState::new();
        state.log(format!("step {}", step));
        Checkpoint::new(thread, step, next, state)
    }

    #[test]
    fn test_memory_store_latest_and_history() {
        let store = MemoryCheckpointStore::new();
        assert!(store.load_latest("t1").unwrap().is_none());

        store.save(&checkpoint("t1", 1, Some(Node::StageProcessor))).unwrap();
        store.save(&checkpoint("t1", 2, Some(Node::Decorator))).unwrap();
        store.save(&checkpoint("t2", 1, None)).unwrap();

        let latest = store.load_latest("t1").unwrap().unwrap();
        assert_eq!(latest.step, 2);
        assert_eq!(latest.next, Some(Node::Decorator));
        assert_eq!(store.history("t1").unwrap().len(), 2);
        assert_eq!(store.threads().unwrap(), vec!["t1", "t2"]);
    }

    #[test]
    fn test_file_store_roundtrip() {
        let temp = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(temp.path());

        store.save(&checkpoint("thread-a", 1, Some(Node::StageProcessor))).unwrap();
        store.save(&checkpoint("thread-a", 2, None)).unwrap();

        let latest = store.load_latest("thread-a").unwrap().unwrap();
        assert!(latest.is_finished());
        assert_eq!(latest.state.latest_log(), Some("step 2"));

        let history = store.history("thread-a").unwrap();
        assert_eq!(history.iter().map(|c| c.step).collect::<Vec<_>>(), vec![1, 2]);
        assert!(temp.path().join("threads/thread-a/checkpoints.jsonl").exists());
        assert_eq!(store.threads().unwrap(), vec!["thread-a"]);
    }

    #[test]
    fn test_file_store_unknown_thread() {
        let temp = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(temp.path());
        assert!(store.load_latest("nobody").unwrap().is_none());
        assert!(store.history("nobody").unwrap().is_empty());
        assert!(store.threads().unwrap().is_empty());
    }

    #[test]
    fn test_file_store_corrupt_latest() {
        let temp = TempDir::new().unwrap();
        let store = FileCheckpointStore::new(temp.path());
        let dir = temp.path().join("threads").join("broken");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("latest.json"), "{not json").unwrap();

        let err = store.load_latest("broken").unwrap_err();
        assert!(matches!(err, CoreError::Checkpoint(_)));
    }

    #[test]
    fn test_thread_id_validation() {
        assert!(validate_thread_id("influencer_outreach_001").is_ok());
        assert!(validate_thread_id("../escape").is_err());
        assert!(validate_thread_id("").is_err());
        assert!(validate_thread_id("..").is_err());
    }
}
