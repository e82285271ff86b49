use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use commune_core::constants::MAX_HISTORY_MESSAGES;
use commune_core::envelope::ChatEnvelope;
use commune_core::error::CommuneError;
use serde::Serialize;
use tracing::debug;

/// History of received envelopes backed by a single JSON file.
///
/// Every `append` is a full read-modify-write:
///   load the whole array → push → drop from the front down to `capacity`
///   → write a sibling temp file → rename over the original.
///
/// At a cap of a hundred records this costs nothing worth optimising, and it
/// keeps the file readable by anything that understands a JSON array. The
/// internal lock serialises read-modify-write cycles issued through the same
/// handle; separate handles on the same path are not coordinated.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    /// Open a store at `path` holding at most `capacity` envelopes. Nothing is
    /// touched on disk until the first write.
    pub fn open<P: AsRef<Path>>(path: P, capacity: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            capacity,
            write_lock: Mutex::new(()),
        }
    }

    /// Open a store with the default cap of [`MAX_HISTORY_MESSAGES`].
    pub fn with_default_capacity<P: AsRef<Path>>(path: P) -> Self {
        Self::open(path, MAX_HISTORY_MESSAGES)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Read the persisted sequence, oldest first. A missing or empty file is
    /// an empty history.
    pub fn load(&self) -> Result<Vec<ChatEnvelope>, CommuneError> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(CommuneError::Storage(format!(
                    "reading {}: {e}",
                    self.path.display()
                )))
            }
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        serde_json::from_slice(&data).map_err(|e| CommuneError::Serialization(e.to_string()))
    }

    /// Append one envelope, evicting the oldest entries beyond the cap.
    pub fn append(&self, envelope: &ChatEnvelope) -> Result<(), CommuneError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());

        let mut messages = self.load()?;
        messages.push(envelope.clone());
        if messages.len() > self.capacity {
            let excess = messages.len() - self.capacity;
            messages.drain(..excess);
            debug!(evicted = excess, path = %self.path.display(), "history cap reached");
        }
        self.persist(&messages)
    }

    /// Reset the history to an empty sequence.
    pub fn clear(&self) -> Result<(), CommuneError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|p| p.into_inner());
        self.persist(&[])
    }

    fn persist(&self, messages: &[ChatEnvelope]) -> Result<(), CommuneError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        messages
            .serialize(&mut ser)
            .map_err(|e| CommuneError::Serialization(e.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| CommuneError::Storage(format!("creating {}: {e}", parent.display())))?;
        }

        let tmp = self.temp_path()?;
        fs::write(&tmp, &buf)
            .map_err(|e| CommuneError::Storage(format!("writing {}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            CommuneError::Storage(format!("replacing {}: {e}", self.path.display()))
        })
    }

    fn temp_path(&self) -> Result<PathBuf, CommuneError> {
        let name = self.path.file_name().ok_or_else(|| {
            CommuneError::Storage(format!("{} is not a file path", self.path.display()))
        })?;
        let mut tmp_name = name.to_os_string();
        tmp_name.push(".tmp");
        Ok(self.path.with_file_name(tmp_name))
    }
}
