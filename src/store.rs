//! Persistent API key store (`config.json`).
//!
//! Holds every configured public key with its last token. Exactly one record
//! is active; its token is the one workers send. Every mutation rewrites the
//! whole file through a temp file and a rename, so a crash mid-write leaves
//! the previous file intact.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::PressError;

/// One configured API key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub key: String,
    #[serde(default)]
    pub token: String,
    /// Whether this is the active key.
    #[serde(default)]
    pub status: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct KeyFile {
    #[serde(default)]
    api_keys: Vec<KeyInfo>,
}

/// The key file plus its location. Not internally synchronized: during a
/// batch it lives inside the token guard's mutex.
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    file: KeyFile,
    active: usize,
}

impl ConfigStore {
    /// Loads the key file. Fails if it is missing or holds no keys.
    ///
    /// If no record is active the first one is activated; if several are, only
    /// the first active record stays active. Either repair is persisted.
    pub fn load(path: &Path) -> Result<Self, PressError> {
        let store = Self::load_or_default(path)?;
        if store.file.api_keys.is_empty() {
            return Err(PressError::NoKeys(path.to_path_buf()));
        }
        Ok(store)
    }

    /// Like [`load`](Self::load), but a missing file yields an empty store.
    pub fn load_or_default(path: &Path) -> Result<Self, PressError> {
        let (store, repaired) = Self::open(path)?;
        if repaired {
            debug!(path = %path.display(), "repaired active key flag");
            write_file(&store.path, &store.file)?;
        }
        Ok(store)
    }

    /// Reads the key file without ever writing it. The active-flag repair is
    /// applied in memory only.
    pub fn read(path: &Path) -> Result<Self, PressError> {
        Ok(Self::open(path)?.0)
    }

    fn open(path: &Path) -> Result<(Self, bool), PressError> {
        let file = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str::<KeyFile>(&contents)?
        } else {
            KeyFile::default()
        };

        let mut store = Self {
            path: path.to_path_buf(),
            file,
            active: 0,
        };
        let repaired = normalize_active(&mut store.file);
        store.active = active_index(&store.file);
        Ok((store, repaired))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn keys(&self) -> &[KeyInfo] {
        &self.file.api_keys
    }

    /// The active record; `None` only for an empty store.
    pub fn key_info(&self) -> Option<&KeyInfo> {
        self.file.api_keys.get(self.active)
    }

    /// Token of the active record.
    pub fn token(&self) -> &str {
        self.key_info().map(|k| k.token.as_str()).unwrap_or("")
    }

    /// Stores `token` for `key` and persists the whole file. If the write
    /// fails the store keeps its previous token.
    pub fn set_token(&mut self, key: &str, token: impl Into<String>) -> Result<(), PressError> {
        let mut next = self.file.clone();
        let record = next
            .api_keys
            .iter_mut()
            .find(|k| k.key == key)
            .ok_or_else(|| PressError::UnknownKey(key.to_string()))?;
        record.token = token.into();
        self.commit(next)
    }

    /// Adds a key with no token. The first key added becomes active.
    pub fn add_key(&mut self, key: &str) -> Result<(), PressError> {
        if self.file.api_keys.iter().any(|k| k.key == key) {
            return Err(PressError::DuplicateKey(key.to_string()));
        }
        let first = self.file.api_keys.is_empty();
        let mut next = self.file.clone();
        next.api_keys.push(KeyInfo {
            key: key.to_string(),
            token: String::new(),
            status: first,
        });
        self.commit(next)
    }

    /// Makes `key` the only active record.
    pub fn activate(&mut self, key: &str) -> Result<(), PressError> {
        let index = self
            .file
            .api_keys
            .iter()
            .position(|k| k.key == key)
            .ok_or_else(|| PressError::UnknownKey(key.to_string()))?;
        let mut next = self.file.clone();
        for (i, record) in next.api_keys.iter_mut().enumerate() {
            record.status = i == index;
        }
        self.commit(next)
    }

    /// Writes `next` to disk and only then adopts it.
    fn commit(&mut self, next: KeyFile) -> Result<(), PressError> {
        write_file(&self.path, &next)?;
        self.active = active_index(&next);
        self.file = next;
        Ok(())
    }
}

/// Makes exactly one record active. Returns true if anything changed.
fn normalize_active(file: &mut KeyFile) -> bool {
    if file.api_keys.is_empty() {
        return false;
    }
    let active = active_index(file);

    let mut changed = false;
    for (i, key) in file.api_keys.iter_mut().enumerate() {
        let status = i == active;
        if key.status != status {
            key.status = status;
            changed = true;
        }
    }
    changed
}

fn active_index(file: &KeyFile) -> usize {
    file.api_keys.iter().position(|k| k.status).unwrap_or(0)
}

/// Replaces `path` atomically: temp file in the same directory, then rename.
fn write_file(path: &Path, file: &KeyFile) -> Result<(), PressError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    serde_json::to_writer_pretty(&mut tmp, file)?;
    tmp.write_all(b"\n")?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
