//! Per-session credential storage
//!
//! Each session owns one directory under the auth root, named after the
//! session id. Transports keep their key material there as one JSON file per
//! named entry (`creds.json`, `pre-key-1.json`, ...), so a later transport can
//! reconnect without pairing again. The whole directory is what the archive
//! uploader ships to the blob store.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

use crate::error::CredentialError;

/// Root of all session credential directories
#[derive(Debug, Clone)]
pub struct CredentialStore {
    root: PathBuf,
}

impl CredentialStore {
    /// Create a store rooted at `root` (e.g. `./auth`)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The auth root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding credentials for `session_id`
    pub fn dir_for(&self, session_id: &str) -> PathBuf {
        self.root.join(session_id)
    }

    /// Open (creating if needed) the credential state for a session
    pub async fn open(&self, session_id: &str) -> Result<CredentialState, CredentialError> {
        let dir = self.dir_for(session_id);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| io_error(&dir, source))?;
        Ok(CredentialState {
            session_id: session_id.to_string(),
            dir,
        })
    }
}

/// Handle to one session's credential directory
///
/// `load` and `save` are the persistence hook handed to transports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialState {
    session_id: String,
    dir: PathBuf,
}

impl CredentialState {
    /// Session this state belongs to
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Directory backing this state
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the primary `creds` entry exists, i.e. a previous pairing succeeded
    pub async fn is_paired(&self) -> bool {
        fs::try_exists(self.entry_path("creds")).await.unwrap_or(false)
    }

    /// Load a named entry, `None` if it was never saved
    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, CredentialError> {
        let path = self.checked_entry_path(name)?;
        let content = match fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(io_error(&path, source)),
        };
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| CredentialError::Malformed {
                name: name.to_string(),
                source,
            })
    }

    /// Persist a named entry, replacing any previous value
    pub async fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<(), CredentialError> {
        let path = self.checked_entry_path(name)?;
        let content =
            serde_json::to_vec_pretty(value).map_err(|source| CredentialError::Malformed {
                name: name.to_string(),
                source,
            })?;

        // Write-then-rename; readers never see a partially written entry
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)
            .await
            .map_err(|source| io_error(&tmp, source))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|source| io_error(&path, source))
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    fn checked_entry_path(&self, name: &str) -> Result<PathBuf, CredentialError> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !name.starts_with('.');
        if !valid {
            return Err(CredentialError::InvalidName(name.to_string()));
        }
        Ok(self.entry_path(name))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> CredentialError {
    CredentialError::Io {
        path: path.display().to_string(),
        source,
    }
}
