//! Persistent key-value storage for the gate
//!
//! Durable state (device id, remembered code, per-code obfuscated device
//! blobs) lives in a JSON file, by default
//! `~/.config/codegate/gate.json`. The session token is deliberately held
//! in a volatile field that is never serialized: it lives only as long as
//! this storage instance, which is what gives the session its
//! restart-ends-the-session behavior.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration directory not found")]
    NoConfigDir,
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable gate state as written to disk
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredData {
    /// The persisted device identifier, once generated
    device_id: Option<String>,
    /// The last code that validated successfully
    current_code: Option<String>,
    /// Obfuscated device-list blob per access code
    devices: HashMap<String, String>,
}

/// Gate storage with file persistence and a volatile session scope.
///
/// The registry owns an `Arc` of this; nothing else reads or writes the
/// underlying file. Constructed without a path it keeps everything in
/// memory, which is how tests run against it.
pub struct GateStorage {
    /// Path to the storage file; `None` means in-memory only
    path: Option<PathBuf>,
    /// Durable state
    data: RwLock<StoredData>,
    /// Session-scoped token, never written to disk
    session_token: RwLock<Option<String>>,
}

impl GateStorage {
    /// Open storage at the default path, loading existing data if present
    pub fn open() -> StorageResult<Self> {
        Self::with_path(Self::default_path()?)
    }

    /// Open storage at a specific path
    pub fn with_path(path: PathBuf) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            match serde_json::from_str(&contents) {
                Ok(data) => {
                    info!("Loaded gate storage from {:?}", path);
                    data
                }
                Err(e) => {
                    warn!("Failed to parse gate storage, starting fresh: {}", e);
                    StoredData::default()
                }
            }
        } else {
            debug!("No existing gate storage, creating new");
            StoredData::default()
        };

        Ok(Self {
            path: Some(path),
            data: RwLock::new(data),
            session_token: RwLock::new(None),
        })
    }

    /// In-memory storage with no backing file
    pub fn in_memory() -> Self {
        Self {
            path: None,
            data: RwLock::new(StoredData::default()),
            session_token: RwLock::new(None),
        }
    }

    /// Default storage path (`~/.config/codegate/gate.json`)
    fn default_path() -> StorageResult<PathBuf> {
        let config_dir = dirs::config_dir().ok_or(StorageError::NoConfigDir)?;
        Ok(config_dir.join("codegate").join("gate.json"))
    }

    /// Write current durable state to disk
    async fn save(&self) -> StorageResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let data = self.data.read().await;
        let json = serde_json::to_string_pretty(&*data)?;
        std::fs::write(path, json)?;
        debug!("Saved gate storage to {:?}", path);
        Ok(())
    }

    /// The persisted device id, if one was ever generated
    pub async fn device_id(&self) -> Option<String> {
        self.data.read().await.device_id.clone()
    }

    /// Persist the device id. Written once; the id never changes after.
    pub async fn set_device_id(&self, id: String) -> StorageResult<()> {
        {
            let mut data = self.data.write().await;
            data.device_id = Some(id);
        }
        self.save().await
    }

    /// The remembered code from the last successful validation
    pub async fn current_code(&self) -> Option<String> {
        self.data.read().await.current_code.clone()
    }

    /// Remember `code` as the current valid code
    pub async fn set_current_code(&self, code: String) -> StorageResult<()> {
        {
            let mut data = self.data.write().await;
            data.current_code = Some(code);
        }
        self.save().await
    }

    /// The obfuscated device-list blob for `code`
    pub async fn device_blob(&self, code: &str) -> Option<String> {
        self.data.read().await.devices.get(code).cloned()
    }

    /// Store the obfuscated device-list blob for `code`
    pub async fn set_device_blob(&self, code: &str, blob: String) -> StorageResult<()> {
        {
            let mut data = self.data.write().await;
            data.devices.insert(code.to_string(), blob);
        }
        self.save().await
    }

    /// The session token, if a session is active
    pub async fn session_token(&self) -> Option<String> {
        self.session_token.read().await.clone()
    }

    /// Mark a session active
    pub async fn set_session_token(&self, token: String) {
        *self.session_token.write().await = Some(token);
    }

    /// End the session. Durable state, the remembered code included,
    /// is untouched.
    pub async fn clear_session_token(&self) {
        *self.session_token.write().await = None;
    }
}
