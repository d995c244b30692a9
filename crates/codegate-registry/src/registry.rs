//! The device registry
//!
//! Admission control for access codes: each code admits at most
//! [`GateConfig::max_devices`] distinct device identifiers, ever. The
//! check runs entirely against local storage; there is no server
//! cross-check and nothing here is a security boundary.

use crate::device::{hash_string, DeviceId, DeviceRecord, Fingerprint};
use crate::obfuscate;
use crate::storage::{GateStorage, StorageError};
use chrono::Utc;
use codegate_core::{AccessCode, AllowList, GateConfig};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Registry errors. Display strings are the exact messages the front-end
/// shows the user.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Código no válido")]
    InvalidCode,
    #[error("Límite de dispositivos alcanzado")]
    DeviceLimitReached,
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// Outcome of registering the current device against a code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    /// `false` when this device was already on the code's list
    pub is_new: bool,
}

/// Outcome of a successful code validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validation {
    /// Whether this validation registered the device for the first time
    pub is_new_device: bool,
}

/// Where to send the user, and after how long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub url: String,
    pub delay: Duration,
}

/// Read-side summary of a code's device usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrationInfo {
    /// Whether the current device is on the code's list
    pub is_registered: bool,
    /// How many devices the code has
    pub registered_devices: usize,
    /// The cap
    pub max_devices: usize,
    /// Remaining slots, never negative
    pub available_slots: usize,
}

/// Validates access codes and tracks device registrations per code.
///
/// Owns its storage reference; all durable and session state goes through
/// [`GateStorage`], so tests run against an in-memory instance.
pub struct DeviceRegistry {
    config: GateConfig,
    allow_list: AllowList,
    storage: Arc<GateStorage>,
    fingerprint: Fingerprint,
}

impl DeviceRegistry {
    /// Create a registry over `storage`, fingerprinting the current
    /// environment
    pub fn new(config: GateConfig, storage: Arc<GateStorage>) -> Self {
        Self::with_fingerprint(config, storage, Fingerprint::collect())
    }

    /// Create a registry with an explicit fingerprint (tests, or callers
    /// that probe the environment themselves)
    pub fn with_fingerprint(
        config: GateConfig,
        storage: Arc<GateStorage>,
        fingerprint: Fingerprint,
    ) -> Self {
        Self {
            config,
            allow_list: AllowList::new(),
            storage,
            fingerprint,
        }
    }

    /// The gate configuration
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// The current device's id: read back if previously generated,
    /// otherwise derived from the fingerprint and persisted. Idempotent;
    /// once stored the id never changes.
    pub async fn device_id(&self) -> RegistryResult<DeviceId> {
        if let Some(stored) = self.storage.device_id().await {
            return Ok(DeviceId::from_stored(stored));
        }

        let id = DeviceId::derive(&self.fingerprint, &self.config.salt);
        self.storage.set_device_id(id.to_string()).await?;
        info!("Generated device id {}", id);
        Ok(id)
    }

    /// The devices registered against `code`. Absent or undecodable blobs
    /// yield an empty list; decode failures are logged and absorbed, never
    /// surfaced to the caller.
    pub async fn registered_devices(&self, code: &AccessCode) -> Vec<DeviceRecord> {
        let Some(blob) = self.storage.device_blob(code.as_str()).await else {
            return Vec::new();
        };
        let Some(json) = obfuscate::decode(&blob, &self.config.salt) else {
            return Vec::new();
        };
        match serde_json::from_str(&json) {
            Ok(devices) => devices,
            Err(e) => {
                warn!("Failed to parse device list for {}: {}", code, e);
                Vec::new()
            }
        }
    }

    /// Register the current device against `code`.
    ///
    /// Re-registering a device already on the list succeeds without
    /// growing it. A code at capacity rejects every device not already on
    /// its list; nothing is ever evicted to make room.
    pub async fn register_device(&self, code: &AccessCode) -> RegistryResult<Registration> {
        let device_id = self.device_id().await?;
        let mut devices = self.registered_devices(code).await;

        if devices.iter().any(|dev| dev.id == device_id) {
            return Ok(Registration { is_new: false });
        }

        if devices.len() >= self.config.max_devices {
            warn!("Device limit reached for code {}", code);
            return Err(RegistryError::DeviceLimitReached);
        }

        devices.push(DeviceRecord::new(device_id, self.fingerprint.ua_prefix()));

        let json = serde_json::to_string(&devices).map_err(StorageError::from)?;
        let blob = obfuscate::encode(&json, &self.config.salt);
        self.storage.set_device_blob(code.as_str(), blob).await?;

        info!(
            "Registered new device for code {} ({}/{})",
            code,
            devices.len(),
            self.config.max_devices
        );
        Ok(Registration { is_new: true })
    }

    /// Validate `code` and, on success, open a session.
    ///
    /// Every attempt pays the fixed validation delay first, valid or not.
    /// A code outside the allow-list fails with [`RegistryError::InvalidCode`];
    /// a full code fails with [`RegistryError::DeviceLimitReached`]. On
    /// success the code is remembered durably and a fresh session token is
    /// minted from the current time.
    pub async fn validate_access_code(&self, code: &AccessCode) -> RegistryResult<Validation> {
        tokio::time::sleep(self.config.validation_delay).await;

        if !self.allow_list.contains(code) {
            return Err(RegistryError::InvalidCode);
        }

        let registration = self.register_device(code).await?;

        self.storage.set_current_code(code.to_string()).await?;
        let token = mint_session_token();
        self.storage.set_session_token(token).await;

        info!("Access granted for code {}", code);
        Ok(Validation {
            is_new_device: registration.is_new,
        })
    }

    /// Resume an existing session if one is active.
    ///
    /// Requires all three of: a remembered code, a live session token, and
    /// this device on the remembered code's list. Returns the redirect to
    /// schedule, or `None` when the user must (re-)validate.
    pub async fn check_existing_session(&self) -> RegistryResult<Option<Redirect>> {
        let Some(saved) = self.storage.current_code().await else {
            return Ok(None);
        };
        if self.storage.session_token().await.is_none() {
            return Ok(None);
        }
        let Ok(code) = saved.parse::<AccessCode>() else {
            warn!("Remembered code {:?} is malformed, ignoring", saved);
            return Ok(None);
        };

        let device_id = self.device_id().await?;
        let devices = self.registered_devices(&code).await;
        if devices.iter().any(|dev| dev.id == device_id) {
            Ok(Some(Redirect {
                url: self.config.destination_url.clone(),
                delay: self.config.resume_redirect_delay,
            }))
        } else {
            Ok(None)
        }
    }

    /// Usage summary for `code`: membership of the current device plus
    /// remaining capacity, floored at zero.
    pub async fn registration_info(&self, code: &AccessCode) -> RegistryResult<RegistrationInfo> {
        let devices = self.registered_devices(code).await;
        let device_id = self.device_id().await?;

        Ok(RegistrationInfo {
            is_registered: devices.iter().any(|dev| dev.id == device_id),
            registered_devices: devices.len(),
            max_devices: self.config.max_devices,
            available_slots: self.config.max_devices.saturating_sub(devices.len()),
        })
    }
}

/// Mint a session token: hash of the current time in milliseconds
fn mint_session_token() -> String {
    hash_string(&Utc::now().timestamp_millis().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_fingerprint(tag: &str) -> Fingerprint {
        Fingerprint {
            user_agent: Some(format!("test agent {tag}")),
            hardware_concurrency: Some(4),
            screen_width: Some(1920),
            screen_height: Some(1080),
            device_memory: Some(8),
        }
    }

    fn test_config() -> GateConfig {
        GateConfig::default().with_validation_delay(Duration::from_millis(0))
    }

    fn registry_on(storage: Arc<GateStorage>, tag: &str) -> DeviceRegistry {
        DeviceRegistry::with_fingerprint(test_config(), storage, test_fingerprint(tag))
    }

    fn code(s: &str) -> AccessCode {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_device_id_is_idempotent() {
        let storage = Arc::new(GateStorage::in_memory());
        let registry = registry_on(storage, "a");

        let first = registry.device_id().await.unwrap();
        let second = registry.device_id().await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_first_registration_succeeds() {
        let storage = Arc::new(GateStorage::in_memory());
        let registry = registry_on(storage, "a");

        let reg = registry.register_device(&code("Q9R1")).await.unwrap();
        assert!(reg.is_new);

        let devices = registry.registered_devices(&code("Q9R1")).await;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id, registry.device_id().await.unwrap());
    }

    #[tokio::test]
    async fn test_reregistration_is_idempotent() {
        let storage = Arc::new(GateStorage::in_memory());
        let registry = registry_on(storage, "a");

        assert!(registry.register_device(&code("Q9R1")).await.unwrap().is_new);
        let again = registry.register_device(&code("Q9R1")).await.unwrap();
        assert!(!again.is_new);
        assert_eq!(registry.registered_devices(&code("Q9R1")).await.len(), 1);
    }

    #[tokio::test]
    async fn test_fourth_device_is_rejected() {
        // One shared device list; distinct devices simulated by rewriting
        // the stored device id between registrations.
        let storage = Arc::new(GateStorage::in_memory());
        let registry = registry_on(storage.clone(), "a");

        for (i, dev) in ["dev-a", "dev-b", "dev-c"].iter().enumerate() {
            storage.set_device_id(dev.to_string()).await.unwrap();
            assert!(registry.register_device(&code("Q9R1")).await.unwrap().is_new);
            assert_eq!(registry.registered_devices(&code("Q9R1")).await.len(), i + 1);
        }

        storage.set_device_id("dev-d".to_string()).await.unwrap();
        let result = registry.register_device(&code("Q9R1")).await;
        assert!(matches!(result, Err(RegistryError::DeviceLimitReached)));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Límite de dispositivos alcanzado"
        );
        assert_eq!(registry.registered_devices(&code("Q9R1")).await.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_code_is_invalid() {
        let storage = Arc::new(GateStorage::in_memory());
        let registry = registry_on(storage, "a");

        let result = registry.validate_access_code(&code("ZZZZ")).await;
        assert!(matches!(result, Err(RegistryError::InvalidCode)));
        assert_eq!(
            result.unwrap_err().to_string(),
            "Código no válido"
        );
    }

    #[tokio::test]
    async fn test_valid_code_grants_access() {
        let storage = Arc::new(GateStorage::in_memory());
        let registry = registry_on(storage.clone(), "a");

        let validation = registry.validate_access_code(&code("Q9R1")).await.unwrap();
        assert!(validation.is_new_device);

        assert_eq!(storage.current_code().await.as_deref(), Some("Q9R1"));
        assert!(storage.session_token().await.is_some());

        // Second validation on the same device: granted, no longer new
        let again = registry.validate_access_code(&code("Q9R1")).await.unwrap();
        assert!(!again.is_new_device);
    }

    #[tokio::test]
    async fn test_session_resume_needs_token_and_membership() {
        let storage = Arc::new(GateStorage::in_memory());
        let registry = registry_on(storage.clone(), "a");

        // Nothing stored: no session
        assert!(registry.check_existing_session().await.unwrap().is_none());

        registry.validate_access_code(&code("Q9R1")).await.unwrap();
        let redirect = registry.check_existing_session().await.unwrap().unwrap();
        assert_eq!(redirect.url, registry.config().destination_url);

        // Token cleared (inactivity): code alone is not enough
        storage.clear_session_token().await;
        assert!(registry.check_existing_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_registration_info_slot_math() {
        let storage = Arc::new(GateStorage::in_memory());
        let registry = registry_on(storage.clone(), "a");

        let info = registry.registration_info(&code("Q9R1")).await.unwrap();
        assert!(!info.is_registered);
        assert_eq!(info.registered_devices, 0);
        assert_eq!(info.available_slots, 3);

        registry.register_device(&code("Q9R1")).await.unwrap();
        let info = registry.registration_info(&code("Q9R1")).await.unwrap();
        assert!(info.is_registered);
        assert_eq!(info.registered_devices, 1);
        assert_eq!(info.available_slots, 2);
    }

    #[tokio::test]
    async fn test_corrupt_blob_reads_as_empty_list() {
        let storage = Arc::new(GateStorage::in_memory());
        storage
            .set_device_blob("Q9R1", "@@not-base64@@".into())
            .await
            .unwrap();

        let registry = registry_on(storage, "a");
        assert!(registry.registered_devices(&code("Q9R1")).await.is_empty());

        // And a fresh registration over the corrupt blob still works
        assert!(registry.register_device(&code("Q9R1")).await.unwrap().is_new);
    }
}
