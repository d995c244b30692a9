//! Codegate Registry - Device registration and session tracking
//!
//! Implements the access gate's bookkeeping: a stable per-installation
//! device id, a capped device list per access code kept in local storage
//! behind a reversible obfuscation, and the session lifecycle (validation
//! delay, session token, inactivity expiry).
//!
//! None of this is a security boundary: the allow-list, the salt and the
//! encoding all ship with the program. The device cap is best-effort
//! bookkeeping on data the user controls.
//!
//! # Flow
//!
//! 1. The front-end builds a [`DeviceRegistry`] over a [`GateStorage`]
//! 2. On startup, [`DeviceRegistry::check_existing_session`] resumes a
//!    still-active session
//! 3. Otherwise the user submits a code through
//!    [`DeviceRegistry::validate_access_code`], which registers this
//!    device (at most `max_devices` per code) and opens a session
//! 4. An [`InactivityMonitor`] clears the session token after a quiet
//!    period; the remembered code survives for the next attempt
//!
//! # Example
//!
//! ```no_run
//! use codegate_core::GateConfig;
//! use codegate_registry::{DeviceRegistry, GateStorage};
//! use std::sync::Arc;
//!
//! async fn example() {
//!     let storage = Arc::new(GateStorage::open().unwrap());
//!     let registry = DeviceRegistry::new(GateConfig::default(), storage);
//!
//!     let code = "Q9R1".parse().unwrap();
//!     match registry.validate_access_code(&code).await {
//!         Ok(v) => println!("granted (new device: {})", v.is_new_device),
//!         Err(e) => println!("denied: {}", e),
//!     }
//! }
//! ```

pub mod device;
pub mod obfuscate;
pub mod registry;
pub mod session;
pub mod storage;

pub use device::{hash_string, DeviceId, DeviceRecord, Fingerprint, UA_PREFIX_LEN};
pub use registry::{
    DeviceRegistry, Redirect, Registration, RegistrationInfo, RegistryError, RegistryResult,
    Validation,
};
pub use session::{ActivityHandle, InactivityMonitor, SessionExpiry};
pub use storage::{GateStorage, StorageError, StorageResult};
