//! Device identity
//!
//! A device identifier is derived from a fingerprint of the local
//! environment, hashed with a short rolling hash, and suffixed with its
//! creation time in base-36. Once generated it is persisted and never
//! changes for the life of the storage entry.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Maximum number of platform-string characters kept in a device record
pub const UA_PREFIX_LEN: usize = 50;

/// Identifier for one device, stable across sessions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    /// Derive a fresh id from a fingerprint: rolling hash of the joined
    /// inputs, then `-` and the current time in milliseconds, base-36.
    pub fn derive(fingerprint: &Fingerprint, salt: &str) -> Self {
        Self::derive_at(fingerprint, salt, Utc::now().timestamp_millis())
    }

    /// Derive with an explicit creation time (tests)
    pub fn derive_at(fingerprint: &Fingerprint, salt: &str, now_ms: i64) -> Self {
        let hash = hash_string(&fingerprint.join(salt));
        Self(format!("{}-{}", hash, to_base36(now_ms.max(0) as u64)))
    }

    /// Wrap an id previously read back from storage
    pub fn from_stored(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Environment traits a device id is derived from.
///
/// Every field is optional; whatever is unavailable on this platform is
/// simply left out of the joined string before hashing. Two machines with
/// identical fingerprints get identical hash prefixes and are told apart
/// only by the creation-time suffix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fingerprint {
    /// Platform description, the closest local analogue of a user agent
    pub user_agent: Option<String>,
    /// Number of hardware threads
    pub hardware_concurrency: Option<usize>,
    /// Primary screen width in pixels
    pub screen_width: Option<u32>,
    /// Primary screen height in pixels
    pub screen_height: Option<u32>,
    /// Installed memory in gigabytes
    pub device_memory: Option<u32>,
}

impl Fingerprint {
    /// Collect what the current environment exposes. Screen dimensions and
    /// memory size are not probed here; they stay absent.
    pub fn collect() -> Self {
        Self {
            user_agent: Some(format!(
                "{} {} ({})",
                std::env::consts::OS,
                std::env::consts::ARCH,
                std::env::consts::FAMILY
            )),
            hardware_concurrency: std::thread::available_parallelism()
                .ok()
                .map(|n| n.get()),
            screen_width: None,
            screen_height: None,
            device_memory: None,
        }
    }

    /// The platform string truncated for storage in a device record
    pub fn ua_prefix(&self) -> String {
        let ua = self.user_agent.as_deref().unwrap_or("");
        ua.chars().take(UA_PREFIX_LEN).collect()
    }

    /// Join the available inputs plus the salt with `|`
    fn join(&self, salt: &str) -> String {
        let mut parts: Vec<String> = Vec::new();
        if let Some(ua) = &self.user_agent {
            parts.push(ua.clone());
        }
        if let Some(n) = self.hardware_concurrency {
            parts.push(n.to_string());
        }
        if let Some(w) = self.screen_width {
            parts.push(w.to_string());
        }
        if let Some(h) = self.screen_height {
            parts.push(h.to_string());
        }
        if let Some(m) = self.device_memory {
            parts.push(m.to_string());
        }
        parts.push(salt.to_string());
        parts.join("|")
    }
}

/// One registered device, as stored in a code's device list.
/// Records are append-only: never mutated, never individually deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// The device identifier
    pub id: DeviceId,
    /// Registration time in milliseconds since the epoch
    pub timestamp: i64,
    /// First characters of the platform string, for display
    #[serde(rename = "ua")]
    pub ua_prefix: String,
}

impl DeviceRecord {
    /// Create a record for a device registering now
    pub fn new(id: DeviceId, ua_prefix: String) -> Self {
        Self {
            id,
            timestamp: Utc::now().timestamp_millis(),
            ua_prefix,
        }
    }
}

/// Rolling 32-bit hash over the UTF-16 units of `s`: start at 5381, then
/// multiply by 33 and XOR each unit, wrapping. Deterministic and
/// order-sensitive but not collision-resistant; used only to produce short
/// stable identifiers, never for integrity.
pub fn hash_string(s: &str) -> String {
    let mut hash: u32 = 5381;
    for unit in s.encode_utf16() {
        hash = hash.wrapping_mul(33) ^ u32::from(unit);
    }
    to_base36(u64::from(hash))
}

/// Render `n` in lowercase base-36
fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}
