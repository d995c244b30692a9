//! Configuration for the access gate

use std::time::Duration;

/// Main configuration for the gate.
///
/// The defaults carry the values the gate has always shipped with; the
/// builder methods exist so the front-end can override them from flags.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Maximum number of distinct devices that may register against one code
    pub max_devices: usize,
    /// How long a session survives without user activity
    pub inactivity_timeout: Duration,
    /// Fixed delay applied to every validation attempt (anti brute force)
    pub validation_delay: Duration,
    /// Delay before redirecting after a fresh successful validation
    pub grant_redirect_delay: Duration,
    /// Delay before redirecting when resuming an existing session
    pub resume_redirect_delay: Duration,
    /// Salt appended to fingerprints and obfuscated blobs.
    /// Ships with the program; provides no secrecy.
    pub salt: String,
    /// Destination the user is sent to once access is granted
    pub destination_url: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_devices: 3,
            inactivity_timeout: Duration::from_secs(10 * 60),
            validation_delay: Duration::from_millis(800),
            grant_redirect_delay: Duration::from_millis(1500),
            resume_redirect_delay: Duration::from_millis(500),
            salt: "xQ9#pL2$kM5&vR1".to_string(),
            destination_url: "https://luishparedes.github.io/massiel/".to_string(),
        }
    }
}

impl GateConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder pattern: set the per-code device cap
    pub fn with_max_devices(mut self, max_devices: usize) -> Self {
        self.max_devices = max_devices;
        self
    }

    /// Builder pattern: set the inactivity timeout
    pub fn with_inactivity_timeout(mut self, timeout: Duration) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    /// Builder pattern: set the validation delay
    pub fn with_validation_delay(mut self, delay: Duration) -> Self {
        self.validation_delay = delay;
        self
    }

    /// Builder pattern: set the destination URL
    pub fn with_destination_url(mut self, url: impl Into<String>) -> Self {
        self.destination_url = url.into();
        self
    }

    /// Builder pattern: set the salt
    pub fn with_salt(mut self, salt: impl Into<String>) -> Self {
        self.salt = salt.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.max_devices, 3);
        assert_eq!(config.inactivity_timeout, Duration::from_secs(600));
        assert_eq!(config.validation_delay, Duration::from_millis(800));
        assert_eq!(config.salt, "xQ9#pL2$kM5&vR1");
    }

    #[test]
    fn test_builder() {
        let config = GateConfig::new()
            .with_max_devices(5)
            .with_destination_url("https://example.com/");
        assert_eq!(config.max_devices, 5);
        assert_eq!(config.destination_url, "https://example.com/");
    }
}
