//! Reversible obfuscation for stored device lists
//!
//! Append the salt, base64-encode the UTF-8 bytes; decode reverses the
//! steps. The salt and the scheme ship with the program, so this hides
//! nothing from a determined reader. It is obfuscation, not encryption,
//! and must never be relied on for confidentiality.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tracing::warn;

/// Obfuscate `plain` by appending `salt` and base64-encoding
pub fn encode(plain: &str, salt: &str) -> String {
    let salted = format!("{plain}{salt}");
    BASE64.encode(salted.as_bytes())
}

/// Reverse [`encode`]. Removes the first occurrence of the salt from the
/// decoded text, not specifically the trailing one — inherited behavior: a
/// plaintext that itself contains the salt comes back corrupted. Returns
/// `None` on malformed base64 or non-UTF-8 content; callers treat that as
/// an empty payload.
pub fn decode(blob: &str, salt: &str) -> Option<String> {
    let bytes = match BASE64.decode(blob) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Failed to decode stored blob: {}", e);
            return None;
        }
    };
    match String::from_utf8(bytes) {
        Ok(decoded) => Some(decoded.replacen(salt, "", 1)),
        Err(e) => {
            warn!("Stored blob is not valid UTF-8: {}", e);
            None
        }
    }
}
