//! Access codes and the fixed allow-list

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The valid codes, comma-joined. Split at startup; this is reordering,
/// not encryption, and ships with the program.
const CODE_TABLE: &str = "Q9R1,O4G9,N3F8,M2E7,L1D6,K0C5,J9B4,I8A3,H7Z2,G6Y1,\
                          F5X0,E4W9,D3V8,C2U7,B1T6,A0S5,Z9R4,Y8Q3,X7P2,K5M9,J3L7";

/// Number of characters in every access code
pub const CODE_LENGTH: usize = 4;

/// Error returned when a string is not a well-formed access code
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("El código debe tener exactamente 4 caracteres alfanuméricos")]
pub struct CodeParseError;

/// A 4-character uppercase alphanumeric access code
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccessCode(String);

impl AccessCode {
    /// The code as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalize raw user input the way the entry field does: uppercase,
    /// dropping everything that is not A-Z or 0-9. The result may still be
    /// too short or too long to parse as a code.
    pub fn sanitize(raw: &str) -> String {
        raw.chars()
            .flat_map(char::to_uppercase)
            .filter(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
            .collect()
    }
}

impl std::str::FromStr for AccessCode {
    type Err = CodeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == CODE_LENGTH
            && s.chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit());
        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(CodeParseError)
        }
    }
}

impl std::fmt::Display for AccessCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The fixed set of codes the gate accepts
#[derive(Debug, Clone)]
pub struct AllowList {
    codes: Vec<String>,
}

impl Default for AllowList {
    fn default() -> Self {
        Self {
            codes: CODE_TABLE.split(',').map(str::to_string).collect(),
        }
    }
}

impl AllowList {
    /// Build the shipped allow-list
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `code` is one of the valid codes (exact match)
    pub fn contains(&self, code: &AccessCode) -> bool {
        self.codes.iter().any(|c| c == code.as_str())
    }

    /// Number of codes in the list
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the list is empty (never true for the shipped list)
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}
