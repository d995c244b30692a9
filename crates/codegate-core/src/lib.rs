//! Codegate Core - Shared types for the access gate
//!
//! This crate provides the configuration, access-code and allow-list types
//! used by the registry and the front-end binary.

pub mod code;
pub mod config;

pub use code::{AccessCode, AllowList, CodeParseError};
pub use config::GateConfig;
