//! `matchpoint-core` — shared configuration, constants and the core error type.
//!
//! Every other matchpoint crate depends on this one; it holds nothing but the
//! config surface (`matchpoint.toml` + `MATCHPOINT_*` env overrides) and the
//! limits the rest of the engine enforces.

pub mod config;
pub mod error;

pub use config::MatchpointConfig;
pub use error::{CoreError, Result};
