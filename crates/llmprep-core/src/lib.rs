//! Core types and configuration for llmprep.
//!
//! This crate provides the foundational pieces shared by the other crates:
//!
//! - Experiment configuration, loadable from YAML
//! - Error handling infrastructure
//! - Secure handling of the hub access token

#![warn(missing_docs)]

mod config;
mod error;
mod secrets;

pub use config::*;
pub use error::*;
pub use secrets::SecretString;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{PrepError, Result};
    pub use crate::secrets::SecretString;
}
