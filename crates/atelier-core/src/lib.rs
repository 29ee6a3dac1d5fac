//! # atelier-core
//!
//! Shared plumbing for the Atelier workspace:
//!
//! - **Configuration**: JSON5 config file with provider settings and generation defaults
//! - **Environment**: variable lookup that can be swapped for a fixed set in tests
//! - **Secrets**: credential strings that never print

pub mod config;
pub mod env;
pub mod error;
pub mod paths;
pub mod secret;

pub use config::Config;
pub use env::Environment;
pub use error::{Error, Result};
pub use secret::SecretString;
