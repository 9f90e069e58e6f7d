//! Lyre command-line player
//!
//! Loads a bundle manifest into a catalog and drives a player over it from
//! an interactive shell.

pub mod activator;
pub mod config;
pub mod error;
pub mod manifest;
pub mod shell;

pub use error::{CliError, Result};
