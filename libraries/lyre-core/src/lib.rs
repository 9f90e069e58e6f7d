//! Lyre Core
//!
//! Platform-agnostic core types, traits, and error handling for Lyre.
//!
//! This crate provides the building blocks shared by the playback engine and
//! the applications that drive it.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `SourceKind`
//! - **Core Traits**: `CatalogSource` (remote or local metadata providers)
//! - **Error Handling**: Unified `CoreError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use lyre_core::{SourceKind, Track};
//! use std::time::Duration;
//!
//! let track = Track::local("intro", "Intro", "audio/intro")
//!     .with_artist("The Band")
//!     .with_duration(Duration::from_secs(95));
//!
//! assert_eq!(track.source_kind(), SourceKind::Local);
//! assert_eq!(track.local_reference(), Some("audio/intro"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod catalog;
pub mod error;
pub mod track;

// Re-export commonly used types
pub use catalog::{CatalogSource, StaticCatalog};
pub use error::{CoreError, Result};
pub use track::{SourceKind, Track, TrackRecord};
