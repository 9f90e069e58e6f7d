//! Catalog source boundary
//!
//! Catalogs (bundled manifests, remote metadata services) are consumed by the
//! orchestration layer to build queues. The playback engine never talks to a
//! catalog directly.

use crate::error::{CoreError, Result};
use crate::track::Track;
use async_trait::async_trait;

/// Provider of track metadata
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the catalog's default listing
    async fn fetch(&self) -> Result<Vec<Track>>;

    /// Search the catalog
    async fn search(&self, query: &str) -> Result<Vec<Track>>;

    /// Look up a single track by id
    ///
    /// # Errors
    /// Returns `CoreError::NotFound` if the catalog has no such track
    async fn details(&self, id: &str) -> Result<Track>;
}

/// In-memory catalog over a fixed track list
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    tracks: Vec<Track>,
}

impl StaticCatalog {
    pub fn new(tracks: Vec<Track>) -> Self {
        Self { tracks }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.clone())
    }

    async fn search(&self, query: &str) -> Result<Vec<Track>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(CoreError::invalid_input("empty search query"));
        }

        Ok(self
            .tracks
            .iter()
            .filter(|track| track.matches(query))
            .cloned()
            .collect())
    }

    async fn details(&self, id: &str) -> Result<Track> {
        self.tracks
            .iter()
            .find(|track| track.id() == id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Track", id))
    }
}
