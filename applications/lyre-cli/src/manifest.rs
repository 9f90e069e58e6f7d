//! Bundle manifest
//!
//! TOML listing of the tracks shipped with a bundle:
//!
//! ```toml
//! [[tracks]]
//! id = "intro"
//! title = "Intro"
//! artist = "The Band"
//! duration_secs = 95
//! file = "audio/intro"
//!
//! [[tracks]]
//! id = "live-01"
//! title = "Live Session"
//! source = "catalog_a"
//! source_id = "88213"
//! ```
//!
//! Entries with a `file` are local and need a positive `duration_secs`; the
//! rest name a remote catalog.

use crate::error::{CliError, Result};
use lyre_core::{SourceKind, StaticCatalog, Track};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    tracks: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    title: String,
    artist: Option<String>,
    album: Option<String>,
    duration_secs: Option<f64>,
    artwork: Option<String>,
    file: Option<String>,
    source: Option<SourceKind>,
    source_id: Option<String>,
}

impl ManifestEntry {
    fn into_track(self) -> Result<Track> {
        let duration = match self.duration_secs {
            Some(secs) => Some(Duration::try_from_secs_f64(secs).map_err(|_| {
                CliError::Manifest(format!(
                    "track '{}' has invalid duration_secs {}",
                    self.id, secs
                ))
            })?),
            None => None,
        };

        let mut track = match (self.file, self.source) {
            (Some(file), None | Some(SourceKind::Local)) => {
                // Local files are timed by their length; a zero length never completes
                if !matches!(duration, Some(d) if !d.is_zero()) {
                    return Err(CliError::Manifest(format!(
                        "local track '{}' needs a positive duration_secs",
                        self.id
                    )));
                }
                Track::local(self.id, self.title, file)
            }
            (None, Some(kind)) if kind.is_remote() => {
                let source_id = self.source_id.ok_or_else(|| {
                    CliError::Manifest(format!("track '{}' is missing source_id", self.id))
                })?;
                Track::remote(kind, self.id, self.title, source_id)
            }
            _ => {
                return Err(CliError::Manifest(format!(
                    "track '{}' needs either a file or a remote source",
                    self.id
                )))
            }
        };

        if let Some(artist) = self.artist {
            track = track.with_artist(artist);
        }
        if let Some(album) = self.album {
            track = track.with_album(album);
        }
        if let Some(artwork) = self.artwork {
            track = track.with_artwork(artwork);
        }
        if let Some(duration) = duration {
            track = track.with_duration(duration);
        }

        Ok(track)
    }
}

/// Parse manifest text into tracks, rejecting duplicate ids
pub fn parse(text: &str) -> Result<Vec<Track>> {
    let manifest: Manifest = toml::from_str(text)?;

    let mut seen = HashSet::new();
    let mut tracks = Vec::with_capacity(manifest.tracks.len());
    for entry in manifest.tracks {
        if !seen.insert(entry.id.clone()) {
            return Err(CliError::Manifest(format!("duplicate track id '{}'", entry.id)));
        }
        tracks.push(entry.into_track()?);
    }

    Ok(tracks)
}

/// Read the manifest at `path` into a catalog
pub fn load_catalog(path: &Path) -> Result<StaticCatalog> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        CliError::Manifest(format!("cannot read {}: {}", path.display(), e))
    })?;
    let tracks = parse(&text)?;

    tracing::debug!(path = %path.display(), tracks = tracks.len(), "Loaded bundle manifest");
    Ok(StaticCatalog::new(tracks))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyre_core::CatalogSource;

    const MANIFEST: &str = r#"
[[tracks]]
id = "intro"
title = "Intro"
artist = "The Band"
album = "First"
duration_secs = 95
file = "audio/intro"

[[tracks]]
id = "live"
title = "Live Session"
source = "catalog_a"
source_id = "88213"
"#;

    #[test]
    fn parses_local_and_remote_entries() {
        let tracks = parse(MANIFEST).unwrap();

        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].source_kind(), SourceKind::Local);
        assert_eq!(tracks[0].local_reference(), Some("audio/intro"));
        assert_eq!(tracks[0].artist(), "The Band");
        assert_eq!(tracks[0].duration(), Duration::from_secs(95));

        assert_eq!(tracks[1].source_kind(), SourceKind::CatalogA);
        assert_eq!(tracks[1].source_id(), "88213");
        assert_eq!(tracks[1].local_reference(), None);
    }

    #[test]
    fn rejects_entry_without_source() {
        let err = parse("[[tracks]]\nid = \"x\"\ntitle = \"X\"\n").unwrap_err();
        assert!(err.to_string().contains("either a file or a remote source"));
    }

    #[test]
    fn rejects_remote_without_source_id() {
        let err = parse("[[tracks]]\nid = \"x\"\ntitle = \"X\"\nsource = \"catalog_b\"\n").unwrap_err();
        assert!(err.to_string().contains("source_id"));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let text = "[[tracks]]\nid = \"a\"\ntitle = \"A\"\nduration_secs = 3\nfile = \"a\"\n\n[[tracks]]\nid = \"a\"\ntitle = \"B\"\nduration_secs = 3\nfile = \"b\"\n";
        let err = parse(text).unwrap_err();
        assert!(err.to_string().contains("duplicate track id 'a'"));
    }

    #[test]
    fn local_entry_requires_duration() {
        let err = parse("[[tracks]]\nid = \"x\"\ntitle = \"X\"\nfile = \"x\"\n").unwrap_err();
        assert!(err.to_string().contains("positive duration_secs"));

        let err = parse("[[tracks]]\nid = \"x\"\ntitle = \"X\"\nduration_secs = 0\nfile = \"x\"\n")
            .unwrap_err();
        assert!(err.to_string().contains("positive duration_secs"));
    }

    #[test]
    fn rejects_negative_duration() {
        let text = "[[tracks]]\nid = \"x\"\ntitle = \"X\"\nduration_secs = -4\nfile = \"x\"\n";
        let err = parse(text).unwrap_err();
        assert!(err.to_string().contains("invalid duration_secs"));
    }

    #[test]
    fn remote_entry_may_omit_duration() {
        let text = "[[tracks]]\nid = \"r\"\ntitle = \"R\"\nsource = \"catalog_b\"\nsource_id = \"9\"\n";
        let tracks = parse(text).unwrap();
        assert_eq!(tracks[0].duration(), Duration::ZERO);
    }

    #[test]
    fn empty_manifest_is_empty_catalog() {
        assert!(parse("").unwrap().is_empty());
    }

    #[tokio::test]
    async fn catalog_from_file_is_searchable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.toml");
        std::fs::write(&path, MANIFEST).unwrap();

        let catalog = load_catalog(&path).unwrap();

        let found = catalog.search("band").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), "intro");
    }
}
