/// Track domain type
use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

/// Where a track's audio comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Audio file bundled with the application
    Local,

    /// First remote catalog
    CatalogA,

    /// Second remote catalog
    CatalogB,
}

impl SourceKind {
    /// Whether tracks of this kind live on a remote catalog
    pub fn is_remote(self) -> bool {
        !matches!(self, SourceKind::Local)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::Local => "local",
            SourceKind::CatalogA => "catalog-a",
            SourceKind::CatalogB => "catalog-b",
        };
        f.write_str(name)
    }
}

/// Immutable descriptor of one playable item
///
/// Equality and hashing use `id` only: two tracks with the same id are the
/// same queue entry even when their metadata differs.
///
/// Serialized through [`TrackRecord`], so the duration reads as
/// `duration_secs` and deserialized tracks obey the same local reference
/// rule as the constructors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TrackRecord", into = "TrackRecord")]
pub struct Track {
    id: String,
    title: String,
    artist: String,
    album: String,
    /// A-priori duration; the loaded resource may report a different one
    duration: Duration,
    artwork: Option<String>,
    source_kind: SourceKind,
    source_id: String,
    /// Present only for `SourceKind::Local`
    local_reference: Option<String>,
}

impl Track {
    /// Create a track backed by a bundled audio file
    pub fn local(
        id: impl Into<String>,
        title: impl Into<String>,
        local_reference: impl Into<String>,
    ) -> Self {
        let id = id.into();
        Self {
            source_id: id.clone(),
            id,
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            duration: Duration::ZERO,
            artwork: None,
            source_kind: SourceKind::Local,
            local_reference: Some(local_reference.into()),
        }
    }

    /// Create a track that lives on a remote catalog
    ///
    /// Remote tracks never carry a local reference. Passing
    /// `SourceKind::Local` yields a local track without a file, which no
    /// resolver can play.
    pub fn remote(
        kind: SourceKind,
        id: impl Into<String>,
        title: impl Into<String>,
        source_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: String::new(),
            album: String::new(),
            duration: Duration::ZERO,
            artwork: None,
            source_kind: kind,
            source_id: source_id.into(),
            local_reference: None,
        }
    }

    #[must_use]
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = artist.into();
        self
    }

    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = album.into();
        self
    }

    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub fn with_artwork(mut self, artwork: impl Into<String>) -> Self {
        self.artwork = Some(artwork.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn album(&self) -> &str {
        &self.album
    }

    /// Estimated duration from catalog metadata
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn artwork(&self) -> Option<&str> {
        self.artwork.as_deref()
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source_kind
    }

    /// Identifier of the track inside its source catalog
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn local_reference(&self) -> Option<&str> {
        self.local_reference.as_deref()
    }

    /// Case-insensitive substring match used by catalog search
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        [&self.title, &self.artist, &self.album]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle))
    }
}

/// Wire form of [`Track`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub album: String,
    #[serde(default)]
    pub duration_secs: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,
    pub source_kind: SourceKind,
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_reference: Option<String>,
}

impl From<Track> for TrackRecord {
    fn from(track: Track) -> Self {
        Self {
            duration_secs: track.duration.as_secs_f64(),
            id: track.id,
            title: track.title,
            artist: track.artist,
            album: track.album,
            artwork: track.artwork,
            source_kind: track.source_kind,
            source_id: track.source_id,
            local_reference: track.local_reference,
        }
    }
}

impl TryFrom<TrackRecord> for Track {
    type Error = CoreError;

    fn try_from(record: TrackRecord) -> Result<Self, Self::Error> {
        match (record.source_kind, &record.local_reference) {
            (SourceKind::Local, None) => {
                return Err(CoreError::invalid_input(format!(
                    "local track {} has no local_reference",
                    record.id
                )));
            }
            (kind, Some(_)) if kind.is_remote() => {
                return Err(CoreError::invalid_input(format!(
                    "{kind} track {} cannot carry a local_reference",
                    record.id
                )));
            }
            _ => {}
        }

        let duration = Duration::try_from_secs_f64(record.duration_secs).map_err(|_| {
            CoreError::invalid_input(format!(
                "track {} has invalid duration_secs {}",
                record.id, record.duration_secs
            ))
        })?;

        Ok(Self {
            id: record.id,
            title: record.title,
            artist: record.artist,
            album: record.album,
            duration,
            artwork: record.artwork,
            source_kind: record.source_kind,
            source_id: record.source_id,
            local_reference: record.local_reference,
        })
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Track {}

impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_track_carries_reference() {
        let track = Track::local("t1", "Song", "songs/t1")
            .with_artist("Artist")
            .with_album("Album")
            .with_duration(Duration::from_secs(180));

        assert_eq!(track.source_kind(), SourceKind::Local);
        assert_eq!(track.local_reference(), Some("songs/t1"));
        assert_eq!(track.source_id(), "t1");
        assert_eq!(track.duration(), Duration::from_secs(180));
        assert!(track.artwork().is_none());
    }

    #[test]
    fn remote_track_has_no_local_reference() {
        let track = Track::remote(SourceKind::CatalogA, "a-42", "Remote", "42")
            .with_artwork("https://img.example/42.jpg");

        assert!(track.source_kind().is_remote());
        assert!(track.local_reference().is_none());
        assert_eq!(track.source_id(), "42");
        assert_eq!(track.artwork(), Some("https://img.example/42.jpg"));
    }

    #[test]
    fn equality_is_identity_based() {
        let a = Track::local("same", "First Title", "a");
        let b = Track::local("same", "Other Title", "b").with_artist("Someone");
        let c = Track::local("other", "First Title", "a");

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn search_matching_is_case_insensitive() {
        let track = Track::local("1", "Blue Monday", "x").with_artist("New Order");

        assert!(track.matches("monday"));
        assert!(track.matches("NEW ORDER"));
        assert!(!track.matches("joy division"));
    }

    #[test]
    fn json_duration_is_in_seconds() {
        let track =
            Track::local("t1", "Song", "songs/t1").with_duration(Duration::from_millis(2500));

        let json = serde_json::to_value(&track).unwrap();
        assert_eq!(json["duration_secs"], serde_json::json!(2.5));
        assert_eq!(json["source_kind"], "local");
        assert!(json.get("duration").is_none());

        let back: Track = serde_json::from_value(json).unwrap();
        assert_eq!(back.duration(), Duration::from_millis(2500));
        assert_eq!(back.local_reference(), Some("songs/t1"));
    }

    #[test]
    fn remote_json_with_local_reference_is_rejected() {
        let json = serde_json::json!({
            "id": "a-1",
            "title": "Remote",
            "source_kind": "catalog_a",
            "source_id": "1",
            "local_reference": "audio/a-1",
        });

        let err = serde_json::from_value::<Track>(json).unwrap_err();
        assert!(err.to_string().contains("cannot carry a local_reference"));
    }

    #[test]
    fn local_json_without_reference_is_rejected() {
        let json = serde_json::json!({
            "id": "l-1",
            "title": "Local",
            "source_kind": "local",
            "source_id": "l-1",
        });

        let err = serde_json::from_value::<Track>(json).unwrap_err();
        assert!(err.to_string().contains("has no local_reference"));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = serde_json::json!({
            "id": "l-1",
            "title": "Local",
            "duration_secs": -3.0,
            "source_kind": "local",
            "source_id": "l-1",
            "local_reference": "audio/l-1",
        });

        assert!(serde_json::from_value::<Track>(json).is_err());
    }

    #[test]
    fn source_kind_display() {
        assert_eq!(SourceKind::Local.to_string(), "local");
        assert_eq!(SourceKind::CatalogB.to_string(), "catalog-b");
    }
}
