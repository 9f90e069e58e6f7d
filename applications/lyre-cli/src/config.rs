/// Application configuration
use crate::error::{CliError, Result};
use lyre_playback::{PlaybackConfig, DEFAULT_EXTENSIONS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file read when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "lyre.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub bundle: BundleSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BundleSettings {
    /// Directory holding the bundled audio files
    #[serde(default = "default_bundle_root")]
    pub root: PathBuf,

    /// Track manifest, relative to `root` unless absolute
    #[serde(default = "default_manifest")]
    pub manifest: PathBuf,

    /// Extensions tried for file references without one
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directives; `RUST_LOG` takes precedence
    #[serde(default = "default_filter")]
    pub filter: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// An explicit `path` must exist; the default `lyre.toml` is optional.
    /// Environment variables override the file, e.g.
    /// `LYRE__PLAYBACK__AUTO_ADVANCE=false` or `LYRE__BUNDLE__ROOT=/srv/audio`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("LYRE")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.playback.progress_interval_ms == 0 {
            return Err(CliError::Config(
                "playback.progress_interval_ms must be greater than zero".to_string(),
            ));
        }

        if !self.bundle.root.is_dir() {
            return Err(CliError::Config(format!(
                "Bundle root {} is not a directory (set LYRE__BUNDLE__ROOT)",
                self.bundle.root.display()
            )));
        }

        Ok(())
    }

    /// Absolute or root-relative location of the track manifest
    pub fn manifest_path(&self) -> PathBuf {
        if self.bundle.manifest.is_absolute() {
            self.bundle.manifest.clone()
        } else {
            self.bundle.root.join(&self.bundle.manifest)
        }
    }
}

// Default values
fn default_bundle_root() -> PathBuf {
    PathBuf::from("./bundle")
}

fn default_manifest() -> PathBuf {
    PathBuf::from("tracks.toml")
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| (*ext).to_string()).collect()
}

fn default_filter() -> String {
    "lyre=info".to_string()
}

impl Default for BundleSettings {
    fn default() -> Self {
        Self {
            root: default_bundle_root(),
            manifest: default_manifest(),
            extensions: default_extensions(),
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}
