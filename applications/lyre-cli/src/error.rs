/// CLI error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Invalid command: {0}")]
    Command(String),

    #[error("Catalog error: {0}")]
    Catalog(#[from] lyre_core::CoreError),

    #[error("Playback error: {0}")]
    Playback(#[from] lyre_playback::PlaybackError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<config::ConfigError> for CliError {
    fn from(err: config::ConfigError) -> Self {
        CliError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for CliError {
    fn from(err: toml::de::Error) -> Self {
        CliError::Manifest(err.to_string())
    }
}
