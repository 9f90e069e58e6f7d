/// Headless audio session activation
use lyre_playback::{AudioActivator, Result};

/// Activator for hosts without a platform audio session
///
/// Activation always succeeds and is only logged.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogActivator;

impl AudioActivator for LogActivator {
    fn activate(&self) -> Result<()> {
        tracing::info!("Audio session activated for background playback");
        Ok(())
    }
}
