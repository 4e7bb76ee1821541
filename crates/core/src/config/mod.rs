use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PosterError, Result};

/// Configuration applied to an audio analysis session.
///
/// The config is immutable once applied; applying a new one through
/// `AudioAnalyzer::set_config` or `PosterManager::setup` starts a fresh load
/// cycle for the referenced audio resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Opaque locator for the audio resource, resolved by the audio loader.
    pub audio_url: String,
    /// Number of visual bars the spectrum is reduced to. Must be at least 1.
    pub bar_count: usize,
    /// Whether playback wraps around at the end of the buffer.
    #[serde(default)]
    pub loop_playback: bool,
}

impl AnalysisConfig {
    pub fn new(audio_url: impl Into<String>, bar_count: usize) -> Self {
        Self {
            audio_url: audio_url.into(),
            bar_count,
            loop_playback: false,
        }
    }

    pub fn with_loop(mut self, loop_playback: bool) -> Self {
        self.loop_playback = loop_playback;
        self
    }

    /// Checks the config against the accepted domain.
    pub fn validate(&self) -> Result<()> {
        if self.bar_count == 0 {
            return Err(PosterError::InvalidInput("bar_count must be at least 1"));
        }
        Ok(())
    }

    /// Reads and validates a config from a JSON file.
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }
}
