use std::fmt;

use crate::{
    bars::{aggregate, AnalysisResult},
    spectrum::{Readiness, SpectrumSource},
    AnalysisConfig, PosterError, Result,
};

/// Facade over a [`SpectrumSource`] and the bar aggregation step.
///
/// `set_config` kicks off the asynchronous load; `start` fails fast with
/// [`PosterError::NotReady`] until the load completes instead of waiting for
/// it. Each `analyze` call pulls a fresh snapshot and reduces it; results are
/// never cached across ticks.
pub struct AudioAnalyzer {
    source: Box<dyn SpectrumSource>,
    config: Option<AnalysisConfig>,
}

impl AudioAnalyzer {
    pub fn new(source: Box<dyn SpectrumSource>) -> Self {
        Self {
            source,
            config: None,
        }
    }

    /// Validates and applies a config, starting a fresh load cycle. Replacing
    /// a config supersedes any load still in flight.
    pub fn set_config(&mut self, config: AnalysisConfig) -> Result<()> {
        config.validate()?;
        self.source.load(&config)?;
        self.config = Some(config);
        Ok(())
    }

    pub fn config(&self) -> Option<&AnalysisConfig> {
        self.config.as_ref()
    }

    pub fn readiness(&self) -> Readiness {
        self.source.readiness()
    }

    pub fn is_ready(&self) -> bool {
        self.source.is_loaded()
    }

    /// Starts audio playback. Fails with [`PosterError::NotConfigured`] before
    /// any config was applied; the source rejects playback with
    /// [`PosterError::NotReady`] until the load finishes and with
    /// [`PosterError::Disposed`] after disposal. A failed start changes
    /// nothing.
    pub fn start(&mut self) -> Result<()> {
        if self.config.is_none() {
            return Err(PosterError::NotConfigured);
        }
        self.source.play(None)
    }

    pub fn stop(&mut self) -> Result<()> {
        self.source.stop()
    }

    /// Reduces the live spectrum snapshot into bars for the configured
    /// `bar_count`.
    pub fn analyze(&mut self) -> Result<AnalysisResult> {
        let bar_count = self
            .config
            .as_ref()
            .ok_or(PosterError::NotConfigured)?
            .bar_count;
        let spectrum = self.source.spectrum_snapshot()?;
        let source = &self.source;
        Ok(aggregate(&spectrum, bar_count, |index| {
            source.frequency_of_bin(index)
        }))
    }

    /// Releases the underlying audio resources. Idempotent.
    pub fn dispose(&mut self) {
        self.source.dispose();
    }
}

impl fmt::Debug for AudioAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioAnalyzer")
            .field("config", &self.config)
            .field("readiness", &self.readiness())
            .finish()
    }
}
