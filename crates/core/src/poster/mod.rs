use std::{fmt, time::Instant};

use crate::{
    analyzer::AudioAnalyzer,
    bars::AnalysisResult,
    frame_loop::{FrameLoop, LoopHooks, LoopState},
    spectrum::{Readiness, SpectrumSource},
    AnalysisConfig, PosterError, Result,
};

/// Opaque animation handle driven alongside audio playback. Construction is
/// caller-supplied; pausing keeps the animation's progress.
pub trait Animation {
    fn play(&mut self);
    fn pause(&mut self);
}

/// No-argument factory building the animation for one poster session.
pub type AnimationFactory = Box<dyn FnMut() -> Box<dyn Animation>>;

/// Per-tick notification carrying the fresh analysis result and the live
/// animation handle to the rendering layer.
pub type UpdateCallback = Box<dyn FnMut(&AnalysisResult, &mut dyn Animation)>;

/// Everything one `setup` call applies: the analysis config plus the
/// rendering layer's callbacks.
pub struct PosterConfig {
    pub analysis: AnalysisConfig,
    pub create_animation: AnimationFactory,
    pub on_update: UpdateCallback,
}

/// Keeps spectrum-source readiness, loop state, and the animation handle in
/// one consistent state.
///
/// The manager is an explicitly constructed, owned value; there is no global
/// instance. Play intents are never queued: `play` before the source is ready
/// fails with [`PosterError::NotReady`] and leaves everything untouched, the
/// caller retries after readiness.
pub struct PosterManager {
    frame_loop: FrameLoop<PosterHooks>,
}

struct PosterHooks {
    analyzer: AudioAnalyzer,
    animation: Option<Box<dyn Animation>>,
    config: Option<PosterConfig>,
}

impl LoopHooks for PosterHooks {
    fn on_play(&mut self) -> Result<()> {
        let config = self.config.as_mut().ok_or(PosterError::NotConfigured)?;
        // Audio starts first so a NotReady rejection changes nothing.
        self.analyzer.start()?;
        let animation = self
            .animation
            .get_or_insert_with(|| (config.create_animation)());
        animation.play();
        Ok(())
    }

    fn on_pause(&mut self) -> Result<()> {
        self.analyzer.stop()?;
        if let Some(animation) = self.animation.as_mut() {
            animation.pause();
        }
        Ok(())
    }

    fn on_update(&mut self) -> Result<()> {
        let (Some(config), Some(animation)) = (self.config.as_mut(), self.animation.as_mut())
        else {
            return Ok(());
        };
        let result = self.analyzer.analyze()?;
        (config.on_update)(&result, animation.as_mut());
        Ok(())
    }
}

impl PosterManager {
    pub fn new(source: Box<dyn SpectrumSource>) -> Self {
        Self {
            frame_loop: FrameLoop::new(PosterHooks {
                analyzer: AudioAnalyzer::new(source),
                animation: None,
                config: None,
            }),
        }
    }

    pub fn with_frame_rate(source: Box<dyn SpectrumSource>, frame_rate: u32) -> Result<Self> {
        Ok(Self {
            frame_loop: FrameLoop::with_frame_rate(
                PosterHooks {
                    analyzer: AudioAnalyzer::new(source),
                    animation: None,
                    config: None,
                },
                frame_rate,
            )?,
        })
    }

    /// Applies a config: pauses any current playback, clears the animation
    /// (it is constructed at most once per setup, on the first play), and
    /// starts loading the audio resource. Does not start playback.
    pub fn setup(&mut self, config: PosterConfig) -> Result<()> {
        self.frame_loop.pause()?;
        let hooks = self.frame_loop.hooks_mut();
        hooks.animation = None;
        hooks.analyzer.set_config(config.analysis.clone())?;
        hooks.config = Some(config);
        Ok(())
    }

    /// Starts playback and the animation. Fails with
    /// [`PosterError::NotReady`] until the audio load completes.
    pub fn play(&mut self) -> Result<()> {
        self.frame_loop.play()
    }

    /// Stops audio playback and pauses the animation without resetting its
    /// progress. Safe to call at any time.
    pub fn pause(&mut self) -> Result<()> {
        self.frame_loop.pause()
    }

    /// Drives the frame loop; forwards the per-tick notification to the
    /// `on_update` callback while playing.
    pub fn advance(&mut self, now: Instant) -> Result<u32> {
        self.frame_loop.advance(now)
    }

    pub fn state(&self) -> LoopState {
        self.frame_loop.state()
    }

    pub fn readiness(&self) -> Readiness {
        self.frame_loop.hooks().analyzer.readiness()
    }

    pub fn is_ready(&self) -> bool {
        self.frame_loop.hooks().analyzer.is_ready()
    }

    /// Stops playback and releases the audio resources. Idempotent; the
    /// resources are released even if a pause hook fails.
    pub fn dispose(&mut self) {
        let _ = self.frame_loop.pause();
        self.frame_loop.hooks_mut().analyzer.dispose();
    }
}

impl fmt::Debug for PosterManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PosterManager")
            .field("state", &self.state())
            .field("readiness", &self.readiness())
            .finish()
    }
}
