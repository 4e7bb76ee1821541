use std::{
    f32::consts::PI,
    fmt,
    sync::{Arc, Mutex, MutexGuard},
    time::Instant,
};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::{AnalysisConfig, PosterError, Result};

/// Default number of spectrum bins exposed by [`FftSource`].
pub const DEFAULT_FFT_SIZE: usize = 1024;
/// Default exponential smoothing factor applied between snapshots.
pub const DEFAULT_SMOOTHING: f32 = 0.8;

const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// Load state of an audio resource. Queried as a snapshot value; it never
/// recomputes anything behind the caller's back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    #[default]
    Unloaded,
    Loading,
    Ready,
}

/// The audio-graph capability the core consumes: load a resource, control
/// playback, and take ordered spectral snapshots.
///
/// Playback control is synchronous from the caller's perspective; only
/// loading is asynchronous, observed through [`SpectrumSource::readiness`].
pub trait SpectrumSource {
    /// Begins loading the resource named by the config. Returns immediately;
    /// readiness flips once the load completes. Starting a new load while one
    /// is pending supersedes it: the stale load must never flip readiness.
    fn load(&mut self, config: &AnalysisConfig) -> Result<()>;
    /// Starts playback, optionally at an offset in seconds. Fails with
    /// [`PosterError::NotReady`] unless the source is loaded.
    fn play(&mut self, offset_seconds: Option<f64>) -> Result<()>;
    /// Stops playback. A no-op when nothing is playing.
    fn stop(&mut self) -> Result<()>;
    /// Returns the current spectral magnitudes, one per bin, each in [0, 1].
    fn spectrum_snapshot(&mut self) -> Result<Vec<f32>>;
    /// Returns the frequency in Hz represented by the given bin index.
    fn frequency_of_bin(&self, index: usize) -> f32;
    /// Number of bins in every snapshot.
    fn bin_count(&self) -> usize;
    fn readiness(&self) -> Readiness;
    fn is_loaded(&self) -> bool {
        matches!(self.readiness(), Readiness::Ready)
    }
    /// Releases the underlying audio resources. Idempotent; every other
    /// operation fails with [`PosterError::Disposed`] afterwards.
    fn dispose(&mut self);
}

/// Decoded audio handed to the core by an [`AudioLoader`]. Mono samples in
/// [-1, 1].
#[derive(Debug, Clone, Default)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Resolves an opaque audio URL into decoded samples. Decoding itself lives
/// outside the core; tests and the demo app supply synthetic loaders.
pub trait AudioLoader: Send + Sync {
    fn load(&self, url: &str) -> Result<AudioBuffer>;
}

/// Tuning knobs for [`FftSource`], mirroring the analyser it stands in for.
#[derive(Debug, Clone, Copy)]
pub struct FftSourceOptions {
    /// Number of bins per snapshot. The analysis window is twice this long.
    pub fft_size: usize,
    /// Exponential smoothing factor in [0, 1); 0 disables averaging.
    pub smoothing: f32,
}

impl Default for FftSourceOptions {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            smoothing: DEFAULT_SMOOTHING,
        }
    }
}

#[derive(Default)]
struct LoadSlot {
    generation: u64,
    state: LoadState,
}

#[derive(Default)]
enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Ready(Arc<AudioBuffer>),
    Failed(String),
}

/// Real-FFT backed [`SpectrumSource`] over an in-memory sample buffer.
///
/// Loading runs on a background thread and publishes into a shared slot; a
/// generation counter ensures only the most recently requested load can flip
/// readiness. Snapshots window the most recent `2 * fft_size` samples at the
/// playhead with a Hann window and smooth magnitudes across calls. A stopped,
/// still-loading, or past-the-end playhead reads as silence.
pub struct FftSource {
    loader: Arc<dyn AudioLoader>,
    options: FftSourceOptions,
    shared: Arc<Mutex<LoadSlot>>,
    loop_playback: bool,
    playing_since: Option<Instant>,
    start_offset: f64,
    smoothed: Vec<f32>,
    planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
    disposed: bool,
}

impl FftSource {
    pub fn new(loader: Arc<dyn AudioLoader>) -> Self {
        Self {
            loader,
            options: FftSourceOptions::default(),
            shared: Arc::new(Mutex::new(LoadSlot::default())),
            loop_playback: false,
            playing_since: None,
            start_offset: 0.0,
            smoothed: Vec::new(),
            planner: RealFftPlanner::new(),
            fft: None,
            disposed: false,
        }
    }

    pub fn with_options(loader: Arc<dyn AudioLoader>, options: FftSourceOptions) -> Result<Self> {
        if options.fft_size == 0 {
            return Err(PosterError::InvalidInput("fft_size must be at least 1"));
        }
        if !(0.0..1.0).contains(&options.smoothing) {
            return Err(PosterError::InvalidInput("smoothing must lie in [0, 1)"));
        }
        let mut source = Self::new(loader);
        source.options = options;
        Ok(source)
    }

    /// Message of the most recent failed load, if the failure has not been
    /// superseded by a newer load.
    pub fn last_load_error(&self) -> Option<String> {
        let slot = self.shared.lock().ok()?;
        match &slot.state {
            LoadState::Failed(message) => Some(message.clone()),
            _ => None,
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.disposed {
            return Err(PosterError::Disposed);
        }
        Ok(())
    }

    fn lock_slot(&self) -> Result<MutexGuard<'_, LoadSlot>> {
        self.shared
            .lock()
            .map_err(|_| PosterError::msg("audio load slot has been poisoned"))
    }

    fn loaded_buffer(&self) -> Option<Arc<AudioBuffer>> {
        let slot = self.shared.lock().ok()?;
        match &slot.state {
            LoadState::Ready(buffer) => Some(Arc::clone(buffer)),
            _ => None,
        }
    }

    fn sample_rate(&self) -> u32 {
        self.loaded_buffer()
            .map(|buffer| buffer.sample_rate)
            .unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Magnitudes of the window ending at the current playhead, before
    /// smoothing. Silence whenever there is nothing audible to analyse.
    fn current_magnitudes(&mut self) -> Result<Vec<f32>> {
        let fft_size = self.options.fft_size;
        let silence = vec![0.0; fft_size];

        let Some(playing_since) = self.playing_since else {
            return Ok(silence);
        };
        let Some(buffer) = self.loaded_buffer() else {
            return Ok(silence);
        };
        if buffer.samples.is_empty() || buffer.sample_rate == 0 {
            return Ok(silence);
        }

        let elapsed = playing_since.elapsed().as_secs_f64() + self.start_offset;
        let mut playhead = (elapsed * buffer.sample_rate as f64) as usize;
        let total = buffer.samples.len();
        if self.loop_playback {
            playhead %= total;
        } else if playhead >= total {
            return Ok(silence);
        }

        let window_len = fft_size * 2;
        let available = playhead.min(window_len);
        let start = playhead - available;

        let fft = self.prepare_fft(window_len)?;
        fft.input.fill(0.0);
        for (offset, sample) in buffer.samples[start..playhead].iter().enumerate() {
            let dest = window_len - available + offset;
            fft.input[dest] = *sample * hann_value(dest, window_len);
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let scale = 2.0 / window_len as f32;
        Ok(fft
            .spectrum
            .iter()
            .take(fft_size)
            .map(|bin| (bin.norm() * scale).clamp(0.0, 1.0))
            .collect())
    }

    fn prepare_fft(&mut self, size: usize) -> Result<&mut FftResources> {
        let rebuild = self
            .fft
            .as_ref()
            .map(|fft| fft.size != size)
            .unwrap_or(true);

        if rebuild {
            let plan = self.planner.plan_fft_forward(size);
            let scratch = plan.make_scratch_vec();
            let spectrum = plan.make_output_vec();
            let input = plan.make_input_vec();
            self.fft = Some(FftResources {
                size,
                plan,
                scratch,
                spectrum,
                input,
            });
        }

        Ok(self.fft.as_mut().expect("fft resources must exist"))
    }
}

impl SpectrumSource for FftSource {
    fn load(&mut self, config: &AnalysisConfig) -> Result<()> {
        self.ensure_live()?;
        self.loop_playback = config.loop_playback;
        self.playing_since = None;
        self.start_offset = 0.0;
        self.smoothed.clear();

        let generation = {
            let mut slot = self.lock_slot()?;
            slot.generation += 1;
            slot.state = LoadState::Loading;
            slot.generation
        };

        let loader = Arc::clone(&self.loader);
        let shared = Arc::clone(&self.shared);
        let url = config.audio_url.clone();
        std::thread::spawn(move || {
            let outcome = loader.load(&url);
            if let Ok(mut slot) = shared.lock() {
                // A newer load owns the slot now; this result is stale.
                if slot.generation != generation {
                    return;
                }
                slot.state = match outcome {
                    Ok(buffer) => LoadState::Ready(Arc::new(buffer)),
                    Err(err) => LoadState::Failed(err.to_string()),
                };
            }
        });

        Ok(())
    }

    fn play(&mut self, offset_seconds: Option<f64>) -> Result<()> {
        self.ensure_live()?;
        match &self.lock_slot()?.state {
            LoadState::Ready(_) => {}
            LoadState::Failed(message) => return Err(PosterError::LoadFailed(message.clone())),
            LoadState::Unloaded | LoadState::Loading => return Err(PosterError::NotReady),
        }
        self.playing_since = Some(Instant::now());
        self.start_offset = offset_seconds.unwrap_or(0.0).max(0.0);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.ensure_live()?;
        self.playing_since = None;
        Ok(())
    }

    fn spectrum_snapshot(&mut self) -> Result<Vec<f32>> {
        self.ensure_live()?;
        let target = self.current_magnitudes()?;
        if self.smoothed.len() != target.len() {
            self.smoothed = vec![0.0; target.len()];
        }
        let smoothing = self.options.smoothing;
        for (held, fresh) in self.smoothed.iter_mut().zip(&target) {
            *held = smoothing * *held + (1.0 - smoothing) * fresh;
        }
        Ok(self.smoothed.clone())
    }

    fn frequency_of_bin(&self, index: usize) -> f32 {
        index as f32 * self.sample_rate() as f32 / (self.options.fft_size * 2) as f32
    }

    fn bin_count(&self) -> usize {
        self.options.fft_size
    }

    fn readiness(&self) -> Readiness {
        if self.disposed {
            return Readiness::Unloaded;
        }
        match self.shared.lock() {
            Ok(slot) => match slot.state {
                LoadState::Ready(_) => Readiness::Ready,
                LoadState::Loading => Readiness::Loading,
                LoadState::Unloaded | LoadState::Failed(_) => Readiness::Unloaded,
            },
            Err(_) => Readiness::Unloaded,
        }
    }

    fn dispose(&mut self) {
        self.disposed = true;
        self.playing_since = None;
        self.smoothed.clear();
        self.fft = None;
        if let Ok(mut slot) = self.shared.lock() {
            // Bumping the generation strands any in-flight load.
            slot.generation += 1;
            slot.state = LoadState::Unloaded;
        }
    }
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for FftSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftSource")
            .field("options", &self.options)
            .field("readiness", &self.readiness())
            .field("playing", &self.playing_since.is_some())
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }

    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}


#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Loader that serves per-URL buffers after a configurable delay, with
    /// the sample rate doubling as an identity marker.
    struct TestLoader;

    impl AudioLoader for TestLoader {
        fn load(&self, url: &str) -> Result<AudioBuffer> {
            let (delay_ms, sample_rate) = match url {
                "slow" => (250, 11_025),
                "fast" => (0, 22_050),
                "broken" => {
                    std::thread::sleep(Duration::from_millis(10));
                    return Err(PosterError::msg("decode failed"));
                }
                _ => (0, 8_000),
            };
            std::thread::sleep(Duration::from_millis(delay_ms));
            let samples = (0..sample_rate)
                .map(|i| (2.0 * PI * 440.0 * i as f32 / sample_rate as f32).sin())
                .collect();
            Ok(AudioBuffer {
                samples,
                sample_rate,
            })
        }
    }

    fn small_source() -> FftSource {
        FftSource::with_options(
            Arc::new(TestLoader),
            FftSourceOptions {
                fft_size: 64,
                smoothing: 0.0,
            },
        )
        .unwrap()
    }

    fn wait_for_ready(source: &FftSource) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !source.is_loaded() {
            assert!(Instant::now() < deadline, "load did not finish in time");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn loads_plays_and_snapshots_energy() {
        let mut source = small_source();
        source.load(&AnalysisConfig::new("tone", 8)).unwrap();
        wait_for_ready(&source);

        // Half a second in, the window is fully inside the buffer.
        source.play(Some(0.5)).unwrap();
        let snapshot = source.spectrum_snapshot().unwrap();

        assert_eq!(snapshot.len(), source.bin_count());
        assert!(snapshot.iter().any(|&value| value > 0.01));
        assert!(snapshot.iter().all(|&value| (0.0..=1.0).contains(&value)));
    }

    #[test]
    fn play_before_ready_is_rejected() {
        let mut source = small_source();
        source.load(&AnalysisConfig::new("slow", 8)).unwrap();

        assert_eq!(source.readiness(), Readiness::Loading);
        assert!(matches!(source.play(None), Err(PosterError::NotReady)));
    }

    #[test]
    fn failed_load_never_flips_readiness() {
        let mut source = small_source();
        source.load(&AnalysisConfig::new("broken", 8)).unwrap();

        let deadline = Instant::now() + Duration::from_secs(2);
        while source.last_load_error().is_none() {
            assert!(Instant::now() < deadline, "failure was not observed");
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(source.readiness(), Readiness::Unloaded);
        assert!(matches!(source.play(None), Err(PosterError::LoadFailed(_))));
    }

    #[test]
    fn newer_load_supersedes_a_pending_one() {
        let mut source = small_source();
        source.load(&AnalysisConfig::new("slow", 8)).unwrap();
        source.load(&AnalysisConfig::new("fast", 8)).unwrap();
        wait_for_ready(&source);
        assert_eq!(source.sample_rate(), 22_050);

        // Let the stale slow load finish; it must not replace the fast one.
        std::thread::sleep(Duration::from_millis(350));
        assert_eq!(source.readiness(), Readiness::Ready);
        assert_eq!(source.sample_rate(), 22_050);
    }

    #[test]
    fn stopped_playback_reads_as_silence() {
        let mut source = small_source();
        source.load(&AnalysisConfig::new("tone", 8)).unwrap();
        wait_for_ready(&source);

        source.play(Some(0.5)).unwrap();
        source.stop().unwrap();
        let snapshot = source.spectrum_snapshot().unwrap();
        assert!(snapshot.iter().all(|&value| value == 0.0));
    }

    #[test]
    fn dispose_is_idempotent_and_later_use_fails() {
        let mut source = small_source();
        source.load(&AnalysisConfig::new("tone", 8)).unwrap();
        wait_for_ready(&source);

        source.dispose();
        source.dispose();

        assert_eq!(source.readiness(), Readiness::Unloaded);
        assert!(matches!(source.play(None), Err(PosterError::Disposed)));
        assert!(matches!(
            source.spectrum_snapshot(),
            Err(PosterError::Disposed)
        ));
        assert!(matches!(
            source.load(&AnalysisConfig::new("tone", 8)),
            Err(PosterError::Disposed)
        ));
    }

    #[test]
    fn bin_frequencies_follow_the_sample_rate() {
        let mut source = small_source();
        source.load(&AnalysisConfig::new("fast", 8)).unwrap();
        wait_for_ready(&source);

        // bin i maps to i * sample_rate / (2 * fft_size)
        let expected = 22_050.0 / 128.0;
        assert_eq!(source.frequency_of_bin(0), 0.0);
        assert!((source.frequency_of_bin(1) - expected).abs() < 1e-3);
    }
}
