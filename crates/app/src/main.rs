use std::{
    f32::consts::PI,
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use audio_poster_core::{
    AnalysisConfig, AnalysisResult, Animation, AudioAnalyzer, AudioBuffer, AudioLoader, FftSource,
    PosterConfig, PosterError, PosterManager,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

fn main() -> audio_poster_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Demo {
            config,
            bars,
            seconds,
            frame_rate,
        } => run_demo(load_config(config, bars)?, seconds, frame_rate),
        Commands::Analyze { config, bars } => run_analyze(load_config(config, bars)?),
    }
}

/// Drives a full poster session against the synthesised tone: setup, wait
/// for readiness, play, tick until the deadline, pause, dispose.
fn run_demo(config: AnalysisConfig, seconds: f32, frame_rate: u32) -> audio_poster_core::Result<()> {
    tracing::info!(url = %config.audio_url, bars = config.bar_count, "starting poster demo");

    let source = FftSource::new(Arc::new(ToneLoader::default()));
    let mut manager = PosterManager::with_frame_rate(Box::new(source), frame_rate)?;

    manager.setup(PosterConfig {
        analysis: config,
        create_animation: Box::new(|| Box::new(PulseAnimation::default())),
        on_update: Box::new(|result, _animation| print_bars(result)),
    })?;

    wait_until(Duration::from_secs(5), || manager.is_ready())?;
    manager.play()?;

    let deadline = Instant::now() + Duration::from_secs_f32(seconds);
    while Instant::now() < deadline {
        manager.advance(Instant::now())?;
        thread::sleep(Duration::from_millis(5));
    }

    manager.pause()?;
    manager.dispose();
    tracing::info!("poster demo finished");
    Ok(())
}

/// Takes a single analysis snapshot through the analyzer facade and prints
/// it as JSON.
fn run_analyze(config: AnalysisConfig) -> audio_poster_core::Result<()> {
    tracing::info!(url = %config.audio_url, "taking analysis snapshot");

    let source = FftSource::new(Arc::new(ToneLoader::default()));
    let mut analyzer = AudioAnalyzer::new(Box::new(source));
    analyzer.set_config(config)?;

    wait_until(Duration::from_secs(5), || analyzer.is_ready())?;
    analyzer.start()?;
    // Let the playhead move past the analysis window before sampling.
    thread::sleep(Duration::from_millis(200));
    let result = analyzer.analyze()?;
    analyzer.stop()?;
    analyzer.dispose();

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn load_config(path: Option<PathBuf>, bars: usize) -> audio_poster_core::Result<AnalysisConfig> {
    match path {
        Some(path) => AnalysisConfig::from_json_path(path),
        None => {
            let config = AnalysisConfig::new("demo://tone", bars).with_loop(true);
            config.validate()?;
            Ok(config)
        }
    }
}

fn wait_until(timeout: Duration, ready: impl Fn() -> bool) -> audio_poster_core::Result<()> {
    let deadline = Instant::now() + timeout;
    while !ready() {
        if Instant::now() >= deadline {
            return Err(PosterError::NotReady);
        }
        thread::sleep(Duration::from_millis(10));
    }
    Ok(())
}

fn print_bars(result: &AnalysisResult) {
    const GLYPHS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

    let mut line = String::new();
    for (index, bar) in result.bars.iter().enumerate() {
        let level = (bar.value * 8.0).round() as usize;
        let glyph = GLYPHS[level.min(8)];
        if index == result.highest_bar {
            line.push('[');
            line.push(glyph);
            line.push(']');
        } else {
            line.push(glyph);
        }
    }
    println!("{line}");
}

/// Stands in for the external decode step: synthesises a low drone plus a
/// slowly swept overtone so the bars keep moving.
struct ToneLoader {
    sample_rate: u32,
    seconds: f32,
}

impl Default for ToneLoader {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            seconds: 30.0,
        }
    }
}

impl AudioLoader for ToneLoader {
    fn load(&self, url: &str) -> audio_poster_core::Result<AudioBuffer> {
        tracing::debug!(url, "synthesising demo tone");
        let sample_rate = self.sample_rate;
        let total = (sample_rate as f32 * self.seconds) as usize;
        let samples = (0..total)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                let drone = (2.0 * PI * 110.0 * t).sin() * 0.4;
                let sweep_hz = 440.0 + 1200.0 * (0.25 * t).sin().abs();
                let sweep = (2.0 * PI * sweep_hz * t).sin() * 0.3;
                drone + sweep
            })
            .collect();
        Ok(AudioBuffer {
            samples,
            sample_rate,
        })
    }
}

/// Minimal animation handle for the terminal demo; real deployments hand in
/// a handle driving the poster artwork.
#[derive(Debug, Default)]
struct PulseAnimation {
    running: bool,
}

impl Animation for PulseAnimation {
    fn play(&mut self) {
        self.running = true;
        tracing::debug!(running = self.running, "animation playing");
    }

    fn pause(&mut self) {
        self.running = false;
        tracing::debug!(running = self.running, "animation paused");
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive poster demo", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the poster loop against a synthesised tone and draw bars.
    Demo {
        /// Optional JSON file with the analysis config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of bars when no config file is given.
        #[arg(long, default_value_t = 24)]
        bars: usize,
        /// How long to keep the loop playing.
        #[arg(long, default_value_t = 5.0)]
        seconds: f32,
        /// Loop frame rate in ticks per second.
        #[arg(long, default_value_t = 30)]
        frame_rate: u32,
    },
    /// Take a single analysis snapshot and print it as JSON.
    Analyze {
        /// Optional JSON file with the analysis config.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of bars when no config file is given.
        #[arg(long, default_value_t = 12)]
        bars: usize,
    },
}
