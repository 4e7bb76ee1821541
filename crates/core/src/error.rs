/// Result alias that carries the custom [`PosterError`] type.
pub type Result<T> = std::result::Result<T, PosterError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum PosterError {
    /// Playback or analysis was requested before the audio source finished
    /// loading. The caller is expected to retry once readiness is reached;
    /// the core never queues the intent.
    #[error("audio source is not ready")]
    NotReady,
    /// An operation that needs an applied configuration ran before `setup`.
    #[error("no configuration has been applied")]
    NotConfigured,
    /// An operation was invoked on a disposed handle. Post-dispose use is a
    /// contract violation and fails loudly rather than silently no-opping.
    #[error("handle has been disposed")]
    Disposed,
    /// The asynchronous load of an audio resource failed. Readiness stays
    /// where it was; it never flips to ready on failure.
    #[error("audio load failed: {0}")]
    LoadFailed(String),
    /// A caller-supplied value was outside the accepted domain.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around configuration (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    /// Wrapper around FFT processing errors.
    #[error("{0}")]
    Fft(#[from] realfft::FftError),
    /// Free-form error used at seams that only need a readable message.
    #[error("{0}")]
    Message(String),
}

impl PosterError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }
}

impl From<&str> for PosterError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for PosterError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
