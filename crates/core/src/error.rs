/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// The host could not provide an audio-processing context. Terminal for
    /// the session: nothing will be visualised and the engine never retries.
    #[error("audio engine unavailable: {0}")]
    EngineUnavailable(String),
    /// A configuration request was rejected; the previous value stays active.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Audible playback could not be started. The transport stays paused.
    #[error("playback failed to start: {0}")]
    PlaybackStartFailed(String),
    /// A single frame failed to draw. Caught by the render loop.
    #[error("frame draw failed: {0}")]
    DrawFault(String),
    /// A transport operation was requested before any asset was loaded.
    #[error("no audio source loaded")]
    NoSource,
    /// The audio asset could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
    /// Free-form error message.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Configuration or dump (de)serialisation failed.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub(crate) fn invalid<T: Into<String>>(msg: T) -> Self {
        Self::InvalidConfig(msg.into())
    }
}

impl From<&str> for VisualiserError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for VisualiserError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<hound::Error> for VisualiserError {
    fn from(value: hound::Error) -> Self {
        match value {
            hound::Error::IoError(err) => Self::Io(err),
            other => Self::Decode(other.to_string()),
        }
    }
}
