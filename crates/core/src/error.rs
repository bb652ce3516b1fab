use std::fmt;

/// Result alias that carries the custom [`MediaEditError`] type.
pub type Result<T> = std::result::Result<T, MediaEditError>;

/// Which kind of media an operation expected to find loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => f.write_str("image"),
            MediaKind::Audio => f.write_str("audio"),
        }
    }
}

/// Common error type for the core crate.
///
/// Every variant is local and recoverable: an operation that fails leaves the
/// previously committed buffers untouched.
#[derive(Debug, thiserror::Error)]
pub enum MediaEditError {
    /// Free-form message for conditions that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Invalid numeric input such as non-positive resize dimensions or an
    /// adjustment parameter outside of its domain.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// A crop rectangle that collapses to zero width or height.
    #[error("invalid crop: {0}")]
    InvalidCrop(String),
    /// The operation needs a buffer that has not been loaded yet.
    #[error("no {0} loaded")]
    NoMediaLoaded(MediaKind),
    /// A stage of the adjustment pipeline could not produce a buffer.
    #[error("adjustment failed: {0}")]
    AdjustmentFailed(String),
    /// Mutation attempted while the sample buffer is streaming to the sink.
    #[error("buffer busy: audio is playing")]
    BufferBusy,
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error(transparent)]
    Fft(#[from] realfft::FftError),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
}

impl MediaEditError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid_input<T: Into<String>>(msg: T) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// True for errors caused by what the caller passed in rather than by the
    /// state of the editor.
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidCrop(_))
    }
}

impl From<&str> for MediaEditError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for MediaEditError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}

impl From<image::ImageError> for MediaEditError {
    fn from(value: image::ImageError) -> Self {
        match value {
            image::ImageError::Encoding(err) => Self::Encode(err.to_string()),
            other => Self::Decode(other.to_string()),
        }
    }
}

impl From<hound::Error> for MediaEditError {
    fn from(value: hound::Error) -> Self {
        match value {
            hound::Error::IoError(err) => Self::Io(err),
            other => Self::Decode(other.to_string()),
        }
    }
}
