use crate::scene::LayerId;

/// Result alias that carries the custom [`VisualiserError`] type.
pub type Result<T> = std::result::Result<T, VisualiserError>;

/// Common error type for the core crate.
#[derive(Debug, thiserror::Error)]
pub enum VisualiserError {
    /// Free-form message for failures that do not warrant their own variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("wav: {0}")]
    Wav(#[from] hound::Error),
    #[error("fft: {0}")]
    Fft(#[from] realfft::FftError),
    /// A layer id that is not present in the scene.
    #[error("unknown layer {0}")]
    UnknownLayer(LayerId),
    /// A structural edit would break the single-parent or acyclic group rules.
    #[error("invalid layer hierarchy: {0}")]
    InvalidHierarchy(String),
    #[error("invalid layer patch: {0}")]
    InvalidPatch(String),
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl VisualiserError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
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
