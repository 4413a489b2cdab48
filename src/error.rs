use thiserror::Error;

/// Errors returned by the analysis pipeline.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// The input bytes could not be decoded as an image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// Re-encoding the normalized image failed or produced no output.
    #[error("Failed to encode image: {0}")]
    Encode(String),

    /// The declared media type is not in the accepted-format allow-list.
    #[error("Unsupported image format: {0}. Use JPG, PNG or WebP")]
    UnsupportedMediaType(String),

    /// The input file exceeds the configured size limit.
    #[error("Image is too large: {size} bytes (max {max})")]
    FileTooLarge { size: usize, max: usize },

    /// A provider identity outside the supported set.
    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    /// The provider rejected or failed the request.
    #[error("{message}")]
    ProviderHttp { status: u16, message: String },

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    /// Unknown analysis mode. The prompt resolver recovers from this one.
    #[error("Unknown analysis mode: {0}")]
    UnknownMode(String),

    /// No API key stored for the model's credential slot.
    #[error("No API key configured for model '{0}'")]
    MissingApiKey(String),

    #[error("No images supplied for analysis")]
    NoImages,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The provider answered 2xx but the body had no text at the expected path.
    #[error("Invalid response from provider: {0}")]
    InvalidResponse(String),

    /// Network-level request failure with context.
    #[error("{context}: {source}")]
    Network {
        context: String,
        source: reqwest::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A blocking image task panicked or was cancelled.
    #[error("Image task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AnalysisError {
    /// HTTP status for provider failures, `None` for everything else.
    pub fn status(&self) -> Option<u16> {
        match self {
            AnalysisError::ProviderHttp { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AnalysisError>;
