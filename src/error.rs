use thiserror::Error;

/// Banner text for a non-success response from the generation endpoint.
pub const FAILED_TO_GENERATE: &str = "Failed to generate image";

/// Banner text used when a failure carries no message of its own.
pub const GENERIC_FAILURE: &str = "An error occurred";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// The endpoint answered with a non-2xx status.
    #[error("Failed to generate image")]
    Status { status: u16 },

    /// Transport-level failure (connection refused, reset, timeout, ...).
    #[error("{0}")]
    Request(String),

    /// The endpoint answered 2xx but the body was not the expected shape.
    #[error("{0}")]
    Response(String),

    #[error("{0}")]
    Serialization(String),

    /// A generation is already in flight on this generator.
    #[error("A generation is already in progress")]
    Busy,
}

impl GenerationError {
    /// The string shown in the error banner.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::Status { .. } => FAILED_TO_GENERATE.to_string(),
            other => {
                let message = other.to_string();
                if message.trim().is_empty() {
                    GENERIC_FAILURE.to_string()
                } else {
                    message
                }
            }
        }
    }
}

impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GenerationError::Response(err.to_string())
        } else {
            GenerationError::Request(err.to_string())
        }
    }
}

impl From<serde_json::Error> for GenerationError {
    fn from(err: serde_json::Error) -> Self {
        GenerationError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GenerationError>;
