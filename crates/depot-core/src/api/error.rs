use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{provider} server error (Status: {status_code}): {details}")]
    ServerError {
        provider: String,
        status_code: u16,
        details: String,
    },

    #[error("Request timed out for {provider}")]
    Timeout { provider: String },

    #[error("Failed to parse response from {provider}: {details}")]
    ResponseParsingError { provider: String, details: String },

    #[error("API returned no choices for {provider}")]
    NoChoices { provider: String },

    #[error("Malformed capability-call arguments from {provider}: {details}")]
    MalformedToolCall { provider: String, details: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}
