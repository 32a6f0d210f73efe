pub mod error;
mod openai;
mod provider;

pub use error::ApiError;
pub use openai::OpenAiChatGateway;
pub use provider::{Decision, ReasoningProvider};
