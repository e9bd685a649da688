pub mod openai;
pub mod provider;
pub mod response;
pub mod service;
pub mod types;

pub use provider::LlmProvider;
pub use service::LlmService;
pub use types::{ChatMessage, ChatRequest};
