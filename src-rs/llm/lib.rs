pub mod openrouter_adapter;
pub mod types;

pub use openrouter_adapter::{OpenRouterAdapter, OpenRouterConfig};
pub use types::{CompletionRequest, LLMResponse, Message, ProviderAdapter, ProviderError};
