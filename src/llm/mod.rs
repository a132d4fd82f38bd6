pub mod anthropic;
pub mod generator;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use generator::ResponseGenerator;
pub use provider::LlmProvider;
