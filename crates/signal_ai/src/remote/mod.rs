pub mod gemini_client;
pub mod gemini_types;

pub use gemini_client::GeminiClient;
