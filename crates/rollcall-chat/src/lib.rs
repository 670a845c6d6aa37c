//! rollcall-chat — Single-persona LLM chat session.
//!
//! Relays user turns to a hosted model with a fixed system instruction and
//! keeps the conversation history between turns.

pub mod config;
pub mod gemini;
pub mod session;

pub use config::{ChatConfig, GenerationConfig, DEFAULT_MODEL, DEFAULT_SYSTEM_INSTRUCTION, REFUSAL_MESSAGE};
pub use gemini::GeminiProvider;
pub use session::{ChatProvider, ChatSession, ProviderError, Role, Turn};
