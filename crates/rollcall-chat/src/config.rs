use serde::Serialize;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Exact reply for questions outside the assistant's domain.
pub const REFUSAL_MESSAGE: &str =
    "I suggest this types details medicials information only ayurvedic or yoga, hameopathy ,siddha, unani";

/// Persona for the "Aushadi Veda" assistant.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = concat!(
    "You are a specialized AI assistant named 'Aushadi Veda'. ",
    "Your sole purpose is to provide medicinal information exclusively about the following systems: ",
    "Ayurveda, Yoga, Homeopathy, Siddha, and Unani. ",
    "You can answer questions about medicinal plants, herbs, remedies, and principles ONLY within these systems. ",
    "If a user asks about anything outside of these specific domains (such as allopathic medicine, modern drugs, ",
    "general knowledge, chemistry, or any other topic), you MUST respond with the exact phrase: ",
    "'I suggest this types details medicials information only ayurvedic or yoga, hameopathy ,siddha, unani' ",
    "and nothing else. Do not apologize or explain further."
);

/// Sampling parameters sent with every request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    /// Capped at the model's output limit (8192 for gemini-1.5-flash).
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: 1.0,
            top_k: 100,
            max_output_tokens: 8192,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub system_instruction: String,
    pub generation: GenerationConfig,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            generation: GenerationConfig::default(),
        }
    }
}
