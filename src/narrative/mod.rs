/// Narrative assistant and language-model backend implementations
pub mod assistant;
pub mod backends;

pub use assistant::NarrativeAssistant;
pub use backends::{
    GeminiBackend, MockBackend, NarrativeBackend, OllamaBackend, OpenAIBackend,
};
