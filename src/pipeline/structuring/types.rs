use super::StructuringError;

/// Extraction-service abstraction: submit a prompt, receive text.
/// Implementations block for the duration of one round trip.
pub trait LlmClient: Send + Sync {
    fn generate(&self, model: &str, prompt: &str, system: &str) -> Result<String, StructuringError>;
}
