//! Model capability registry
//!
//! Static table of context window and output limits per model. Unknown
//! identifiers resolve to the default profile instead of failing.

use super::models::ModelProfile;
use tracing::debug;

/// Default context window for unrecognized models
pub const DEFAULT_CONTEXT_WINDOW: usize = 128_000;

/// Default output limit for unrecognized models
pub const DEFAULT_MAX_OUTPUT_TOKENS: usize = 16_384;

/// (identifier, context_window, max_output_tokens)
const KNOWN_MODELS: &[(&str, usize, usize)] = &[
    ("gpt-4o", 128_000, 16_384),
    ("gpt-4o-mini", 128_000, 16_384),
    ("gpt-4-turbo", 128_000, 4_096),
    ("o1", 200_000, 100_000),
    ("o1-mini", 200_000, 100_000),
    ("o3-mini", 200_000, 100_000),
    ("claude-3-5-sonnet-latest", 200_000, 8_192),
    ("claude-3-5-haiku-latest", 200_000, 8_192),
    ("claude-3-7-sonnet-latest", 200_000, 64_000),
];

/// Resolve the profile for a model identifier
pub fn get_profile(model: &str) -> ModelProfile {
    match KNOWN_MODELS.iter().find(|(id, _, _)| *id == model) {
        Some((id, context_window, max_output_tokens)) => {
            ModelProfile::new(*id, *context_window, *max_output_tokens)
        }
        None => {
            debug!("Unknown model '{}', using default profile", model);
            ModelProfile::new(model, DEFAULT_CONTEXT_WINDOW, DEFAULT_MAX_OUTPUT_TOKENS)
        }
    }
}

/// Identifiers present in the static table
pub fn known_models() -> Vec<String> {
    KNOWN_MODELS.iter().map(|(id, _, _)| id.to_string()).collect()
}

/// Whether the model has an entry in the static table
pub fn is_known(model: &str) -> bool {
    KNOWN_MODELS.iter().any(|(id, _, _)| *id == model)
}
