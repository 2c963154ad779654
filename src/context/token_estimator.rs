//! Local token estimation using tiktoken

use crate::error::{AssistantError, Result};
use std::sync::Arc;
use tiktoken_rs::{cl100k_base, o200k_base, CoreBPE};

/// Token estimator trait for different tokenization strategies
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in the given text
    fn estimate(&self, text: &str) -> usize;

    /// Estimate tokens for multiple texts
    fn estimate_batch(&self, texts: &[&str]) -> Vec<usize> {
        texts.iter().map(|t| self.estimate(t)).collect()
    }
}

/// Byte-pair encoding scheme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BpeScheme {
    /// GPT-4 / GPT-3.5 encoding, the default scheme
    Cl100k,
    /// GPT-4o and o-series encoding
    O200k,
}

/// Tiktoken-based token estimator
pub struct TiktokenEstimator {
    bpe: Arc<CoreBPE>,
    scheme: BpeScheme,
}

impl TiktokenEstimator {
    /// Load the encoding tables for a scheme
    pub fn new(scheme: BpeScheme) -> Result<Self> {
        let bpe = match scheme {
            BpeScheme::Cl100k => cl100k_base(),
            BpeScheme::O200k => o200k_base(),
        }
        .map_err(|e| AssistantError::Configuration(format!("Failed to load {:?} encoding: {}", scheme, e)))?;

        Ok(Self {
            bpe: Arc::new(bpe),
            scheme,
        })
    }

    pub fn scheme(&self) -> BpeScheme {
        self.scheme
    }
}

impl TokenEstimator for TiktokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }
}

/// Word-based token estimator (fallback, ~1.3 tokens per word)
pub struct WordBasedEstimator {
    tokens_per_word: f64,
}

impl WordBasedEstimator {
    pub fn new(tokens_per_word: f64) -> Self {
        Self { tokens_per_word }
    }
}

impl Default for WordBasedEstimator {
    fn default() -> Self {
        Self::new(1.3)
    }
}

impl TokenEstimator for WordBasedEstimator {
    fn estimate(&self, text: &str) -> usize {
        let word_count = text.split_whitespace().count();
        (word_count as f64 * self.tokens_per_word).ceil() as usize
    }
}
