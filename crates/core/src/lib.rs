//! Core curation logic for price-prediction training data.
//!
//! This crate provides the [`Curator`] which turns raw product-listing records
//! (title, description, features, details) plus a price into fixed-shape
//! prompts suitable for training a language model to predict prices.

/// Trait for tokenization operations.
///
/// Implementors are the token-encoding oracle the curator measures and
/// truncates text with. Implementations must be deterministic, and
/// `decode(&encode(x)[..k])` must render a prefix of `x`.
pub trait Tokenizer {
    /// Encode text into token ids.
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>, EncodingError>;

    /// Decode token ids back into text.
    fn decode(&self, ids: &[u32]) -> Result<String, EncodingError>;

    /// Count the number of tokens in the given text, without special tokens.
    fn count_tokens(&self, text: &str) -> Result<usize, EncodingError> {
        Ok(self.encode(text, false)?.len())
    }
}

// Blanket implementation for references to Tokenizers
impl<T: Tokenizer + ?Sized> Tokenizer for &T {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>, EncodingError> {
        (*self).encode(text, add_special_tokens)
    }

    fn decode(&self, ids: &[u32]) -> Result<String, EncodingError> {
        (*self).decode(ids)
    }
}

mod curator;
mod error;
mod helpers;
pub mod pipeline;
mod record;

pub use curator::{CuratedItem, CuratedPrompt, Curator, Rejection, Verdict};
pub use error::{CurationError, EncodingError, PipelineError};
pub use helpers::{render_details, round_price, scrub, scrub_details, truncate_chars};
pub use pipeline::{
    curate_all, curate_file, curate_files, discover_jsonl_files, write_dataset, CurationStats,
    DatasetSummary, FileResult, PipelineConfig, TrainingRecord,
};
pub use record::{parse_price, Details, RawRecord};

/// Minimum token count (exclusive) of the scrubbed text for a record to be kept.
pub const MIN_TOKENS: usize = 150;

/// Token budget for the description portion of the prompt.
pub const MAX_TOKENS: usize = 160;

/// Minimum character count (exclusive) of the assembled raw text.
///
/// Checked before tokenizing so obviously thin records never reach the tokenizer.
pub const MIN_CHARS: usize = 300;

/// Character cap applied before tokenizing.
///
/// Assumes roughly 7 characters per token for the Llama 3 vocabulary; re-measure
/// this ratio when switching to a tokenizer with a different vocabulary.
pub const CEILING_CHARS: usize = MAX_TOKENS * 7;

/// Question every training prompt opens with.
pub const QUESTION: &str = "How much does this cost to the nearest dollar?";

/// Text preceding the price in the answer.
pub const PRICE_PREFIX: &str = "Price is $";

/// Detail attribute names that carry no pricing signal.
pub const REMOVALS: &[&str] = &[
    "Manufacturer",
    "Language",
    "Best Sellers Rank",
    "Is Discontinued By Manufacturer",
];

/// Default HuggingFace tokenizer used by the CLI.
pub const DEFAULT_TOKENIZER: &str = "meta-llama/Llama-3.1-8B";
