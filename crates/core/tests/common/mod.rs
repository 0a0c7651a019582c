//! Shared test doubles.

use std::collections::HashMap;
use std::sync::Mutex;

use price_curator_core::{EncodingError, Tokenizer};

/// Word-level tokenizer for tests.
///
/// Each token is a run of whitespace followed by a run of non-whitespace, so
/// `"Dell Laptop"` is two tokens (`"Dell"`, `" Laptop"`) and decoding any
/// prefix of the ids reproduces a prefix of the input exactly.
#[derive(Default)]
pub struct WordTokenizer {
    vocab: Mutex<Vocab>,
}

#[derive(Default)]
struct Vocab {
    ids: HashMap<String, u32>,
    pieces: Vec<String>,
}

impl WordTokenizer {
    pub fn new() -> Self {
        Self::default()
    }
}

fn split_pieces(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    let mut seen_word = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if seen_word {
                pieces.push(&text[start..idx]);
                start = idx;
                seen_word = false;
            }
        } else {
            seen_word = true;
        }
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str, _add_special_tokens: bool) -> Result<Vec<u32>, EncodingError> {
        let mut vocab = self
            .vocab
            .lock()
            .map_err(|_| EncodingError::new("vocabulary lock poisoned"))?;
        let ids = split_pieces(text)
            .into_iter()
            .map(|piece| {
                if let Some(&id) = vocab.ids.get(piece) {
                    return id;
                }
                let id = vocab.pieces.len() as u32;
                vocab.pieces.push(piece.to_string());
                vocab.ids.insert(piece.to_string(), id);
                id
            })
            .collect();
        Ok(ids)
    }

    fn decode(&self, ids: &[u32]) -> Result<String, EncodingError> {
        let vocab = self
            .vocab
            .lock()
            .map_err(|_| EncodingError::new("vocabulary lock poisoned"))?;
        ids.iter()
            .map(|&id| {
                vocab
                    .pieces
                    .get(id as usize)
                    .map(String::as_str)
                    .ok_or_else(|| EncodingError::new(format!("unknown token id {id}")))
            })
            .collect()
    }
}

/// Extract the description text from a rendered prompt.
pub fn prompt_body<'a>(prompt: &'a str, main_category: &str) -> &'a str {
    let preamble = format!(
        "{}\n\nMain_Category: {}\n\n",
        price_curator_core::QUESTION,
        main_category
    );
    let rest = prompt.strip_prefix(preamble.as_str()).unwrap_or(prompt);
    rest.rsplit_once("\n\n").map_or(rest, |(body, _)| body)
}
