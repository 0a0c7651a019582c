//! Record curator: decides whether a listing is usable and renders its prompt.

use std::fmt;

use crate::error::CurationError;
use crate::helpers::{round_price, scrub, scrub_details, truncate_chars};
use crate::record::RawRecord;
use crate::Tokenizer;
use crate::{CEILING_CHARS, MAX_TOKENS, MIN_CHARS, MIN_TOKENS, PRICE_PREFIX, QUESTION};

/// Why a record was left out of the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Assembled text had at most `MIN_CHARS` characters.
    TooFewChars { chars: usize },
    /// Scrubbed text encoded to at most `MIN_TOKENS` tokens.
    TooFewTokens { tokens: usize },
}

/// A rendered training prompt and its size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuratedPrompt {
    pub text: String,
    /// Tokens in the whole prompt, preamble and price included.
    pub token_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Included(CuratedPrompt),
    Rejected(Rejection),
}

/// A curated datapoint: a product with its price and, if usable, its prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct CuratedItem {
    pub title: String,
    pub price: f64,
    pub main_category: String,
    pub verdict: Verdict,
}

impl CuratedItem {
    pub fn included(&self) -> bool {
        matches!(self.verdict, Verdict::Included(_))
    }

    pub fn prompt(&self) -> Option<&CuratedPrompt> {
        match &self.verdict {
            Verdict::Included(prompt) => Some(prompt),
            Verdict::Rejected(_) => None,
        }
    }

    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt().map(|p| p.text.as_str())
    }

    pub fn token_count(&self) -> Option<usize> {
        self.prompt().map(|p| p.token_count)
    }

    pub fn rejection(&self) -> Option<Rejection> {
        match self.verdict {
            Verdict::Rejected(rejection) => Some(rejection),
            Verdict::Included(_) => None,
        }
    }

    /// The prompt with its answer withheld, for evaluating a model.
    ///
    /// Everything up to and including [`PRICE_PREFIX`]; `None` for rejected items.
    pub fn test_prompt(&self) -> Option<&str> {
        let text = self.prompt_text()?;
        let end = text.find(PRICE_PREFIX)? + PRICE_PREFIX.len();
        Some(&text[..end])
    }
}

impl fmt::Display for CuratedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} = ${:?}>", self.title, self.price)
    }
}

/// Curates raw records into training prompts.
///
/// Holds the tokenizer used to gate and truncate text. Pass `&tokenizer` to
/// share one tokenizer between several curators or threads.
pub struct Curator<T>
where
    T: Tokenizer,
{
    tokenizer: T,
}

impl<T> Curator<T>
where
    T: Tokenizer,
{
    /// Create a new Curator with the given tokenizer.
    pub fn new(tokenizer: T) -> Self {
        Self { tokenizer }
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    /// Curate one record at the given price.
    ///
    /// A record without enough text is returned with [`Verdict::Rejected`];
    /// errors are reserved for malformed records and tokenizer failures.
    pub fn curate(&self, record: &RawRecord, price: f64) -> Result<CuratedItem, CurationError> {
        let title = record
            .title
            .as_deref()
            .ok_or(CurationError::InvalidRecord { field: "title" })?;
        let main_category = record
            .main_category
            .as_deref()
            .ok_or(CurationError::InvalidRecord {
                field: "main_category",
            })?;

        let verdict = self.judge(record, title, main_category, price)?;
        Ok(CuratedItem {
            title: title.to_string(),
            price,
            main_category: main_category.to_string(),
            verdict,
        })
    }

    fn judge(
        &self,
        record: &RawRecord,
        title: &str,
        main_category: &str,
        price: f64,
    ) -> Result<Verdict, CurationError> {
        let contents = assemble_contents(record);
        let chars = contents.chars().count();
        if chars <= MIN_CHARS {
            return Ok(Verdict::Rejected(Rejection::TooFewChars { chars }));
        }

        let contents = truncate_chars(&contents, CEILING_CHARS);
        let text = format!("{}\n{}", scrub(title), scrub(contents));

        let mut tokens = self.tokenizer.encode(&text, false)?;
        if tokens.len() <= MIN_TOKENS {
            return Ok(Verdict::Rejected(Rejection::TooFewTokens {
                tokens: tokens.len(),
            }));
        }

        tokens.truncate(MAX_TOKENS);
        let text = self.tokenizer.decode(&tokens)?;
        let prompt = render_prompt(main_category, &text, price);
        let token_count = self.tokenizer.count_tokens(&prompt)?;

        Ok(Verdict::Included(CuratedPrompt {
            text: prompt,
            token_count,
        }))
    }
}

/// Join description, features and scrubbed details, each block newline-terminated.
fn assemble_contents(record: &RawRecord) -> String {
    let mut contents = record.description.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }

    let features = record.features.join("\n");
    if !features.is_empty() {
        contents.push_str(&features);
        contents.push('\n');
    }

    if let Some(details) = record.details.as_ref().filter(|d| !d.is_empty()) {
        contents.push_str(&scrub_details(details));
        contents.push('\n');
    }

    contents
}

fn render_prompt(main_category: &str, text: &str, price: f64) -> String {
    format!(
        "{QUESTION}\n\nMain_Category: {main_category}\n\n{text}\n\n{PRICE_PREFIX}{:.0}.00",
        round_price(price)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Details, EncodingError};

    /// Byte-level tokenizer for tests: one token per UTF-8 byte.
    struct ByteTokenizer;

    impl Tokenizer for ByteTokenizer {
        fn encode(&self, text: &str, _add_special_tokens: bool) -> Result<Vec<u32>, EncodingError> {
            Ok(text.bytes().map(u32::from).collect())
        }

        fn decode(&self, ids: &[u32]) -> Result<String, EncodingError> {
            let bytes: Vec<u8> = ids.iter().map(|&id| id as u8).collect();
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
    }

    struct FailingTokenizer;

    impl Tokenizer for FailingTokenizer {
        fn encode(
            &self,
            _text: &str,
            _add_special_tokens: bool,
        ) -> Result<Vec<u32>, EncodingError> {
            Err(EncodingError::new("vocabulary not loaded"))
        }

        fn decode(&self, _ids: &[u32]) -> Result<String, EncodingError> {
            Err(EncodingError::new("vocabulary not loaded"))
        }
    }

    fn long_record() -> RawRecord {
        RawRecord::new("Desk Lamp", "Home")
            .with_description(["A bright lamp with a flexible neck. ".repeat(10)])
    }

    #[test]
    fn test_assemble_contents_order() {
        let record = RawRecord::new("t", "c")
            .with_description(["d1", "d2"])
            .with_features(["f1"])
            .with_details(Details::from("Brand: Acme, Manufacturer: Acme"));
        assert_eq!(assemble_contents(&record), "d1\nd2\nf1\nBrand: Acme, : Acme\n");
    }

    #[test]
    fn test_assemble_contents_skips_empty_blocks() {
        let record = RawRecord::new("t", "c")
            .with_features(["only"])
            .with_details(Details::from(""));
        assert_eq!(assemble_contents(&record), "only\n");
    }

    #[test]
    fn test_render_prompt_shape() {
        let prompt = render_prompt("Electronics", "Some laptop", 121.6);
        assert_eq!(
            prompt,
            "How much does this cost to the nearest dollar?\n\nMain_Category: Electronics\n\nSome laptop\n\nPrice is $122.00"
        );
    }

    #[test]
    fn test_byte_level_truncation() {
        let curator = Curator::new(ByteTokenizer);
        let item = curator.curate(&long_record(), 24.99).unwrap();

        assert!(item.included());
        let prompt = item.prompt_text().unwrap();
        // "Desk Lamp\n" plus the first 150 bytes of scrubbed description
        let body = prompt.split("\n\n").nth(2).unwrap();
        assert_eq!(body.len(), MAX_TOKENS);
        assert!(body.starts_with("Desk Lamp\nA bright lamp"));
        assert_eq!(item.token_count(), Some(prompt.len()));
        assert!(prompt.ends_with("Price is $25.00"));
    }

    #[test]
    fn test_missing_title_is_invalid() {
        let record = RawRecord {
            title: None,
            ..long_record()
        };
        let err = Curator::new(ByteTokenizer).curate(&record, 10.0).unwrap_err();
        assert_eq!(err, CurationError::InvalidRecord { field: "title" });
    }

    #[test]
    fn test_missing_category_is_invalid() {
        let record = RawRecord {
            main_category: None,
            ..long_record()
        };
        let err = Curator::new(ByteTokenizer).curate(&record, 10.0).unwrap_err();
        assert_eq!(
            err,
            CurationError::InvalidRecord {
                field: "main_category"
            }
        );
    }

    #[test]
    fn test_tokenizer_failure_propagates() {
        let err = Curator::new(FailingTokenizer)
            .curate(&long_record(), 10.0)
            .unwrap_err();
        assert!(matches!(err, CurationError::Encoding(_)));
    }

    #[test]
    fn test_short_record_never_reaches_tokenizer() {
        let record = RawRecord::new("Pen", "Office").with_description(["Blue ink."]);
        let item = Curator::new(FailingTokenizer).curate(&record, 1.0).unwrap();
        assert_eq!(item.rejection(), Some(Rejection::TooFewChars { chars: 10 }));
        assert_eq!(item.test_prompt(), None);
    }

    #[test]
    fn test_test_prompt_withholds_price() {
        let item = Curator::new(ByteTokenizer)
            .curate(&long_record(), 24.99)
            .unwrap();
        let test_prompt = item.test_prompt().unwrap();
        assert!(test_prompt.ends_with(PRICE_PREFIX));
        assert!(!test_prompt.contains("25.00"));
        assert!(item.prompt_text().unwrap().starts_with(test_prompt));
    }

    #[test]
    fn test_display() {
        let item = Curator::new(ByteTokenizer)
            .curate(&long_record(), 24.5)
            .unwrap();
        assert_eq!(item.to_string(), "<Desk Lamp = $24.5>");

        // Whole-dollar prices keep their fractional zero
        let item = Curator::new(ByteTokenizer)
            .curate(&long_record(), 122.0)
            .unwrap();
        assert_eq!(item.to_string(), "<Desk Lamp = $122.0>");
    }
}
