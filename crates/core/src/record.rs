//! Raw product-listing records as they arrive from the upstream dataset.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// A raw product listing, one JSON object per line.
///
/// `title` and `main_category` are optional here so that a record with a
/// missing or non-text value still deserializes; the curator reports those
/// as invalid records.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
    #[serde(default, deserialize_with = "text_or_absent")]
    pub title: Option<String>,
    #[serde(default, alias = "mainCategory", deserialize_with = "text_or_absent")]
    pub main_category: Option<String>,
    #[serde(default, deserialize_with = "fragments")]
    pub description: Vec<String>,
    #[serde(default, deserialize_with = "fragments")]
    pub features: Vec<String>,
    #[serde(default)]
    pub details: Option<Details>,
    /// Listed price, in whatever shape the source gives it. See [`parse_price`].
    #[serde(default)]
    pub price: Option<Value>,
}

impl RawRecord {
    pub fn new(title: impl Into<String>, main_category: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            main_category: Some(main_category.into()),
            ..Default::default()
        }
    }

    pub fn with_description<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.description = fragments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_features<I, S>(mut self, fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = fragments.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_details(mut self, details: Details) -> Self {
        self.details = Some(details);
        self
    }
}

/// Structured product details.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Details {
    /// Details already serialized as text, e.g. `"Brand: Dell, Color: Silver"`.
    Text(String),
    /// Attribute name to value, in source order.
    Map(Map<String, Value>),
}

impl Details {
    pub fn is_empty(&self) -> bool {
        match self {
            Details::Text(text) => text.is_empty(),
            Details::Map(map) => map.is_empty(),
        }
    }
}

impl From<&str> for Details {
    fn from(text: &str) -> Self {
        Details::Text(text.to_string())
    }
}

impl From<Map<String, Value>> for Details {
    fn from(map: Map<String, Value>) -> Self {
        Details::Map(map)
    }
}

/// Parse a listed price into dollars.
///
/// Accepts JSON numbers and strings such as `"19.99"`, `"$1,299.00"`. Returns
/// `None` for missing, non-numeric, negative or non-finite values.
pub fn parse_price(value: &Value) -> Option<f64> {
    let price = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let cleaned: String = s.trim().trim_start_matches('$').replace(',', "");
            cleaned.trim().parse::<f64>().ok()?
        }
        _ => return None,
    };
    (price.is_finite() && price >= 0.0).then_some(price)
}

fn text_or_absent<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        _ => Ok(None),
    }
}

fn fragments<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s]),
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect()),
        other => Err(D::Error::custom(format!(
            "expected a string or a list of strings, found {other}"
        ))),
    }
}
