use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Monetary amount in the store currency
pub type Amount = Decimal;

/// Backend totals arrive either as JSON numbers or as numeric strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

/// Parse an amount from its textual form, tolerating surrounding whitespace.
pub fn parse_amount(raw: &str) -> Option<Amount> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Decimal::from_str(trimmed).ok()
}

/// Serde adapter for fields that accept `number | string`.
pub mod amount {
    use super::*;
    use serde::Serializer;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Amount, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawAmount::deserialize(deserializer)?;
        let text = match &raw {
            RawAmount::Number(n) => n.to_string(),
            RawAmount::Text(s) => s.clone(),
        };
        parse_amount(&text)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid amount: {:?}", text)))
    }

    pub fn serialize<S>(value: &Amount, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_string())
    }
}
