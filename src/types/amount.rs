//! Lenient monetary amount decoding
//!
//! Snapshot documents carry amounts either as JSON numbers or as strings,
//! and strings may use a comma as the decimal separator ("1500,75").
//! Everything is normalized into `Decimal` at the deserialization boundary so
//! the aggregation code never sees raw text.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

/// Parse a textual amount, accepting both `.` and `,` as decimal separator
///
/// # Returns
///
/// * `Ok(Decimal)` - The parsed amount
/// * `Err(String)` - If the text is empty or not a number
pub fn parse_amount(raw: &str) -> Result<Decimal, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty amount".to_string());
    }

    let normalized = trimmed.replace(',', ".");
    Decimal::from_str(&normalized)
        .or_else(|_| Decimal::from_scientific(&normalized))
        .map_err(|_| format!("invalid amount '{}'", raw))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawAmount {
    Number(serde_json::Number),
    Text(String),
}

impl RawAmount {
    fn into_decimal(self) -> Result<Decimal, String> {
        match self {
            RawAmount::Number(number) => parse_amount(&number.to_string()),
            RawAmount::Text(text) => parse_amount(&text),
        }
    }
}

/// `deserialize_with` target for required amounts
pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    RawAmount::deserialize(deserializer)?
        .into_decimal()
        .map_err(serde::de::Error::custom)
}

/// `deserialize_with` target for optional amounts
///
/// `null` and blank strings both decode to `None`.
pub fn deserialize_opt<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<RawAmount>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawAmount::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(raw) => raw.into_decimal().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Holder {
        #[serde(deserialize_with = "deserialize")]
        amount: Decimal,
        #[serde(default, deserialize_with = "deserialize_opt")]
        extra: Option<Decimal>,
    }

    #[rstest]
    #[case::dot("1500.75", Decimal::new(150075, 2))]
    #[case::comma("1500,75", Decimal::new(150075, 2))]
    #[case::padded("  42 ", Decimal::new(42, 0))]
    #[case::scientific("1e3", Decimal::new(1000, 0))]
    fn test_parse_amount_valid(#[case] raw: &str, #[case] expected: Decimal) {
        assert_eq!(parse_amount(raw).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::letters("abc")]
    fn test_parse_amount_invalid(#[case] raw: &str) {
        assert!(parse_amount(raw).is_err());
    }

    #[rstest]
    #[case::number(r#"{"amount": 1000}"#, Decimal::new(1000, 0), None)]
    #[case::float(r#"{"amount": 12.5, "extra": 3}"#, Decimal::new(125, 1), Some(Decimal::new(3, 0)))]
    #[case::string(r#"{"amount": "1000,50", "extra": null}"#, Decimal::new(100050, 2), None)]
    #[case::blank_extra(r#"{"amount": "7", "extra": ""}"#, Decimal::new(7, 0), None)]
    fn test_deserialize_forms(
        #[case] json: &str,
        #[case] amount: Decimal,
        #[case] extra: Option<Decimal>,
    ) {
        let holder: Holder = serde_json::from_str(json).unwrap();
        assert_eq!(holder.amount, amount);
        assert_eq!(holder.extra, extra);
    }

    #[test]
    fn test_deserialize_rejects_garbage() {
        let result: Result<Holder, _> = serde_json::from_str(r#"{"amount": "ten"}"#);
        assert!(result.is_err());
    }
}
