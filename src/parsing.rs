//! Normalization of oracle output.
//!
//! The oracle is asked for bare JSON but often wraps it in markdown fences.
//! These helpers strip that formatting and turn whatever came back into a
//! [`PriceOutcome`]. Nothing in here fails: any valid JSON is a record, and
//! text that does not parse becomes a [`NormalizedError::ParseError`]
//! carrying the cleaned text.

use crate::error::GatewayError;
use crate::types::{NormalizedError, PriceOutcome, PriceRecord};
use serde_json::Value;

const FENCE: &str = "```";
const FENCE_TAG: &str = "json";

/// Remove markdown code-fence markers and trim.
///
/// Every `` ``` `` is dropped. An opener tagged `json` (any ASCII case) also
/// loses its tag and the whitespace after it.
pub fn strip_code_fences(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(idx) = rest.find(FENCE) {
        out.push_str(&rest[..idx]);
        rest = &rest[idx + FENCE.len()..];
        let tagged = rest
            .get(..FENCE_TAG.len())
            .is_some_and(|t| t.eq_ignore_ascii_case(FENCE_TAG));
        if tagged {
            rest = rest[FENCE_TAG.len()..].trim_start();
        }
    }
    out.push_str(rest);

    out.trim().to_string()
}

/// Turn raw oracle text into a price outcome.
///
/// The parsed value is the record; its fields are not validated.
pub fn normalize_price_text(text: &str) -> PriceOutcome {
    let cleaned = strip_code_fences(text);
    match serde_json::from_str::<Value>(&cleaned) {
        Ok(value) => PriceOutcome::Record(PriceRecord::new(value)),
        Err(_) => PriceOutcome::Failed(NormalizedError::ParseError { raw: cleaned }),
    }
}

/// Turn a failed oracle call into a price outcome.
pub fn normalize_transport_error(err: &GatewayError) -> PriceOutcome {
    PriceOutcome::Failed(NormalizedError::TransportError {
        message: err.to_string(),
    })
}

/// Shorten text for log lines.
pub fn truncate_for_log(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WHEAT: &str = r#"{"commodity":"Wheat","state":"Punjab","district":"Ludhiana","market":"Ludhiana Mandi","price":2100,"unit":"quintal","source":"estimate"}"#;

    #[test]
    fn test_strip_tagged_fence() {
        let text = format!("```json\n{WHEAT}\n```");
        assert_eq!(strip_code_fences(&text), WHEAT);
    }

    #[test]
    fn test_strip_plain_fence() {
        let text = format!("```\n{WHEAT}\n```\n");
        assert_eq!(strip_code_fences(&text), WHEAT);
    }

    #[test]
    fn test_strip_uppercase_tag() {
        assert_eq!(strip_code_fences("```JSON {\"a\":1} ```"), "{\"a\":1}");
    }

    #[test]
    fn test_strip_leaves_bare_text_alone() {
        assert_eq!(strip_code_fences("  {\"a\": 1}\n"), "{\"a\": 1}");
        assert_eq!(strip_code_fences(""), "");
    }

    #[test]
    fn test_fenced_and_bare_normalize_identically() {
        let fenced = format!("```json\n{WHEAT}\n```");
        assert_eq!(normalize_price_text(&fenced), normalize_price_text(WHEAT));
        assert!(matches!(normalize_price_text(&fenced), PriceOutcome::Record(_)));
    }

    #[test]
    fn test_normalize_valid_record() {
        match normalize_price_text(WHEAT) {
            PriceOutcome::Record(record) => {
                assert_eq!(record.commodity(), Some("Wheat"));
                assert_eq!(record.price(), Some(&json!(2100)));
                assert_eq!(
                    serde_json::to_value(&record).unwrap(),
                    serde_json::from_str::<serde_json::Value>(WHEAT).unwrap()
                );
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_prose_is_parse_error() {
        let text = "```json\nSorry, I cannot browse live mandi prices.\n```";
        assert_eq!(
            normalize_price_text(text),
            PriceOutcome::Failed(NormalizedError::ParseError {
                raw: "Sorry, I cannot browse live mandi prices.".into()
            })
        );
    }

    #[test]
    fn test_normalize_keeps_unexpected_shapes() {
        let ranged = WHEAT.replace("2100", "\"2100-2300\"");
        match normalize_price_text(&ranged) {
            PriceOutcome::Record(record) => assert_eq!(record.price(), Some(&json!("2100-2300"))),
            other => panic!("expected record, got {:?}", other),
        }

        let no_source = r#"{"commodity":"Wheat","state":"Punjab","district":"Ludhiana","market":"Ludhiana Mandi","price":2100,"unit":"quintal"}"#;
        match normalize_price_text(no_source) {
            PriceOutcome::Record(record) => assert_eq!(record.missing_fields(), vec!["source"]),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_empty_object_is_record() {
        assert_eq!(
            normalize_price_text("{}"),
            PriceOutcome::Record(PriceRecord::new(json!({})))
        );
    }

    #[test]
    fn test_normalize_truncated_json_is_parse_error() {
        let text = r#"{"commodity": "Wheat", "price": 21"#;
        assert_eq!(
            normalize_price_text(text),
            PriceOutcome::Failed(NormalizedError::ParseError { raw: text.into() })
        );
    }

    #[test]
    fn test_normalize_transport_error() {
        let err = GatewayError::HttpError {
            status: 503,
            body: "overloaded".into(),
        };
        match normalize_transport_error(&err) {
            PriceOutcome::Failed(NormalizedError::TransportError { message }) => {
                assert_eq!(message, "HTTP 503: overloaded");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_record_with_fractional_price() {
        let text = json!({
            "commodity": "Onion", "state": "Maharashtra", "district": "Nashik",
            "market": "Lasalgaon", "price": 1850.5, "unit": "quintal", "source": "estimate"
        })
        .to_string();
        match normalize_price_text(&text) {
            PriceOutcome::Record(record) => assert_eq!(record.price(), Some(&json!(1850.5))),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_truncate_for_log() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc");
        assert_eq!(truncate_for_log("ab", 3), "ab");
        assert_eq!(truncate_for_log("éééé", 2), "éé");
    }
}
