//! The shared completion handler.
//!
//! # Design
//! Every transport funnels its raw outcome through [`handle_complete`], so
//! status classification and body coercion have exactly one definition.
//! Anything but 200 is a failure. A 200 body is coerced in priority order:
//! JSON-shaped text is parsed (and a parse failure is final), then the
//! literals `true`/`false`, then numeric text, and otherwise the text is
//! returned as-is. Nothing is trimmed before classification.

use serde_json::{Number, Value};

use crate::error::{Error, HttpError, HttpParseError};
use crate::http::{RawResponse, Response};

/// First and last characters are a matching `{}` or `[]` pair.
pub fn is_json(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    (text.starts_with('{') && text.ends_with('}'))
        || (text.starts_with('[') && text.ends_with(']'))
}

/// Optionally signed integer or decimal, with an optional exponent.
pub fn is_numeric(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut i = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_digits = count_digits(&bytes[i..]);
    i += int_digits;
    let mut frac_digits = 0;
    if bytes.get(i) == Some(&b'.') {
        i += 1;
        frac_digits = count_digits(&bytes[i..]);
        i += frac_digits;
    }
    if int_digits == 0 && frac_digits == 0 {
        return false;
    }

    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_digits = count_digits(&bytes[i..]);
        if exp_digits == 0 {
            return false;
        }
        i += exp_digits;
    }

    i == bytes.len()
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

/// Coerce a 200 body into its most specific value.
pub fn coerce(text: &str) -> Result<Value, HttpParseError> {
    if is_json(text) {
        return serde_json::from_str(text).map_err(|e| HttpParseError::new(text, e));
    }
    match text {
        "true" => return Ok(Value::Bool(true)),
        "false" => return Ok(Value::Bool(false)),
        _ => {}
    }
    if is_numeric(text) {
        // Overflowing literals (e.g. "1e400") are not finite and stay text.
        if let Some(number) = text.parse::<f64>().ok().and_then(Number::from_f64) {
            return Ok(Value::Number(number));
        }
    }
    Ok(Value::String(text.to_string()))
}

/// Classify a finished response and normalize its body.
pub fn handle_complete(raw: RawResponse) -> Result<Response, Error> {
    if raw.status != 200 {
        tracing::debug!(status = raw.status, "request failed with non-200 status");
        return Err(HttpError::new(
            Some(raw.status),
            Some(raw.body.as_str()),
            raw.status_text.as_deref(),
        )
        .into());
    }

    let data = coerce(&raw.body).map_err(|e| {
        tracing::warn!(response_text = %e.response_text, error = %e.parse_error, "response body is not valid JSON");
        e
    })?;
    Ok(Response {
        data,
        headers: raw.headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(body: &str) -> RawResponse {
        RawResponse {
            status: 200,
            status_text: Some("OK".to_string()),
            body: body.to_string(),
            headers: Default::default(),
        }
    }

    #[test]
    fn is_json_detects_objects_and_arrays() {
        assert!(is_json("{}"));
        assert!(is_json(r#"{"name":"phil"}"#));
        assert!(is_json("[1,2,3]"));
        assert!(is_json("{not-json}"));
    }

    #[test]
    fn is_json_rejects_other_text() {
        assert!(!is_json(""));
        assert!(!is_json(" {}"));
        assert!(!is_json("{]"));
        assert!(!is_json("[}"));
        assert!(!is_json("hello"));
        assert!(!is_json("{"));
    }

    #[test]
    fn is_numeric_accepts_numbers() {
        for text in ["123", "-1", "+4", "1.5", "-0.25", ".5", "5.", "1e3", "2.5E-2"] {
            assert!(is_numeric(text), "{text}");
        }
    }

    #[test]
    fn is_numeric_rejects_non_numbers() {
        for text in ["", "-", ".", "1e", "abc", "12a", " 12", "12 ", "NaN", "inf", "0x10", "1.2.3"] {
            assert!(!is_numeric(text), "{text}");
        }
    }

    #[test]
    fn resolves_string_unchanged() {
        let response = handle_complete(ok("hello")).unwrap();
        assert_eq!(response.data, json!("hello"));
    }

    #[test]
    fn resolves_number() {
        assert_eq!(handle_complete(ok("123")).unwrap().data, json!(123.0));
        assert_eq!(handle_complete(ok("-1.5")).unwrap().data, json!(-1.5));
    }

    #[test]
    fn resolves_booleans() {
        assert_eq!(handle_complete(ok("true")).unwrap().data, json!(true));
        assert_eq!(handle_complete(ok("false")).unwrap().data, json!(false));
        assert_eq!(handle_complete(ok("True")).unwrap().data, json!("True"));
    }

    #[test]
    fn resolves_json_object_and_array() {
        assert_eq!(
            handle_complete(ok(r#"{"name":"phil"}"#)).unwrap().data,
            json!({ "name": "phil" })
        );
        assert_eq!(handle_complete(ok("[1,2,3]")).unwrap().data, json!([1, 2, 3]));
    }

    #[test]
    fn empty_body_is_empty_string() {
        assert_eq!(handle_complete(ok("")).unwrap().data, json!(""));
    }

    #[test]
    fn leading_whitespace_is_not_json() {
        assert_eq!(handle_complete(ok(" {}")).unwrap().data, json!(" {}"));
    }

    #[test]
    fn overflowing_number_stays_text() {
        assert_eq!(handle_complete(ok("1e400")).unwrap().data, json!("1e400"));
    }

    #[test]
    fn malformed_json_rejects_with_parse_error() {
        let err = handle_complete(ok("{not-json}")).unwrap_err();
        match err {
            Error::Parse(e) => {
                assert_eq!(e.response_text, "{not-json}");
                assert_eq!(e.message, "Failed to parse: \"{not-json}\"");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn non_200_rejects_with_status_error() {
        let raw = RawResponse {
            status: 404,
            status_text: Some("Not Found".to_string()),
            body: "not found".to_string(),
            headers: Default::default(),
        };
        match handle_complete(raw).unwrap_err() {
            Error::Status(e) => {
                assert_eq!(e.status, 404);
                assert_eq!(e.message, "not found");
                assert_eq!(e.status_text.as_deref(), Some("Not Found"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[test]
    fn non_200_with_empty_body_uses_default_message() {
        let raw = RawResponse {
            status: 503,
            ..Default::default()
        };
        let err = handle_complete(raw).unwrap_err();
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "Failed while making Http request.");
    }

    #[test]
    fn other_2xx_statuses_are_failures() {
        for status in [201, 204, 301] {
            let raw = RawResponse {
                status,
                body: "{}".to_string(),
                ..Default::default()
            };
            assert_eq!(handle_complete(raw).unwrap_err().status(), Some(status));
        }
    }

    #[test]
    fn response_headers_pass_through() {
        let mut raw = ok("hello");
        raw.headers.insert("x-id".to_string(), "7".to_string());
        let response = handle_complete(raw).unwrap();
        assert_eq!(response.headers["x-id"], "7");
    }
}
