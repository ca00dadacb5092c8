//! Response classification.
//!
//! Turns a raw HTTP outcome (status, content type, body text) into either a
//! decoded JSON object or a classified [`ApiError`]. Kept free of I/O so every
//! branch can be exercised without a server.

use serde_json::Value;

use super::JsonMap;
use crate::error::ApiError;

/// Maps a non-success status to its error kind.
///
/// 400 and 422 carry the message reported by the API (`error.message` and
/// `message` respectively); statuses without a dedicated kind become
/// [`ErrorKind::ServerError`](crate::error::ErrorKind::ServerError) with the
/// raw status preserved.
pub fn classify_status(endpoint: &str, status: u16, body: String) -> ApiError {
    let parsed = serde_json::from_str::<Value>(&body).ok();
    let body = (!body.is_empty()).then_some(body);

    match status {
        400 => {
            let message = parsed.as_ref().and_then(|v| string_at(v, "/error/message"));
            ApiError::bad_request(endpoint, message, body)
        }
        401 => ApiError::authentication(endpoint, body),
        404 => ApiError::not_found(endpoint, body),
        422 => {
            let message = parsed.as_ref().and_then(|v| string_at(v, "/message"));
            ApiError::validation(endpoint, message, body)
        }
        429 => ApiError::rate_limited(endpoint, body),
        _ => ApiError::server(endpoint, status, body),
    }
}

/// Decodes a success body, requiring a JSON object that does not report a
/// failure.
///
/// # Errors
///
/// - [`InvalidResponse`](crate::error::ErrorKind::InvalidResponse) if the
///   content type is not JSON, the body does not parse, or the top-level value
///   is not an object
/// - [`BusinessLogic`](crate::error::ErrorKind::BusinessLogic) if the object
///   signals failure (see [`check_business_logic`])
pub fn parse_success_body(
    endpoint: &str,
    status: u16,
    content_type: Option<&str>,
    body: String,
) -> Result<JsonMap, ApiError> {
    let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("application/json"));
    if !is_json {
        let reason = format!("expected application/json, got {}", content_type.unwrap_or("no content type"));
        return Err(ApiError::invalid_response(endpoint, status, reason, Some(body)));
    }

    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            return Err(ApiError::invalid_response(
                endpoint,
                status,
                format!("malformed JSON: {e}"),
                Some(body),
            )
            .with_source(e));
        }
    };

    let Value::Object(map) = value else {
        return Err(ApiError::invalid_response(
            endpoint,
            status,
            "top-level JSON value is not an object",
            Some(body),
        ));
    };

    check_business_logic(endpoint, &map, &body)?;
    Ok(map)
}

/// Rejects success bodies that report an application-level failure.
///
/// Checks run in order and the first match wins:
/// 1. a non-null `error` field
/// 2. `success: false`, using `message`
/// 3. `status: "error"`, using `message` or `error_message`
///
/// # Errors
///
/// Returns a [`BusinessLogic`](crate::error::ErrorKind::BusinessLogic) error on
/// the first matching rule.
pub fn check_business_logic(endpoint: &str, map: &JsonMap, body: &str) -> Result<(), ApiError> {
    if let Some(error) = map.get("error").filter(|e| !e.is_null()) {
        let message = match error {
            Value::String(s) => s.clone(),
            other => string_at(other, "/message").unwrap_or_else(|| other.to_string()),
        };
        return Err(ApiError::business_logic(endpoint, message, Some(body.to_owned())));
    }

    if map.get("success") == Some(&Value::Bool(false)) {
        let message = field_str(map, "message").unwrap_or_else(|| "request was not successful".to_owned());
        return Err(ApiError::business_logic(endpoint, message, Some(body.to_owned())));
    }

    if map.get("status").and_then(Value::as_str) == Some("error") {
        let message = field_str(map, "message")
            .or_else(|| field_str(map, "error_message"))
            .unwrap_or_else(|| "unknown error".to_owned());
        return Err(ApiError::business_logic(endpoint, message, Some(body.to_owned())));
    }

    Ok(())
}

fn string_at(value: &Value, pointer: &str) -> Option<String> {
    value.pointer(pointer).and_then(Value::as_str).map(str::to_owned)
}

fn field_str(map: &JsonMap, key: &str) -> Option<String> {
    map.get(key).and_then(Value::as_str).map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const JSON: Option<&str> = Some("application/json");

    #[test]
    fn test_classify_status_kinds() {
        let cases = [
            (400, ErrorKind::BadRequest),
            (401, ErrorKind::Authentication),
            (404, ErrorKind::NotFound),
            (422, ErrorKind::Validation),
            (429, ErrorKind::RateLimited),
            (500, ErrorKind::ServerError),
            (502, ErrorKind::ServerError),
            (503, ErrorKind::ServerError),
        ];

        for (status, kind) in cases {
            let error = classify_status("/account/a", status, String::new());
            assert_eq!(error.kind(), kind, "status {status}");
            assert_eq!(error.status(), status);
            assert_eq!(error.endpoint(), "/account/a");
        }
    }

    #[test]
    fn test_classify_unmatched_4xx_is_server_error() {
        let error = classify_status("/x", 403, "forbidden".to_owned());
        assert_eq!(error.kind(), ErrorKind::ServerError);
        assert_eq!(error.status(), 403);
        assert_eq!(error.body(), Some("forbidden"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_bad_request_extracts_nested_message() {
        let body = r#"{"error":{"message":"session_id is required"}}"#.to_owned();
        let error = classify_status("/session/authenticate", 400, body);
        assert_eq!(error.message(), "Bad request: session_id is required");
    }

    #[test]
    fn test_bad_request_without_message() {
        let error = classify_status("/x", 400, "oops".to_owned());
        assert_eq!(error.message(), "Bad request: Bad request");
        assert_eq!(error.body(), Some("oops"));
    }

    #[test]
    fn test_validation_extracts_message() {
        let body = r#"{"message":"phone_number is invalid"}"#.to_owned();
        let error = classify_status("/phone", 422, body);
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(error.message(), "Validation error: phone_number is invalid");
    }

    #[test]
    fn test_parse_success_body_object() {
        let map = parse_success_body("/x", 200, JSON, r#"{"account_id":"a1"}"#.to_owned()).unwrap();
        assert_eq!(map["account_id"], "a1");
    }

    #[test]
    fn test_parse_success_body_content_type_with_charset() {
        let map = parse_success_body(
            "/x",
            200,
            Some("Application/JSON; charset=utf-8"),
            "{}".to_owned(),
        )
        .unwrap();
        assert!(map.is_empty());
    }

    #[test]
    fn test_parse_success_body_wrong_content_type() {
        let error = parse_success_body("/x", 200, Some("text/html"), "{}".to_owned()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidResponse);
        assert!(error.message().contains("text/html"));

        let error = parse_success_body("/x", 200, None, "{}".to_owned()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidResponse);
    }

    #[test]
    fn test_parse_success_body_malformed_json() {
        let error = parse_success_body("/x", 200, JSON, "{not json".to_owned()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::InvalidResponse);
        assert_eq!(error.body(), Some("{not json"));
    }

    #[test]
    fn test_parse_success_body_non_object() {
        for body in ["[1,2,3]", "\"text\"", "42", "null"] {
            let error = parse_success_body("/x", 200, JSON, body.to_owned()).unwrap_err();
            assert_eq!(error.kind(), ErrorKind::InvalidResponse, "body {body}");
        }
    }

    #[test]
    fn test_business_logic_error_key() {
        let error =
            parse_success_body("/x", 200, JSON, r#"{"error":"invalid account"}"#.to_owned()).unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BusinessLogic);
        assert_eq!(error.status(), 200);
        assert!(error.message().contains("invalid account"));
    }

    #[test]
    fn test_business_logic_error_object() {
        let error = parse_success_body("/x", 200, JSON, r#"{"error":{"message":"expired"}}"#.to_owned())
            .unwrap_err();
        assert!(error.message().contains("expired"));
    }

    #[test]
    fn test_business_logic_null_error_is_success() {
        let map = parse_success_body("/x", 200, JSON, r#"{"error":null,"ok":1}"#.to_owned()).unwrap();
        assert_eq!(map["ok"], 1);
    }

    #[test]
    fn test_business_logic_success_false() {
        let error =
            parse_success_body("/x", 200, JSON, r#"{"success":false,"message":"list exists"}"#.to_owned())
                .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::BusinessLogic);
        assert!(error.message().contains("list exists"));
    }

    #[test]
    fn test_business_logic_success_true_passes() {
        assert!(parse_success_body("/x", 200, JSON, r#"{"success":true}"#.to_owned()).is_ok());
    }

    #[test]
    fn test_business_logic_status_error() {
        let error = parse_success_body(
            "/x",
            200,
            JSON,
            r#"{"status":"error","error_message":"phone unreachable"}"#.to_owned(),
        )
        .unwrap_err();
        assert!(error.message().contains("phone unreachable"));

        let error =
            parse_success_body("/x", 200, JSON, r#"{"status":"error","message":"m"}"#.to_owned())
                .unwrap_err();
        assert!(error.message().ends_with(": m"));
    }

    #[test]
    fn test_business_logic_precedence_error_key_first() {
        let body = r#"{"error":"from error","success":false,"message":"from message"}"#;
        let error = parse_success_body("/x", 200, JSON, body.to_owned()).unwrap_err();
        assert!(error.message().contains("from error"));
    }
}
