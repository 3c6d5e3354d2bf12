//! JSON ingestion and egress.
//!
//! [`Toolkit::read_json`] is strict: the body must hold exactly one JSON document no larger
//! than the configured cap, and by default every object key must be known to the target
//! type. Failures are mapped onto the JSON variants of [`Error`] so their messages can be
//! shown to clients as-is.
//!
//! Syntax errors win over everything else. Among data errors the first one in document order
//! is reported, so an unknown key ahead of a mistyped field yields
//! [`Error::UnknownField`].

use std::fmt::Display;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{FromRef, FromRequest, Request};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::BytesMut;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::error::Category;

use crate::Toolkit;
use crate::errors::{Error, Result};

/// Envelope used for every JSON response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonResponse<T = serde_json::Value> {
    pub error: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> JsonResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            error: false,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: message.into(),
            data: None,
        }
    }
}

impl Toolkit {
    /// Reads `body` (up to the configured JSON size cap) and decodes exactly one JSON value
    /// from it.
    pub async fn read_json<T: DeserializeOwned>(&self, body: Body) -> Result<T> {
        let limit = self.config.max_json_size();
        let mut stream = body.into_data_stream();
        let mut buf = BytesMut::new();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::UnreadableBody { message: e.to_string() })?;
            if buf.len() + chunk.len() > limit {
                return Err(Error::BodyTooLarge { limit });
            }
            buf.extend_from_slice(&chunk);
        }

        self.decode_json(&buf)
    }

    /// Decodes exactly one JSON value from `bytes`, applying the unknown-field policy.
    pub fn decode_json<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        if bytes.iter().all(|&b| matches!(b, b' ' | b'\t' | b'\n' | b'\r')) {
            return Err(Error::EmptyBody);
        }

        let mut de = serde_json::Deserializer::from_slice(bytes);
        let mut unknown_field: Option<String> = None;

        let decoded: std::result::Result<T, _> = {
            let mut track_unknown = |path: serde_ignored::Path<'_>| {
                unknown_field.get_or_insert_with(|| path.to_string());
            };
            let tracked = serde_ignored::Deserializer::new(&mut de, &mut track_unknown);
            serde_path_to_error::deserialize(tracked)
        };
        let reject_unknown = !self.config.allow_unknown_fields;
        let value = match decoded {
            Ok(value) => value,
            // An unknown key seen before a data error is the first problem in the body
            Err(e) if reject_unknown && unknown_field.is_some() && e.inner().classify() == Category::Data => {
                return Err(Error::UnknownField {
                    field: unknown_field.unwrap_or_default(),
                });
            }
            Err(e) => return Err(classify_decode_error(bytes, e)),
        };

        if reject_unknown {
            if let Some(field) = unknown_field {
                return Err(Error::UnknownField { field });
            }
        }

        // Only whitespace may follow the first value
        de.end().map_err(|_| Error::MultipleValues)?;

        Ok(value)
    }

    /// Serializes `data` and builds a response with `status`. Extra `headers` are merged in
    /// first (replacing same-named ones); `Content-Type` is always `application/json`.
    pub fn write_json<T: Serialize + ?Sized>(&self, status: StatusCode, data: &T, headers: Option<HeaderMap>) -> Result<Response> {
        let body = serde_json::to_vec(data)?;

        let mut response = (status, body).into_response();
        if let Some(headers) = headers {
            response.headers_mut().extend(headers);
        }
        response
            .headers_mut()
            .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(response)
    }

    /// Wraps `err`'s message in the error envelope. `status` defaults to 400.
    pub fn error_json(&self, err: &dyn Display, status: Option<StatusCode>) -> Result<Response> {
        let payload = JsonResponse::<()>::error(err.to_string());
        self.write_json(status.unwrap_or(StatusCode::BAD_REQUEST), &payload, None)
    }
}

fn classify_decode_error(bytes: &[u8], err: serde_path_to_error::Error<serde_json::Error>) -> Error {
    let path = err.path().to_string();
    let inner = err.into_inner();
    let offset = byte_offset(bytes, inner.line(), inner.column());

    match inner.classify() {
        Category::Eof => Error::TruncatedBody,
        Category::Syntax => Error::MalformedSyntax { offset },
        Category::Data => {
            // serde's type/value mismatch messages all start this way
            let message = inner.to_string();
            if message.starts_with("invalid type") || message.starts_with("invalid value") || message.starts_with("invalid length") {
                Error::WrongType {
                    field: (path != ".").then_some(path),
                    offset,
                }
            } else {
                Error::InvalidTarget { message }
            }
        }
        Category::Io => Error::InvalidTarget {
            message: inner.to_string(),
        },
    }
}

/// Converts serde_json's 1-based line/column position into a byte offset.
fn byte_offset(bytes: &[u8], line: usize, column: usize) -> usize {
    let line_start: usize = bytes
        .split(|b| *b == b'\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    (line_start + column).min(bytes.len())
}

/// Extractor running [`Toolkit::read_json`] with the toolkit found in router state.
///
/// ```ignore
/// async fn create(StrictJson(body): StrictJson<CreateNote>) -> Result<Response> { ... }
/// ```
#[derive(Debug, Clone)]
pub struct StrictJson<T>(pub T);

impl<S, T> FromRequest<S> for StrictJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
    Arc<Toolkit>: FromRef<S>,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        let toolkit = Arc::<Toolkit>::from_ref(state);
        toolkit.read_json(req.into_body()).await.map(StrictJson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToolkitConfig;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Foo {
        foo: String,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Required {
        foo: String,
    }

    fn toolkit(max_json_size: usize, allow_unknown_fields: bool) -> Toolkit {
        Toolkit::new(ToolkitConfig {
            max_json_size,
            allow_unknown_fields,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_read_json() {
        let cases: &[(&str, &str, bool, usize, bool)] = &[
            ("good json", r#"{"foo": "bar"}"#, false, 1024, false),
            ("badly formatted json", r#"{"foo": }"#, true, 1024, false),
            ("incorrect type", r#"{"foo": 5 }"#, true, 1024, false),
            ("two json files", r#"{"foo": "bar"}{"foo": "bar"}"#, true, 1024, false),
            ("empty body", "", true, 1024, false),
            ("syntax error in json", r#"{"foo": 1"}"#, true, 1024, false),
            ("unknown field", r#"{"fooo": "1"}"#, true, 1024, false),
            ("unknown field allowed", r#"{"fooo": "1"}"#, false, 1024, true),
            ("missing field name", r#"{jack: "1"}"#, true, 1024, true),
            ("file too large", r#"{"foo": "bar"}"#, true, 1, true),
            ("not json", "Hello World", true, 1024, false),
            ("trailing whitespace", "{\"foo\": \"bar\"}\n  ", false, 1024, false),
        ];

        for (name, json, error_expected, max_size, allow_unknown) in cases {
            let toolkit = toolkit(*max_size, *allow_unknown);
            let result = toolkit.read_json::<Foo>(Body::from(json.to_string())).await;

            match (error_expected, &result) {
                (true, Ok(_)) => panic!("{name}: error expected, but none received"),
                (false, Err(e)) => panic!("{name}: error not expected but one received: {e}"),
                _ => {}
            }
        }
    }

    #[tokio::test]
    async fn test_error_kinds() {
        let toolkit = toolkit(1024, false);

        let err = toolkit.decode_json::<Foo>(br#"{"foo": }"#).unwrap_err();
        assert!(matches!(err, Error::MalformedSyntax { .. }), "{err:?}");

        let err = toolkit.decode_json::<Foo>(br#"{"foo": 5}"#).unwrap_err();
        assert!(matches!(err, Error::WrongType { field: Some(ref f), .. } if f == "foo"), "{err:?}");
        assert_eq!(err.to_string(), "body contains incorrect JSON type for field \"foo\"");

        let err = toolkit.decode_json::<Foo>(br#"{"foo": "bar"}{"foo": "bar"}"#).unwrap_err();
        assert!(matches!(err, Error::MultipleValues), "{err:?}");

        let err = toolkit.decode_json::<Foo>(b"").unwrap_err();
        assert!(matches!(err, Error::EmptyBody), "{err:?}");

        let err = toolkit.decode_json::<Foo>(br#"{"foo": "ba"#).unwrap_err();
        assert!(matches!(err, Error::TruncatedBody), "{err:?}");

        let err = toolkit.decode_json::<Foo>(br#"{"fooo": "1", "foo": "x"}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownField { ref field } if field == "fooo"), "{err:?}");

        let err = toolkit.decode_json::<Foo>(br#"{"fooo": 1, "foo": 5}"#).unwrap_err();
        assert!(matches!(err, Error::UnknownField { ref field } if field == "fooo"), "{err:?}");

        let err = toolkit.decode_json::<Foo>(br#"{"foo": 5, "fooo": 1}"#).unwrap_err();
        assert!(matches!(err, Error::WrongType { .. }), "{err:?}");

        let err = toolkit.decode_json::<Foo>(b"\x0c").unwrap_err();
        assert!(matches!(err, Error::MalformedSyntax { .. }), "{err:?}");

        let err = toolkit.decode_json::<Foo>(b" \t\r\n").unwrap_err();
        assert!(matches!(err, Error::EmptyBody), "{err:?}");

        let err = toolkit.decode_json::<Required>(br#"{}"#).unwrap_err();
        assert!(matches!(err, Error::InvalidTarget { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_body_too_large_names_limit() {
        let toolkit = toolkit(8, false);
        let err = toolkit
            .read_json::<Foo>(Body::from(r#"{"foo": "bar"}"#))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::BodyTooLarge { limit: 8 }));
        assert_eq!(err.to_string(), "body must not be larger than 8 bytes");
    }

    #[test]
    fn test_unknown_field_allowed() {
        let toolkit = toolkit(1024, true);
        let foo: Foo = toolkit.decode_json(br#"{"fooo": "1", "foo": "x"}"#).unwrap();
        assert_eq!(foo.foo, "x");
    }

    #[test]
    fn test_syntax_error_offset() {
        let toolkit = toolkit(1024, false);
        let err = toolkit.decode_json::<Foo>(b"{\n\"foo\": }").unwrap_err();
        match err {
            // points into the second line, at or just past the closing brace
            Error::MalformedSyntax { offset } => assert!((9..=10).contains(&offset), "{offset}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_byte_offset() {
        assert_eq!(byte_offset(b"abc", 1, 2), 2);
        assert_eq!(byte_offset(b"ab\ncd", 2, 1), 4);
        assert_eq!(byte_offset(b"ab", 5, 9), 2);
    }

    #[tokio::test]
    async fn test_write_json() {
        let toolkit = Toolkit::default();
        let payload = JsonResponse::ok("foo", serde_json::json!({"answer": 42}));

        let mut headers = HeaderMap::new();
        headers.insert("FOO", HeaderValue::from_static("BAR"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));

        let response = toolkit.write_json(StatusCode::ACCEPTED, &payload, Some(headers)).unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["foo"], "BAR");
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let decoded: JsonResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_envelope_without_data_decodes() {
        let envelope: JsonResponse<Required> = serde_json::from_str(r#"{"error": true, "message": "nope"}"#).unwrap();
        assert!(envelope.error);
        assert!(envelope.data.is_none());

        let envelope: JsonResponse<Required> =
            serde_json::from_str(r#"{"error": false, "message": "ok", "data": {"foo": "x"}}"#).unwrap();
        assert_eq!(envelope.data.unwrap().foo, "x");
    }

    #[tokio::test]
    async fn test_error_json() {
        let toolkit = Toolkit::default();
        let response = toolkit
            .error_json(&"some error", Some(StatusCode::SERVICE_UNAVAILABLE))
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: JsonResponse = serde_json::from_slice(&body).unwrap();
        assert!(payload.error);
        assert_eq!(payload.message, "some error");
        assert!(payload.data.is_none());
    }

    #[tokio::test]
    async fn test_error_json_defaults_to_bad_request() {
        let response = Toolkit::default().error_json(&Error::EmptyBody, None).unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
