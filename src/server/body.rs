//! JSON/YAML request decoding and `Accept`-negotiated replies.

use axum::{
    extract::{FromRequest, FromRequestParts, Request},
    http::{HeaderMap, HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use serde::{Serialize, de::DeserializeOwned};

use super::response::ApiError;

pub const YAML_CONTENT_TYPE: &str = "application/x-yaml";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Body encoding for requests and replies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    #[default]
    Json,
    Yaml,
}

fn media_types(value: &str) -> impl Iterator<Item = String> + '_ {
    value.split(',').filter_map(|part| {
        let media = part.split(';').next()?.trim().to_ascii_lowercase();
        (!media.is_empty()).then_some(media)
    })
}

fn is_yaml(media: &str) -> bool {
    matches!(
        media,
        "application/x-yaml" | "text/x-yaml" | "application/yaml" | "text/yaml"
    ) || media.ends_with("+yaml")
}

fn is_json(media: &str) -> bool {
    media == "application/json" || media.ends_with("+json")
}

impl Format {
    /// Request body format from a `Content-Type` value. Anything not YAML is JSON.
    pub fn from_content_type(value: Option<&str>) -> Self {
        match value.and_then(|v| media_types(v).next()) {
            Some(media) if is_yaml(&media) => Format::Yaml,
            _ => Format::Json,
        }
    }

    /// Reply format from an `Accept` value. YAML only when asked for unambiguously.
    pub fn from_accept(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Format::Json;
        };
        let media: Vec<String> = media_types(value).collect();
        if media.iter().any(|m| is_yaml(m)) && !media.iter().any(|m| is_json(m)) {
            Format::Yaml
        } else {
            Format::Json
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Format::Json => JSON_CONTENT_TYPE,
            Format::Yaml => YAML_CONTENT_TYPE,
        }
    }

    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T, ApiError> {
        match self {
            Format::Json => serde_json::from_slice(bytes)
                .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}"))),
            Format::Yaml => serde_yaml::from_slice(bytes)
                .map_err(|e| ApiError::bad_request(format!("invalid YAML body: {e}"))),
        }
    }

    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>, ApiError> {
        match self {
            Format::Json => serde_json::to_vec(value)
                .map_err(|e| ApiError::internal(format!("failed to encode JSON: {e}"))),
            Format::Yaml => serde_yaml::to_string(value)
                .map(String::into_bytes)
                .map_err(|e| ApiError::internal(format!("failed to encode YAML: {e}"))),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: header::HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

impl<S: Send + Sync> FromRequestParts<S> for Format {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Format::from_accept(header_str(&parts.headers, header::ACCEPT)))
    }
}

/// A request body decoded according to its `Content-Type`.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let format = Format::from_content_type(header_str(req.headers(), header::CONTENT_TYPE));
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read request body: {e}")))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(ApiError::bad_request("request body is empty"));
        }
        format.decode(&bytes).map(Payload)
    }
}

/// A domain value rendered in the negotiated format.
pub struct Reply<T> {
    format: Format,
    status: StatusCode,
    value: T,
}

impl<T: Serialize> Reply<T> {
    pub fn ok(format: Format, value: T) -> Self {
        Self {
            format,
            status: StatusCode::OK,
            value,
        }
    }

    pub fn created(format: Format, value: T) -> Self {
        Self {
            format,
            status: StatusCode::CREATED,
            value,
        }
    }
}

impl<T: Serialize> IntoResponse for Reply<T> {
    fn into_response(self) -> Response {
        match self.format.encode(&self.value) {
            Ok(body) => (
                self.status,
                [(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(self.format.content_type()),
                )],
                body,
            )
                .into_response(),
            Err(err) => err.into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_selection() {
        assert_eq!(Format::from_content_type(None), Format::Json);
        assert_eq!(
            Format::from_content_type(Some("application/json; charset=utf-8")),
            Format::Json
        );
        for yaml in [
            "application/x-yaml",
            "text/x-yaml",
            "application/yaml",
            "application/vnd.fuseml+yaml",
        ] {
            assert_eq!(Format::from_content_type(Some(yaml)), Format::Yaml, "{yaml}");
        }
        assert_eq!(Format::from_content_type(Some("text/plain")), Format::Json);
    }

    #[test]
    fn test_accept_selection() {
        assert_eq!(Format::from_accept(None), Format::Json);
        assert_eq!(Format::from_accept(Some("*/*")), Format::Json);
        assert_eq!(Format::from_accept(Some("application/x-yaml")), Format::Yaml);
        assert_eq!(
            Format::from_accept(Some("application/x-yaml, application/json")),
            Format::Json
        );
    }

    #[test]
    fn test_decode_yaml_and_json() {
        #[derive(serde::Deserialize)]
        struct Named {
            name: String,
        }
        let yaml: Named = Format::Yaml.decode(b"name: cs1\n").unwrap();
        assert_eq!(yaml.name, "cs1");
        let json: Named = Format::Json.decode(br#"{"name": "cs2"}"#).unwrap();
        assert_eq!(json.name, "cs2");
        assert!(Format::Json.decode::<Named>(b"name: cs1").is_err());
    }

    #[test]
    fn test_decode_rejects_unknown_keys() {
        let err = Format::Yaml
            .decode::<crate::types::Codeset>(b"name: cs1\nproject: p\nbranch: main\n")
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("branch"), "{}", err.message);
    }
}
