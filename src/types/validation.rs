use std::collections::BTreeMap;

use axum::http::Uri;

use crate::error::{Error, Result};

pub const MAX_ID_LEN: usize = 100;
pub const MAX_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 1000;

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

/// Checks `value` against `^[A-Za-z0-9_][A-Za-z0-9-_]*$` and the given length cap.
pub fn validate_identifier(value: &str, field: &str, max_len: usize) -> Result<()> {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(Error::bad_request(format!("{field} cannot be empty")));
    };
    if value.len() > max_len {
        return Err(Error::bad_request(format!(
            "{field} cannot exceed {max_len} characters"
        )));
    }
    if !is_identifier_start(first) || !chars.all(is_identifier_char) {
        return Err(Error::bad_request(format!(
            "{field} '{value}' must start with an alphanumeric character or underscore and \
             contain only alphanumeric characters, hyphens, and underscores"
        )));
    }
    Ok(())
}

pub fn validate_max_len(value: &str, field: &str, max_len: usize) -> Result<()> {
    if value.len() > max_len {
        return Err(Error::bad_request(format!(
            "{field} cannot exceed {max_len} characters"
        )));
    }
    Ok(())
}

pub fn require<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::bad_request(format!("{field} is required")));
    }
    Ok(trimmed)
}

/// Configuration maps are keyed by identifiers.
pub fn validate_configuration(config: &BTreeMap<String, String>, field: &str) -> Result<()> {
    for key in config.keys() {
        validate_identifier(key, &format!("{field} key"), MAX_ID_LEN)?;
    }
    Ok(())
}

/// Parses an absolute URI (scheme and authority are mandatory).
pub fn parse_uri(value: &str, field: &str) -> Result<Uri> {
    let uri: Uri = value
        .trim()
        .parse()
        .map_err(|e| Error::bad_request(format!("{field} '{value}' is not a valid URI: {e}")))?;
    if uri.scheme().is_none() || uri.authority().is_none() {
        return Err(Error::bad_request(format!(
            "{field} '{value}' must be an absolute URI with a scheme and host"
        )));
    }
    Ok(uri)
}

/// Comparison key for endpoint URLs: scheme and host are case-insensitive, userinfo,
/// path and query are compared exactly.
pub fn url_key(value: &str) -> Result<String> {
    let uri = parse_uri(value, "url")?;
    let scheme = uri.scheme_str().unwrap_or_default().to_ascii_lowercase();
    let host = uri.host().unwrap_or_default().to_ascii_lowercase();
    let mut key = format!("{scheme}://");
    if let Some((userinfo, _)) = uri.authority().and_then(|a| a.as_str().rsplit_once('@')) {
        key.push_str(userinfo);
        key.push('@');
    }
    key.push_str(&host);
    if let Some(port) = uri.port_u16() {
        key.push_str(&format!(":{port}"));
    }
    key.push_str(uri.path());
    if let Some(query) = uri.query() {
        key.push('?');
        key.push_str(query);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_accepts_valid_names() {
        for name in ["mlflow", "_private", "a-b_c", "0abc", "S3-store"] {
            assert!(validate_identifier(name, "id", MAX_ID_LEN).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_identifier_rejects_invalid_names() {
        for name in ["", "-leading", "has space", "dot.name", "slash/name"] {
            assert!(validate_identifier(name, "id", MAX_ID_LEN).is_err(), "{name}");
        }
        let long = "a".repeat(MAX_ID_LEN + 1);
        assert!(validate_identifier(&long, "id", MAX_ID_LEN).is_err());
    }

    #[test]
    fn test_configuration_keys_must_be_identifiers() {
        let mut config = BTreeMap::new();
        config.insert("endpoint_url".to_string(), "x".to_string());
        assert!(validate_configuration(&config, "configuration").is_ok());
        config.insert("bad key".to_string(), "x".to_string());
        assert!(validate_configuration(&config, "configuration").is_err());
    }

    #[test]
    fn test_parse_uri_requires_scheme_and_host() {
        assert!(parse_uri("http://mlflow.example.com:5000", "url").is_ok());
        assert!(parse_uri("/relative/path", "url").is_err());
        assert!(parse_uri("not a uri", "url").is_err());
    }

    #[test]
    fn test_url_key_host_case_insensitive_path_exact() {
        assert_eq!(
            url_key("HTTP://MinIO.Example.com:9000/Bucket").unwrap(),
            url_key("http://minio.example.com:9000/Bucket").unwrap()
        );
        assert_ne!(
            url_key("http://minio.example.com/Bucket").unwrap(),
            url_key("http://minio.example.com/bucket").unwrap()
        );
    }

    #[test]
    fn test_url_key_keeps_userinfo() {
        assert_ne!(
            url_key("http://alice@minio.example.com/").unwrap(),
            url_key("http://bob@minio.example.com/").unwrap()
        );
        assert_ne!(
            url_key("http://alice@minio.example.com/").unwrap(),
            url_key("http://minio.example.com/").unwrap()
        );
        assert_eq!(
            url_key("http://alice:pw@MinIO.example.com:9000/").unwrap(),
            "http://alice:pw@minio.example.com:9000/"
        );
    }
}
