//! Access-key authentication.
//!
//! Clients authenticate every protected request with two headers:
//! - `X-Access-Key`: the 32-hex-char access key
//! - `X-Secret-Key`: the matching 64-hex-char secret key
//!
//! The pair is checked against the credential store by
//! [`crate::metadata::credentials::CredentialStore::verify`]; this module
//! only extracts the headers and provides the constant-time comparison used
//! for secrets.

use axum::http::HeaderMap;
use subtle::ConstantTimeEq;

use crate::errors::StoreError;

pub const ACCESS_KEY_HEADER: &str = "x-access-key";
pub const SECRET_KEY_HEADER: &str = "x-secret-key";

/// Bucket access policies that allow anonymous reads through `/storage`.
const PUBLIC_POLICIES: &[&str] = &["public-read", "public"];

/// Key pair as presented on a request.
#[derive(Debug, Clone)]
pub struct PresentedKeys {
    pub access_key: String,
    pub secret_key: String,
}

/// Compare two secrets in constant time.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Pull the key pair out of the request headers.
///
/// Both headers must be present and non-empty.
pub fn extract_keys(headers: &HeaderMap) -> Result<PresentedKeys, StoreError> {
    match (
        header_value(headers, ACCESS_KEY_HEADER),
        header_value(headers, SECRET_KEY_HEADER),
    ) {
        (Some(ak), Some(sk)) => Ok(PresentedKeys {
            access_key: ak.to_string(),
            secret_key: sk.to_string(),
        }),
        _ => Err(StoreError::Unauthorized {
            message: "X-Access-Key and X-Secret-Key headers are required".to_string(),
        }),
    }
}

/// Whether a bucket's access policy allows unauthenticated downloads.
pub fn is_public_policy(policy: &str) -> bool {
    PUBLIC_POLICIES.iter().any(|p| policy.eq_ignore_ascii_case(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_constant_time_eq_same() {
        assert!(constant_time_eq("abc123", "abc123"));
    }

    #[test]
    fn test_constant_time_eq_different() {
        assert!(!constant_time_eq("abc123", "abc124"));
    }

    #[test]
    fn test_constant_time_eq_different_length() {
        assert!(!constant_time_eq("abc", "abcd"));
        assert!(!constant_time_eq("", "a"));
    }

    #[test]
    fn test_extract_keys() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Access-Key", HeaderValue::from_static("ak"));
        headers.insert("X-Secret-Key", HeaderValue::from_static(" sk "));
        let keys = extract_keys(&headers).unwrap();
        assert_eq!(keys.access_key, "ak");
        assert_eq!(keys.secret_key, "sk");
    }

    #[test]
    fn test_extract_keys_missing_half() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Access-Key", HeaderValue::from_static("ak"));
        assert!(matches!(
            extract_keys(&headers),
            Err(StoreError::Unauthorized { .. })
        ));

        headers.insert("X-Secret-Key", HeaderValue::from_static(""));
        assert!(extract_keys(&headers).is_err());
    }

    #[test]
    fn test_public_policy() {
        assert!(is_public_policy("public-read"));
        assert!(is_public_policy("PUBLIC"));
        assert!(!is_public_policy("private"));
        assert!(!is_public_policy(""));
    }
}
