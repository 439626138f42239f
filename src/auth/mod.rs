//! L2 AuthProvider: contributes auth headers per request; opaque to the core.
//!
//! Grounded on `examples/original_source/.../auth/authenticators.py`'s `AuthProvider` base
//! class and `AccessTokenAuthProvider`. OAuth/Azure/Kerberos acquisition flows are explicitly
//! out of scope — the core only needs the contract below plus a PAT implementation
//! and room for a caller-supplied provider.

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

/// `add_headers` must be idempotent for a given logical "now" and perform any needed token
/// refresh internally; the core never inspects credentials directly.
pub trait AuthProvider: Send + Sync {
    fn add_headers(&self, headers: &mut HeaderMap);
}

/// Personal access token / bearer-token auth, the simplest provider and the one the core ships
/// directly (`AccessTokenAuthProvider` in the original).
pub struct PatAuthProvider {
    header_value: HeaderValue,
}

impl PatAuthProvider {
    pub fn new(access_token: impl AsRef<str>) -> Self {
        let mut value = HeaderValue::from_str(&format!("Bearer {}", access_token.as_ref()))
            .expect("bearer header value must be valid ASCII");
        value.set_sensitive(true);
        Self { header_value: value }
    }
}

impl AuthProvider for PatAuthProvider {
    fn add_headers(&self, headers: &mut HeaderMap) {
        headers.insert(AUTHORIZATION, self.header_value.clone());
    }
}

/// No-op provider, used when an externally supplied `AuthProvider` handles auth out of band
/// (e.g. a caller-managed OAuth token source) — the core composes against the trait, not a
/// concrete implementation.
pub struct NoAuthProvider;

impl AuthProvider for NoAuthProvider {
    fn add_headers(&self, _headers: &mut HeaderMap) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pat_provider_sets_bearer_header() {
        let provider = PatAuthProvider::new("abc123");
        let mut headers = HeaderMap::new();
        provider.add_headers(&mut headers);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer abc123");
    }

    #[test]
    fn pat_header_is_idempotent() {
        let provider = PatAuthProvider::new("abc123");
        let mut headers = HeaderMap::new();
        provider.add_headers(&mut headers);
        provider.add_headers(&mut headers);
        assert_eq!(headers.len(), 1);
    }
}
