//! Rate limit key derivation.

use axum::http::HeaderMap;

use super::policy::PolicyClass;

/// Client identity used when no address header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Derive the client identity from proxy headers.
///
/// The first entry of `x-forwarded-for` wins, then `x-real-ip`, then
/// [`UNKNOWN_CLIENT`].
pub fn client_key(headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
    };

    if let Some(forwarded) = header("x-forwarded-for") {
        let first = forwarded.split(',').next().unwrap_or_default().trim();
        return if first.is_empty() {
            UNKNOWN_CLIENT.to_string()
        } else {
            first.to_string()
        };
    }

    if let Some(real_ip) = header("x-real-ip") {
        return real_ip.trim().to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

/// A counter key: one client within one endpoint class.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RateLimitKey {
    /// The endpoint class whose quota applies
    pub class: PolicyClass,
    /// The caller identity
    pub client: String,
}

impl RateLimitKey {
    /// Create a key for a client within a class.
    pub fn new(class: PolicyClass, client: impl Into<String>) -> Self {
        Self {
            class,
            client: client.into(),
        }
    }

    /// The string stored in the counter store.
    pub fn to_store_key(&self) -> String {
        format!("{}:{}", self.class, self.client)
    }
}

impl std::fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_store_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_forwarded_for_first_entry() {
        let map = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "10.0.0.2"),
        ]);
        assert_eq!(client_key(&map), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_fallback() {
        let map = headers(&[("x-real-ip", "10.0.0.2")]);
        assert_eq!(client_key(&map), "10.0.0.2");
    }

    #[test]
    fn test_unknown_when_no_headers() {
        assert_eq!(client_key(&HeaderMap::new()), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_empty_first_forwarded_entry_is_unknown() {
        let map = headers(&[("x-forwarded-for", " , 10.0.0.1")]);
        assert_eq!(client_key(&map), UNKNOWN_CLIENT);
    }

    #[test]
    fn test_store_key_is_namespaced_by_class() {
        let key = RateLimitKey::new(PolicyClass::Auth, "198.51.100.4");
        assert_eq!(key.to_store_key(), "auth:198.51.100.4");
        assert_eq!(key.to_string(), "auth:198.51.100.4");
        assert_ne!(
            RateLimitKey::new(PolicyClass::Api, "x").to_store_key(),
            RateLimitKey::new(PolicyClass::Report, "x").to_store_key()
        );
    }
}
