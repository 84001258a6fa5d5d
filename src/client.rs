//! Client identification for rate limiting.

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::HeaderMap;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use std::convert::Infallible;
use std::net::SocketAddr;

pub const UNKNOWN_CLIENT: &str = "unknown";

/// Rate-limit key for the calling client.
///
/// First `X-Forwarded-For` entry, then `X-Real-IP`, then the socket address,
/// then [`UNKNOWN_CLIENT`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientKey(pub String);

impl ClientKey {
    pub fn from_headers(headers: &HeaderMap, direct: Option<SocketAddr>) -> Self {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|xff| xff.split(',').next())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty());

        let key = forwarded
            .or(real_ip)
            .map(str::to_string)
            .or_else(|| direct.map(|addr| addr.ip().to_string()))
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string());

        ClientKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // Short digest for logs, keeps raw addresses out of them
    pub fn tag(&self) -> String {
        let digest = Sha256::digest(self.0.as_bytes());
        format!("{:x}", digest)[..12].to_string()
    }
}

impl<S> FromRequestParts<S> for ClientKey
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let direct = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientKey::from_headers(&parts.headers, direct))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7, 10.0.0.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        let direct: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        assert_eq!(ClientKey::from_headers(&headers, Some(direct)).as_str(), "203.0.113.7");
    }

    #[test]
    fn real_ip_then_socket_then_unknown() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(ClientKey::from_headers(&headers, None).as_str(), "198.51.100.2");

        let direct: SocketAddr = "192.0.2.9:443".parse().unwrap();
        assert_eq!(ClientKey::from_headers(&HeaderMap::new(), Some(direct)).as_str(), "192.0.2.9");

        assert_eq!(ClientKey::from_headers(&HeaderMap::new(), None).as_str(), UNKNOWN_CLIENT);
    }

    #[test]
    fn tag_is_stable_and_short() {
        let a = ClientKey("203.0.113.7".to_string());
        assert_eq!(a.tag(), a.tag());
        assert_eq!(a.tag().len(), 12);
        assert_ne!(a.tag(), ClientKey("203.0.113.8".to_string()).tag());
    }
}
