//! Caller metadata recorded alongside audit-log rows.

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap},
};
use std::convert::Infallible;

/// Client address and user agent as seen by the API (proxy aware)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientInfo {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        // First entry of x-forwarded-for is the originating client
        let ip_address = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| {
                headers
                    .get("x-real-ip")
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            });

        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        Self {
            ip_address,
            user_agent,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientInfo
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(ClientInfo::from_headers(&parts.headers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn forwarded_for_takes_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("10.0.0.9"));
        headers.insert(header::USER_AGENT, HeaderValue::from_static("curl/8.0"));

        let info = ClientInfo::from_headers(&headers);
        assert_eq!(info.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(info.user_agent.as_deref(), Some("curl/8.0"));
    }

    #[test]
    fn falls_back_to_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        let info = ClientInfo::from_headers(&headers);
        assert_eq!(info.ip_address.as_deref(), Some("198.51.100.4"));
        assert!(info.user_agent.is_none());
    }

    #[test]
    fn missing_headers_yield_empty_info() {
        assert_eq!(ClientInfo::from_headers(&HeaderMap::new()), ClientInfo::default());
    }
}
