//! Client address resolution

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{header, request::Parts, Extensions, HeaderMap},
};

use crate::api::state::AppState;
use crate::infrastructure::services::ClientInfo;

const UNKNOWN_CLIENT: &str = "unknown";

/// Best-effort client address. A trusted `X-Forwarded-For` wins over the socket peer
/// because behind a proxy the peer is the proxy itself.
pub fn client_ip(headers: &HeaderMap, extensions: &Extensions, trust_forwarded: bool) -> String {
    if trust_forwarded {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());

        if let Some(ip) = forwarded {
            return ip.to_string();
        }
    }

    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Caller address and user agent for the audit trail
#[derive(Debug, Clone)]
pub struct RequestClient(pub ClientInfo);

impl FromRequestParts<AppState> for RequestClient {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ip = client_ip(&parts.headers, &parts.extensions, state.trust_forwarded_headers);
        let user_agent = parts
            .headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(RequestClient(ClientInfo {
            ip: Some(ip),
            user_agent,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", value.parse().unwrap());
        headers
    }

    #[test]
    fn test_peer_address() {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 7], 5000))));

        assert_eq!(client_ip(&HeaderMap::new(), &extensions, false), "192.168.1.7");
    }

    #[test]
    fn test_forwarded_header_only_when_trusted() {
        let headers = forwarded("203.0.113.9, 10.0.0.1");
        let extensions = Extensions::new();

        assert_eq!(client_ip(&headers, &extensions, true), "203.0.113.9");
        assert_eq!(client_ip(&headers, &extensions, false), UNKNOWN_CLIENT);
    }
}
