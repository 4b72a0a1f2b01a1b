//! Header handling between the client, the gateway and backends.

use http::header::{HeaderMap, HeaderName, HeaderValue, HOST};
use portico_core::RequestId;
use portico_filters::stages::AUTH_SUBJECT_HEADER;
use std::net::SocketAddr;

/// Correlation id, forwarded upstream and echoed to the client.
pub static HEADER_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Client address chain.
pub static HEADER_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Host the client addressed.
pub static HEADER_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");

/// Scheme the client used.
pub static HEADER_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Hop-by-hop headers (RFC 9110 section 7.6.1). Never forwarded in either
/// direction.
pub static HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Returns `true` for hop-by-hop headers.
pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Removes hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(http::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();
    for name in listed {
        headers.remove(name);
    }
    for name in HOP_BY_HOP_HEADERS {
        headers.remove(*name);
    }
}

/// Removes headers only the gateway may set.
///
/// Runs on every inbound request before any filter, so a client cannot
/// pose as an authenticated subject.
pub fn strip_reserved(headers: &mut HeaderMap) {
    headers.remove(AUTH_SUBJECT_HEADER);
}

/// Where a request entered the gateway.
#[derive(Debug, Clone)]
pub struct ForwardedInfo {
    /// Client socket address.
    pub peer: SocketAddr,
    /// `Host` the client sent, if any.
    pub host: Option<HeaderValue>,
    /// `http` or `https`.
    pub proto: &'static str,
}

impl ForwardedInfo {
    /// Captures forwarding info from the inbound headers.
    pub fn new(peer: SocketAddr, headers: &HeaderMap) -> Self {
        let proto = match headers
            .get(&HEADER_FORWARDED_PROTO)
            .and_then(|v| v.to_str().ok())
        {
            Some(p) if p.eq_ignore_ascii_case("https") => "https",
            _ => "http",
        };
        Self {
            peer,
            host: headers.get(HOST).cloned(),
            proto,
        }
    }

    /// Rewrites `headers` for the upstream hop.
    ///
    /// Hop-by-hop headers and `Host` are dropped, the client address is
    /// appended to `x-forwarded-for` and the request id is set.
    pub fn apply(&self, headers: &mut HeaderMap, request_id: RequestId) {
        strip_hop_by_hop(headers);
        headers.remove(HOST);

        let peer_ip = self.peer.ip().to_string();
        let forwarded_for = match headers
            .get(&HEADER_FORWARDED_FOR)
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) if !existing.trim().is_empty() => format!("{existing}, {peer_ip}"),
            _ => peer_ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(HEADER_FORWARDED_FOR.clone(), value);
        }
        if let Some(host) = &self.host {
            headers.insert(HEADER_FORWARDED_HOST.clone(), host.clone());
        }
        headers.insert(
            HEADER_FORWARDED_PROTO.clone(),
            HeaderValue::from_static(self.proto),
        );
        set_request_id(headers, request_id);
    }
}

/// Sets `x-request-id`.
pub fn set_request_id(headers: &mut HeaderMap, request_id: RequestId) {
    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        headers.insert(HEADER_REQUEST_ID.clone(), value);
    }
}

/// Reads the inbound `x-request-id`, keeping it when it is a UUID.
pub fn request_id_from(headers: &HeaderMap) -> RequestId {
    RequestId::from_header(headers.get(&HEADER_REQUEST_ID).and_then(|v| v.to_str().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "10.1.2.3:50000".parse().unwrap()
    }

    #[test]
    fn test_hop_by_hop() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(!is_hop_by_hop("authorization"));
        assert!(!is_hop_by_hop("content-type"));
    }

    #[test]
    fn test_connection_listed_headers_are_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive, x-session"));
        headers.insert("x-session", HeaderValue::from_static("abc"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("accept", HeaderValue::from_static("*/*"));

        strip_hop_by_hop(&mut headers);
        assert_eq!(headers.len(), 1);
        assert!(headers.contains_key("accept"));
    }

    #[test]
    fn test_forwarded_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(HOST, HeaderValue::from_static("api.example.com"));
        inbound.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.7"));
        inbound.insert("authorization", HeaderValue::from_static("Bearer t"));
        let info = ForwardedInfo::new(peer(), &inbound);
        let id = RequestId::new();

        let mut headers = inbound.clone();
        info.apply(&mut headers, id);

        assert!(headers.get(HOST).is_none());
        assert_eq!(headers["x-forwarded-for"], "203.0.113.7, 10.1.2.3");
        assert_eq!(headers["x-forwarded-host"], "api.example.com");
        assert_eq!(headers["x-forwarded-proto"], "http");
        assert_eq!(headers["x-request-id"], id.to_string().as_str());
        assert_eq!(headers["authorization"], "Bearer t");
    }

    #[test]
    fn test_reserved_headers_are_removed() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_SUBJECT_HEADER, HeaderValue::from_static("admin"));
        strip_reserved(&mut headers);
        assert!(headers.is_empty());
    }

    #[test]
    fn test_request_id_reuse() {
        let id = RequestId::new();
        let mut headers = HeaderMap::new();
        set_request_id(&mut headers, id);
        assert_eq!(request_id_from(&headers), id);

        headers.insert("x-request-id", HeaderValue::from_static("not-a-uuid"));
        assert_ne!(request_id_from(&headers), id);
    }
}
