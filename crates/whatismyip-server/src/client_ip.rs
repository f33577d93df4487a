use std::convert::Infallible;
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Caller address as reported by proxies or, failing that, the socket.
///
/// Nothing here is validated: whatever the first hop wrote into the
/// forwarding headers is returned verbatim (trimmed).
pub fn client_ip(headers: &HeaderMap, remote_addr: &str) -> String {
    if let Some(xff) = header_str(headers, X_FORWARDED_FOR) {
        let first = xff.split(',').next().unwrap_or_default();
        return first.trim().to_owned();
    }

    if let Some(real) = header_str(headers, X_REAL_IP) {
        return real.trim().to_owned();
    }

    match split_host_port(remote_addr) {
        Some((host, _port)) => host.to_owned(),
        None => remote_addr.to_owned(),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
}

/// Split `host:port` or `[v6-host]:port`. A bare IPv6 literal has too many
/// colons and is rejected, as is anything without a port separator.
fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let (host, tail) = rest.split_once(']')?;
        let port = tail.strip_prefix(':')?;
        return Some((host, port));
    }
    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(':') {
        return None;
    }
    Some((host, port))
}

/// Extractor yielding [`client_ip`] for the current request.
///
/// The socket address comes from `ConnectInfo` (or `MockConnectInfo` in
/// tests), so the server must be run with
/// `into_make_service_with_connect_info::<SocketAddr>()`. Without it only
/// the forwarding headers are consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let remote = ConnectInfo::<SocketAddr>::from_request_parts(parts, state)
            .await
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_default();
        Ok(ClientIp(client_ip(&parts.headers, &remote)))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_static(*v));
        }
        h
    }

    #[test]
    fn forwarded_for_takes_first_hop() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.5 , 10.0.0.1, 10.0.0.2"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(client_ip(&h, "127.0.0.1:5000"), "203.0.113.5");
    }

    #[test]
    fn real_ip_when_no_forwarded_for() {
        let h = headers(&[("x-real-ip", "  198.51.100.1 ")]);
        assert_eq!(client_ip(&h, "127.0.0.1:5000"), "198.51.100.1");
    }

    #[test]
    fn falls_back_to_socket_host() {
        assert_eq!(client_ip(&HeaderMap::new(), "192.0.2.10:41234"), "192.0.2.10");
        assert_eq!(client_ip(&HeaderMap::new(), "[2001:db8::1]:443"), "2001:db8::1");
    }

    #[test]
    fn unsplittable_address_is_returned_as_is() {
        assert_eq!(client_ip(&HeaderMap::new(), "2001:db8::1"), "2001:db8::1");
        assert_eq!(client_ip(&HeaderMap::new(), "garbage"), "garbage");
        assert_eq!(client_ip(&HeaderMap::new(), ""), "");
    }

    #[test]
    fn malformed_header_is_not_validated() {
        let h = headers(&[("x-forwarded-for", "not-an-ip")]);
        assert_eq!(client_ip(&h, "192.0.2.10:1"), "not-an-ip");
    }
}
