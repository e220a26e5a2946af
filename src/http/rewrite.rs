//! Request-line rewriting.
//!
//! Pure functions turning the inbound request target into the address the
//! proxy forwards to. Nothing here touches the network.

use std::fmt;
use std::str::FromStr;

use axum::http::uri::Authority;
use axum::http::Uri;

use crate::error::{ProxyError, Result};

/// Port used for CONNECT targets that omit one.
pub const DEFAULT_CONNECT_PORT: u16 = 443;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }
}

/// Resolved upstream address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundTarget {
    pub scheme: Scheme,
    /// Host as written in the request (IPv6 literals keep their brackets).
    pub host: String,
    pub port: u16,
}

impl OutboundTarget {
    /// `host:port`, suitable for dialing and logging.
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for OutboundTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

fn host_of(authority: &Authority) -> Result<&str> {
    let host = authority.host();
    if host.is_empty() {
        return Err(ProxyError::MalformedRequest(authority.to_string()));
    }
    Ok(host)
}

/// Target of a CONNECT request; the port defaults to 443.
pub fn resolve_connect_target(uri: &Uri) -> Result<OutboundTarget> {
    let authority = uri
        .authority()
        .ok_or_else(|| ProxyError::MalformedRequest(uri.to_string()))?;

    Ok(OutboundTarget {
        scheme: Scheme::Https,
        host: host_of(authority)?.to_string(),
        port: authority.port_u16().unwrap_or(DEFAULT_CONNECT_PORT),
    })
}

/// Resolve a plain request line into its target and the absolute URI to send upstream.
///
/// The request line must carry an authority. The scheme is `https` only when
/// the request says so and `http` when it names none; any other scheme is
/// rejected. Userinfo is dropped.
pub fn rewrite_uri(uri: &Uri) -> Result<(OutboundTarget, Uri)> {
    let malformed = || ProxyError::MalformedRequest(uri.to_string());

    let authority = uri.authority().ok_or_else(malformed)?;
    let scheme = match uri.scheme_str() {
        None => Scheme::Http,
        Some(s) if s.eq_ignore_ascii_case("http") => Scheme::Http,
        Some(s) if s.eq_ignore_ascii_case("https") => Scheme::Https,
        Some(_) => return Err(malformed()),
    };
    let host = host_of(authority)?;
    let host_port = match authority.port() {
        Some(port) => format!("{}:{}", host, port.as_str()),
        None => host.to_string(),
    };
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    let path_and_query = if path_and_query.is_empty() { "/" } else { path_and_query };

    let absolute = format!("{}://{}{}", scheme.as_str(), host_port, path_and_query);
    let parsed = url::Url::parse(&absolute).map_err(|_| malformed())?;
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(malformed());
    }
    let rewritten = Uri::from_str(&absolute).map_err(|_| malformed())?;

    let target = OutboundTarget {
        scheme,
        host: host.to_string(),
        port: authority.port_u16().unwrap_or(scheme.default_port()),
    };
    Ok((target, rewritten))
}
