//! Host/Origin validation gate.
//!
//! Every transport handshake and every plain request to the relay's control
//! endpoints passes through [`HostValidator`] before it is trusted. This is
//! the DNS-rebinding defense: a remote page whose script has been retargeted
//! at `localhost` still carries its own Origin/Host names, which are refused
//! unless they are local addresses or explicitly allow-listed.
//!
//! Failures are never errors. Plain requests get a 403 with
//! [`INVALID_HOST_MESSAGE`]; real-time connections get one `error` envelope
//! and are closed by the relay.

use crate::config::{AllowedHosts, RelayConfig};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, StatusCode, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use std::sync::Arc;
use url::{Host, Url};

/// Body of the 403 response and reason of the `error` envelope.
pub const INVALID_HOST_MESSAGE: &str = "Invalid Host/Origin header";

/// Values with these schemes cannot come from a remote page.
static EXEMPT_PROTOCOL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)^(file|.+-extension):").ok());

/// Pure Host/Origin policy built from the relay configuration.
#[derive(Debug, Clone)]
pub struct HostValidator {
    allowed_hosts: AllowedHosts,
    public_hostname: Option<String>,
}

impl HostValidator {
    pub fn new(allowed_hosts: AllowedHosts, public_hostname: Option<String>) -> Self {
        // A configured public hostname may be written as a URL or host:port.
        let public_hostname = public_hostname
            .as_deref()
            .and_then(parse_hostname)
            .or(public_hostname);
        Self {
            allowed_hosts,
            public_hostname,
        }
    }

    pub fn from_config(config: &RelayConfig) -> Self {
        Self::new(
            config.allowed_hosts.clone(),
            config.client.public_hostname.clone(),
        )
    }

    /// Whether the header `name` carries a trustworthy host.
    ///
    /// A missing or non-UTF-8 header fails closed. `strict` additionally
    /// accepts IP literals, `localhost` and `*.localhost`.
    pub fn is_valid_host(&self, headers: &HeaderMap, name: &HeaderName, strict: bool) -> bool {
        if self.allowed_hosts.is_all() {
            return true;
        }

        match headers.get(name).map(|value| value.to_str()) {
            Some(Ok(value)) => self.is_valid_host_value(value, strict),
            _ => false,
        }
    }

    /// Whether the Origin header names the same site as the Host header.
    ///
    /// Requests without an Origin only pass under the `all` wildcard.
    pub fn is_same_origin(&self, headers: &HeaderMap) -> bool {
        if self.allowed_hosts.is_all() {
            return true;
        }

        let origin = match headers.get(header::ORIGIN).map(|value| value.to_str()) {
            Some(Ok(origin)) => origin,
            _ => return false,
        };

        if self.is_valid_host_value(origin, false) {
            return true;
        }

        let Some(origin_hostname) = parse_hostname(origin) else {
            return false;
        };
        headers
            .get(header::HOST)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_hostname)
            .is_some_and(|host_hostname| host_hostname == origin_hostname)
    }

    /// Whether `hostname` is allow-listed or the public client hostname.
    pub fn is_host_allowed(&self, hostname: &str) -> bool {
        if self.allowed_hosts.is_all() {
            return true;
        }

        let hostname = hostname.to_ascii_lowercase();
        let listed = self.allowed_hosts.entries().iter().any(|entry| {
            let entry = entry.to_ascii_lowercase();
            match entry.strip_prefix('.') {
                // `.example.com` matches example.com and any subdomain
                Some(domain) => hostname == domain || hostname.ends_with(&entry),
                None => hostname == entry,
            }
        });

        listed
            || self
                .public_hostname
                .as_deref()
                .is_some_and(|public| public.eq_ignore_ascii_case(&hostname))
    }

    /// Gate for a new real-time connection.
    pub fn check_handshake(&self, headers: &HeaderMap) -> bool {
        self.is_valid_host(headers, &header::HOST, true) && self.is_same_origin(headers)
    }

    /// Gate for a plain HTTP request.
    ///
    /// HTTP/2 requests may omit `Host`; the URI authority stands in for it.
    pub fn check_request(&self, headers: &HeaderMap, uri: &Uri) -> bool {
        if self.allowed_hosts.is_all() {
            return true;
        }

        let host_ok = match headers.get(header::HOST) {
            Some(_) => self.is_valid_host(headers, &header::HOST, true),
            None => uri
                .authority()
                .is_some_and(|authority| self.is_valid_host_value(authority.as_str(), true)),
        };
        if !host_ok {
            return false;
        }

        if headers.contains_key(header::ORIGIN) && !self.is_same_origin(headers) {
            return false;
        }

        !is_cross_site_no_cors(headers)
    }

    fn is_valid_host_value(&self, value: &str, strict: bool) -> bool {
        if EXEMPT_PROTOCOL
            .as_ref()
            .is_some_and(|exempt| exempt.is_match(value))
        {
            return true;
        }

        let Some(hostname) = parse_hostname(value) else {
            return false;
        };

        if self.is_host_allowed(&hostname) {
            return true;
        }

        strict && is_local_hostname(&hostname)
    }
}

/// Extract the hostname from a Host (`name:port`) or Origin (`scheme://name`) value.
pub fn parse_hostname(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let candidate = if value.contains("//") {
        value.to_string()
    } else {
        format!("http://{}", value)
    };

    let url = Url::parse(&candidate).ok()?;
    match url.host()? {
        Host::Domain(domain) => Some(domain.to_ascii_lowercase()),
        Host::Ipv4(ip) => Some(ip.to_string()),
        Host::Ipv6(ip) => Some(ip.to_string()),
    }
}

fn is_local_hostname(hostname: &str) -> bool {
    hostname.parse::<IpAddr>().is_ok()
        || hostname == "localhost"
        || hostname.ends_with(".localhost")
}

/// `<script src>`/`<img>` style requests issued from another site.
fn is_cross_site_no_cors(headers: &HeaderMap) -> bool {
    let value = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    value("sec-fetch-mode") == Some("no-cors") && value("sec-fetch-site") == Some("cross-site")
}

/// axum middleware answering untrusted plain requests with 403.
pub async fn host_gate(
    State(validator): State<Arc<HostValidator>>,
    request: Request,
    next: Next,
) -> Response {
    if validator.check_request(request.headers(), request.uri()) {
        return next.run(request).await;
    }

    tracing::warn!(
        host = ?request.headers().get(header::HOST),
        origin = ?request.headers().get(header::ORIGIN),
        "Rejected request to {}",
        request.uri().path()
    );
    forbidden()
}

fn forbidden() -> Response {
    (
        StatusCode::FORBIDDEN,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from(INVALID_HOST_MESSAGE),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use proptest::prelude::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    fn auto() -> HostValidator {
        HostValidator::new(AllowedHosts::default(), None)
    }

    #[test]
    fn test_parse_hostname() {
        assert_eq!(parse_hostname("localhost:8080").as_deref(), Some("localhost"));
        assert_eq!(
            parse_hostname("https://App.Example.com").as_deref(),
            Some("app.example.com")
        );
        assert_eq!(parse_hostname("[::1]:3000").as_deref(), Some("::1"));
        assert_eq!(parse_hostname("192.168.0.7").as_deref(), Some("192.168.0.7"));
        assert_eq!(parse_hostname(""), None);
        assert_eq!(parse_hostname("exa mple.com"), None);
    }

    #[test]
    fn test_local_hosts_allowed_when_strict() {
        let validator = auto();
        for host in ["localhost:8080", "app.localhost", "127.0.0.1:8080", "[::1]:8080"] {
            let h = headers(&[("host", host)]);
            assert!(validator.is_valid_host(&h, &header::HOST, true), "{}", host);
            assert!(!validator.is_valid_host(&h, &header::HOST, false), "{}", host);
        }
    }

    #[test]
    fn test_foreign_host_rejected() {
        let h = headers(&[("host", "evil.example:8080")]);
        assert!(!auto().is_valid_host(&h, &header::HOST, true));
    }

    #[test]
    fn test_missing_or_malformed_header_fails_closed() {
        let validator = auto();
        assert!(!validator.is_valid_host(&HeaderMap::new(), &header::HOST, true));

        let mut h = HeaderMap::new();
        h.insert(header::HOST, HeaderValue::from_bytes(b"caf\xe9").unwrap());
        assert!(!validator.is_valid_host(&h, &header::HOST, true));
    }

    #[test]
    fn test_wildcard_allows_everything() {
        let validator = HostValidator::new(AllowedHosts::all(), None);
        assert!(validator.is_valid_host(&HeaderMap::new(), &header::HOST, true));
        assert!(validator.is_same_origin(&HeaderMap::new()));
        assert!(validator.check_handshake(&headers(&[("host", "evil.example")])));
    }

    #[test]
    fn test_domain_wildcard_entry() {
        let validator = HostValidator::new(AllowedHosts::list([".example.com"]), None);
        assert!(validator.is_host_allowed("example.com"));
        assert!(validator.is_host_allowed("foo.example.com"));
        assert!(validator.is_host_allowed("FOO.Example.com"));
        assert!(!validator.is_host_allowed("notexample.com"));
    }

    #[test]
    fn test_public_hostname_allowed() {
        let validator = HostValidator::new(
            AllowedHosts::default(),
            Some("https://tunnel.example.net:443".to_string()),
        );
        assert!(validator.is_host_allowed("tunnel.example.net"));
        assert!(!validator.is_host_allowed("example.net"));
    }

    #[test]
    fn test_exempt_protocols() {
        let validator = auto();
        let h = headers(&[("origin", "chrome-extension://abcdef")]);
        assert!(validator.is_valid_host(&h, &header::ORIGIN, false));
        let h = headers(&[("origin", "file://")]);
        assert!(validator.is_same_origin(&h));
    }

    #[test]
    fn test_same_origin() {
        let validator = auto();

        // no Origin header
        assert!(!validator.is_same_origin(&headers(&[("host", "localhost:8080")])));

        // Origin hostname equals Host hostname
        assert!(validator.is_same_origin(&headers(&[
            ("host", "localhost:8080"),
            ("origin", "http://localhost:8080"),
        ])));

        // Cross-origin page targeting a local relay
        assert!(!validator.is_same_origin(&headers(&[
            ("host", "localhost:8080"),
            ("origin", "http://evil.example"),
        ])));

        // IP origins are not auto-allowed in the cross-origin check
        assert!(!validator.is_same_origin(&headers(&[
            ("host", "localhost:8080"),
            ("origin", "http://10.0.0.5:8080"),
        ])));
    }

    #[test]
    fn test_check_handshake() {
        let validator = HostValidator::new(AllowedHosts::list(["app.test"]), None);
        assert!(validator.check_handshake(&headers(&[
            ("host", "app.test"),
            ("origin", "http://app.test"),
        ])));
        assert!(!validator.check_handshake(&headers(&[
            ("host", "rebound.attacker.example"),
            ("origin", "http://rebound.attacker.example"),
        ])));
        assert!(!validator.check_handshake(&headers(&[("host", "app.test")])));
    }

    #[test]
    fn test_check_request() {
        let validator = auto();
        let uri: Uri = "/".parse().unwrap();

        assert!(validator.check_request(&headers(&[("host", "localhost:8080")]), &uri));
        assert!(!validator.check_request(&headers(&[("host", "evil.example")]), &uri));
        assert!(!validator.check_request(
            &headers(&[("host", "localhost:8080"), ("origin", "http://evil.example")]),
            &uri
        ));
        assert!(!validator.check_request(
            &headers(&[
                ("host", "localhost:8080"),
                ("sec-fetch-mode", "no-cors"),
                ("sec-fetch-site", "cross-site"),
            ]),
            &uri
        ));

        // HTTP/2 authority
        let absolute: Uri = "http://localhost:8080/status".parse().unwrap();
        assert!(validator.check_request(&HeaderMap::new(), &absolute));
        assert!(!validator.check_request(&HeaderMap::new(), &uri));
    }

    proptest! {
        #[test]
        fn prop_ipv4_literal_host_always_valid(
            a in any::<u8>(),
            b in any::<u8>(),
            c in any::<u8>(),
            d in any::<u8>(),
            port in 1u16..,
        ) {
            let validator = HostValidator::new(AllowedHosts::list(["only.test"]), None);
            let h = headers(&[("host", &format!("{}.{}.{}.{}:{}", a, b, c, d, port))]);
            prop_assert!(validator.is_valid_host(&h, &header::HOST, true));
        }

        #[test]
        fn prop_ipv6_literal_host_always_valid(segments in any::<[u16; 8]>()) {
            let ip = std::net::Ipv6Addr::from(segments);
            let h = headers(&[("host", &format!("[{}]:8080", ip))]);
            prop_assert!(auto().is_valid_host(&h, &header::HOST, true));
        }

        #[test]
        fn prop_subdomains_match_dot_entry(label in "[a-z][a-z0-9-]{0,20}") {
            let validator = HostValidator::new(AllowedHosts::list([".example.com"]), None);
            let subdomain = format!("{}.example.com", label);
            let lookalike = format!("{}example.com", label);
            prop_assert!(validator.is_host_allowed(&subdomain));
            prop_assert!(!validator.is_host_allowed(&lookalike));
        }
    }
}
