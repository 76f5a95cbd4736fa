//! Per-request state shared between the engine and the nested trial.
//!
//! One [`RequestContext`] exists per top-level inbound request and is
//! passed explicitly into everything that needs it — no ambient or
//! global lookup. It owns the inbound header snapshot, the held
//! response buffer, and (after a trial that consumed body bytes) the
//! spooled body, so end-of-request cleanup is simply `Drop`.

use axum::http::header::HOST;
use axum::http::{request, HeaderMap, HeaderValue, Method, Uri};

use crate::hold::HeldResponse;
use crate::spool::SpooledBody;

pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    /// Mutable snapshot of the inbound headers. `Accept-Encoding`
    /// stripping/restoration around the trial happens here, and the
    /// forwarded request is built from here.
    pub headers_in: HeaderMap,
    /// Whether the inbound connection is considered secure; drives the
    /// scheme of the upstream target and rewritten redirects.
    pub secure: bool,
    pub saved_accept_encoding: Option<HeaderValue>,
    pub held: HeldResponse,
    pub spooled: Option<SpooledBody>,
    /// One-shot gate for the Location rewrite on a forwarded response.
    pub location_rewritten: bool,
}

impl RequestContext {
    #[must_use]
    pub fn new(parts: &request::Parts) -> Self {
        // TLS terminates upstream of this process, so the security flag
        // comes from the standard forwarding header.
        let secure = parts
            .headers
            .get("x-forwarded-proto")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|proto| proto.eq_ignore_ascii_case("https"));

        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers_in: parts.headers.clone(),
            secure,
            saved_accept_encoding: None,
            held: HeldResponse::new(),
            spooled: None,
            location_rewritten: false,
        }
    }

    /// The authority clients reach this server under: the inbound
    /// `Host` header, falling back to the configured server name.
    #[must_use]
    pub fn client_authority(&self, server_name: Option<&str>) -> Option<String> {
        self.headers_in
            .get(HOST)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .or_else(|| server_name.map(String::from))
    }
}
