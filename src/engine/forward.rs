//! Forwarding a request to the fallback upstream.
//!
//! Computes the upstream target (scheme forced to the inbound
//! connection's security, path/query carried over verbatim — no
//! further canonicalization), streams the body from a chunk source
//! with backpressure, and pipes the response headers through the
//! Location rewriter before handing the response back to the client.

use axum::http::header::HOST;
use axum::http::{HeaderValue, Uri};
use axum::response::Response;
use url::Url;

use super::context::RequestContext;
use super::{headers, rewrite};
use crate::error::UnderstudyError;
use crate::server::AppState;
use crate::stream::{ChunkBody, ChunkSource};

/// The computed URI a forwarded request is sent to.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    url: Url,
}

impl UpstreamTarget {
    /// Upstream base with the scheme matching the inbound connection's
    /// security and path/query taken from the inbound request.
    pub fn compute(upstream: &Url, secure: bool, uri: &Uri) -> Result<Self, UnderstudyError> {
        let mut url = upstream.clone();
        let scheme = if secure { "https" } else { "http" };
        url.set_scheme(scheme)
            .map_err(|()| UnderstudyError::UriParse {
                source: format!("cannot force scheme '{scheme}' on upstream base").into(),
            })?;
        url.set_path(uri.path());
        url.set_query(uri.query());
        Ok(Self { url })
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `host[:port]` of the target, explicit port only when present in
    /// the upstream base.
    #[must_use]
    pub fn authority(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        self.url
            .port()
            .map_or_else(|| host.to_string(), |port| format!("{host}:{port}"))
    }
}

pub async fn forward(
    state: &AppState,
    ctx: &mut RequestContext,
    body: Box<dyn ChunkSource>,
) -> Result<Response, UnderstudyError> {
    let target = UpstreamTarget::compute(&state.upstream, ctx.secure, &ctx.uri)?;
    let uri: hyper::Uri =
        target
            .url()
            .as_str()
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| UnderstudyError::UriParse {
                source: Box::new(e),
            })?;

    let mut forwarded_headers = ctx.headers_in.clone();
    headers::strip_hop_by_hop(&mut forwarded_headers);
    if let Ok(host) = HeaderValue::from_str(&target.authority()) {
        forwarded_headers.insert(HOST, host);
    }

    let mut builder = hyper::Request::builder().method(ctx.method.clone()).uri(uri);
    for (name, value) in &forwarded_headers {
        builder = builder.header(name, value);
    }
    let request = builder
        .body(ChunkBody::new(body))
        .map_err(|e| UnderstudyError::Forward {
            source: Box::new(e),
        })?;

    let response = tokio::time::timeout(state.timeout, state.http_client.request(request))
        .await
        .map_err(|_| UnderstudyError::Forward {
            source: format!("upstream timed out after {:?}", state.timeout).into(),
        })?
        .map_err(|e| UnderstudyError::Forward {
            source: Box::new(e),
        })?;

    let (mut parts, upstream_body) = response.into_parts();
    if let Some(authority) = ctx.client_authority(state.server_name.as_deref()) {
        rewrite::rewrite_location(
            &mut parts.headers,
            target.url(),
            &authority,
            ctx.secure,
            &mut ctx.location_rewritten,
        );
    }

    tracing::debug!(
        status = parts.status.as_u16(),
        target = %target.url(),
        "upstream responded"
    );

    Ok(Response::from_parts(
        parts,
        axum::body::Body::new(upstream_body),
    ))
}
