//! The decision engine: try the local origin, else forward.
//!
//! [`decide_handler`] is the Axum fallback that receives every
//! non-`/health` request and drives the per-request state machine:
//! a cheap existence probe first, then (if inconclusive) a full trial
//! execution with the body tee and output capture installed, then
//! classification into exactly one of serve-trial or forward.
//! Submodules cover classification ([`classify`]), per-request state
//! ([`context`]), upstream dispatch ([`forward`]), header
//! reconciliation ([`headers`]), and redirect rewriting ([`rewrite`]).

pub mod classify;
pub mod context;
pub mod forward;
pub mod headers;
pub mod rewrite;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use classify::{classify, Decision};
use context::RequestContext;

use crate::error::UnderstudyError;
use crate::origin::{TrialRequest, TrialResult};
use crate::server::AppState;
use crate::spool::{ReplaySource, TeeSource};
use crate::stream::{BodySource, ChunkBody};

pub async fn decide_handler(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let mut ctx = RequestContext::new(&parts);

    match run(&state, &mut ctx, body).await {
        Ok(response) => response,
        Err(e) => {
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            let status = if matches!(e, UnderstudyError::Forward { .. }) {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::error!(
                method = %ctx.method,
                uri = %ctx.uri,
                error = %e,
                fatal = e.is_fatal(),
                "request failed"
            );
            // No partial trial or forward content leaks; the held
            // buffer and any spool file die with the context.
            status.into_response()
        }
    }
    // ctx dropped here — spool cleanup runs on every path
}

/// Drive the state machine for one top-level request:
/// `CheapProbe -> {Forward | RunTrial} -> Classify -> {ServeTrial | Forward}`.
async fn run(
    state: &AppState,
    ctx: &mut RequestContext,
    body: axum::body::Body,
) -> Result<Response, UnderstudyError> {
    let path = ctx.uri.path().to_string();

    match state.origin.probe(&ctx.method, &path).await {
        Ok(status) if state.probe_unserved.contains(status) => {
            tracing::debug!(
                status = status.as_u16(),
                path = %path,
                "cheap probe unserved, forwarding without trial"
            );
            // The body was never consumed locally — stream it straight
            // through, no spooling needed.
            let response = forward::forward(state, ctx, Box::new(BodySource::new(body))).await?;
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            return Ok(response);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(error = %e, path = %path, "existence probe failed, continuing to trial");
        }
    }

    ctx.saved_accept_encoding = headers::strip_accept_encoding(&mut ctx.headers_in);
    let trial_request = build_trial_request(ctx);
    let mut tee = TeeSource::new(BodySource::new(body), state.spool_dir.clone());

    let trial = match state
        .origin
        .run_trial(&trial_request, &mut tee, &mut ctx.held)
        .await
    {
        Ok(result) => Some(result),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => {
            // Execution failure distinct from a status — conservatively
            // classified as unserved.
            tracing::warn!(error = %e, path = %path, "trial execution failed, treating as unserved");
            None
        }
    };

    // The Accept-Encoding bracket closes with the trial, whichever
    // path we take from here.
    let saved = ctx.saved_accept_encoding.take();
    headers::restore_accept_encoding(&mut ctx.headers_in, saved);

    match trial {
        Some(result) if classify(&result, &state.unserved) == Decision::ServeTrial => {
            tracing::info!(
                status = result.status.as_u16(),
                path = %path,
                bytes = ctx.held.total_bytes(),
                "serving trial result"
            );
            let response = serve_trial(ctx, &result);
            state.stats.served.fetch_add(1, Ordering::Relaxed);
            Ok(response)
        }
        _ => {
            // Spool must hold the complete body before any replay read.
            tee.drain().await?;
            ctx.spooled = tee.into_spooled();
            tracing::info!(path = %path, "local origin cannot serve, forwarding");
            let replay = ReplaySource::new(ctx.spooled.take());
            let response = forward::forward(state, ctx, Box::new(replay)).await?;
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            Ok(response)
        }
    }
}

/// The request the trial sees: method, path/query, and the selected
/// inbound headers (Content-Type, Content-Length). `Accept-Encoding`
/// was already stripped from the context snapshot.
fn build_trial_request(ctx: &RequestContext) -> TrialRequest {
    let mut headers = HeaderMap::new();
    for name in [CONTENT_TYPE, CONTENT_LENGTH] {
        if let Some(value) = ctx.headers_in.get(&name) {
            headers.insert(name, value.clone());
        }
    }
    TrialRequest {
        method: ctx.method.clone(),
        path: ctx.uri.path().to_string(),
        query: ctx.uri.query().map(String::from),
        headers,
    }
}

/// Adopt the trial's status and headers onto the outer response and
/// release the held buffer verbatim.
fn serve_trial(ctx: &mut RequestContext, trial: &TrialResult) -> Response {
    let mut response_headers = HeaderMap::new();
    headers::merge_trial_headers(&mut response_headers, trial);

    let chunks = ctx.held.release().unwrap_or_default();
    let mut response = Response::new(axum::body::Body::new(ChunkBody::from_chunks(chunks)));
    *response.status_mut() = trial.status;
    *response.headers_mut() = response_headers;
    response
}
