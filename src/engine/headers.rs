//! Header reconciliation between trial results, inbound requests, and
//! the forwarded request.
//!
//! Trial headers merge onto the outer response with set/overwrite
//! semantics, never duplicate-append. Content-type, content-encoding
//! and last-modified get explicit separate assignment on top of the
//! merge — host header tables have historically not carried these three
//! reliably, so the copy is a deliberate special case. `Accept-Encoding`
//! removal/restoration brackets the trial execution only.

use std::sync::LazyLock;

use axum::http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, CONTENT_TYPE, LAST_MODIFIED};
use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::origin::TrialResult;

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Strip hop-by-hop headers before handing a request to the upstream
/// client; hyper manages the connection itself.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP.iter() {
        headers.remove(name);
    }
}

/// Remove `Accept-Encoding` ahead of the trial, returning the original
/// value so it can be restored afterwards. Running the trial with the
/// client's value would content-negotiate twice.
pub fn strip_accept_encoding(headers: &mut HeaderMap) -> Option<HeaderValue> {
    headers.remove(ACCEPT_ENCODING)
}

/// Restore a previously stripped `Accept-Encoding` value.
pub fn restore_accept_encoding(headers: &mut HeaderMap, saved: Option<HeaderValue>) {
    if let Some(value) = saved {
        headers.insert(ACCEPT_ENCODING, value);
    }
}

/// Merge a trial's headers onto the outer response: regular headers,
/// then error headers, each overwriting on conflict, then the three
/// explicitly carried fields.
pub fn merge_trial_headers(outer: &mut HeaderMap, trial: &TrialResult) {
    for (name, value) in &trial.headers {
        outer.insert(name.clone(), value.clone());
    }
    for (name, value) in &trial.error_headers {
        outer.insert(name.clone(), value.clone());
    }
    if let Some(value) = &trial.content_type {
        outer.insert(CONTENT_TYPE, value.clone());
    }
    if let Some(value) = &trial.content_encoding {
        outer.insert(CONTENT_ENCODING, value.clone());
    }
    if let Some(value) = &trial.last_modified {
        outer.insert(LAST_MODIFIED, value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn merge_overwrites_on_conflict() {
        let mut outer = HeaderMap::new();
        outer.insert("x-served-by", "outer".parse().unwrap());

        let mut trial = TrialResult::with_status(StatusCode::OK);
        trial.headers.insert("x-served-by", "trial".parse().unwrap());

        merge_trial_headers(&mut outer, &trial);
        let values: Vec<_> = outer.get_all("x-served-by").iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "trial");
    }

    #[test]
    fn error_headers_override_regular_headers() {
        let mut outer = HeaderMap::new();
        let mut trial = TrialResult::with_status(StatusCode::OK);
        trial.headers.insert("x-note", "normal".parse().unwrap());
        trial.error_headers.insert("x-note", "error".parse().unwrap());

        merge_trial_headers(&mut outer, &trial);
        assert_eq!(outer.get("x-note").unwrap(), "error");
    }

    #[test]
    fn explicit_fields_are_carried() {
        let mut outer = HeaderMap::new();
        let mut trial = TrialResult::with_status(StatusCode::OK);
        trial.content_type = Some("text/css".parse().unwrap());
        trial.content_encoding = Some("gzip".parse().unwrap());
        trial.last_modified = Some("Wed, 01 Jan 2025 00:00:00 GMT".parse().unwrap());

        merge_trial_headers(&mut outer, &trial);
        assert_eq!(outer.get("content-type").unwrap(), "text/css");
        assert_eq!(outer.get("content-encoding").unwrap(), "gzip");
        assert_eq!(
            outer.get("last-modified").unwrap(),
            "Wed, 01 Jan 2025 00:00:00 GMT"
        );
    }

    #[test]
    fn accept_encoding_round_trips() {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, "gzip, br".parse().unwrap());

        let saved = strip_accept_encoding(&mut headers);
        assert!(headers.get(ACCEPT_ENCODING).is_none());

        restore_accept_encoding(&mut headers, saved);
        assert_eq!(headers.get(ACCEPT_ENCODING).unwrap(), "gzip, br");
    }

    #[test]
    fn restore_without_saved_value_is_a_noop() {
        let mut headers = HeaderMap::new();
        restore_accept_encoding(&mut headers, None);
        assert!(headers.get(ACCEPT_ENCODING).is_none());
    }

    #[test]
    fn strips_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("content-type", "text/plain".parse().unwrap());

        strip_hop_by_hop(&mut headers);
        assert!(headers.get("connection").is_none());
        assert!(headers.get("transfer-encoding").is_none());
        assert!(headers.get("content-type").is_some());
    }
}
