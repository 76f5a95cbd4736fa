//! Location-header rewriting on the forward path.
//!
//! A redirect produced by the fallback upstream may point at the
//! upstream's own authority, which the client must never see. When the
//! resolved `Location` matches the upstream's authority, only the
//! authority (and the scheme, per the inbound connection's security)
//! is replaced with the client-facing host; path, query, and fragment
//! stay untouched. Any other authority is someone else's redirect and
//! passes through unmodified. Gated to run at most once per forwarded
//! response.

use axum::http::header::LOCATION;
use axum::http::{HeaderMap, HeaderValue};
use url::Url;

/// Rewrite the `Location` header in-place if it leaks the upstream
/// authority. `applied` is the per-response one-shot gate.
pub fn rewrite_location(
    headers: &mut HeaderMap,
    upstream: &Url,
    client_authority: &str,
    secure: bool,
    applied: &mut bool,
) {
    if *applied {
        return;
    }
    *applied = true;

    let Some(location) = headers.get(LOCATION).and_then(|v| v.to_str().ok()) else {
        return;
    };

    // Relative Location values resolve against the upstream base.
    let Ok(resolved) = upstream.join(location) else {
        tracing::debug!(location, "unparseable Location header, leaving unmodified");
        return;
    };

    if !same_authority(&resolved, upstream) {
        return;
    }

    let Some((host, port)) = split_authority(client_authority) else {
        tracing::warn!(
            authority = client_authority,
            "invalid client authority, leaving Location unmodified"
        );
        return;
    };

    let mut rewritten = resolved;
    let scheme = if secure { "https" } else { "http" };
    if rewritten.set_scheme(scheme).is_err()
        || rewritten.set_host(Some(&host)).is_err()
        || rewritten.set_port(port).is_err()
    {
        return;
    }

    match HeaderValue::from_str(rewritten.as_str()) {
        Ok(value) => {
            headers.insert(LOCATION, value);
        }
        Err(e) => {
            tracing::warn!(error = %e, "rewritten Location is not a valid header value");
        }
    }
}

/// Authority equality: host plus effective port (default ports count).
fn same_authority(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Split `host[:port]`, tolerating bracketed IPv6 literals, by round-
/// tripping through a URL parse.
fn split_authority(authority: &str) -> Option<(String, Option<u16>)> {
    let probe = Url::parse(&format!("http://{authority}/")).ok()?;
    let host = probe.host_str()?.to_string();
    Some((host, probe.port()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream() -> Url {
        Url::parse("http://upstream-host:8081").unwrap()
    }

    fn rewrite(headers: &mut HeaderMap, secure: bool) -> bool {
        let mut applied = false;
        rewrite_location(headers, &upstream(), "public.example", secure, &mut applied);
        applied
    }

    #[test]
    fn upstream_authority_is_replaced() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, "http://upstream-host:8081/newpath".parse().unwrap());
        rewrite(&mut headers, false);
        assert_eq!(headers.get(LOCATION).unwrap(), "http://public.example/newpath");
    }

    #[test]
    fn scheme_follows_inbound_security() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, "http://upstream-host:8081/login".parse().unwrap());
        rewrite(&mut headers, true);
        assert_eq!(headers.get(LOCATION).unwrap(), "https://public.example/login");
    }

    #[test]
    fn relative_location_resolves_against_upstream() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, "/moved/here".parse().unwrap());
        rewrite(&mut headers, false);
        assert_eq!(headers.get(LOCATION).unwrap(), "http://public.example/moved/here");
    }

    #[test]
    fn foreign_authority_is_untouched() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, "http://elsewhere.example/page".parse().unwrap());
        rewrite(&mut headers, false);
        assert_eq!(headers.get(LOCATION).unwrap(), "http://elsewhere.example/page");
    }

    #[test]
    fn path_query_and_fragment_survive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LOCATION,
            "http://upstream-host:8081/a/b?x=1&y=2#frag".parse().unwrap(),
        );
        rewrite(&mut headers, false);
        assert_eq!(
            headers.get(LOCATION).unwrap(),
            "http://public.example/a/b?x=1&y=2#frag"
        );
    }

    #[test]
    fn client_port_is_carried() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, "http://upstream-host:8081/p".parse().unwrap());
        let mut applied = false;
        rewrite_location(
            &mut headers,
            &upstream(),
            "public.example:8443",
            false,
            &mut applied,
        );
        assert_eq!(headers.get(LOCATION).unwrap(), "http://public.example:8443/p");
    }

    #[test]
    fn default_port_matches_explicit_default() {
        // Upstream on port 80, Location without an explicit port.
        let upstream = Url::parse("http://upstream-host:80").unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, "http://upstream-host/done".parse().unwrap());
        let mut applied = false;
        rewrite_location(&mut headers, &upstream, "public.example", false, &mut applied);
        assert_eq!(headers.get(LOCATION).unwrap(), "http://public.example/done");
    }

    #[test]
    fn runs_at_most_once() {
        let mut headers = HeaderMap::new();
        headers.insert(LOCATION, "http://upstream-host:8081/one".parse().unwrap());
        let mut applied = false;
        rewrite_location(&mut headers, &upstream(), "public.example", false, &mut applied);
        assert!(applied);

        // A second pass must not touch the (already rewritten) header,
        // even if it would otherwise match.
        headers.insert(LOCATION, "http://upstream-host:8081/two".parse().unwrap());
        rewrite_location(&mut headers, &upstream(), "public.example", false, &mut applied);
        assert_eq!(headers.get(LOCATION).unwrap(), "http://upstream-host:8081/two");
    }

    #[test]
    fn missing_location_is_a_noop() {
        let mut headers = HeaderMap::new();
        assert!(rewrite(&mut headers, false));
        assert!(headers.get(LOCATION).is_none());
    }
}
