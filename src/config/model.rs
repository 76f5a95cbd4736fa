//! Serde data structures for the Understudy configuration file.
//!
//! Contains [`Config`], the root (and only) config type. All fields
//! except `upstream` and `origin_root` have defaults, and serialization
//! skips values that match them, so generated configs stay minimal.
//! `deny_unknown_fields` keeps parsing strict.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

const fn default_timeout() -> u64 {
    30_000
}

fn default_unserved() -> Vec<u16> {
    vec![403, 404]
}

fn default_probe_unserved() -> Vec<u16> {
    vec![404]
}

fn is_default_timeout(v: &u64) -> bool {
    *v == default_timeout()
}

fn is_default_unserved(v: &[u16]) -> bool {
    *v == [403, 404]
}

fn is_default_probe_unserved(v: &[u16]) -> bool {
    *v == [404]
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Base URI of the fallback upstream.
    pub upstream: String,

    /// Document root of the built-in filesystem origin.
    pub origin_root: PathBuf,

    /// Directory for spooled request bodies. Default: system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_cache: Option<PathBuf>,

    /// Status codes meaning "local origin cannot serve this" after a
    /// full trial.
    #[serde(default = "default_unserved", skip_serializing_if = "is_default_unserved")]
    pub unserved: Vec<u16>,

    /// Status codes letting the cheap probe skip the trial entirely.
    #[serde(
        default = "default_probe_unserved",
        skip_serializing_if = "is_default_probe_unserved"
    )]
    pub probe_unserved: Vec<u16>,

    /// Client-facing hostname used for redirect rewriting when the
    /// request carries no `Host` header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_timeout", skip_serializing_if = "is_default_timeout")]
    pub timeout: u64,
}

impl Config {
    /// A config built purely from required values, everything else at
    /// defaults. Used when no config file is given.
    #[must_use]
    pub fn from_required(upstream: String, origin_root: PathBuf) -> Self {
        Self {
            upstream,
            origin_root,
            body_cache: None,
            unserved: default_unserved(),
            probe_unserved: default_probe_unserved(),
            server_name: None,
            timeout: default_timeout(),
        }
    }
}
