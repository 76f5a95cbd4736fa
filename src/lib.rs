//! Understudy is an HTTP fallback proxy.
//!
//! For every inbound request it decides whether a local origin can
//! successfully serve it; if not, the request is transparently
//! forwarded to a fallback upstream, with the original body replayed
//! byte-for-byte and redirect targets rewritten so the client never
//! observes the fallback's identity. The decision runs an internal
//! trial execution whose output is held back until classification.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Configuration loading and validation.
//! - [`engine`] -- The decision engine: cheap probe, trial execution,
//!   classification, serve-or-forward dispatch, header reconciliation,
//!   and Location rewriting.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /health` endpoint handler returning runtime diagnostics.
//! - [`hold`] -- The output hold/release buffer for trial responses.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`origin`] -- The local-origin trait and its filesystem implementation.
//! - [`server`] -- Axum server setup, shared application state, HTTP client,
//!   and graceful shutdown.
//! - [`spool`] -- Request-body capture and replay via on-disk spool files.
//! - [`stream`] -- The pull-based chunk-stream interface shared by all
//!   interception stages.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `json` | JSON config file support |

// Binary crate — public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod hold;
pub mod logging;
pub mod origin;
pub mod server;
pub mod spool;
pub mod stream;
