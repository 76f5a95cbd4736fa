//! `understudy run` — start the proxy server.
//!
//! Resolves configuration from a file and/or CLI flags (flags win),
//! validates the result, and starts the Axum HTTP server with graceful
//! shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use url::Url;

use crate::cli::RunArgs;
use crate::config::model::Config;
use crate::config::{self, validation};
use crate::engine::classify::UnservedCodes;
use crate::error::UnderstudyError;
use crate::logging;
use crate::origin::FsOrigin;
use crate::server::{self, AppState, Stats};

pub async fn execute(args: RunArgs) -> Result<(), UnderstudyError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let config = resolve_config(&args).await?;

    // resolve_config validated the upstream, so this parse cannot fail
    // for a config that got this far.
    let upstream = Url::parse(&config.upstream).map_err(|e| UnderstudyError::UriParse {
        source: Box::new(e),
    })?;
    let spool_dir = config
        .body_cache
        .clone()
        .unwrap_or_else(std::env::temp_dir);

    let state = Arc::new(AppState {
        upstream,
        spool_dir,
        server_name: config.server_name.clone(),
        unserved: UnservedCodes::new(&config.unserved),
        probe_unserved: UnservedCodes::new(&config.probe_unserved),
        timeout: Duration::from_millis(config.timeout),
        origin: Arc::new(FsOrigin::new(config.origin_root.clone())),
        http_client: server::build_http_client(),
        start_time: Instant::now(),
        stats: Stats::new(),
        config: Arc::new(config),
    });

    let router = server::build_router(Arc::clone(&state), args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        upstream = %state.upstream,
        origin_root = %state.config.origin_root.display(),
        spool_dir = %state.spool_dir.display(),
        "understudy started"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(server::shutdown_signal())
        .await?;

    tracing::info!("understudy stopped");
    Ok(())
}

/// Load the config file if given, then layer CLI flags on top; with no
/// file, `--upstream` and `--root` become required.
async fn resolve_config(args: &RunArgs) -> Result<Config, UnderstudyError> {
    let mut config = if let Some(ref path) = args.config {
        config::load_file(path).await?
    } else {
        match (&args.upstream, &args.root) {
            (Some(upstream), Some(root)) => Config::from_required(upstream.clone(), root.clone()),
            _ => {
                return Err(UnderstudyError::NoConfig {
                    hint: "Provide --config <file>, or both --upstream and --root.".into(),
                })
            }
        }
    };

    if let Some(ref upstream) = args.upstream {
        config.upstream = upstream.clone();
    }
    if let Some(ref root) = args.root {
        config.origin_root = root.clone();
    }
    if let Some(ref cache) = args.body_cache {
        config.body_cache = Some(cache.clone());
    }
    if let Some(ref codes) = args.unserved {
        config.unserved = codes.clone();
    }
    if let Some(ref codes) = args.probe_unserved {
        config.probe_unserved = codes.clone();
    }
    if let Some(ref name) = args.server_name {
        config.server_name = Some(name.clone());
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }

    if let Err(errors) = validation::validate(&config) {
        return Err(UnderstudyError::ConfigValidation { errors });
    }

    Ok(config)
}
