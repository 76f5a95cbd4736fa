//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`Config`] for structural
//! errors such as a malformed upstream URL, an empty origin root, or
//! out-of-range status codes. Returns a list of [`ValidationError`]
//! values with per-field suggestions.

use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Validate the upstream base URL. Returns `Ok(())` or a human-readable error.
pub fn validate_upstream(upstream: &str) -> Result<(), String> {
    match Url::parse(upstream) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            if scheme != "http" && scheme != "https" {
                Err(format!(
                    "unsupported scheme '{scheme}' (expected http or https)"
                ))
            } else if parsed.host_str().is_none() {
                Err(format!("'{upstream}' has no host"))
            } else {
                Ok(())
            }
        }
        Err(_) => Err(format!("'{upstream}' is not a valid URL")),
    }
}

fn validate_codes(field: &str, codes: &[u16], errors: &mut Vec<ValidationError>) {
    if codes.is_empty() {
        errors.push(ValidationError {
            field: field.to_string(),
            message: "at least one status code must be listed".into(),
            suggestion: Some("the default is 403,404".into()),
        });
    }
    for code in codes {
        if !(100..=599).contains(code) {
            errors.push(ValidationError {
                field: field.to_string(),
                message: format!("'{code}' is not a valid HTTP status code"),
                suggestion: None,
            });
        }
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(message) = validate_upstream(&config.upstream) {
        errors.push(ValidationError {
            field: "upstream".into(),
            message,
            suggestion: Some("e.g. http://fallback.internal:8080".into()),
        });
    }

    if config.origin_root.as_os_str().is_empty() {
        errors.push(ValidationError {
            field: "origin_root".into(),
            message: "origin root cannot be empty".into(),
            suggestion: None,
        });
    }

    validate_codes("unserved", &config.unserved, &mut errors);
    validate_codes("probe_unserved", &config.probe_unserved, &mut errors);

    if config.timeout == 0 {
        errors.push(ValidationError {
            field: "timeout".into(),
            message: "timeout must be greater than zero milliseconds".into(),
            suggestion: None,
        });
    }

    if let Some(ref name) = config.server_name {
        if name.is_empty() {
            errors.push(ValidationError {
                field: "server_name".into(),
                message: "server name cannot be empty when set".into(),
                suggestion: Some("omit the field to fall back to the Host header".into()),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, config: &Config) -> String {
    let mut lines = vec![format!("  upstream:     {}", config.upstream)];
    lines.push(format!(
        "  origin root:  {}",
        config.origin_root.display()
    ));
    lines.push(format!(
        "  body cache:   {}",
        config
            .body_cache
            .as_ref()
            .map_or_else(|| "(system temp dir)".to_string(), |p| p.display().to_string())
    ));
    lines.push(format!(
        "  unserved:     {:?} (probe: {:?})",
        config.unserved, config.probe_unserved
    ));
    lines.push(format!("  timeout:      {}ms", config.timeout));

    format!("{} is valid\n{}", path, lines.join("\n"))
}
