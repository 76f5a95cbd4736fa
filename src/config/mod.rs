//! Configuration loading and validation.
//!
//! A config can come from a YAML/JSON file, from CLI flags alone, or
//! from a file with flag overrides on top. [`load_file`] parses by
//! extension and validates; [`parse_config_str`] is the format
//! dispatcher shared with `understudy validate`.

pub mod model;
pub mod validation;

use std::path::Path;

use crate::error::UnderstudyError;
use model::Config;

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, UnderstudyError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| UnderstudyError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| UnderstudyError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(UnderstudyError::UnsupportedFormat(other.to_string())),
    }
}

/// Read, parse, and validate a config file.
pub async fn load_file(path: &Path) -> Result<Config, UnderstudyError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            UnderstudyError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            UnderstudyError::Io(e)
        }
    })?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = parse_config_str(ext, &content, &path.display().to_string())?;

    if let Err(errors) = validation::validate(&config) {
        return Err(UnderstudyError::ConfigValidation { errors });
    }

    Ok(config)
}
