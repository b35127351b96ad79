//! Loading command trees from schema files.
//!
//! The file format follows the extension: `.yaml`/`.yml` is YAML and
//! `.json` is JSON.
//!
//! # Example YAML
//!
//! ```yaml
//! name: deploy
//! help: Ship a build
//! flags:
//!   - name: verbose
//!     kind: bool
//!     short: v
//!   - name: region
//!     allow: [eu, us]
//!     env: DEPLOY_REGION
//!     default: eu
//! commands:
//!   - name: service
//!     args:
//!       - name: target
//!         required: true
//! ```

use std::io::BufReader;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::schema::App;
use crate::types::CommandSpec;
use crate::validate::SchemaError;

/// Errors that can occur while loading a schema file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The extension names no known format.
    #[error("unsupported schema format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The file parsed but describes an invalid tree.
    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),
}

/// Serialization format of a schema file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecFormat {
    Json,
    Yaml,
}

impl SpecFormat {
    /// Picks the format from `path`'s extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "json" => Some(SpecFormat::Json),
            "yaml" | "yml" => Some(SpecFormat::Yaml),
            _ => None,
        }
    }
}

/// Reads a [`CommandSpec`] from `path` without validating it.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read,
/// [`ConfigError::UnsupportedFormat`] for an unknown extension, or a
/// JSON/YAML error if parsing fails.
pub fn load_spec(path: impl AsRef<Path>) -> Result<CommandSpec, ConfigError> {
    let path = path.as_ref();
    let format =
        SpecFormat::from_path(path).ok_or_else(|| ConfigError::UnsupportedFormat(path.into()))?;

    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let spec = match format {
        SpecFormat::Json => serde_json::from_reader(reader)?,
        SpecFormat::Yaml => serde_yaml::from_reader(reader)?,
    };
    debug!(path = %path.display(), ?format, "Loaded schema file");
    Ok(spec)
}

impl App {
    /// Loads and validates the command tree stored at `path`.
    ///
    /// # Errors
    ///
    /// Everything [`load_spec`] returns, plus [`ConfigError::Schema`] when
    /// the tree is invalid.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let spec = load_spec(path)?;
        Ok(App::new(spec)?)
    }
}
