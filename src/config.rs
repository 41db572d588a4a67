use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::errors::{SearchError, SearchResult};

/// Engine settings.
///
/// # Configuration Locations
///
/// Settings can be loaded from multiple locations in order of precedence:
/// 1. Custom config file passed to [`SearchSettings::load_from`]
/// 2. Local `.linescout.yaml` in the current directory
/// 3. Global `$HOME/.config/linescout/config.yaml`
///
/// # Configuration Format
///
/// The configuration uses YAML format. Example:
/// ```yaml
/// # Skip files that look binary
/// skip_binary_files: true
///
/// # Lines of context before and after each match
/// context_lines: 2
///
/// # Longest context string attached to a match
/// max_context_length: 512
///
/// # Worker count (default: CPU cores)
/// thread_count: 4
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Whether to sniff file prefixes and skip likely-binary sources
    #[serde(default)]
    pub skip_binary_files: bool,

    /// Number of context lines kept before and after each matched line
    #[serde(default)]
    pub context_lines: usize,

    /// Upper bound, in characters, on the context string and on each
    /// context line attached to a match
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,

    /// Number of worker threads for the parallel pass
    /// Defaults to number of CPU cores if not specified
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,
}

fn default_max_context_length() -> usize {
    512
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            skip_binary_files: false,
            context_lines: 0,
            max_context_length: default_max_context_length(),
            thread_count: default_thread_count(),
        }
    }
}

impl SearchSettings {
    /// Loads settings from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads settings, additionally reading `config_path` when given.
    /// The explicit path must exist; the default locations are optional.
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        let default_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("linescout/config.yaml")),
            // Local config
            Some(PathBuf::from(".linescout.yaml")),
        ];

        for path in default_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }

        builder.build()?.try_deserialize()
    }

    /// Checks the constraints the engine relies on.
    pub fn validate(&self) -> SearchResult<()> {
        if self.max_context_length == 0 {
            return Err(SearchError::invalid_argument(
                "max_context_length must be greater than zero",
            ));
        }
        Ok(())
    }
}
