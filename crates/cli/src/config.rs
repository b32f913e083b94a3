//! Project configuration for `apicheck`.
//!
//! Loaded from `--config <path>`, or from `apicheck.toml` in the working
//! directory when present. Command-line flags extend or override it.
//!
//! # Example
//!
//! ```toml
//! [listing]
//! exclude_namespaces = ["Company.Internal"]
//! exclude_types = ["Company.Generated."]
//!
//! [compare]
//! kinds = ["removed", "visibility", "parameters"]
//! exceptions = "breaking-changes.json"
//!
//! [renames]
//! "Company.OldName" = "Company.NewName"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use apicheck_reader::{ExclusionFilter, NamespaceFilter, TypeNameFilter};
use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "apicheck.toml";

#[derive(Debug, thiserror::Error)]
pub(crate) enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Config {
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub compare: CompareConfig,
    /// Old name to new name, for types (`Company.Old`) or members
    /// qualified by their type (`Company.Widget.OldMethod`).
    #[serde(default)]
    pub renames: BTreeMap<String, String>,
}

/// `[listing]`: what to leave out of every listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ListingConfig {
    #[serde(default)]
    pub exclude_namespaces: Vec<String>,
    #[serde(default)]
    pub exclude_types: Vec<String>,
}

/// `[compare]`: which changes count and which are accepted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct CompareConfig {
    /// Change kind names; all kinds when absent.
    pub kinds: Option<Vec<String>>,
    /// Exception list, relative to the configuration file.
    pub exceptions: Option<PathBuf>,
}

impl Config {
    /// Read the explicit configuration file, or the default one if it
    /// exists, or fall back to an empty configuration.
    pub(crate) fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
        match explicit {
            Some(path) => Config::read(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Config::read(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    pub(crate) fn read(path: &Path) -> Result<Config, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if let (Some(exceptions), Some(dir)) = (&config.compare.exceptions, path.parent()) {
            if exceptions.is_relative() {
                config.compare.exceptions = Some(dir.join(exceptions));
            }
        }
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Exclusion filters from the configuration plus any given on the
    /// command line.
    pub(crate) fn filters(
        &self,
        extra_namespaces: &[String],
        extra_types: &[String],
    ) -> Vec<Box<dyn ExclusionFilter>> {
        let namespaces: Vec<&String> = self
            .listing
            .exclude_namespaces
            .iter()
            .chain(extra_namespaces)
            .collect();
        let types: Vec<&String> = self
            .listing
            .exclude_types
            .iter()
            .chain(extra_types)
            .collect();

        let mut filters: Vec<Box<dyn ExclusionFilter>> = Vec::new();
        if !namespaces.is_empty() {
            filters.push(Box::new(NamespaceFilter::new(namespaces.into_iter().cloned())));
        }
        if !types.is_empty() {
            filters.push(Box::new(TypeNameFilter::new(types.into_iter().cloned())));
        }
        filters
    }
}
