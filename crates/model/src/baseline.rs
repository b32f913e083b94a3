//! The persisted baseline artifact.
//!
//! A baseline is the JSON rendering of an [`ApiListing`]. Serialization is
//! deterministic: two listings that compare equal always produce the same
//! bytes, so regenerated baselines only show real changes in review.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::listing::ApiListing;

/// Errors reading or writing a baseline artifact.
#[derive(Debug, thiserror::Error)]
pub enum BaselineError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid baseline JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Two types in one listing share a canonical name.
    #[error("baseline lists type '{0}' more than once")]
    DuplicateType(String),
}

impl ApiListing {
    /// Render the listing as pretty-printed JSON with a trailing newline.
    pub fn to_json_string(&self) -> Result<String, BaselineError> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Parse a listing from baseline JSON, rejecting duplicate type names.
    pub fn from_json_str(json: &str) -> Result<ApiListing, BaselineError> {
        let listing: ApiListing = serde_json::from_str(json)?;
        let mut seen = BTreeSet::new();
        for ty in &listing.types {
            if !seen.insert(ty.name.as_str()) {
                return Err(BaselineError::DuplicateType(ty.name.clone()));
            }
        }
        Ok(listing)
    }
}

/// Read a baseline artifact from disk.
pub fn read_baseline(path: &Path) -> Result<ApiListing, BaselineError> {
    let content = std::fs::read_to_string(path).map_err(|source| BaselineError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    ApiListing::from_json_str(&content)
}

/// Write a baseline artifact to disk, replacing any previous file.
pub fn write_baseline(path: &Path, listing: &ApiListing) -> Result<(), BaselineError> {
    let json = listing.to_json_string()?;
    std::fs::write(path, json).map_err(|source| BaselineError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// True when `bytes` look like a baseline rather than a compiled binary.
pub fn looks_like_baseline(bytes: &[u8]) -> bool {
    let text = match bytes.strip_prefix(b"\xEF\xBB\xBF") {
        Some(rest) => rest,
        None => bytes,
    };
    text.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}
