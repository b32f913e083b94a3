//! Accepted breaking changes.
//!
//! An exception file is a JSON array of entries; each entry suppresses the
//! changes whose old identity (and optionally new identity, owning type and
//! kind) it names:
//!
//! ```json
//! [
//!   { "OldId": "public System.Void M()", "TypeId": "public class C.Widget" },
//!   { "OldId": "public class C.Legacy", "Kind": "Removed" }
//! ]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::change::BreakingChange;
use crate::kinds::ChangeKind;

#[derive(Debug, thiserror::Error)]
pub enum ExceptionError {
    #[error("could not read exception list '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid exception list '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Decides whether a breaking change is accepted and left out of the report.
pub trait ExceptionPredicate: Send + Sync {
    fn accepts(&self, change: &BreakingChange) -> bool;
}

impl<F> ExceptionPredicate for F
where
    F: Fn(&BreakingChange) -> bool + Send + Sync,
{
    fn accepts(&self, change: &BreakingChange) -> bool {
        self(change)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExceptionEntry {
    pub old_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ChangeKind>,
}

impl ExceptionEntry {
    pub fn new(old_id: impl Into<String>) -> Self {
        ExceptionEntry {
            old_id: old_id.into(),
            new_id: None,
            type_id: None,
            kind: None,
        }
    }

    /// An entry accepting exactly `change`.
    pub fn for_change(change: &BreakingChange) -> Self {
        ExceptionEntry {
            old_id: change.old_item.clone().unwrap_or_default(),
            new_id: change.new_item.clone(),
            type_id: change.type_id.clone(),
            kind: Some(change.kind),
        }
    }
}

impl ExceptionPredicate for ExceptionEntry {
    fn accepts(&self, change: &BreakingChange) -> bool {
        change.old_item.as_deref() == Some(self.old_id.as_str())
            && self
                .new_id
                .as_deref()
                .map_or(true, |new_id| change.new_item.as_deref() == Some(new_id))
            && self
                .type_id
                .as_deref()
                .map_or(true, |type_id| change.type_id.as_deref() == Some(type_id))
            && self.kind.map_or(true, |kind| change.kind == kind)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExceptionList {
    pub entries: Vec<ExceptionEntry>,
}

impl ExceptionList {
    pub fn load(path: &Path) -> Result<ExceptionList, ExceptionError> {
        let content = std::fs::read_to_string(path).map_err(|source| ExceptionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ExceptionError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ExceptionPredicate for ExceptionList {
    fn accepts(&self, change: &BreakingChange) -> bool {
        self.entries.iter().any(|entry| entry.accepts(change))
    }
}
