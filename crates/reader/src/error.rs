use std::path::PathBuf;

use apicheck_metadata::MetadataError;
use apicheck_model::BaselineError;

/// Errors produced while building an API listing.
///
/// Malformed binaries surface as [`ReadError::Metadata`]. The remaining
/// variants describe metadata shapes a compiler does not normally emit;
/// they abort the read rather than produce an incomplete listing.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Baseline(#[from] BaselineError),

    #[error("can't determine the kind of type '{0}'")]
    UnknownTypeKind(String),

    /// A field row with a method signature, or the reverse.
    #[error("member '{member}' of '{type_name}' has a signature of an unexpected category")]
    UnsupportedMember { type_name: String, member: String },

    #[error("unsupported literal (element type {element_type:#04x}) for '{context}'")]
    UnsupportedLiteral { element_type: u8, context: String },
}
