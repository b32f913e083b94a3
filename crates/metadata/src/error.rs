use crate::tables::TableId;

/// Errors raised while parsing a compiled assembly.
///
/// Every malformed or out-of-range read in the parser ends up here; the
/// parser never panics on hostile input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    /// A read ran past the end of the buffer it was reading from.
    #[error("image truncated at offset {offset:#x}")]
    Truncated { offset: usize },

    /// The PE container is malformed.
    #[error("invalid image: {0}")]
    InvalidImage(&'static str),

    /// The image is a valid PE file but carries no CLI metadata.
    #[error("not a managed assembly: {0}")]
    NotManaged(&'static str),

    /// The metadata is well formed but uses a layout this parser does not read.
    #[error("unsupported metadata: {0}")]
    Unsupported(String),

    /// A row index pointed outside its table.
    #[error("{table:?} row {row} out of range")]
    BadIndex { table: TableId, row: u32 },

    /// A heap offset pointed outside its heap, or heap data is malformed.
    #[error("invalid {heap} heap entry at {offset:#x}")]
    BadHeapEntry { heap: &'static str, offset: u32 },

    /// A signature or constant blob could not be decoded.
    #[error("invalid signature: {0}")]
    BadSignature(&'static str),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
