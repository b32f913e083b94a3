//! apicheck-reader: extracts the public API listing of a compiled library.
//!
//! The reader walks the metadata decoded by `apicheck-metadata` and keeps
//! what a consumer outside the assembly can see: public types, public and
//! protected members, and the modifiers and signatures that matter for
//! compatibility. Exclusion filters drop further types or members.
//!
//! ```no_run
//! use std::path::Path;
//! use apicheck_reader::{read_path, ExclusionFilter, NamespaceFilter};
//!
//! let filters: Vec<Box<dyn ExclusionFilter>> =
//!     vec![Box::new(NamespaceFilter::new(["Company.Internal"]))];
//! let listing = read_path(Path::new("Company.Widgets.dll"), &filters)?;
//! println!("{} public types", listing.types.len());
//! # Ok::<(), apicheck_reader::ReadError>(())
//! ```

pub mod error;
pub mod filter;
mod identity;
mod interfaces;
mod literal;
mod names;
mod reader;
mod source;

pub use error::ReadError;
pub use filter::{ExclusionFilter, FilterSubject, NamespaceFilter, TypeNameFilter};
pub use identity::{assembly_identity, public_key_token};
pub use reader::{read_module, ListingReader};
pub use source::{read_bytes, read_path};
