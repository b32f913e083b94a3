//! apicheck-model: descriptors for a library's public API surface.
//!
//! An [`ApiListing`] is the canonical, comparable description of one
//! assembly version. It is produced by `apicheck-reader`, persisted as a
//! baseline artifact, and consumed by `apicheck-compare`.
//!
//! Every descriptor renders a canonical identity string (see [`identity`]);
//! identity equality is what makes two descriptors the same element.

pub mod baseline;
pub mod identity;
pub mod listing;

pub use baseline::{looks_like_baseline, read_baseline, write_baseline, BaselineError};
pub use identity::{method_name, simple_name};
pub use listing::{
    ApiListing, GenericParameterDescriptor, MemberDescriptor, MemberKind, ParameterDescriptor,
    ParameterDirection, TypeDescriptor, TypeKind, Visibility,
};
