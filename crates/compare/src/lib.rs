//! apicheck-compare: finds breaking changes between two API listings.
//!
//! [`BaselineComparer`] pairs the types and members of an old and a new
//! [`ApiListing`](apicheck_model::ApiListing), classifies the differences
//! into [`ChangeKind`]s and drops the ones an [`ExceptionPredicate`]
//! accepts. Pairing across renames and overload changes is delegated to an
//! ordered chain of [`CorrelationHandler`]s.

pub mod change;
pub mod comparer;
pub mod exceptions;
pub mod handlers;
pub mod kinds;

pub use change::{BreakingChange, ChangeReport};
pub use comparer::{compare, BaselineComparer};
pub use exceptions::{ExceptionEntry, ExceptionError, ExceptionList, ExceptionPredicate};
pub use handlers::{
    default_handlers, find_member_using_name, find_type_using_full_name, find_using_rename_map,
    CorrelationContext, CorrelationData, CorrelationHandler, CorrelationScope,
};
pub use kinds::{ChangeKind, ChangeKinds, UnknownChangeKind};
