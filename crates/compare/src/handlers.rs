//! Correlation handlers: strategies pairing an old element with its
//! counterpart in the new listing once exact identity matching has failed.
//!
//! Handlers are tried in order and the first match wins, so specific
//! strategies (explicit rename maps) go ahead of the generic built-ins.

use std::collections::BTreeMap;

use apicheck_model::{MemberDescriptor, TypeDescriptor};

/// Auxiliary data handed to every handler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationData {
    /// Old name to new name. Keys are type names (`Company.OldName`) or
    /// member names qualified by their old type
    /// (`Company.Widget.OldMethod`); values are the new type name or the
    /// new simple member name.
    pub renames: BTreeMap<String, String>,
}

impl CorrelationData {
    pub fn with_rename(mut self, old: impl Into<String>, new: impl Into<String>) -> Self {
        self.renames.insert(old.into(), new.into());
        self
    }
}

/// What is being correlated: an unmatched old element and the new elements
/// at the same scope nobody has claimed yet.
#[derive(Debug, Clone, Copy)]
pub enum CorrelationScope<'a> {
    Type {
        old: &'a TypeDescriptor,
        candidates: &'a [&'a TypeDescriptor],
    },
    Member {
        old_type: &'a TypeDescriptor,
        new_type: &'a TypeDescriptor,
        old: &'a MemberDescriptor,
        candidates: &'a [&'a MemberDescriptor],
    },
}

#[derive(Debug, Clone, Copy)]
pub struct CorrelationContext<'a> {
    pub scope: CorrelationScope<'a>,
    pub data: &'a CorrelationData,
}

/// A matching strategy. Returns the index of the matched element within the
/// context's candidates, or `None` to defer to the next handler.
pub trait CorrelationHandler: Send + Sync {
    fn correlate(&self, context: &CorrelationContext<'_>) -> Option<usize>;
}

impl<F> CorrelationHandler for F
where
    F: Fn(&CorrelationContext<'_>) -> Option<usize> + Send + Sync,
{
    fn correlate(&self, context: &CorrelationContext<'_>) -> Option<usize> {
        self(context)
    }
}

/// Pairs a type with the candidate carrying the same fully qualified name,
/// so a type whose modifiers or constraints changed is still compared.
pub fn find_type_using_full_name(context: &CorrelationContext<'_>) -> Option<usize> {
    let CorrelationScope::Type { old, candidates } = context.scope else {
        return None;
    };
    candidates.iter().position(|ty| ty.name == old.name)
}

/// Pairs a member with a same-kind candidate of the same simple name.
///
/// Overloads make this ambiguous; the single candidate with the same
/// parameter count wins, and the handler declines when that is not unique.
pub fn find_member_using_name(context: &CorrelationContext<'_>) -> Option<usize> {
    let CorrelationScope::Member { old, candidates, .. } = context.scope else {
        return None;
    };
    let same_name: Vec<usize> = candidates
        .iter()
        .enumerate()
        .filter(|(_, member)| member.kind == old.kind && member.simple_name() == old.simple_name())
        .map(|(index, _)| index)
        .collect();
    match same_name.as_slice() {
        [] => None,
        [only] => Some(*only),
        several => {
            let mut same_arity = several
                .iter()
                .copied()
                .filter(|index| candidates[*index].parameters.len() == old.parameters.len());
            match (same_arity.next(), same_arity.next()) {
                (Some(index), None) => Some(index),
                _ => None,
            }
        }
    }
}

/// Pairs elements through [`CorrelationData::renames`].
pub fn find_using_rename_map(context: &CorrelationContext<'_>) -> Option<usize> {
    let renames = &context.data.renames;
    match context.scope {
        CorrelationScope::Type { old, candidates } => {
            let new_name = renames.get(&old.name)?;
            candidates.iter().position(|ty| &ty.name == new_name)
        }
        CorrelationScope::Member {
            old_type,
            old,
            candidates,
            ..
        } => {
            let key = format!("{}.{}", old_type.name, old.simple_name());
            let new_name = renames.get(&key)?;
            let mut matches = candidates.iter().enumerate().filter(|(_, member)| {
                member.kind == old.kind
                    && (member.simple_name() == new_name || &member.name == new_name)
            });
            match (matches.next(), matches.next()) {
                (Some((index, _)), None) => Some(index),
                _ => None,
            }
        }
    }
}

/// The built-in handlers: rename map, full type name, member name.
pub fn default_handlers() -> Vec<Box<dyn CorrelationHandler>> {
    vec![
        Box::new(find_using_rename_map),
        Box::new(find_type_using_full_name),
        Box::new(find_member_using_name),
    ]
}
