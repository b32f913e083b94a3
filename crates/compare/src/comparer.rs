//! The baseline comparer: pairs the elements of two listings and classifies
//! what changed between each pair.
//!
//! Pairing happens per scope (types within the listing, then members within
//! each paired type). Elements with identical identity strings pair first;
//! the rest go through the correlation handlers against whatever new
//! elements are still unclaimed. An old element left without a partner is
//! `Removed`. Elements only present in the new listing are never reported.

use std::collections::HashMap;

use apicheck_model::{
    ApiListing, GenericParameterDescriptor, MemberDescriptor, ParameterDescriptor, TypeDescriptor,
    TypeKind,
};
use tracing::{debug, info};

use crate::change::{BreakingChange, ChangeReport};
use crate::exceptions::ExceptionPredicate;
use crate::handlers::{
    default_handlers, CorrelationContext, CorrelationData, CorrelationHandler, CorrelationScope,
};
use crate::kinds::{ChangeKind, ChangeKinds};

/// Compare two listings with explicit handlers and exceptions.
///
/// `handlers` are tried in the given order; pass
/// [`default_handlers`](crate::handlers::default_handlers) (possibly with
/// extra handlers in front) for the usual behavior.
pub fn compare(
    old: &ApiListing,
    new: &ApiListing,
    kinds: ChangeKinds,
    exceptions: &[Box<dyn ExceptionPredicate>],
    handlers: &[Box<dyn CorrelationHandler>],
    data: &CorrelationData,
) -> ChangeReport {
    Comparison {
        kinds,
        handlers: handlers.iter().map(|handler| &**handler).collect(),
        exceptions,
        data,
        changes: Vec::new(),
        suppressed: 0,
    }
    .run(old, new)
}

/// Builder-style front end to [`compare`].
///
/// ```
/// use apicheck_compare::{BaselineComparer, ChangeKinds, ExceptionEntry};
/// use apicheck_model::ApiListing;
///
/// let old = ApiListing::new("Widgets");
/// let new = ApiListing::new("Widgets");
/// let report = BaselineComparer::new()
///     .with_kinds(ChangeKinds::REMOVED | ChangeKinds::VISIBILITY)
///     .with_exception(ExceptionEntry::new("public class Widgets.Legacy"))
///     .compare(&old, &new);
/// assert!(report.is_empty());
/// ```
pub struct BaselineComparer {
    kinds: ChangeKinds,
    custom_handlers: Vec<Box<dyn CorrelationHandler>>,
    builtin_handlers: Vec<Box<dyn CorrelationHandler>>,
    exceptions: Vec<Box<dyn ExceptionPredicate>>,
    data: CorrelationData,
}

impl Default for BaselineComparer {
    fn default() -> Self {
        BaselineComparer::new()
    }
}

impl BaselineComparer {
    /// All change kinds, the built-in handlers, no exceptions.
    pub fn new() -> Self {
        BaselineComparer {
            kinds: ChangeKinds::all(),
            custom_handlers: Vec::new(),
            builtin_handlers: default_handlers(),
            exceptions: Vec::new(),
            data: CorrelationData::default(),
        }
    }

    pub fn with_kinds(mut self, kinds: ChangeKinds) -> Self {
        self.kinds = kinds;
        self
    }

    /// Add a handler that runs after previously added ones but before the
    /// built-ins.
    pub fn with_handler(mut self, handler: impl CorrelationHandler + 'static) -> Self {
        self.custom_handlers.push(Box::new(handler));
        self
    }

    /// Replace the whole handler chain, built-ins included.
    pub fn with_handlers(mut self, handlers: Vec<Box<dyn CorrelationHandler>>) -> Self {
        self.custom_handlers = handlers;
        self.builtin_handlers.clear();
        self
    }

    pub fn with_exception(mut self, exception: impl ExceptionPredicate + 'static) -> Self {
        self.exceptions.push(Box::new(exception));
        self
    }

    pub fn with_correlation_data(mut self, data: CorrelationData) -> Self {
        self.data = data;
        self
    }

    pub fn compare(&self, old: &ApiListing, new: &ApiListing) -> ChangeReport {
        Comparison {
            kinds: self.kinds,
            handlers: self
                .custom_handlers
                .iter()
                .chain(&self.builtin_handlers)
                .map(|handler| &**handler)
                .collect(),
            exceptions: &self.exceptions,
            data: &self.data,
            changes: Vec::new(),
            suppressed: 0,
        }
        .run(old, new)
    }
}

struct Comparison<'a> {
    kinds: ChangeKinds,
    handlers: Vec<&'a dyn CorrelationHandler>,
    exceptions: &'a [Box<dyn ExceptionPredicate>],
    data: &'a CorrelationData,
    changes: Vec<BreakingChange>,
    suppressed: usize,
}

impl<'a> Comparison<'a> {
    fn run(mut self, old: &ApiListing, new: &ApiListing) -> ChangeReport {
        let pairs = pair(&old.types, &new.types, TypeDescriptor::id, |old_type, candidates| {
            self.correlate(CorrelationScope::Type {
                old: old_type,
                candidates,
            })
        });

        for (old_type, new_type) in pairs {
            match new_type {
                Some(new_type) => self.compare_types(old_type, new_type),
                None => self.record(ChangeKind::Removed, None, old_type.id(), None),
            }
        }

        info!(
            old = %old.assembly_identity,
            new = %new.assembly_identity,
            changes = self.changes.len(),
            suppressed = self.suppressed,
            "compared listings"
        );
        ChangeReport {
            changes: self.changes,
        }
    }

    fn correlate(&self, scope: CorrelationScope<'_>) -> Option<usize> {
        let context = CorrelationContext {
            scope,
            data: self.data,
        };
        self.handlers
            .iter()
            .enumerate()
            .find_map(|(position, handler)| {
                let matched = handler.correlate(&context)?;
                debug!(handler = position, candidate = matched, "handler matched");
                Some(matched)
            })
    }

    fn record(
        &mut self,
        kind: ChangeKind,
        type_id: Option<String>,
        old_item: String,
        new_item: Option<String>,
    ) {
        if !self.kinds.includes(kind) {
            return;
        }
        let change = BreakingChange {
            kind,
            type_id,
            old_item: Some(old_item),
            new_item,
        };
        if self
            .exceptions
            .iter()
            .any(|exception| exception.accepts(&change))
        {
            debug!(kind = %kind, old = ?change.old_item, "change accepted by exception");
            self.suppressed += 1;
            return;
        }
        self.changes.push(change);
    }

    fn compare_types(&mut self, old: &TypeDescriptor, new: &TypeDescriptor) {
        let old_id = old.id();
        let new_id = new.id();
        let mut found = Vec::new();

        if old.name != new.name {
            found.push(ChangeKind::Renamed);
        }
        if old.kind != new.kind {
            found.push(ChangeKind::KindChanged);
        }
        if old.visibility.is_narrowed_by(new.visibility) {
            found.push(ChangeKind::VisibilityNarrowed);
        }
        // Structs and enums are always sealed and interfaces always abstract,
        // so modifiers only compare within one kind.
        if old.kind == new.kind
            && ((!old.is_sealed && new.is_sealed)
                || (!old.is_abstract && new.is_abstract)
                || (!old.is_static && new.is_static))
        {
            found.push(ChangeKind::ModifiersChanged);
        }
        let base_changed = if old.kind == TypeKind::Enumeration {
            old.base_type != new.base_type
        } else {
            old.base_type.is_some() && old.base_type != new.base_type
        };
        if base_changed {
            found.push(ChangeKind::BaseTypeChanged);
        }
        if old
            .implemented_interfaces
            .iter()
            .any(|interface| !new.implemented_interfaces.contains(interface))
        {
            found.push(ChangeKind::InterfaceRemoved);
        }
        if constraints_narrowed(&old.generic_parameters, &new.generic_parameters) {
            found.push(ChangeKind::GenericConstraintsChanged);
        }
        for kind in found {
            self.record(kind, None, old_id.clone(), Some(new_id.clone()));
        }

        let pairs = pair(&old.members, &new.members, MemberDescriptor::id, |member, candidates| {
            self.correlate(CorrelationScope::Member {
                old_type: old,
                new_type: new,
                old: member,
                candidates,
            })
        });
        for (old_member, new_member) in pairs {
            match new_member {
                Some(new_member) => self.compare_members(&old_id, old_member, new_member),
                None => self.record(
                    ChangeKind::Removed,
                    Some(old_id.clone()),
                    old_member.id(),
                    None,
                ),
            }
        }
    }

    fn compare_members(&mut self, type_id: &str, old: &MemberDescriptor, new: &MemberDescriptor) {
        let mut found = Vec::new();

        if old.simple_name() != new.simple_name() {
            found.push(ChangeKind::Renamed);
        }
        if let (Some(before), Some(after)) = (old.visibility, new.visibility) {
            if before.is_narrowed_by(after) {
                found.push(ChangeKind::VisibilityNarrowed);
            }
        }
        if (!old.is_sealed && new.is_sealed)
            || (!old.is_abstract && new.is_abstract)
            || old.is_override != new.is_override
            || old.is_static != new.is_static
            || (old.is_virtual && !new.is_virtual)
            || (!old.is_read_only && new.is_read_only)
            || old.is_constant != new.is_constant
            || (old.is_extension && !new.is_extension)
        {
            found.push(ChangeKind::ModifiersChanged);
        }
        if old.return_type != new.return_type {
            found.push(ChangeKind::ReturnTypeChanged);
        }
        if parameters_changed(&old.parameters, &new.parameters) {
            found.push(ChangeKind::ParametersChanged);
        }
        if old.literal.is_some() && new.literal.is_some() && old.literal != new.literal {
            found.push(ChangeKind::LiteralChanged);
        }
        if constraints_narrowed(&old.generic_parameter, &new.generic_parameter) {
            found.push(ChangeKind::GenericConstraintsChanged);
        }

        if found.is_empty() {
            return;
        }
        let old_id = old.id();
        let new_id = new.id();
        for kind in found {
            self.record(
                kind,
                Some(type_id.to_string()),
                old_id.clone(),
                Some(new_id.clone()),
            );
        }
    }
}

/// Pair each old element with at most one new element: identical ids
/// first, then `correlate` over the new elements nobody claimed. Results
/// follow the order of `olds`.
fn pair<'t, T>(
    olds: &'t [T],
    news: &'t [T],
    id: impl Fn(&T) -> String,
    mut correlate: impl FnMut(&'t T, &[&'t T]) -> Option<usize>,
) -> Vec<(&'t T, Option<&'t T>)> {
    let mut by_id: HashMap<String, usize> = HashMap::with_capacity(news.len());
    for (index, item) in news.iter().enumerate() {
        by_id.entry(id(item)).or_insert(index);
    }

    let mut claimed = vec![false; news.len()];
    let mut pairs: Vec<(&'t T, Option<usize>)> = Vec::with_capacity(olds.len());
    for old in olds {
        let matched = by_id
            .get(&id(old))
            .copied()
            .filter(|index| !claimed[*index]);
        if let Some(index) = matched {
            claimed[index] = true;
        }
        pairs.push((old, matched));
    }

    for (old, matched) in pairs.iter_mut() {
        if matched.is_some() {
            continue;
        }
        let open: Vec<usize> = (0..news.len()).filter(|index| !claimed[*index]).collect();
        if open.is_empty() {
            break;
        }
        let candidates: Vec<&'t T> = open.iter().map(|index| &news[*index]).collect();
        if let Some(&index) = correlate(*old, &candidates).and_then(|position| open.get(position)) {
            claimed[index] = true;
            *matched = Some(index);
        }
    }

    pairs
        .into_iter()
        .map(|(old, matched)| (old, matched.map(|index| &news[index])))
        .collect()
}

/// True when a parameter at some position gained a constraint.
fn constraints_narrowed(
    old: &[GenericParameterDescriptor],
    new: &[GenericParameterDescriptor],
) -> bool {
    old.iter().any(|before| {
        new.iter()
            .find(|after| after.parameter_position == before.parameter_position)
            .is_some_and(|after| before.is_narrowed_by(after))
    })
}

fn parameters_changed(old: &[ParameterDescriptor], new: &[ParameterDescriptor]) -> bool {
    old.len() != new.len()
        || old.iter().zip(new).any(|(before, after)| {
            before.type_name != after.type_name
                || before.direction != after.direction
                || (before.default_value.is_some() && after.default_value.is_none())
                || (before.is_params && !after.is_params)
        })
}
