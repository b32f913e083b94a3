//! Exclusion filters: predicates that drop types or members from a listing.

use apicheck_model::{MemberDescriptor, TypeDescriptor};

/// The element an exclusion filter is asked about.
#[derive(Debug, Clone, Copy)]
pub enum FilterSubject<'a> {
    Type(&'a TypeDescriptor),
    Member {
        owner: &'a TypeDescriptor,
        member: &'a MemberDescriptor,
    },
}

impl<'a> FilterSubject<'a> {
    /// Canonical name of the type involved (the owner, for members).
    pub fn type_name(&self) -> &'a str {
        match *self {
            FilterSubject::Type(ty) => &ty.name,
            FilterSubject::Member { owner, .. } => &owner.name,
        }
    }
}

/// Decides whether an element is left out of the listing. Filters combine
/// with a logical OR: any filter excluding an element removes it.
pub trait ExclusionFilter: Send + Sync {
    fn excludes(&self, subject: &FilterSubject<'_>) -> bool;
}

impl<F> ExclusionFilter for F
where
    F: Fn(&FilterSubject<'_>) -> bool + Send + Sync,
{
    fn excludes(&self, subject: &FilterSubject<'_>) -> bool {
        self(subject)
    }
}

/// Excludes every type (and so every member) inside the given namespaces,
/// including their sub-namespaces.
#[derive(Debug, Clone, Default)]
pub struct NamespaceFilter {
    namespaces: Vec<String>,
}

impl NamespaceFilter {
    pub fn new<I, S>(namespaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        NamespaceFilter {
            namespaces: namespaces.into_iter().map(Into::into).collect(),
        }
    }
}

impl ExclusionFilter for NamespaceFilter {
    fn excludes(&self, subject: &FilterSubject<'_>) -> bool {
        let name = subject.type_name();
        self.namespaces.iter().any(|namespace| {
            name.strip_prefix(namespace.as_str())
                .is_some_and(|rest| rest.starts_with('.'))
        })
    }
}

/// Excludes types whose canonical name starts with one of the prefixes.
#[derive(Debug, Clone, Default)]
pub struct TypeNameFilter {
    prefixes: Vec<String>,
}

impl TypeNameFilter {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        TypeNameFilter {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }
}

impl ExclusionFilter for TypeNameFilter {
    fn excludes(&self, subject: &FilterSubject<'_>) -> bool {
        match subject {
            FilterSubject::Type(ty) => self
                .prefixes
                .iter()
                .any(|prefix| ty.name.starts_with(prefix.as_str())),
            // Members of a kept type are never excluded by name.
            FilterSubject::Member { .. } => false,
        }
    }
}

pub(crate) fn is_excluded(
    filters: &[Box<dyn ExclusionFilter>],
    subject: &FilterSubject<'_>,
) -> bool {
    filters.iter().any(|filter| filter.excludes(subject))
}

#[cfg(test)]
mod tests {
    use super::*;
    use apicheck_model::MemberKind;

    fn ty(name: &str) -> TypeDescriptor {
        TypeDescriptor {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_namespace_filter() {
        let filter = NamespaceFilter::new(["Company.Internal"]);
        assert!(filter.excludes(&FilterSubject::Type(&ty("Company.Internal.Cache"))));
        assert!(filter.excludes(&FilterSubject::Type(&ty("Company.Internal.Deep.Cache"))));
        assert!(!filter.excludes(&FilterSubject::Type(&ty("Company.InternalTools.Cache"))));
        assert!(!filter.excludes(&FilterSubject::Type(&ty("Company.Cache"))));
    }

    #[test]
    fn test_type_name_filter_ignores_members() {
        let filter = TypeNameFilter::new(vec!["Company.Generated.".to_string()]);
        let owner = ty("Company.Generated.Proxy");
        let member = MemberDescriptor {
            kind: MemberKind::Method,
            name: "Invoke()".to_string(),
            ..Default::default()
        };
        assert!(filter.excludes(&FilterSubject::Type(&owner)));
        assert!(!filter.excludes(&FilterSubject::Member {
            owner: &owner,
            member: &member
        }));
    }

    fn obsolete_members(subject: &FilterSubject<'_>) -> bool {
        match subject {
            FilterSubject::Member { member, .. } => member.name.starts_with("Obsolete"),
            FilterSubject::Type(_) => false,
        }
    }

    #[test]
    fn test_functions_combine_with_or() {
        let filters: Vec<Box<dyn ExclusionFilter>> = vec![
            Box::new(NamespaceFilter::new(["A"])),
            Box::new(obsolete_members),
        ];
        let owner = ty("B.Widget");
        let member = MemberDescriptor {
            name: "ObsoleteRender()".to_string(),
            ..Default::default()
        };
        assert!(is_excluded(&filters, &FilterSubject::Type(&ty("A.Widget"))));
        assert!(!is_excluded(&filters, &FilterSubject::Type(&owner)));
        assert!(is_excluded(
            &filters,
            &FilterSubject::Member {
                owner: &owner,
                member: &member
            }
        ));
    }
}
