//! Categories of breaking change and the mask selecting which to check.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// The category of a single breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChangeKind {
    /// The element has no counterpart in the new listing.
    #[serde(alias = "removed")]
    Removed,
    /// A type became a different kind (class to struct, ...).
    #[serde(alias = "kind")]
    KindChanged,
    #[serde(alias = "visibility")]
    VisibilityNarrowed,
    /// Sealed, abstract, static, override, virtual, read-only or const
    /// changed in a way callers can observe.
    #[serde(alias = "modifiers")]
    ModifiersChanged,
    #[serde(alias = "base-type")]
    BaseTypeChanged,
    #[serde(alias = "interfaces")]
    InterfaceRemoved,
    #[serde(alias = "constraints")]
    GenericConstraintsChanged,
    #[serde(alias = "return-type")]
    ReturnTypeChanged,
    #[serde(alias = "parameters")]
    ParametersChanged,
    /// The value of a constant or enumeration member changed.
    #[serde(alias = "literal")]
    LiteralChanged,
    /// Paired with a differently named element by a correlation handler.
    #[serde(alias = "renamed")]
    Renamed,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 11] = [
        ChangeKind::Removed,
        ChangeKind::KindChanged,
        ChangeKind::VisibilityNarrowed,
        ChangeKind::ModifiersChanged,
        ChangeKind::BaseTypeChanged,
        ChangeKind::InterfaceRemoved,
        ChangeKind::GenericConstraintsChanged,
        ChangeKind::ReturnTypeChanged,
        ChangeKind::ParametersChanged,
        ChangeKind::LiteralChanged,
        ChangeKind::Renamed,
    ];

    /// Short name used on the command line and in configuration.
    pub fn name(self) -> &'static str {
        match self {
            ChangeKind::Removed => "removed",
            ChangeKind::KindChanged => "kind",
            ChangeKind::VisibilityNarrowed => "visibility",
            ChangeKind::ModifiersChanged => "modifiers",
            ChangeKind::BaseTypeChanged => "base-type",
            ChangeKind::InterfaceRemoved => "interfaces",
            ChangeKind::GenericConstraintsChanged => "constraints",
            ChangeKind::ReturnTypeChanged => "return-type",
            ChangeKind::ParametersChanged => "parameters",
            ChangeKind::LiteralChanged => "literal",
            ChangeKind::Renamed => "renamed",
        }
    }

    pub fn flag(self) -> ChangeKinds {
        match self {
            ChangeKind::Removed => ChangeKinds::REMOVED,
            ChangeKind::KindChanged => ChangeKinds::KIND,
            ChangeKind::VisibilityNarrowed => ChangeKinds::VISIBILITY,
            ChangeKind::ModifiersChanged => ChangeKinds::MODIFIERS,
            ChangeKind::BaseTypeChanged => ChangeKinds::BASE_TYPE,
            ChangeKind::InterfaceRemoved => ChangeKinds::INTERFACES,
            ChangeKind::GenericConstraintsChanged => ChangeKinds::CONSTRAINTS,
            ChangeKind::ReturnTypeChanged => ChangeKinds::RETURN_TYPE,
            ChangeKind::ParametersChanged => ChangeKinds::PARAMETERS,
            ChangeKind::LiteralChanged => ChangeKinds::LITERAL,
            ChangeKind::Renamed => ChangeKinds::RENAMED,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown change kind '{0}' (expected one of: all, {list})", list = known_names())]
pub struct UnknownChangeKind(pub String);

fn known_names() -> String {
    ChangeKind::ALL
        .iter()
        .map(|kind| kind.name())
        .collect::<Vec<_>>()
        .join(", ")
}

impl FromStr for ChangeKind {
    type Err = UnknownChangeKind;

    /// Accepts the short name (`return-type`) or the variant name
    /// (`ReturnTypeChanged`), ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        ChangeKind::ALL
            .into_iter()
            .find(|kind| {
                kind.name().eq_ignore_ascii_case(wanted)
                    || format!("{:?}", kind).eq_ignore_ascii_case(wanted)
            })
            .ok_or_else(|| UnknownChangeKind(wanted.to_string()))
    }
}

bitflags! {
    /// The set of change categories a comparison evaluates.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangeKinds: u32 {
        const REMOVED = 1 << 0;
        const KIND = 1 << 1;
        const VISIBILITY = 1 << 2;
        const MODIFIERS = 1 << 3;
        const BASE_TYPE = 1 << 4;
        const INTERFACES = 1 << 5;
        const CONSTRAINTS = 1 << 6;
        const RETURN_TYPE = 1 << 7;
        const PARAMETERS = 1 << 8;
        const LITERAL = 1 << 9;
        const RENAMED = 1 << 10;
    }
}

impl Default for ChangeKinds {
    fn default() -> Self {
        ChangeKinds::all()
    }
}

impl ChangeKinds {
    pub fn includes(self, kind: ChangeKind) -> bool {
        self.contains(kind.flag())
    }

    /// Build a mask from category names; `all` selects everything.
    pub fn from_names<I, S>(names: I) -> Result<ChangeKinds, UnknownChangeKind>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut mask = ChangeKinds::empty();
        for name in names {
            let name = name.as_ref().trim();
            if name.is_empty() {
                continue;
            }
            if name.eq_ignore_ascii_case("all") {
                mask |= ChangeKinds::all();
            } else {
                mask |= name.parse::<ChangeKind>()?.flag();
            }
        }
        Ok(mask)
    }
}

impl FromStr for ChangeKinds {
    type Err = UnknownChangeKind;

    /// Parse a comma-separated list such as `removed,visibility`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeKinds::from_names(s.split(','))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list() {
        let mask: ChangeKinds = "removed, visibility,ReturnTypeChanged".parse().unwrap();
        assert_eq!(
            mask,
            ChangeKinds::REMOVED | ChangeKinds::VISIBILITY | ChangeKinds::RETURN_TYPE
        );
        assert!(mask.includes(ChangeKind::Removed));
        assert!(!mask.includes(ChangeKind::ParametersChanged));
        assert_eq!("all".parse::<ChangeKinds>().unwrap(), ChangeKinds::all());
    }

    #[test]
    fn test_unknown_name() {
        let err = "removed,bogus".parse::<ChangeKinds>().unwrap_err();
        assert_eq!(err, UnknownChangeKind("bogus".to_string()));
        assert!(err.to_string().contains("return-type"));
    }

    #[test]
    fn test_every_kind_has_its_own_flag() {
        let mut mask = ChangeKinds::empty();
        for kind in ChangeKind::ALL {
            assert!(!mask.intersects(kind.flag()));
            mask |= kind.flag();
            assert_eq!(kind.name().parse::<ChangeKind>().unwrap(), kind);
        }
        assert_eq!(mask, ChangeKinds::all());
    }

    #[test]
    fn test_serde_accepts_short_names() {
        let kind: ChangeKind = serde_json::from_str("\"parameters\"").unwrap();
        assert_eq!(kind, ChangeKind::ParametersChanged);
        assert_eq!(
            serde_json::to_string(&ChangeKind::Removed).unwrap(),
            "\"Removed\""
        );
    }
}
