//! Typed descriptors for one version of a library's public surface.
//!
//! These structs are the persisted baseline format as well as the in-memory
//! input of the comparer. Keys are PascalCase; empty collections, `None`
//! values and `false` flags are left out so that baselines stay small and
//! diff cleanly under version control.

use serde::{Deserialize, Serialize};

fn is_false(value: &bool) -> bool {
    !*value
}

/// The full public and protected surface of one assembly version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiListing {
    pub assembly_identity: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub types: Vec<TypeDescriptor>,
}

impl ApiListing {
    pub fn new(assembly_identity: impl Into<String>) -> Self {
        ApiListing {
            assembly_identity: assembly_identity.into(),
            types: Vec::new(),
        }
    }

    /// Look up a type by its canonical name.
    pub fn find_type(&self, name: &str) -> Option<&TypeDescriptor> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Total number of members across all types.
    pub fn member_count(&self) -> usize {
        self.types.iter().map(|t| t.members.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeKind {
    #[default]
    Class,
    Interface,
    Struct,
    Enumeration,
}

impl TypeKind {
    /// The keyword used for this kind in identity strings.
    pub fn keyword(self) -> &'static str {
        match self {
            TypeKind::Class => "class",
            TypeKind::Interface => "interface",
            TypeKind::Struct => "struct",
            TypeKind::Enumeration => "enum",
        }
    }
}

/// Accessibility of a listed element. Anything less visible than
/// `Protected` never reaches a listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Visibility {
    #[default]
    Public,
    Protected,
}

impl Visibility {
    pub fn keyword(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Protected => "protected",
        }
    }

    /// True when going from `self` to `other` reduces who can see the element.
    pub fn is_narrowed_by(self, other: Visibility) -> bool {
        self == Visibility::Public && other == Visibility::Protected
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    pub visibility: Visibility,
    #[serde(rename = "Static", default, skip_serializing_if = "is_false")]
    pub is_static: bool,
    #[serde(rename = "Abstract", default, skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    #[serde(rename = "Sealed", default, skip_serializing_if = "is_false")]
    pub is_sealed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implemented_interfaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_parameters: Vec<GenericParameterDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<MemberDescriptor>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    Constructor,
    #[default]
    Method,
    Field,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MemberDescriptor {
    pub kind: MemberKind,
    pub name: String,
    /// Absent for interface members and enumeration values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(rename = "Static", default, skip_serializing_if = "is_false")]
    pub is_static: bool,
    #[serde(rename = "Sealed", default, skip_serializing_if = "is_false")]
    pub is_sealed: bool,
    #[serde(rename = "Virtual", default, skip_serializing_if = "is_false")]
    pub is_virtual: bool,
    #[serde(rename = "Override", default, skip_serializing_if = "is_false")]
    pub is_override: bool,
    #[serde(rename = "Abstract", default, skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    /// Hides an inherited member with the same signature.
    #[serde(rename = "New", default, skip_serializing_if = "is_false")]
    pub hides_inherited: bool,
    #[serde(rename = "Extension", default, skip_serializing_if = "is_false")]
    pub is_extension: bool,
    #[serde(rename = "Constant", default, skip_serializing_if = "is_false")]
    pub is_constant: bool,
    #[serde(rename = "ReadOnly", default, skip_serializing_if = "is_false")]
    pub is_read_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explicit_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implemented_interface: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generic_parameter: Vec<GenericParameterDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterDirection {
    #[default]
    In,
    Out,
    Ref,
}

impl ParameterDirection {
    fn is_in(&self) -> bool {
        *self == ParameterDirection::In
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(rename = "Type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "ParameterDirection::is_in")]
    pub direction: ParameterDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_params: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GenericParameterDescriptor {
    pub parameter_name: String,
    pub parameter_position: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub base_type_or_interfaces: Vec<String>,
    /// Requires a public parameterless constructor (`new()`).
    #[serde(rename = "New", default, skip_serializing_if = "is_false")]
    pub new_constraint: bool,
    /// Reference-type constraint (`class`).
    #[serde(rename = "Class", default, skip_serializing_if = "is_false")]
    pub class_constraint: bool,
    /// Non-nullable value-type constraint (`struct`).
    #[serde(rename = "Struct", default, skip_serializing_if = "is_false")]
    pub struct_constraint: bool,
}

impl GenericParameterDescriptor {
    pub fn has_constraints(&self) -> bool {
        self.new_constraint
            || self.class_constraint
            || self.struct_constraint
            || !self.base_type_or_interfaces.is_empty()
    }

    /// True when `other` demands something of type arguments that `self` did not.
    pub fn is_narrowed_by(&self, other: &GenericParameterDescriptor) -> bool {
        (other.new_constraint && !self.new_constraint)
            || (other.class_constraint && !self.class_constraint)
            || (other.struct_constraint && !self.struct_constraint)
            || other
                .base_type_or_interfaces
                .iter()
                .any(|c| !self.base_type_or_interfaces.contains(c))
    }
}
