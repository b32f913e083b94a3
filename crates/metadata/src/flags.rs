//! Attribute flag words from the TypeDef, MethodDef, Field, Param and
//! GenericParam tables.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeAttributes: u32 {
        const VISIBILITY_MASK = 0x0000_0007;
        const INTERFACE = 0x0000_0020;
        const ABSTRACT = 0x0000_0080;
        const SEALED = 0x0000_0100;
        const SPECIAL_NAME = 0x0000_0400;
        const RT_SPECIAL_NAME = 0x0000_0800;
        const IMPORT = 0x0000_1000;
        const SERIALIZABLE = 0x0000_2000;
        const BEFORE_FIELD_INIT = 0x0010_0000;
    }
}

/// The visibility sub-field of [`TypeAttributes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeVisibility {
    NotPublic,
    Public,
    NestedPublic,
    NestedPrivate,
    NestedFamily,
    NestedAssembly,
    NestedFamAndAssem,
    NestedFamOrAssem,
}

impl TypeAttributes {
    pub fn visibility(self) -> TypeVisibility {
        match self.bits() & Self::VISIBILITY_MASK.bits() {
            0 => TypeVisibility::NotPublic,
            1 => TypeVisibility::Public,
            2 => TypeVisibility::NestedPublic,
            3 => TypeVisibility::NestedPrivate,
            4 => TypeVisibility::NestedFamily,
            5 => TypeVisibility::NestedAssembly,
            6 => TypeVisibility::NestedFamAndAssem,
            _ => TypeVisibility::NestedFamOrAssem,
        }
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MethodAttributes: u16 {
        const ACCESS_MASK = 0x0007;
        const STATIC = 0x0010;
        const FINAL = 0x0020;
        const VIRTUAL = 0x0040;
        const HIDE_BY_SIG = 0x0080;
        const NEW_SLOT = 0x0100;
        const STRICT = 0x0200;
        const ABSTRACT = 0x0400;
        const SPECIAL_NAME = 0x0800;
        const RT_SPECIAL_NAME = 0x1000;
        const PINVOKE_IMPL = 0x2000;
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FieldAttributes: u16 {
        const ACCESS_MASK = 0x0007;
        const STATIC = 0x0010;
        const INIT_ONLY = 0x0020;
        const LITERAL = 0x0040;
        const NOT_SERIALIZED = 0x0080;
        const HAS_FIELD_RVA = 0x0100;
        const SPECIAL_NAME = 0x0200;
        const RT_SPECIAL_NAME = 0x0400;
        const HAS_FIELD_MARSHAL = 0x1000;
        const PINVOKE_IMPL = 0x2000;
        const HAS_DEFAULT = 0x8000;
    }
}

/// Member accessibility shared by methods and fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberAccess {
    CompilerControlled,
    Private,
    FamAndAssem,
    Assembly,
    Family,
    FamOrAssem,
    Public,
}

impl MemberAccess {
    fn from_bits(bits: u16) -> MemberAccess {
        match bits & 0x7 {
            1 => MemberAccess::Private,
            2 => MemberAccess::FamAndAssem,
            3 => MemberAccess::Assembly,
            4 => MemberAccess::Family,
            5 => MemberAccess::FamOrAssem,
            6 => MemberAccess::Public,
            // 7 is reserved; treat it like 0.
            _ => MemberAccess::CompilerControlled,
        }
    }
}

impl MethodAttributes {
    pub fn access(self) -> MemberAccess {
        MemberAccess::from_bits(self.bits())
    }
}

impl FieldAttributes {
    pub fn access(self) -> MemberAccess {
        MemberAccess::from_bits(self.bits())
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ParamAttributes: u16 {
        const IN = 0x0001;
        const OUT = 0x0002;
        const OPTIONAL = 0x0010;
        const HAS_DEFAULT = 0x1000;
        const HAS_FIELD_MARSHAL = 0x2000;
    }
}

bitflags! {
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GenericParamAttributes: u16 {
        const COVARIANT = 0x0001;
        const CONTRAVARIANT = 0x0002;
        const REFERENCE_TYPE_CONSTRAINT = 0x0004;
        const NOT_NULLABLE_VALUE_TYPE_CONSTRAINT = 0x0008;
        const DEFAULT_CONSTRUCTOR_CONSTRAINT = 0x0010;
    }
}
