//! apicheck-metadata: a static reader for ECMA-335 (CLI) assemblies.
//!
//! [`Module::parse`] takes the raw bytes of a compiled library, walks the
//! PE container to the CLI metadata root and decodes the tables needed to
//! describe a public API surface. Nothing is executed or loaded; types from
//! referenced assemblies stay symbolic (`TypeRef` rows).

mod bytes;
pub mod error;
pub mod flags;
mod heaps;
pub mod module;
mod pe;
pub mod signature;
pub mod tables;

pub use error::{MetadataError, Result};
pub use flags::{
    FieldAttributes, GenericParamAttributes, MemberAccess, MethodAttributes, ParamAttributes,
    TypeAttributes, TypeVisibility,
};
pub use module::{
    AssemblyInfo, Field, GenericParam, MemberRef, MemberRefParent, Method, MethodDefOrRef,
    MethodImpl, Module, Param, ResolutionScope, TypeDef, TypeRef,
};
pub use signature::{ConstantValue, MemberSig, MethodSig, Primitive, TypeDefOrRef, TypeSig};
pub use tables::TableId;
