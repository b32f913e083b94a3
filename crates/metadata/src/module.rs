//! The decoded module: plain data resolved from the metadata tables.
//!
//! Row ranges (field, method and parameter lists), constants, custom
//! attributes, generic parameters and nesting are attached to their owners
//! here so consumers never deal with raw table rows. All references that
//! remain (`TypeDefOrRef`, `MethodDefOrRef`, ...) carry 1-based row numbers
//! into the vectors of [`Module`].

use std::collections::HashMap;

use crate::error::{MetadataError, Result};
use crate::flags::{
    FieldAttributes, GenericParamAttributes, MethodAttributes, ParamAttributes, TypeAttributes,
};
use crate::heaps::Streams;
use crate::pe::PeImage;
use crate::signature::{
    parse_member_signature, parse_type_spec, ConstantValue, MemberSig, TypeDefOrRef, TypeSig,
};
use crate::tables::{CodedIndex, TableId, TableStream};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    pub name: String,
    pub mvid: Option<[u8; 16]>,
    pub runtime_version: String,
    pub assembly: Option<AssemblyInfo>,
    pub type_refs: Vec<TypeRef>,
    pub type_defs: Vec<TypeDef>,
    pub type_specs: Vec<TypeSig>,
    pub member_refs: Vec<MemberRef>,
    pub method_impls: Vec<MethodImpl>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyInfo {
    pub name: String,
    pub version: [u16; 4],
    pub culture: String,
    pub public_key: Vec<u8>,
    pub flags: u32,
}

/// Where a TypeRef resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionScope {
    Module,
    ModuleRef(u32),
    AssemblyRef(u32),
    /// The enclosing type of a nested type reference.
    TypeRef(u32),
    /// Resolved through the ExportedType table.
    Exported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    pub scope: ResolutionScope,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeDef {
    pub flags: TypeAttributes,
    pub namespace: String,
    pub name: String,
    pub extends: Option<TypeDefOrRef>,
    /// TypeDef row of the enclosing type, for nested types.
    pub enclosing: Option<u32>,
    pub interfaces: Vec<TypeDefOrRef>,
    pub generic_params: Vec<GenericParam>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    pub attributes: Vec<TypeDefOrRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub flags: FieldAttributes,
    pub name: String,
    pub signature: MemberSig,
    pub constant: Option<ConstantValue>,
    pub attributes: Vec<TypeDefOrRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    /// Row in the MethodDef table.
    pub rid: u32,
    pub flags: MethodAttributes,
    pub name: String,
    pub signature: MemberSig,
    pub params: Vec<Param>,
    pub generic_params: Vec<GenericParam>,
    pub attributes: Vec<TypeDefOrRef>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Param {
    pub flags: ParamAttributes,
    /// 0 for the return value, otherwise the 1-based parameter position.
    pub sequence: u16,
    pub name: String,
    pub constant: Option<ConstantValue>,
    pub attributes: Vec<TypeDefOrRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenericParam {
    pub number: u16,
    pub flags: GenericParamAttributes,
    pub name: String,
    pub constraints: Vec<TypeDefOrRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MethodDefOrRef {
    MethodDef(u32),
    MemberRef(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberRefParent {
    TypeDef(u32),
    TypeRef(u32),
    ModuleRef(u32),
    MethodDef(u32),
    TypeSpec(u32),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberRef {
    pub parent: MemberRefParent,
    pub name: String,
    pub signature: MemberSig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodImpl {
    /// TypeDef row of the implementing class.
    pub class: u32,
    pub body: MethodDefOrRef,
    pub declaration: MethodDefOrRef,
}

impl Module {
    /// Parse a compiled assembly image.
    pub fn parse(image: &[u8]) -> Result<Module> {
        let pe = PeImage::parse(image)?;
        Module::from_metadata(pe.metadata_root()?)
    }

    /// Decode a bare metadata root (starting at the `BSJB` signature).
    pub fn from_metadata(root: &[u8]) -> Result<Module> {
        let streams = Streams::parse(root)?;
        let tables = streams
            .tables
            .ok_or(MetadataError::NotManaged("metadata has no tables stream"))?;
        let tables = TableStream::parse(tables)?;
        let module = Decoder {
            tables: &tables,
            streams: &streams,
        }
        .decode()?;
        tracing::debug!(
            module = %module.name,
            types = module.type_defs.len(),
            "decoded module"
        );
        Ok(module)
    }

    /// The TypeDef at 1-based row `rid`.
    pub fn type_def(&self, rid: u32) -> Option<&TypeDef> {
        rid.checked_sub(1)
            .and_then(|index| self.type_defs.get(index as usize))
    }

    pub fn type_ref(&self, rid: u32) -> Option<&TypeRef> {
        rid.checked_sub(1)
            .and_then(|index| self.type_refs.get(index as usize))
    }

    pub fn type_spec(&self, rid: u32) -> Option<&TypeSig> {
        rid.checked_sub(1)
            .and_then(|index| self.type_specs.get(index as usize))
    }

    pub fn member_ref(&self, rid: u32) -> Option<&MemberRef> {
        rid.checked_sub(1)
            .and_then(|index| self.member_refs.get(index as usize))
    }

    /// Find a method by MethodDef row, with the TypeDef row that owns it.
    pub fn method_def(&self, rid: u32) -> Option<(u32, &Method)> {
        self.type_defs.iter().enumerate().find_map(|(index, ty)| {
            ty.methods
                .iter()
                .find(|method| method.rid == rid)
                .map(|method| (index as u32 + 1, method))
        })
    }
}

type Owner = (TableId, u32);

struct Decoder<'s, 'a> {
    tables: &'s TableStream<'a>,
    streams: &'s Streams<'a>,
}

impl Decoder<'_, '_> {
    fn string(&self, offset: u32) -> Result<String> {
        self.streams.strings.get(offset).map(str::to_string)
    }

    fn type_def_or_ref(&self, value: u32) -> Result<Option<TypeDefOrRef>> {
        Ok(match CodedIndex::TypeDefOrRef.decode(value)? {
            Some((TableId::TypeDef, row)) => Some(TypeDefOrRef::TypeDef(row)),
            Some((TableId::TypeRef, row)) => Some(TypeDefOrRef::TypeRef(row)),
            Some((TableId::TypeSpec, row)) => Some(TypeDefOrRef::TypeSpec(row)),
            _ => None,
        })
    }

    fn method_def_or_ref(&self, value: u32) -> Result<MethodDefOrRef> {
        match CodedIndex::MethodDefOrRef.decode(value)? {
            Some((TableId::MethodDef, row)) => Ok(MethodDefOrRef::MethodDef(row)),
            Some((TableId::MemberRef, row)) => Ok(MethodDefOrRef::MemberRef(row)),
            _ => Err(MetadataError::Unsupported(
                "null method reference in MethodImpl".to_string(),
            )),
        }
    }

    /// End of a row range that starts at `start` and runs to the next owner's start.
    fn range_end(next_start: Option<u32>, target_rows: u32) -> u32 {
        next_start.unwrap_or(target_rows + 1).min(target_rows + 1)
    }

    fn decode(&self) -> Result<Module> {
        let tables = self.tables;

        let (name, mvid) = if tables.row_count(TableId::Module) > 0 {
            let row = tables.read_row(TableId::Module, 1)?;
            (self.string(row[1])?, self.streams.guids.get(row[2])?)
        } else {
            (String::new(), None)
        };

        let assembly = if tables.row_count(TableId::Assembly) > 0 {
            let row = tables.read_row(TableId::Assembly, 1)?;
            Some(AssemblyInfo {
                version: [row[1] as u16, row[2] as u16, row[3] as u16, row[4] as u16],
                flags: row[5],
                public_key: self.streams.blobs.get(row[6])?.to_vec(),
                name: self.string(row[7])?,
                culture: self.string(row[8])?,
            })
        } else {
            None
        };

        let type_refs = tables
            .rows(TableId::TypeRef)?
            .into_iter()
            .map(|row| {
                let scope = match CodedIndex::ResolutionScope.decode(row[0])? {
                    None => ResolutionScope::Exported,
                    Some((TableId::Module, _)) => ResolutionScope::Module,
                    Some((TableId::ModuleRef, rid)) => ResolutionScope::ModuleRef(rid),
                    Some((TableId::AssemblyRef, rid)) => ResolutionScope::AssemblyRef(rid),
                    Some((_, rid)) => ResolutionScope::TypeRef(rid),
                };
                Ok(TypeRef {
                    scope,
                    name: self.string(row[1])?,
                    namespace: self.string(row[2])?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let type_specs = tables
            .rows(TableId::TypeSpec)?
            .into_iter()
            .map(|row| parse_type_spec(self.streams.blobs.get(row[0])?))
            .collect::<Result<Vec<_>>>()?;

        let member_refs = tables
            .rows(TableId::MemberRef)?
            .into_iter()
            .map(|row| {
                let parent = match CodedIndex::MemberRefParent.decode(row[0])? {
                    Some((TableId::TypeDef, rid)) => MemberRefParent::TypeDef(rid),
                    Some((TableId::TypeRef, rid)) => MemberRefParent::TypeRef(rid),
                    Some((TableId::ModuleRef, rid)) => MemberRefParent::ModuleRef(rid),
                    Some((TableId::MethodDef, rid)) => MemberRefParent::MethodDef(rid),
                    Some((_, rid)) => MemberRefParent::TypeSpec(rid),
                    None => {
                        return Err(MetadataError::Unsupported(
                            "MemberRef without a parent".to_string(),
                        ))
                    }
                };
                Ok(MemberRef {
                    parent,
                    name: self.string(row[1])?,
                    signature: parse_member_signature(self.streams.blobs.get(row[2])?)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let constants = self.constants()?;
        let method_owners = self.method_owners()?;
        let mut attributes = self.attributes(&member_refs, &method_owners)?;
        let mut generic_params = self.generic_params()?;

        let type_rows = tables.rows(TableId::TypeDef)?;
        let field_rows = tables.row_count(TableId::Field);
        let method_rows = tables.row_count(TableId::MethodDef);
        let param_rows = tables.row_count(TableId::Param);

        let mut type_defs = Vec::with_capacity(type_rows.len());
        for (index, row) in type_rows.iter().enumerate() {
            let rid = index as u32 + 1;
            let next = type_rows.get(index + 1);

            let mut fields = Vec::new();
            let field_end = Self::range_end(next.map(|r| r[4]), field_rows);
            for field_rid in row[4].max(1)..field_end {
                let field = tables.read_row(TableId::Field, field_rid)?;
                let owner = (TableId::Field, field_rid);
                fields.push(Field {
                    flags: FieldAttributes::from_bits_retain(field[0] as u16),
                    name: self.string(field[1])?,
                    signature: parse_member_signature(self.streams.blobs.get(field[2])?)?,
                    constant: constants.get(&owner).cloned(),
                    attributes: attributes.remove(&owner).unwrap_or_default(),
                });
            }

            let mut methods = Vec::new();
            let method_end = Self::range_end(next.map(|r| r[5]), method_rows);
            for method_rid in row[5].max(1)..method_end {
                let method = tables.read_row(TableId::MethodDef, method_rid)?;
                let next_method = if method_rid < method_rows {
                    Some(tables.read_row(TableId::MethodDef, method_rid + 1)?[5])
                } else {
                    None
                };
                let mut params = Vec::new();
                for param_rid in method[5].max(1)..Self::range_end(next_method, param_rows) {
                    let param = tables.read_row(TableId::Param, param_rid)?;
                    let owner = (TableId::Param, param_rid);
                    params.push(Param {
                        flags: ParamAttributes::from_bits_retain(param[0] as u16),
                        sequence: param[1] as u16,
                        name: self.string(param[2])?,
                        constant: constants.get(&owner).cloned(),
                        attributes: attributes.remove(&owner).unwrap_or_default(),
                    });
                }
                methods.push(Method {
                    rid: method_rid,
                    flags: MethodAttributes::from_bits_retain(method[2] as u16),
                    name: self.string(method[3])?,
                    signature: parse_member_signature(self.streams.blobs.get(method[4])?)?,
                    params,
                    generic_params: generic_params
                        .remove(&(TableId::MethodDef, method_rid))
                        .unwrap_or_default(),
                    attributes: attributes
                        .remove(&(TableId::MethodDef, method_rid))
                        .unwrap_or_default(),
                });
            }

            type_defs.push(TypeDef {
                flags: TypeAttributes::from_bits_retain(row[0]),
                name: self.string(row[1])?,
                namespace: self.string(row[2])?,
                extends: self.type_def_or_ref(row[3])?,
                enclosing: None,
                interfaces: Vec::new(),
                generic_params: generic_params
                    .remove(&(TableId::TypeDef, rid))
                    .unwrap_or_default(),
                fields,
                methods,
                attributes: attributes
                    .remove(&(TableId::TypeDef, rid))
                    .unwrap_or_default(),
            });
        }

        for row in tables.rows(TableId::InterfaceImpl)? {
            let interface = self.type_def_or_ref(row[1])?;
            let ty = row[0]
                .checked_sub(1)
                .and_then(|index| type_defs.get_mut(index as usize))
                .ok_or(MetadataError::BadIndex {
                    table: TableId::TypeDef,
                    row: row[0],
                })?;
            ty.interfaces.extend(interface);
        }

        for row in tables.rows(TableId::NestedClass)? {
            if row[1] == 0 || row[1] as usize > type_defs.len() {
                return Err(MetadataError::BadIndex {
                    table: TableId::TypeDef,
                    row: row[1],
                });
            }
            let nested = row[0]
                .checked_sub(1)
                .and_then(|index| type_defs.get_mut(index as usize))
                .ok_or(MetadataError::BadIndex {
                    table: TableId::TypeDef,
                    row: row[0],
                })?;
            nested.enclosing = Some(row[1]);
        }

        let method_impls = tables
            .rows(TableId::MethodImpl)?
            .into_iter()
            .map(|row| {
                Ok(MethodImpl {
                    class: row[0],
                    body: self.method_def_or_ref(row[1])?,
                    declaration: self.method_def_or_ref(row[2])?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Module {
            name,
            mvid,
            runtime_version: self.streams.version.clone(),
            assembly,
            type_refs,
            type_defs,
            type_specs,
            member_refs,
            method_impls,
        })
    }

    fn constants(&self) -> Result<HashMap<Owner, ConstantValue>> {
        let mut constants = HashMap::new();
        for row in self.tables.rows(TableId::Constant)? {
            let Some(owner) = CodedIndex::HasConstant.decode(row[2])? else {
                continue;
            };
            let value = ConstantValue::decode(row[0] as u8, self.streams.blobs.get(row[3])?)?;
            constants.insert(owner, value);
        }
        Ok(constants)
    }

    /// TypeDef row owning each MethodDef row, indexed by MethodDef row - 1.
    fn method_owners(&self) -> Result<Vec<u32>> {
        let method_rows = self.tables.row_count(TableId::MethodDef);
        let mut owners = vec![0u32; method_rows as usize];
        let type_rows = self.tables.rows(TableId::TypeDef)?;
        for (index, row) in type_rows.iter().enumerate() {
            let end = Self::range_end(type_rows.get(index + 1).map(|r| r[5]), method_rows);
            for method_rid in row[5].max(1)..end {
                owners[method_rid as usize - 1] = index as u32 + 1;
            }
        }
        Ok(owners)
    }

    /// Attribute types applied to each owner, in table order.
    fn attributes(
        &self,
        member_refs: &[MemberRef],
        method_owners: &[u32],
    ) -> Result<HashMap<Owner, Vec<TypeDefOrRef>>> {
        let mut attributes: HashMap<Owner, Vec<TypeDefOrRef>> = HashMap::new();
        for row in self.tables.rows(TableId::CustomAttribute)? {
            let Some(owner) = CodedIndex::HasCustomAttribute.decode(row[0])? else {
                continue;
            };
            let attribute_type = match CodedIndex::CustomAttributeType.decode(row[1])? {
                Some((TableId::MethodDef, rid)) => method_owners
                    .get(rid as usize - 1)
                    .filter(|owner| **owner != 0)
                    .map(|owner| TypeDefOrRef::TypeDef(*owner)),
                Some((_, rid)) => member_refs
                    .get(rid as usize - 1)
                    .and_then(|member| match member.parent {
                        MemberRefParent::TypeDef(row) => Some(TypeDefOrRef::TypeDef(row)),
                        MemberRefParent::TypeRef(row) => Some(TypeDefOrRef::TypeRef(row)),
                        MemberRefParent::TypeSpec(row) => Some(TypeDefOrRef::TypeSpec(row)),
                        _ => None,
                    }),
                None => None,
            };
            match attribute_type {
                Some(ty) => attributes.entry(owner).or_default().push(ty),
                None => tracing::debug!(?owner, "skipping unresolvable custom attribute"),
            }
        }
        Ok(attributes)
    }

    fn generic_params(&self) -> Result<HashMap<Owner, Vec<GenericParam>>> {
        let rows = self.tables.rows(TableId::GenericParam)?;
        let mut constraints: HashMap<u32, Vec<TypeDefOrRef>> = HashMap::new();
        for row in self.tables.rows(TableId::GenericParamConstraint)? {
            if let Some(constraint) = self.type_def_or_ref(row[1])? {
                constraints.entry(row[0]).or_default().push(constraint);
            }
        }

        let mut params: HashMap<Owner, Vec<GenericParam>> = HashMap::new();
        for (index, row) in rows.iter().enumerate() {
            let Some(owner) = CodedIndex::TypeOrMethodDef.decode(row[2])? else {
                continue;
            };
            params.entry(owner).or_default().push(GenericParam {
                number: row[0] as u16,
                flags: GenericParamAttributes::from_bits_retain(row[1] as u16),
                name: self.string(row[3])?,
                constraints: constraints.remove(&(index as u32 + 1)).unwrap_or_default(),
            });
        }
        for list in params.values_mut() {
            list.sort_by_key(|param| param.number);
        }
        Ok(params)
    }
}
