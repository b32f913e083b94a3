//! Walks a decoded [`Module`] and produces its [`ApiListing`].

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use apicheck_metadata::{
    Field, FieldAttributes, GenericParam, GenericParamAttributes, MemberAccess, MemberSig,
    MetadataError, Method, MethodAttributes, MethodSig, Module, ParamAttributes, Primitive,
    TableId, TypeAttributes, TypeDef, TypeDefOrRef, TypeSig, TypeVisibility,
};
use apicheck_model::{
    method_name, ApiListing, GenericParameterDescriptor, MemberDescriptor, MemberKind,
    ParameterDescriptor, ParameterDirection, TypeDescriptor, TypeKind, Visibility,
};
use tracing::{debug, info};

use crate::error::ReadError;
use crate::filter::{is_excluded, ExclusionFilter, FilterSubject};
use crate::identity::assembly_identity;
use crate::interfaces::{Implementation, InterfaceMap};
use crate::literal::format_literal;
use crate::names::{GenericContext, TypeNamer, MAX_CHAIN};

const SYSTEM_OBJECT: &str = "System.Object";
const SYSTEM_VALUE_TYPE: &str = "System.ValueType";
const SYSTEM_ENUM: &str = "System.Enum";
const EXTENSION_ATTRIBUTE: &str = "System.Runtime.CompilerServices.ExtensionAttribute";
const PARAM_ARRAY_ATTRIBUTE: &str = "System.ParamArrayAttribute";

/// Read the public and protected surface of `module`, leaving out anything
/// an exclusion filter matches.
pub fn read_module(
    module: &Module,
    filters: &[Box<dyn ExclusionFilter>],
) -> Result<ApiListing, ReadError> {
    ListingReader::new(module, filters).read()
}

/// Builds an [`ApiListing`] from one module. Interface maps are computed
/// at most once per type.
pub struct ListingReader<'a> {
    module: &'a Module,
    filters: &'a [Box<dyn ExclusionFilter>],
    namer: TypeNamer<'a>,
    interface_maps: HashMap<u32, InterfaceMap>,
}

impl<'a> ListingReader<'a> {
    pub fn new(module: &'a Module, filters: &'a [Box<dyn ExclusionFilter>]) -> Self {
        ListingReader {
            module,
            filters,
            namer: TypeNamer::new(module),
            interface_maps: HashMap::new(),
        }
    }

    pub fn read(mut self) -> Result<ApiListing, ReadError> {
        let mut listing = ApiListing::new(assembly_identity(self.module));
        for index in 0..self.module.type_defs.len() {
            let rid = index as u32 + 1;
            let Some(visibility) = self.visibility(rid)? else {
                continue;
            };
            if let Some(ty) = self.read_type(rid, visibility)? {
                listing.types.push(ty);
            }
        }
        info!(
            assembly = %listing.assembly_identity,
            types = listing.types.len(),
            members = listing.member_count(),
            "read API listing"
        );
        Ok(listing)
    }

    fn type_def(&self, rid: u32) -> Result<&'a TypeDef, MetadataError> {
        let module = self.module;
        module.type_def(rid).ok_or(MetadataError::BadIndex {
            table: TableId::TypeDef,
            row: rid,
        })
    }

    /// The type's own visibility, or `None` when it or any enclosing type is
    /// not visible outside the assembly.
    fn visibility(&self, rid: u32) -> Result<Option<Visibility>, ReadError> {
        let mut own = None;
        let mut current = rid;
        for _ in 0..MAX_CHAIN {
            let ty = self.type_def(current)?;
            let level = match ty.flags.visibility() {
                TypeVisibility::Public | TypeVisibility::NestedPublic => Visibility::Public,
                TypeVisibility::NestedFamily | TypeVisibility::NestedFamOrAssem => {
                    Visibility::Protected
                }
                _ => return Ok(None),
            };
            if own.is_none() {
                own = Some(level);
            }
            match ty.enclosing {
                Some(outer) => current = outer,
                None => return Ok(own),
            }
        }
        Err(MetadataError::Unsupported(format!("type {} is nested too deeply", rid)).into())
    }

    fn read_type(
        &mut self,
        rid: u32,
        visibility: Visibility,
    ) -> Result<Option<TypeDescriptor>, ReadError> {
        let def = self.type_def(rid)?;
        let type_params = self.namer.type_parameters(rid)?;
        let context = GenericContext::new(&type_params, &[]);
        let name = self.namer.type_def_name(rid, None)?;
        let kind = self.type_kind(rid, def, &name)?;

        let is_abstract = def.flags.contains(TypeAttributes::ABSTRACT);
        let is_sealed = def.flags.contains(TypeAttributes::SEALED);
        let mut descriptor = TypeDescriptor {
            kind,
            visibility,
            is_static: kind == TypeKind::Class && is_abstract && is_sealed,
            is_abstract,
            is_sealed,
            base_type: self.base_type(def, kind, context)?,
            implemented_interfaces: self.interfaces(def, &type_params)?,
            generic_parameters: self.generic_parameters(&def.generic_params, context)?,
            name,
            members: Vec::new(),
        };

        if is_excluded(self.filters, &FilterSubject::Type(&descriptor)) {
            debug!(r#type = %descriptor.name, "type excluded by filter");
            return Ok(None);
        }

        let mut members = Vec::new();
        for method in &def.methods {
            if let Some(member) = self.read_method(rid, &descriptor, method, &type_params)? {
                members.push(member);
            }
        }
        for field in &def.fields {
            if let Some(member) = self.read_field(&descriptor, field, &type_params)? {
                members.push(member);
            }
        }
        members.retain(|member| {
            let excluded = is_excluded(
                self.filters,
                &FilterSubject::Member {
                    owner: &descriptor,
                    member,
                },
            );
            if excluded {
                debug!(r#type = %descriptor.name, member = %member.name, "member excluded by filter");
            }
            !excluded
        });
        descriptor.members = members;

        debug!(
            r#type = %descriptor.name,
            members = descriptor.members.len(),
            "read type"
        );
        Ok(Some(descriptor))
    }

    fn type_kind(&self, rid: u32, def: &TypeDef, name: &str) -> Result<TypeKind, ReadError> {
        if def.flags.contains(TypeAttributes::INTERFACE) {
            return Ok(TypeKind::Interface);
        }
        let own = self.namer.full_name(TypeDefOrRef::TypeDef(rid))?;
        match def.extends {
            Some(base) if self.namer.is_named(base, SYSTEM_ENUM)? => Ok(TypeKind::Enumeration),
            Some(base)
                if self.namer.is_named(base, SYSTEM_VALUE_TYPE)?
                    && own.as_deref() != Some(SYSTEM_ENUM) =>
            {
                Ok(TypeKind::Struct)
            }
            Some(_) => Ok(TypeKind::Class),
            None if own.as_deref() == Some(SYSTEM_OBJECT) => Ok(TypeKind::Class),
            None => Err(ReadError::UnknownTypeKind(name.to_string())),
        }
    }

    fn base_type(
        &self,
        def: &TypeDef,
        kind: TypeKind,
        context: GenericContext<'_>,
    ) -> Result<Option<String>, ReadError> {
        match kind {
            TypeKind::Interface => Ok(None),
            TypeKind::Enumeration => {
                // The backing type is the type of the instance `value__` field.
                let storage = def.fields.iter().find(|field| {
                    !field.flags.contains(FieldAttributes::STATIC)
                        && !field.flags.contains(FieldAttributes::LITERAL)
                });
                match storage.map(|field| &field.signature) {
                    Some(MemberSig::Field(TypeSig::Primitive(Primitive::Int32))) | None => Ok(None),
                    Some(MemberSig::Field(sig)) => {
                        Ok(Some(self.namer.signature_name(sig, context)?))
                    }
                    Some(MemberSig::Method(_)) => Ok(None),
                }
            }
            TypeKind::Class | TypeKind::Struct => match def.extends {
                Some(base)
                    if self.namer.is_named(base, SYSTEM_OBJECT)?
                        || self.namer.is_named(base, SYSTEM_VALUE_TYPE)? =>
                {
                    Ok(None)
                }
                Some(base) => Ok(Some(self.namer.reference_name(base, context)?)),
                None => Ok(None),
            },
        }
    }

    /// Base types defined in this module, nearest first, each with the names
    /// its generic parameters are instantiated with.
    fn base_chain(
        &self,
        def: &TypeDef,
        type_params: &[String],
    ) -> Result<Vec<(u32, Vec<String>)>, ReadError> {
        let mut chain = Vec::new();
        let mut next = def.extends.map(|base| (base, type_params.to_vec()));
        while let Some((reference, params)) = next.take() {
            if chain.len() >= MAX_CHAIN {
                return Err(MetadataError::Unsupported(
                    "inheritance chain is cyclic or too deep".to_string(),
                )
                .into());
            }
            let context = GenericContext::new(&params, &[]);
            let Some((rid, arguments)) = self.namer.local_instance(reference, context)? else {
                break;
            };
            next = self
                .type_def(rid)?
                .extends
                .map(|base| (base, arguments.clone()));
            chain.push((rid, arguments));
        }
        Ok(chain)
    }

    /// Declared interfaces minus those a base type in this module already
    /// implements, sorted.
    fn interfaces(&self, def: &TypeDef, type_params: &[String]) -> Result<Vec<String>, ReadError> {
        if def.interfaces.is_empty() {
            return Ok(Vec::new());
        }
        let context = GenericContext::new(type_params, &[]);
        let mut inherited = HashSet::new();
        for (rid, arguments) in self.base_chain(def, type_params)? {
            let base_context = GenericContext::new(&arguments, &[]);
            for interface in &self.type_def(rid)?.interfaces {
                inherited.insert(self.namer.reference_name(*interface, base_context)?);
            }
        }

        let mut interfaces = Vec::new();
        for interface in &def.interfaces {
            let name = self.namer.reference_name(*interface, context)?;
            if !inherited.contains(&name) {
                interfaces.push(name);
            }
        }
        interfaces.sort();
        interfaces.dedup();
        Ok(interfaces)
    }

    fn generic_parameters(
        &self,
        params: &[GenericParam],
        context: GenericContext<'_>,
    ) -> Result<Vec<GenericParameterDescriptor>, ReadError> {
        let mut descriptors = Vec::with_capacity(params.len());
        for param in params {
            let mut constraints = Vec::new();
            for constraint in &param.constraints {
                if self.namer.is_named(*constraint, SYSTEM_OBJECT)?
                    || self.namer.is_named(*constraint, SYSTEM_VALUE_TYPE)?
                {
                    continue;
                }
                constraints.push(self.namer.reference_name(*constraint, context)?);
            }
            descriptors.push(GenericParameterDescriptor {
                parameter_name: param.name.clone(),
                parameter_position: u32::from(param.number),
                base_type_or_interfaces: constraints,
                new_constraint: param
                    .flags
                    .contains(GenericParamAttributes::DEFAULT_CONSTRUCTOR_CONSTRAINT),
                class_constraint: param
                    .flags
                    .contains(GenericParamAttributes::REFERENCE_TYPE_CONSTRAINT),
                struct_constraint: param
                    .flags
                    .contains(GenericParamAttributes::NOT_NULLABLE_VALUE_TYPE_CONSTRAINT),
            });
        }
        Ok(descriptors)
    }

    fn has_attribute(&self, attributes: &[TypeDefOrRef], name: &str) -> Result<bool, ReadError> {
        for attribute in attributes {
            if self.namer.is_named(*attribute, name)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn implementation(&mut self, rid: u32, method_rid: u32) -> Result<Option<Implementation>, ReadError> {
        let map = match self.interface_maps.entry(rid) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => entry.insert(InterfaceMap::build(self.module, &self.namer, rid)?),
        };
        Ok(map.get(method_rid).cloned())
    }

    fn read_method(
        &mut self,
        rid: u32,
        owner: &TypeDescriptor,
        method: &Method,
        type_params: &[String],
    ) -> Result<Option<MemberDescriptor>, ReadError> {
        let Some(visibility) = member_visibility(method.flags.access()) else {
            return Ok(None);
        };
        let MemberSig::Method(sig) = &method.signature else {
            return Err(ReadError::UnsupportedMember {
                type_name: owner.name.clone(),
                member: method.name.clone(),
            });
        };
        let method_params: Vec<String> =
            method.generic_params.iter().map(|p| p.name.clone()).collect();
        let context = GenericContext::new(type_params, &method_params);
        let parameters = self.parameters(owner, method, sig, context)?;

        let flags = method.flags;
        if flags.contains(MethodAttributes::RT_SPECIAL_NAME)
            && (method.name == ".ctor" || method.name == ".cctor")
        {
            return Ok(Some(MemberDescriptor {
                kind: MemberKind::Constructor,
                name: method_name(&method.name, &[], &parameters, false),
                visibility: Some(visibility),
                parameters,
                ..Default::default()
            }));
        }

        let is_interface = owner.kind == TypeKind::Interface;
        let implementation = if is_interface {
            None
        } else {
            self.implementation(rid, method.rid)?
        };
        let generic_parameter = self.generic_parameters(&method.generic_params, context)?;
        let is_extension = self.has_attribute(&method.attributes, EXTENSION_ATTRIBUTE)?;
        let is_virtual = !is_interface && flags.contains(MethodAttributes::VIRTUAL);
        let hides_inherited = self.hides_inherited(rid, method, sig, type_params)?;

        Ok(Some(MemberDescriptor {
            kind: MemberKind::Method,
            name: method_name(&method.name, &generic_parameter, &parameters, is_extension),
            visibility: (!is_interface).then_some(visibility),
            is_static: flags.contains(MethodAttributes::STATIC),
            is_sealed: flags.contains(MethodAttributes::FINAL),
            is_virtual,
            is_override: is_virtual && !flags.contains(MethodAttributes::NEW_SLOT),
            is_abstract: !is_interface && flags.contains(MethodAttributes::ABSTRACT),
            hides_inherited,
            is_extension,
            return_type: Some(self.namer.signature_name(&sig.return_type, context)?),
            parameters,
            explicit_interface: implementation
                .as_ref()
                .filter(|implementation| implementation.explicit)
                .map(|implementation| implementation.interface.clone()),
            implemented_interface: implementation.map(|implementation| implementation.interface),
            generic_parameter,
            ..Default::default()
        }))
    }

    fn parameters(
        &self,
        owner: &TypeDescriptor,
        method: &Method,
        sig: &MethodSig,
        context: GenericContext<'_>,
    ) -> Result<Vec<ParameterDescriptor>, ReadError> {
        let mut parameters = Vec::with_capacity(sig.parameters.len());
        for (index, param_sig) in sig.parameters.iter().enumerate() {
            let row = method
                .params
                .iter()
                .find(|row| usize::from(row.sequence) == index + 1);
            let flags = row.map(|row| row.flags).unwrap_or_default();
            let by_ref = param_sig.is_by_ref();
            let inner = param_sig.dereferenced();
            let type_name = self.namer.signature_name(inner, context)?;
            let name = row.map(|row| row.name.clone()).unwrap_or_default();

            let direction = if by_ref && flags.contains(ParamAttributes::OUT) {
                ParameterDirection::Out
            } else if by_ref {
                ParameterDirection::Ref
            } else {
                ParameterDirection::In
            };
            let default_value = match row {
                Some(row) if row.flags.contains(ParamAttributes::HAS_DEFAULT) => Some(format_literal(
                    row.constant.as_ref(),
                    &type_name,
                    is_value_type(inner),
                    &format!("{}.{}({})", owner.name, method.name, name),
                )?),
                _ => None,
            };
            let is_params = match row {
                Some(row) => self.has_attribute(&row.attributes, PARAM_ARRAY_ATTRIBUTE)?,
                None => false,
            };

            parameters.push(ParameterDescriptor {
                name,
                type_name,
                direction,
                default_value,
                is_params,
            });
        }
        Ok(parameters)
    }

    /// A non-virtual method hiding a same-named, same-signature public method
    /// of a base type defined in this module.
    fn hides_inherited(
        &self,
        rid: u32,
        method: &Method,
        sig: &MethodSig,
        type_params: &[String],
    ) -> Result<bool, ReadError> {
        let flags = method.flags;
        if flags.contains(MethodAttributes::ABSTRACT)
            || flags.contains(MethodAttributes::VIRTUAL)
            || !flags.contains(MethodAttributes::HIDE_BY_SIG)
        {
            return Ok(false);
        }
        let key = self.namer.method_key(sig, type_params)?;
        let param_flags = parameter_flags(method, sig.parameters.len());

        for (base_rid, arguments) in self.base_chain(self.type_def(rid)?, type_params)? {
            for candidate in &self.type_def(base_rid)?.methods {
                if candidate.name != method.name
                    || candidate.flags.access() != MemberAccess::Public
                {
                    continue;
                }
                let MemberSig::Method(candidate_sig) = &candidate.signature else {
                    continue;
                };
                if self.namer.method_key(candidate_sig, &arguments)? == key
                    && parameter_flags(candidate, candidate_sig.parameters.len()) == param_flags
                {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn read_field(
        &self,
        owner: &TypeDescriptor,
        field: &Field,
        type_params: &[String],
    ) -> Result<Option<MemberDescriptor>, ReadError> {
        let Some(visibility) = member_visibility(field.flags.access()) else {
            return Ok(None);
        };
        let MemberSig::Field(sig) = &field.signature else {
            return Err(ReadError::UnsupportedMember {
                type_name: owner.name.clone(),
                member: field.name.clone(),
            });
        };
        let is_enum = owner.kind == TypeKind::Enumeration;
        let is_literal = field.flags.contains(FieldAttributes::LITERAL);
        if is_enum && !is_literal {
            // Enumeration storage is not part of the surface.
            return Ok(None);
        }

        let type_name = self
            .namer
            .signature_name(sig, GenericContext::new(type_params, &[]))?;
        let literal = if is_literal {
            Some(format_literal(
                field.constant.as_ref(),
                &type_name,
                is_value_type(sig),
                &format!("{}.{}", owner.name, field.name),
            )?)
        } else {
            None
        };

        if is_enum {
            return Ok(Some(MemberDescriptor {
                kind: MemberKind::Field,
                name: field.name.clone(),
                literal,
                ..Default::default()
            }));
        }
        Ok(Some(MemberDescriptor {
            kind: MemberKind::Field,
            name: field.name.clone(),
            visibility: Some(visibility),
            is_constant: is_literal,
            is_static: field.flags.contains(FieldAttributes::STATIC),
            is_read_only: field.flags.contains(FieldAttributes::INIT_ONLY),
            return_type: Some(type_name),
            literal,
            ..Default::default()
        }))
    }
}

fn member_visibility(access: MemberAccess) -> Option<Visibility> {
    match access {
        MemberAccess::Public => Some(Visibility::Public),
        MemberAccess::Family | MemberAccess::FamOrAssem => Some(Visibility::Protected),
        _ => None,
    }
}

fn is_value_type(sig: &TypeSig) -> bool {
    match sig {
        TypeSig::Primitive(primitive) => primitive.is_value_type(),
        TypeSig::ValueType(_) => true,
        TypeSig::GenericInst { is_value_type, .. } => *is_value_type,
        _ => false,
    }
}

/// The parameter flags that take part in signature equality.
fn parameter_flags(method: &Method, count: usize) -> Vec<ParamAttributes> {
    let relevant = ParamAttributes::IN
        | ParamAttributes::OUT
        | ParamAttributes::OPTIONAL
        | ParamAttributes::HAS_DEFAULT;
    (1..=count)
        .map(|position| {
            method
                .params
                .iter()
                .find(|row| usize::from(row.sequence) == position)
                .map(|row| row.flags & relevant)
                .unwrap_or_default()
        })
        .collect()
}
