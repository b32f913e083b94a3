//! Rendering metadata type references as canonical type names.
//!
//! Names are namespace-qualified, nested types are joined with `+` and the
//! generic arity suffix (`` `2 ``) is replaced by an argument list, so
//! `Dictionary`2` instantiated over two type parameters renders as
//! `System.Collections.Generic.Dictionary<TKey, TValue>`.

use apicheck_metadata::{
    MetadataError, MethodSig, Module, ResolutionScope, TableId, TypeDefOrRef, TypeSig,
};

/// Guard against cyclic nesting or inheritance in hostile metadata.
pub(crate) const MAX_CHAIN: usize = 64;

/// Names that `Var(n)` and `MVar(n)` resolve to.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct GenericContext<'a> {
    pub(crate) type_params: &'a [String],
    pub(crate) method_params: &'a [String],
}

impl<'a> GenericContext<'a> {
    pub(crate) fn new(type_params: &'a [String], method_params: &'a [String]) -> Self {
        GenericContext {
            type_params,
            method_params,
        }
    }
}

/// Positional placeholders, so methods with differently named generic
/// parameters still compare equal.
pub(crate) fn positional_names(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("!!{}", i)).collect()
}

pub(crate) struct TypeNamer<'m> {
    module: &'m Module,
}

impl<'m> TypeNamer<'m> {
    pub(crate) fn new(module: &'m Module) -> Self {
        TypeNamer { module }
    }

    fn bad(table: TableId, row: u32) -> MetadataError {
        MetadataError::BadIndex { table, row }
    }

    /// Names of the generic parameters declared on a type definition.
    pub(crate) fn type_parameters(&self, rid: u32) -> Result<Vec<String>, MetadataError> {
        let ty = self
            .module
            .type_def(rid)
            .ok_or_else(|| Self::bad(TableId::TypeDef, rid))?;
        Ok(ty.generic_params.iter().map(|p| p.name.clone()).collect())
    }

    /// `Namespace.Outer+Inner` with arity suffixes kept, for well-known
    /// type checks.
    pub(crate) fn full_name(&self, reference: TypeDefOrRef) -> Result<Option<String>, MetadataError> {
        let segments = match reference {
            TypeDefOrRef::TypeDef(rid) => self.type_def_segments(rid)?,
            TypeDefOrRef::TypeRef(rid) => self.type_ref_segments(rid)?,
            TypeDefOrRef::TypeSpec(_) => return Ok(None),
        };
        let (namespace, names) = segments;
        let joined = names.join("+");
        Ok(Some(qualify(&namespace, &joined)))
    }

    /// True when `reference` names `expected` (`System.Object`, ...).
    pub(crate) fn is_named(
        &self,
        reference: TypeDefOrRef,
        expected: &str,
    ) -> Result<bool, MetadataError> {
        Ok(self.full_name(reference)?.as_deref() == Some(expected))
    }

    /// Render a type definition; `arguments` replace its generic parameters.
    pub(crate) fn type_def_name(
        &self,
        rid: u32,
        arguments: Option<&[String]>,
    ) -> Result<String, MetadataError> {
        let (namespace, names) = self.type_def_segments(rid)?;
        let own;
        let arguments = match arguments {
            Some(arguments) => arguments,
            None => {
                own = self.type_parameters(rid)?;
                &own
            }
        };
        Ok(qualify(&namespace, &apply_arguments(&names, arguments)))
    }

    fn type_ref_name(&self, rid: u32, arguments: &[String]) -> Result<String, MetadataError> {
        let (namespace, names) = self.type_ref_segments(rid)?;
        Ok(qualify(&namespace, &apply_arguments(&names, arguments)))
    }

    /// Render a TypeDef/TypeRef/TypeSpec reference within `context`.
    pub(crate) fn reference_name(
        &self,
        reference: TypeDefOrRef,
        context: GenericContext<'_>,
    ) -> Result<String, MetadataError> {
        match reference {
            TypeDefOrRef::TypeDef(rid) => self.type_def_name(rid, None),
            TypeDefOrRef::TypeRef(rid) => self.type_ref_name(rid, &[]),
            TypeDefOrRef::TypeSpec(rid) => {
                let spec = self
                    .module
                    .type_spec(rid)
                    .ok_or_else(|| Self::bad(TableId::TypeSpec, rid))?;
                self.signature_name(spec, context)
            }
        }
    }

    /// Render a type signature within `context`.
    pub(crate) fn signature_name(
        &self,
        sig: &TypeSig,
        context: GenericContext<'_>,
    ) -> Result<String, MetadataError> {
        Ok(match sig {
            TypeSig::Primitive(primitive) => primitive.type_name().to_string(),
            TypeSig::Class(reference) | TypeSig::ValueType(reference) => {
                self.reference_name(*reference, context)?
            }
            TypeSig::GenericInst {
                generic, arguments, ..
            } => {
                let arguments = arguments
                    .iter()
                    .map(|argument| self.signature_name(argument, context))
                    .collect::<Result<Vec<_>, _>>()?;
                match generic {
                    TypeDefOrRef::TypeDef(rid) => self.type_def_name(*rid, Some(&arguments))?,
                    TypeDefOrRef::TypeRef(rid) => self.type_ref_name(*rid, &arguments)?,
                    TypeDefOrRef::TypeSpec(_) => {
                        return Err(MetadataError::BadSignature(
                            "generic instance over a TypeSpec",
                        ))
                    }
                }
            }
            TypeSig::Var(index) => context
                .type_params
                .get(*index as usize)
                .cloned()
                .unwrap_or_else(|| format!("!{}", index)),
            TypeSig::MVar(index) => context
                .method_params
                .get(*index as usize)
                .cloned()
                .unwrap_or_else(|| format!("!!{}", index)),
            TypeSig::SzArray(element) => format!("{}[]", self.signature_name(element, context)?),
            TypeSig::Array { element, rank } => format!(
                "{}[{}]",
                self.signature_name(element, context)?,
                ",".repeat(rank.saturating_sub(1) as usize)
            ),
            TypeSig::Pointer(element) => format!("{}*", self.signature_name(element, context)?),
            TypeSig::ByRef(element) => format!("{}&", self.signature_name(element, context)?),
            // Function pointers surface as native integers.
            TypeSig::FnPtr(_) => "System.IntPtr".to_string(),
        })
    }

    /// Resolve a reference to a type defined in this module, with the names
    /// its generic parameters are instantiated with. `None` for external
    /// types.
    pub(crate) fn local_instance(
        &self,
        reference: TypeDefOrRef,
        context: GenericContext<'_>,
    ) -> Result<Option<(u32, Vec<String>)>, MetadataError> {
        match reference {
            TypeDefOrRef::TypeDef(rid) => Ok(Some((rid, self.type_parameters(rid)?))),
            TypeDefOrRef::TypeRef(_) => Ok(None),
            TypeDefOrRef::TypeSpec(rid) => {
                let spec = self
                    .module
                    .type_spec(rid)
                    .ok_or_else(|| Self::bad(TableId::TypeSpec, rid))?;
                match spec {
                    TypeSig::GenericInst {
                        generic: TypeDefOrRef::TypeDef(generic),
                        arguments,
                        ..
                    } => {
                        let arguments = arguments
                            .iter()
                            .map(|argument| self.signature_name(argument, context))
                            .collect::<Result<Vec<_>, _>>()?;
                        Ok(Some((*generic, arguments)))
                    }
                    _ => Ok(None),
                }
            }
        }
    }

    /// Return and parameter types, for matching methods by signature.
    pub(crate) fn method_key(
        &self,
        sig: &MethodSig,
        type_params: &[String],
    ) -> Result<String, MetadataError> {
        let method_params = positional_names(sig.generic_parameter_count as usize);
        let context = GenericContext::new(type_params, &method_params);
        let mut key = self.signature_name(&sig.return_type, context)?;
        key.push('(');
        for (index, parameter) in sig.parameters.iter().enumerate() {
            if index > 0 {
                key.push(',');
            }
            key.push_str(&self.signature_name(parameter, context)?);
        }
        key.push(')');
        Ok(key)
    }

    fn type_def_segments(&self, rid: u32) -> Result<(String, Vec<String>), MetadataError> {
        let mut names = Vec::new();
        let mut current = rid;
        for _ in 0..MAX_CHAIN {
            let ty = self
                .module
                .type_def(current)
                .ok_or_else(|| Self::bad(TableId::TypeDef, current))?;
            names.push(ty.name.clone());
            match ty.enclosing {
                Some(outer) => current = outer,
                None => {
                    names.reverse();
                    return Ok((ty.namespace.clone(), names));
                }
            }
        }
        Err(MetadataError::Unsupported(format!(
            "type nesting deeper than {} levels",
            MAX_CHAIN
        )))
    }

    fn type_ref_segments(&self, rid: u32) -> Result<(String, Vec<String>), MetadataError> {
        let mut names = Vec::new();
        let mut current = rid;
        for _ in 0..MAX_CHAIN {
            let ty = self
                .module
                .type_ref(current)
                .ok_or_else(|| Self::bad(TableId::TypeRef, current))?;
            names.push(ty.name.clone());
            match ty.scope {
                ResolutionScope::TypeRef(outer) => current = outer,
                _ => {
                    names.reverse();
                    return Ok((ty.namespace.clone(), names));
                }
            }
        }
        Err(MetadataError::Unsupported(format!(
            "type reference nesting deeper than {} levels",
            MAX_CHAIN
        )))
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", namespace, name)
    }
}

/// Split `Name`N` into the base name and its arity.
fn split_arity(name: &str) -> (&str, usize) {
    match name.rfind('`') {
        Some(tick) => match name[tick + 1..].parse::<usize>() {
            Ok(arity) => (&name[..tick], arity),
            Err(_) => (name, 0),
        },
        None => (name, 0),
    }
}

/// Hand out `arguments` to nesting levels in order, each level taking as
/// many as its arity suffix declares.
fn apply_arguments(segments: &[String], arguments: &[String]) -> String {
    let mut remaining = arguments.iter();
    let mut rendered = Vec::with_capacity(segments.len());
    for segment in segments {
        let (base, arity) = split_arity(segment);
        let taken: Vec<&str> = remaining.by_ref().take(arity).map(String::as_str).collect();
        if taken.is_empty() {
            rendered.push(base.to_string());
        } else {
            rendered.push(format!("{}<{}>", base, taken.join(", ")));
        }
    }
    rendered.join("+")
}
