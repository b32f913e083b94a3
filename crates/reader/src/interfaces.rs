//! Which interface, if any, each method of a type implements.
//!
//! MethodImpl rows are authoritative and are consulted first. Remaining
//! interface methods are matched by name and signature against the type's
//! own public virtual methods; this only works for interfaces defined in the
//! same module, since referenced assemblies are never loaded.

use std::collections::{HashMap, HashSet};

use apicheck_metadata::{
    MemberAccess, MemberRefParent, MemberSig, Method, MethodAttributes, MethodDefOrRef,
    MetadataError, Module, TableId, TypeDefOrRef,
};

use crate::names::{GenericContext, TypeNamer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Implementation {
    pub(crate) interface: String,
    /// Private and final: only reachable through the interface.
    pub(crate) explicit: bool,
}

#[derive(Debug, Default)]
pub(crate) struct InterfaceMap {
    methods: HashMap<u32, Implementation>,
}

fn is_explicit(method: &Method) -> bool {
    method.flags.access() == MemberAccess::Private && method.flags.contains(MethodAttributes::FINAL)
}

impl InterfaceMap {
    pub(crate) fn get(&self, method_rid: u32) -> Option<&Implementation> {
        self.methods.get(&method_rid)
    }

    pub(crate) fn build(
        module: &Module,
        namer: &TypeNamer<'_>,
        rid: u32,
    ) -> Result<InterfaceMap, MetadataError> {
        let ty = module.type_def(rid).ok_or(MetadataError::BadIndex {
            table: TableId::TypeDef,
            row: rid,
        })?;
        let type_params = namer.type_parameters(rid)?;
        let context = GenericContext::new(&type_params, &[]);
        let mut map = InterfaceMap::default();
        let mut covered: HashSet<(String, String)> = HashSet::new();

        for row in module.method_impls.iter().filter(|row| row.class == rid) {
            let MethodDefOrRef::MethodDef(body) = row.body else {
                continue;
            };
            let Some(method) = ty.methods.iter().find(|m| m.rid == body) else {
                continue;
            };
            let Some((interface, name)) = declaration(module, namer, row.declaration, context)?
            else {
                continue;
            };
            covered.insert((interface.clone(), name));
            map.methods.entry(body).or_insert(Implementation {
                interface,
                explicit: is_explicit(method),
            });
        }

        for reference in &ty.interfaces {
            let Some((interface_rid, arguments)) = namer.local_instance(*reference, context)?
            else {
                continue;
            };
            let Some(interface_type) = module.type_def(interface_rid) else {
                continue;
            };
            let interface = namer.reference_name(*reference, context)?;

            for declared in &interface_type.methods {
                if covered.contains(&(interface.clone(), declared.name.clone())) {
                    continue;
                }
                let MemberSig::Method(declared_sig) = &declared.signature else {
                    continue;
                };
                let key = namer.method_key(declared_sig, &arguments)?;
                for candidate in &ty.methods {
                    if candidate.name != declared.name
                        || candidate.flags.access() != MemberAccess::Public
                        || !candidate.flags.contains(MethodAttributes::VIRTUAL)
                        || map.methods.contains_key(&candidate.rid)
                    {
                        continue;
                    }
                    let MemberSig::Method(sig) = &candidate.signature else {
                        continue;
                    };
                    if namer.method_key(sig, &type_params)? == key {
                        map.methods.insert(
                            candidate.rid,
                            Implementation {
                                interface: interface.clone(),
                                explicit: is_explicit(candidate),
                            },
                        );
                        break;
                    }
                }
            }
        }
        Ok(map)
    }
}

/// Interface name and method name a MethodImpl declaration points at.
fn declaration(
    module: &Module,
    namer: &TypeNamer<'_>,
    declaration: MethodDefOrRef,
    context: GenericContext<'_>,
) -> Result<Option<(String, String)>, MetadataError> {
    match declaration {
        MethodDefOrRef::MethodDef(rid) => {
            let (owner, method) = module.method_def(rid).ok_or(MetadataError::BadIndex {
                table: TableId::MethodDef,
                row: rid,
            })?;
            Ok(Some((namer.type_def_name(owner, None)?, method.name.clone())))
        }
        MethodDefOrRef::MemberRef(rid) => {
            let member = module.member_ref(rid).ok_or(MetadataError::BadIndex {
                table: TableId::MemberRef,
                row: rid,
            })?;
            let parent = match member.parent {
                MemberRefParent::TypeDef(row) => TypeDefOrRef::TypeDef(row),
                MemberRefParent::TypeRef(row) => TypeDefOrRef::TypeRef(row),
                MemberRefParent::TypeSpec(row) => TypeDefOrRef::TypeSpec(row),
                MemberRefParent::ModuleRef(_) | MemberRefParent::MethodDef(_) => return Ok(None),
            };
            Ok(Some((
                namer.reference_name(parent, context)?,
                member.name.clone(),
            )))
        }
    }
}
