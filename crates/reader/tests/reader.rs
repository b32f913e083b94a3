//! Listing extraction over hand-built modules.

use apicheck_metadata::{
    ConstantValue, Field, FieldAttributes, GenericParam, GenericParamAttributes, MemberSig,
    Method, MethodAttributes, MethodDefOrRef, MethodImpl, MethodSig, Module, Param,
    ParamAttributes, Primitive, ResolutionScope, TypeAttributes, TypeDef, TypeDefOrRef, TypeRef,
    TypeSig,
};
use apicheck_model::{MemberKind, ParameterDirection, TypeKind, Visibility};
use apicheck_reader::{
    read_module, read_path, ExclusionFilter, FilterSubject, NamespaceFilter, ReadError,
};

const OBJECT: TypeDefOrRef = TypeDefOrRef::TypeRef(1);
const VALUE_TYPE: TypeDefOrRef = TypeDefOrRef::TypeRef(2);
const ENUM: TypeDefOrRef = TypeDefOrRef::TypeRef(3);
const EXTENSION: TypeDefOrRef = TypeDefOrRef::TypeRef(4);
const PARAM_ARRAY: TypeDefOrRef = TypeDefOrRef::TypeRef(5);
const DISPOSABLE: TypeDefOrRef = TypeDefOrRef::TypeRef(6);

const PUBLIC_TYPE: u32 = 0x1;
const NESTED_PUBLIC: u32 = 0x2;
const NESTED_PRIVATE: u32 = 0x3;

const PUBLIC: u16 = 0x6;
const FAMILY: u16 = 0x4;
const PRIVATE: u16 = 0x1;

fn type_ref(namespace: &str, name: &str) -> TypeRef {
    TypeRef {
        scope: ResolutionScope::AssemblyRef(1),
        namespace: namespace.to_string(),
        name: name.to_string(),
    }
}

fn base_module() -> Module {
    Module {
        name: "Demo.dll".to_string(),
        type_refs: vec![
            type_ref("System", "Object"),
            type_ref("System", "ValueType"),
            type_ref("System", "Enum"),
            type_ref("System.Runtime.CompilerServices", "ExtensionAttribute"),
            type_ref("System", "ParamArrayAttribute"),
            type_ref("System", "IDisposable"),
            type_ref("System.Collections.Generic", "IEnumerable`1"),
        ],
        ..Default::default()
    }
}

fn class(name: &str, flags: u32, extends: Option<TypeDefOrRef>) -> TypeDef {
    TypeDef {
        flags: TypeAttributes::from_bits_retain(flags),
        namespace: "Demo".to_string(),
        name: name.to_string(),
        extends,
        ..Default::default()
    }
}

fn method(rid: u32, name: &str, flags: u16, ret: TypeSig, params: Vec<TypeSig>) -> Method {
    Method {
        rid,
        flags: MethodAttributes::from_bits_retain(flags),
        name: name.to_string(),
        signature: MemberSig::Method(MethodSig {
            has_this: flags & MethodAttributes::STATIC.bits() == 0,
            explicit_this: false,
            generic_parameter_count: 0,
            return_type: ret,
            parameters: params,
        }),
        params: Vec::new(),
        generic_params: Vec::new(),
        attributes: Vec::new(),
    }
}

fn param(sequence: u16, name: &str) -> Param {
    Param {
        sequence,
        name: name.to_string(),
        ..Default::default()
    }
}

fn field(name: &str, flags: u16, sig: TypeSig, constant: Option<ConstantValue>) -> Field {
    Field {
        flags: FieldAttributes::from_bits_retain(flags),
        name: name.to_string(),
        signature: MemberSig::Field(sig),
        constant,
        attributes: Vec::new(),
    }
}

fn void() -> TypeSig {
    TypeSig::Primitive(Primitive::Void)
}

fn int32() -> TypeSig {
    TypeSig::Primitive(Primitive::Int32)
}

fn string() -> TypeSig {
    TypeSig::Primitive(Primitive::String)
}

#[test]
fn test_type_kinds_and_visibility() {
    let mut module = base_module();
    let literal = FieldAttributes::STATIC.bits() | FieldAttributes::LITERAL.bits() | PUBLIC;
    module.type_defs = vec![
        class("Helpers", PUBLIC_TYPE | 0x180, Some(OBJECT)),
        class("Point", PUBLIC_TYPE | 0x100, Some(VALUE_TYPE)),
        TypeDef {
            fields: vec![
                field("value__", PUBLIC, TypeSig::Primitive(Primitive::Byte), None),
                field("None", literal, int32(), Some(ConstantValue::Byte(0))),
            ],
            ..class("Flags", PUBLIC_TYPE | 0x100, Some(ENUM))
        },
        class("IShape", PUBLIC_TYPE | 0xA0, None),
        class("Hidden", 0, Some(OBJECT)),
        TypeDef {
            enclosing: Some(5),
            ..class("Leaked", NESTED_PUBLIC, Some(OBJECT))
        },
        TypeDef {
            enclosing: Some(1),
            ..class("Secret", NESTED_PRIVATE, Some(OBJECT))
        },
    ];

    let listing = read_module(&module, &[]).unwrap();
    let names: Vec<&str> = listing.types.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["Demo.Helpers", "Demo.Point", "Demo.Flags", "Demo.IShape"]);

    let helpers = &listing.types[0];
    assert_eq!(helpers.kind, TypeKind::Class);
    assert!(helpers.is_static && helpers.is_abstract && helpers.is_sealed);
    assert_eq!(helpers.base_type, None);

    assert_eq!(listing.types[1].kind, TypeKind::Struct);
    assert_eq!(listing.types[1].base_type, None);

    let flags = &listing.types[2];
    assert_eq!(flags.kind, TypeKind::Enumeration);
    assert_eq!(flags.base_type.as_deref(), Some("System.Byte"));
    assert_eq!(flags.members.len(), 1);
    assert_eq!(flags.members[0].name, "None");
    assert_eq!(flags.members[0].visibility, None);
    assert_eq!(flags.members[0].return_type, None);
    assert_eq!(flags.members[0].literal.as_deref(), Some("0"));

    assert_eq!(listing.types[3].kind, TypeKind::Interface);
    assert_eq!(listing.types[3].visibility, Visibility::Public);
}

#[test]
fn test_type_without_base_is_unknown_kind() {
    let mut module = base_module();
    module.type_defs = vec![class("Orphan", PUBLIC_TYPE, None)];
    let err = read_module(&module, &[]).unwrap_err();
    assert!(matches!(err, ReadError::UnknownTypeKind(ref name) if name == "Demo.Orphan"));
}

#[test]
fn test_methods_fields_and_parameters() {
    let mut module = base_module();
    let widget = TypeDefOrRef::TypeDef(1);
    let hide = MethodAttributes::HIDE_BY_SIG.bits();
    let statik = MethodAttributes::STATIC.bits();
    let ctor_flags = PUBLIC | hide | 0x1800;

    let mut ctor = method(1, ".ctor", ctor_flags, void(), vec![int32()]);
    ctor.params = vec![param(1, "size")];

    let mut resize = method(2, "Resize", PUBLIC | hide | statik, void(), vec![TypeSig::Class(widget), int32()]);
    resize.attributes = vec![EXTENSION];
    resize.params = vec![
        param(1, "widget"),
        Param {
            flags: ParamAttributes::OPTIONAL | ParamAttributes::HAS_DEFAULT,
            constant: Some(ConstantValue::Int32(3)),
            ..param(2, "width")
        },
    ];

    let mut try_parse = method(
        3,
        "TryParse",
        PUBLIC | hide | statik,
        TypeSig::Primitive(Primitive::Boolean),
        vec![string(), TypeSig::ByRef(Box::new(TypeSig::Class(widget)))],
    );
    try_parse.params = vec![
        param(1, "text"),
        Param {
            flags: ParamAttributes::OUT,
            ..param(2, "result")
        },
    ];

    let mut join = method(4, "Join", PUBLIC | hide | statik, string(), vec![TypeSig::SzArray(Box::new(string()))]);
    join.params = vec![Param {
        attributes: vec![PARAM_ARRAY],
        ..param(1, "parts")
    }];

    let mut swap = method(5, "Swap", PUBLIC | hide, void(), vec![TypeSig::ByRef(Box::new(int32()))]);
    swap.params = vec![param(1, "value")];

    let changed = method(6, "OnChanged", FAMILY | hide, void(), vec![]);
    let secret = method(7, "Secret", PRIVATE | hide, void(), vec![]);

    let constant = FieldAttributes::STATIC.bits() | FieldAttributes::LITERAL.bits() | PUBLIC;
    let read_only = FieldAttributes::INIT_ONLY.bits() | PUBLIC;
    module.type_defs = vec![TypeDef {
        methods: vec![ctor, resize, try_parse, join, swap, changed, secret],
        fields: vec![
            field("Max", constant, int32(), Some(ConstantValue::Int32(10))),
            field("Label", read_only, string(), None),
            field("cache", PRIVATE, string(), None),
        ],
        ..class("Widget", PUBLIC_TYPE, Some(OBJECT))
    }];

    let listing = read_module(&module, &[]).unwrap();
    let ty = &listing.types[0];
    let names: Vec<&str> = ty.members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(
        names,
        [
            ".ctor(System.Int32 size)",
            "Resize(this Demo.Widget widget, System.Int32 width = 3)",
            "TryParse(System.String text, out Demo.Widget result)",
            "Join(params System.String[] parts)",
            "Swap(ref System.Int32 value)",
            "OnChanged()",
            "Max",
            "Label",
        ]
    );

    let ctor = &ty.members[0];
    assert_eq!(ctor.kind, MemberKind::Constructor);
    assert_eq!(ctor.return_type, None);

    let resize = &ty.members[1];
    assert!(resize.is_extension && resize.is_static);
    assert_eq!(resize.return_type.as_deref(), Some("System.Void"));
    assert_eq!(resize.parameters[1].default_value.as_deref(), Some("3"));

    let try_parse = &ty.members[2];
    assert_eq!(try_parse.parameters[1].direction, ParameterDirection::Out);
    assert_eq!(try_parse.parameters[1].type_name, "Demo.Widget");
    assert_eq!(ty.members[4].parameters[0].direction, ParameterDirection::Ref);
    assert_eq!(ty.members[5].visibility, Some(Visibility::Protected));

    let max = &ty.members[6];
    assert_eq!(max.kind, MemberKind::Field);
    assert!(max.is_constant && max.is_static);
    assert_eq!(max.literal.as_deref(), Some("10"));
    assert_eq!(max.return_type.as_deref(), Some("System.Int32"));

    let label = &ty.members[7];
    assert!(label.is_read_only && !label.is_constant);
    assert_eq!(label.literal, None);
}

#[test]
fn test_virtual_override_and_hiding() {
    let mut module = base_module();
    let hide = MethodAttributes::HIDE_BY_SIG.bits();
    let virt = MethodAttributes::VIRTUAL.bits();
    let new_slot = MethodAttributes::NEW_SLOT.bits();
    let abstr = MethodAttributes::ABSTRACT.bits();

    module.type_defs = vec![
        TypeDef {
            methods: vec![
                method(1, "Draw", PUBLIC | hide | virt | new_slot, void(), vec![]),
                method(2, "Reset", PUBLIC | hide, void(), vec![]),
                method(3, "Layout", PUBLIC | hide | virt | new_slot | abstr, void(), vec![]),
            ],
            ..class("Shape", PUBLIC_TYPE | 0x80, Some(OBJECT))
        },
        TypeDef {
            methods: vec![
                method(4, "Draw", PUBLIC | hide | virt, void(), vec![]),
                method(5, "Reset", PUBLIC | hide, void(), vec![]),
                method(6, "Reset", PUBLIC | hide, void(), vec![int32()]),
                method(7, "Layout", PUBLIC | hide | virt | 0x20, void(), vec![]),
            ],
            ..class("Circle", PUBLIC_TYPE, Some(TypeDefOrRef::TypeDef(1)))
        },
    ];

    let listing = read_module(&module, &[]).unwrap();
    let shape = &listing.types[0];
    assert!(shape.members[0].is_virtual && !shape.members[0].is_override);
    assert!(!shape.members[1].hides_inherited);
    assert!(shape.members[2].is_abstract);

    let circle = &listing.types[1];
    assert_eq!(circle.base_type.as_deref(), Some("Demo.Shape"));
    assert!(circle.members[0].is_override);
    assert!(circle.members[1].hides_inherited);
    assert!(!circle.members[2].hides_inherited);
    assert!(circle.members[3].is_override && circle.members[3].is_sealed);
}

#[test]
fn test_interfaces_and_implementations() {
    let mut module = base_module();
    let hide = MethodAttributes::HIDE_BY_SIG.bits();
    let interface_method = PUBLIC | hide | 0x0140 | MethodAttributes::ABSTRACT.bits();
    let implementation = PUBLIC | hide | 0x0160;
    let explicit = PRIVATE | hide | 0x0160;

    module.type_defs = vec![
        TypeDef {
            methods: vec![
                method(1, "Area", interface_method, int32(), vec![]),
                method(2, "Perimeter", interface_method, int32(), vec![]),
            ],
            ..class("IShape", PUBLIC_TYPE | 0xA0, None)
        },
        class("IOther", PUBLIC_TYPE | 0xA0, None),
        TypeDef {
            interfaces: vec![DISPOSABLE, TypeDefOrRef::TypeDef(1)],
            methods: vec![
                method(3, "Area", implementation, int32(), vec![]),
                method(4, "Demo.IShape.Perimeter", explicit, int32(), vec![]),
                method(5, "Dispose", implementation, void(), vec![]),
            ],
            ..class("Square", PUBLIC_TYPE, Some(OBJECT))
        },
        TypeDef {
            interfaces: vec![
                TypeDefOrRef::TypeDef(2),
                TypeDefOrRef::TypeDef(1),
                DISPOSABLE,
            ],
            ..class("Tile", PUBLIC_TYPE, Some(TypeDefOrRef::TypeDef(3)))
        },
    ];
    module.method_impls = vec![MethodImpl {
        class: 3,
        body: MethodDefOrRef::MethodDef(4),
        declaration: MethodDefOrRef::MethodDef(2),
    }];

    let listing = read_module(&module, &[]).unwrap();
    let shape = &listing.types[0];
    assert_eq!(shape.members[0].visibility, None);
    assert!(!shape.members[0].is_virtual && !shape.members[0].is_abstract);

    let square = listing.find_type("Demo.Square").unwrap();
    assert_eq!(
        square.implemented_interfaces,
        ["Demo.IShape", "System.IDisposable"]
    );
    // The private explicit implementation is not part of the surface.
    assert_eq!(square.members.len(), 2);
    assert_eq!(
        square.members[0].implemented_interface.as_deref(),
        Some("Demo.IShape")
    );
    assert_eq!(square.members[0].explicit_interface, None);
    // External interfaces can't be matched without loading them.
    assert_eq!(square.members[1].implemented_interface, None);

    let tile = listing.find_type("Demo.Tile").unwrap();
    assert_eq!(tile.implemented_interfaces, ["Demo.IOther"]);
}

#[test]
fn test_generic_types_and_methods() {
    let mut module = base_module();
    module.type_specs = vec![TypeSig::GenericInst {
        is_value_type: false,
        generic: TypeDefOrRef::TypeRef(7),
        arguments: vec![TypeSig::Var(0)],
    }];
    let mut get = method(
        1,
        "Get",
        PUBLIC | MethodAttributes::HIDE_BY_SIG.bits(),
        TypeSig::Var(0),
        vec![TypeSig::MVar(0)],
    );
    get.params = vec![param(1, "key")];
    get.generic_params = vec![GenericParam {
        name: "TKey".to_string(),
        flags: GenericParamAttributes::NOT_NULLABLE_VALUE_TYPE_CONSTRAINT,
        constraints: vec![VALUE_TYPE],
        ..Default::default()
    }];
    if let MemberSig::Method(sig) = &mut get.signature {
        sig.generic_parameter_count = 1;
    }

    module.type_defs = vec![TypeDef {
        generic_params: vec![GenericParam {
            name: "T".to_string(),
            flags: GenericParamAttributes::DEFAULT_CONSTRUCTOR_CONSTRAINT,
            constraints: vec![OBJECT, TypeDefOrRef::TypeSpec(1)],
            ..Default::default()
        }],
        methods: vec![get],
        ..class("Cache`1", PUBLIC_TYPE, Some(OBJECT))
    }];

    let listing = read_module(&module, &[]).unwrap();
    let cache = &listing.types[0];
    assert_eq!(cache.name, "Demo.Cache<T>");
    let t = &cache.generic_parameters[0];
    assert_eq!(t.parameter_position, 0);
    assert_eq!(
        t.base_type_or_interfaces,
        ["System.Collections.Generic.IEnumerable<T>"]
    );
    assert!(t.new_constraint && !t.class_constraint);

    let get = &cache.members[0];
    assert_eq!(get.name, "Get<TKey>(TKey key)");
    assert_eq!(get.return_type.as_deref(), Some("T"));
    assert!(get.generic_parameter[0].struct_constraint);
    assert!(get.generic_parameter[0].base_type_or_interfaces.is_empty());
}

fn skip_obsolete(subject: &FilterSubject<'_>) -> bool {
    matches!(subject, FilterSubject::Member { member, .. } if member.name.starts_with("Obsolete"))
}

#[test]
fn test_exclusion_filters() {
    let mut module = base_module();
    let hide = MethodAttributes::HIDE_BY_SIG.bits();
    module.type_defs = vec![
        TypeDef {
            methods: vec![
                method(1, "Render", PUBLIC | hide, void(), vec![]),
                method(2, "ObsoleteRender", PUBLIC | hide, void(), vec![]),
            ],
            ..class("Widget", PUBLIC_TYPE, Some(OBJECT))
        },
        TypeDef {
            namespace: "Demo.Internal".to_string(),
            ..class("Cache", PUBLIC_TYPE, Some(OBJECT))
        },
    ];
    let filters: Vec<Box<dyn ExclusionFilter>> = vec![
        Box::new(NamespaceFilter::new(["Demo.Internal"])),
        Box::new(skip_obsolete),
    ];
    let listing = read_module(&module, &filters).unwrap();
    assert_eq!(listing.types.len(), 1);
    assert_eq!(listing.types[0].members.len(), 1);
    assert_eq!(listing.types[0].members[0].name, "Render()");
}

#[test]
fn test_member_with_wrong_signature_category() {
    let mut module = base_module();
    let mut broken = method(1, "Broken", PUBLIC, void(), vec![]);
    broken.signature = MemberSig::Field(int32());
    module.type_defs = vec![TypeDef {
        methods: vec![broken],
        ..class("Widget", PUBLIC_TYPE, Some(OBJECT))
    }];
    let err = read_module(&module, &[]).unwrap_err();
    assert!(matches!(err, ReadError::UnsupportedMember { ref member, .. } if member == "Broken"));
}

#[test]
fn test_unsupported_default_value() {
    let mut module = base_module();
    let mut run = method(1, "Run", PUBLIC, void(), vec![TypeSig::Primitive(Primitive::Object)]);
    run.params = vec![Param {
        flags: ParamAttributes::HAS_DEFAULT,
        constant: Some(ConstantValue::Unsupported(0x1c)),
        ..param(1, "state")
    }];
    module.type_defs = vec![TypeDef {
        methods: vec![run],
        ..class("Widget", PUBLIC_TYPE, Some(OBJECT))
    }];
    let err = read_module(&module, &[]).unwrap_err();
    assert!(matches!(err, ReadError::UnsupportedLiteral { element_type: 0x1c, .. }));
}

#[test]
fn test_extraction_is_deterministic() {
    let mut module = base_module();
    module.type_defs = vec![
        TypeDef {
            interfaces: vec![DISPOSABLE],
            methods: vec![method(1, "Dispose", PUBLIC | 0x01E0, void(), vec![])],
            ..class("Widget", PUBLIC_TYPE, Some(OBJECT))
        },
        class("Gadget", PUBLIC_TYPE, Some(OBJECT)),
    ];
    let first = read_module(&module, &[]).unwrap().to_json_string().unwrap();
    let second = read_module(&module, &[]).unwrap().to_json_string().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_read_path() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.dll");
    let err = read_path(&missing, &[]).unwrap_err();
    assert!(matches!(err, ReadError::Io { .. }));
    assert!(err.to_string().contains("missing.dll"));

    let mut module = base_module();
    module.type_defs = vec![class("Widget", PUBLIC_TYPE, Some(OBJECT))];
    let listing = read_module(&module, &[]).unwrap();
    let baseline = dir.path().join("baseline.json");
    std::fs::write(&baseline, listing.to_json_string().unwrap()).unwrap();
    assert_eq!(read_path(&baseline, &[]).unwrap(), listing);
    assert_eq!(listing.assembly_identity, "Demo.dll");
}
