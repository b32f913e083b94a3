//! Signature blobs, ECMA-335 II.23.2, and constant values.

use crate::bytes::Reader;
use crate::error::{MetadataError, Result};

const MAX_DEPTH: u32 = 64;

const ELEMENT_VOID: u8 = 0x01;
const ELEMENT_BOOLEAN: u8 = 0x02;
const ELEMENT_CHAR: u8 = 0x03;
const ELEMENT_I1: u8 = 0x04;
const ELEMENT_U1: u8 = 0x05;
const ELEMENT_I2: u8 = 0x06;
const ELEMENT_U2: u8 = 0x07;
const ELEMENT_I4: u8 = 0x08;
const ELEMENT_U4: u8 = 0x09;
const ELEMENT_I8: u8 = 0x0a;
const ELEMENT_U8: u8 = 0x0b;
const ELEMENT_R4: u8 = 0x0c;
const ELEMENT_R8: u8 = 0x0d;
const ELEMENT_STRING: u8 = 0x0e;
const ELEMENT_PTR: u8 = 0x0f;
const ELEMENT_BYREF: u8 = 0x10;
const ELEMENT_VALUETYPE: u8 = 0x11;
const ELEMENT_CLASS: u8 = 0x12;
const ELEMENT_VAR: u8 = 0x13;
const ELEMENT_ARRAY: u8 = 0x14;
const ELEMENT_GENERICINST: u8 = 0x15;
const ELEMENT_TYPEDBYREF: u8 = 0x16;
const ELEMENT_I: u8 = 0x18;
const ELEMENT_U: u8 = 0x19;
const ELEMENT_FNPTR: u8 = 0x1b;
const ELEMENT_OBJECT: u8 = 0x1c;
const ELEMENT_SZARRAY: u8 = 0x1d;
const ELEMENT_MVAR: u8 = 0x1e;
const ELEMENT_CMOD_REQD: u8 = 0x1f;
const ELEMENT_CMOD_OPT: u8 = 0x20;
const ELEMENT_SENTINEL: u8 = 0x41;
const ELEMENT_PINNED: u8 = 0x45;

const CALLCONV_FIELD: u8 = 0x06;
const CALLCONV_PROPERTY: u8 = 0x08;
const CALLCONV_GENERIC: u8 = 0x10;
const CALLCONV_HASTHIS: u8 = 0x20;
const CALLCONV_EXPLICITTHIS: u8 = 0x40;

/// Built-in element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Void,
    Boolean,
    Char,
    SByte,
    Byte,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Single,
    Double,
    String,
    TypedReference,
    IntPtr,
    UIntPtr,
    Object,
}

impl Primitive {
    fn from_element_type(element: u8) -> Option<Primitive> {
        Some(match element {
            ELEMENT_VOID => Primitive::Void,
            ELEMENT_BOOLEAN => Primitive::Boolean,
            ELEMENT_CHAR => Primitive::Char,
            ELEMENT_I1 => Primitive::SByte,
            ELEMENT_U1 => Primitive::Byte,
            ELEMENT_I2 => Primitive::Int16,
            ELEMENT_U2 => Primitive::UInt16,
            ELEMENT_I4 => Primitive::Int32,
            ELEMENT_U4 => Primitive::UInt32,
            ELEMENT_I8 => Primitive::Int64,
            ELEMENT_U8 => Primitive::UInt64,
            ELEMENT_R4 => Primitive::Single,
            ELEMENT_R8 => Primitive::Double,
            ELEMENT_STRING => Primitive::String,
            ELEMENT_TYPEDBYREF => Primitive::TypedReference,
            ELEMENT_I => Primitive::IntPtr,
            ELEMENT_U => Primitive::UIntPtr,
            ELEMENT_OBJECT => Primitive::Object,
            _ => return None,
        })
    }

    /// The framework type this element type stands for.
    pub fn type_name(self) -> &'static str {
        match self {
            Primitive::Void => "System.Void",
            Primitive::Boolean => "System.Boolean",
            Primitive::Char => "System.Char",
            Primitive::SByte => "System.SByte",
            Primitive::Byte => "System.Byte",
            Primitive::Int16 => "System.Int16",
            Primitive::UInt16 => "System.UInt16",
            Primitive::Int32 => "System.Int32",
            Primitive::UInt32 => "System.UInt32",
            Primitive::Int64 => "System.Int64",
            Primitive::UInt64 => "System.UInt64",
            Primitive::Single => "System.Single",
            Primitive::Double => "System.Double",
            Primitive::String => "System.String",
            Primitive::TypedReference => "System.TypedReference",
            Primitive::IntPtr => "System.IntPtr",
            Primitive::UIntPtr => "System.UIntPtr",
            Primitive::Object => "System.Object",
        }
    }

    pub fn is_value_type(self) -> bool {
        !matches!(self, Primitive::String | Primitive::Object)
    }
}

/// A reference into the TypeDef, TypeRef or TypeSpec table (1-based rows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeDefOrRef {
    TypeDef(u32),
    TypeRef(u32),
    TypeSpec(u32),
}

impl TypeDefOrRef {
    /// Decode the compressed `TypeDefOrRefOrSpecEncoded` form.
    fn from_encoded(value: u32) -> Result<TypeDefOrRef> {
        let row = value >> 2;
        match value & 3 {
            0 => Ok(TypeDefOrRef::TypeDef(row)),
            1 => Ok(TypeDefOrRef::TypeRef(row)),
            2 => Ok(TypeDefOrRef::TypeSpec(row)),
            _ => Err(MetadataError::BadSignature("invalid TypeDefOrRef tag")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    Primitive(Primitive),
    Class(TypeDefOrRef),
    ValueType(TypeDefOrRef),
    GenericInst {
        is_value_type: bool,
        generic: TypeDefOrRef,
        arguments: Vec<TypeSig>,
    },
    /// Generic parameter of the enclosing type.
    Var(u32),
    /// Generic parameter of the enclosing method.
    MVar(u32),
    SzArray(Box<TypeSig>),
    Array {
        element: Box<TypeSig>,
        rank: u32,
    },
    Pointer(Box<TypeSig>),
    ByRef(Box<TypeSig>),
    FnPtr(Box<MethodSig>),
}

impl TypeSig {
    pub fn is_by_ref(&self) -> bool {
        matches!(self, TypeSig::ByRef(_))
    }

    /// Strip one level of by-reference.
    pub fn dereferenced(&self) -> &TypeSig {
        match self {
            TypeSig::ByRef(inner) => inner,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub has_this: bool,
    pub explicit_this: bool,
    pub generic_parameter_count: u32,
    pub return_type: TypeSig,
    pub parameters: Vec<TypeSig>,
}

/// The signature attached to a Field, MethodDef or MemberRef row.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MemberSig {
    Field(TypeSig),
    Method(MethodSig),
}

/// Parse a member signature, whichever category it is.
pub fn parse_member_signature(blob: &[u8]) -> Result<MemberSig> {
    let mut parser = SigParser::new(blob);
    let header = parser.reader.peek_u8()?;
    if header & 0x0f == CALLCONV_FIELD {
        parser.reader.u8()?;
        parser.skip_custom_modifiers()?;
        return Ok(MemberSig::Field(parser.type_sig(0)?));
    }
    if header & 0x0f == CALLCONV_PROPERTY {
        return Err(MetadataError::BadSignature(
            "property signature where a member signature was expected",
        ));
    }
    Ok(MemberSig::Method(parser.method_sig(0)?))
}

/// Parse a TypeSpec blob.
pub fn parse_type_spec(blob: &[u8]) -> Result<TypeSig> {
    SigParser::new(blob).type_sig(0)
}

struct SigParser<'a> {
    reader: Reader<'a>,
}

impl<'a> SigParser<'a> {
    fn new(blob: &'a [u8]) -> Self {
        SigParser {
            reader: Reader::new(blob),
        }
    }

    fn skip_custom_modifiers(&mut self) -> Result<()> {
        loop {
            match self.reader.peek_u8() {
                Ok(ELEMENT_CMOD_REQD) | Ok(ELEMENT_CMOD_OPT) => {
                    self.reader.u8()?;
                    self.reader.compressed_u32()?;
                }
                Ok(ELEMENT_PINNED) | Ok(ELEMENT_SENTINEL) => {
                    self.reader.u8()?;
                }
                _ => return Ok(()),
            }
        }
    }

    fn type_def_or_ref(&mut self) -> Result<TypeDefOrRef> {
        TypeDefOrRef::from_encoded(self.reader.compressed_u32()?)
    }

    fn method_sig(&mut self, depth: u32) -> Result<MethodSig> {
        let calling_convention = self.reader.u8()?;
        let generic_parameter_count = if calling_convention & CALLCONV_GENERIC != 0 {
            self.reader.compressed_u32()?
        } else {
            0
        };
        let count = self.reader.compressed_u32()?;
        self.skip_custom_modifiers()?;
        let return_type = self.type_sig(depth + 1)?;
        let mut parameters = Vec::new();
        for _ in 0..count {
            self.skip_custom_modifiers()?;
            parameters.push(self.type_sig(depth + 1)?);
        }
        Ok(MethodSig {
            has_this: calling_convention & CALLCONV_HASTHIS != 0,
            explicit_this: calling_convention & CALLCONV_EXPLICITTHIS != 0,
            generic_parameter_count,
            return_type,
            parameters,
        })
    }

    fn type_sig(&mut self, depth: u32) -> Result<TypeSig> {
        if depth > MAX_DEPTH {
            return Err(MetadataError::BadSignature("signature nesting too deep"));
        }
        self.skip_custom_modifiers()?;
        let element = self.reader.u8()?;
        if let Some(primitive) = Primitive::from_element_type(element) {
            return Ok(TypeSig::Primitive(primitive));
        }
        let sig = match element {
            ELEMENT_CLASS => TypeSig::Class(self.type_def_or_ref()?),
            ELEMENT_VALUETYPE => TypeSig::ValueType(self.type_def_or_ref()?),
            ELEMENT_VAR => TypeSig::Var(self.reader.compressed_u32()?),
            ELEMENT_MVAR => TypeSig::MVar(self.reader.compressed_u32()?),
            ELEMENT_PTR => TypeSig::Pointer(Box::new(self.type_sig(depth + 1)?)),
            ELEMENT_BYREF => TypeSig::ByRef(Box::new(self.type_sig(depth + 1)?)),
            ELEMENT_SZARRAY => TypeSig::SzArray(Box::new(self.type_sig(depth + 1)?)),
            ELEMENT_FNPTR => TypeSig::FnPtr(Box::new(self.method_sig(depth + 1)?)),
            ELEMENT_GENERICINST => {
                let is_value_type = match self.reader.u8()? {
                    ELEMENT_CLASS => false,
                    ELEMENT_VALUETYPE => true,
                    _ => return Err(MetadataError::BadSignature("invalid generic instance")),
                };
                let generic = self.type_def_or_ref()?;
                let count = self.reader.compressed_u32()?;
                let mut arguments = Vec::new();
                for _ in 0..count {
                    arguments.push(self.type_sig(depth + 1)?);
                }
                TypeSig::GenericInst {
                    is_value_type,
                    generic,
                    arguments,
                }
            }
            ELEMENT_ARRAY => {
                let element = Box::new(self.type_sig(depth + 1)?);
                let rank = self.reader.compressed_u32()?;
                let sizes = self.reader.compressed_u32()?;
                for _ in 0..sizes {
                    self.reader.compressed_u32()?;
                }
                let lower_bounds = self.reader.compressed_u32()?;
                for _ in 0..lower_bounds {
                    self.reader.compressed_u32()?;
                }
                TypeSig::Array { element, rank }
            }
            _ => return Err(MetadataError::BadSignature("unknown element type")),
        };
        Ok(sig)
    }
}

/// A decoded Constant table value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConstantValue {
    Boolean(bool),
    Char(u16),
    SByte(i8),
    Byte(u8),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Single(f32),
    Double(f64),
    String(String),
    /// The null reference, stored as `CLASS` with a zero value.
    NullReference,
    /// An element type constants cannot normally carry.
    Unsupported(u8),
}

impl ConstantValue {
    pub fn decode(element_type: u8, blob: &[u8]) -> Result<ConstantValue> {
        let mut reader = Reader::new(blob);
        let value = match element_type {
            ELEMENT_BOOLEAN => ConstantValue::Boolean(reader.u8()? != 0),
            ELEMENT_CHAR => ConstantValue::Char(reader.u16()?),
            ELEMENT_I1 => ConstantValue::SByte(reader.u8()? as i8),
            ELEMENT_U1 => ConstantValue::Byte(reader.u8()?),
            ELEMENT_I2 => ConstantValue::Int16(reader.u16()? as i16),
            ELEMENT_U2 => ConstantValue::UInt16(reader.u16()?),
            ELEMENT_I4 => ConstantValue::Int32(reader.u32()? as i32),
            ELEMENT_U4 => ConstantValue::UInt32(reader.u32()?),
            ELEMENT_I8 => ConstantValue::Int64(reader.u64()? as i64),
            ELEMENT_U8 => ConstantValue::UInt64(reader.u64()?),
            ELEMENT_R4 => ConstantValue::Single(f32::from_bits(reader.u32()?)),
            ELEMENT_R8 => ConstantValue::Double(f64::from_bits(reader.u64()?)),
            ELEMENT_STRING => {
                if blob.len() % 2 != 0 {
                    return Err(MetadataError::BadSignature("odd-length string constant"));
                }
                let units: Vec<u16> = blob
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let text = String::from_utf16(&units)
                    .map_err(|_| MetadataError::BadSignature("invalid UTF-16 string constant"))?;
                ConstantValue::String(text)
            }
            ELEMENT_CLASS => {
                if blob.iter().any(|b| *b != 0) {
                    return Err(MetadataError::BadSignature(
                        "class constant with a non-null value",
                    ));
                }
                ConstantValue::NullReference
            }
            other => ConstantValue::Unsupported(other),
        };
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_method_signature() {
        // instance void (int32, string)
        let sig = parse_member_signature(&[0x20, 0x02, 0x01, 0x08, 0x0e]).unwrap();
        assert_eq!(
            sig,
            MemberSig::Method(MethodSig {
                has_this: true,
                explicit_this: false,
                generic_parameter_count: 0,
                return_type: TypeSig::Primitive(Primitive::Void),
                parameters: vec![
                    TypeSig::Primitive(Primitive::Int32),
                    TypeSig::Primitive(Primitive::String),
                ],
            })
        );
    }

    #[test]
    fn test_generic_method_with_byref_and_mvar() {
        // static !!0 M<T>(ref !!0, class TypeRef#2[])
        let blob = [0x10, 0x01, 0x02, 0x1e, 0x00, 0x10, 0x1e, 0x00, 0x1d, 0x12, 0x09];
        let MemberSig::Method(sig) = parse_member_signature(&blob).unwrap() else {
            panic!("expected a method signature");
        };
        assert!(!sig.has_this);
        assert_eq!(sig.generic_parameter_count, 1);
        assert_eq!(sig.return_type, TypeSig::MVar(0));
        assert!(sig.parameters[0].is_by_ref());
        assert_eq!(sig.parameters[0].dereferenced(), &TypeSig::MVar(0));
        assert_eq!(
            sig.parameters[1],
            TypeSig::SzArray(Box::new(TypeSig::Class(TypeDefOrRef::TypeRef(2))))
        );
    }

    #[test]
    fn test_field_signature_with_modifier() {
        // field modreq(TypeRef#1) int32
        let sig = parse_member_signature(&[0x06, 0x1f, 0x05, 0x08]).unwrap();
        assert_eq!(sig, MemberSig::Field(TypeSig::Primitive(Primitive::Int32)));
    }

    #[test]
    fn test_generic_instance_type_spec() {
        // IEnumerable`1<!0> where IEnumerable`1 is TypeRef#3
        let sig = parse_type_spec(&[0x15, 0x12, 0x0d, 0x01, 0x13, 0x00]).unwrap();
        assert_eq!(
            sig,
            TypeSig::GenericInst {
                is_value_type: false,
                generic: TypeDefOrRef::TypeRef(3),
                arguments: vec![TypeSig::Var(0)],
            }
        );
    }

    #[test]
    fn test_multi_dimensional_array() {
        // int32[,] with no sizes or bounds
        let sig = parse_type_spec(&[0x14, 0x08, 0x02, 0x00, 0x00]).unwrap();
        assert_eq!(
            sig,
            TypeSig::Array {
                element: Box::new(TypeSig::Primitive(Primitive::Int32)),
                rank: 2
            }
        );
    }

    #[test]
    fn test_rejects_deep_nesting_and_garbage() {
        let mut blob = vec![0x0f; 100];
        blob.push(0x08);
        assert_eq!(
            parse_type_spec(&blob),
            Err(MetadataError::BadSignature("signature nesting too deep"))
        );
        assert!(parse_type_spec(&[0x99]).is_err());
        assert!(parse_member_signature(&[0x08, 0x00, 0x08]).is_err());
        assert!(parse_member_signature(&[0x20, 0x01, 0x01]).is_err());
    }

    #[test]
    fn test_constant_values() {
        assert_eq!(
            ConstantValue::decode(0x08, &(-5i32).to_le_bytes()).unwrap(),
            ConstantValue::Int32(-5)
        );
        assert_eq!(
            ConstantValue::decode(0x0e, &[b'h', 0, b'i', 0]).unwrap(),
            ConstantValue::String("hi".to_string())
        );
        assert_eq!(
            ConstantValue::decode(0x12, &[0, 0, 0, 0]).unwrap(),
            ConstantValue::NullReference
        );
        assert_eq!(
            ConstantValue::decode(0x0d, &1.5f64.to_le_bytes()).unwrap(),
            ConstantValue::Double(1.5)
        );
        assert_eq!(
            ConstantValue::decode(0x1c, &[]).unwrap(),
            ConstantValue::Unsupported(0x1c)
        );
        assert!(ConstantValue::decode(0x08, &[1, 2]).is_err());
    }
}
