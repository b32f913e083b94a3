//! Canonical text for constant values: field literals, enum values and
//! parameter defaults.

use apicheck_metadata::ConstantValue;

use crate::error::ReadError;

/// Format `value` as it appears in identity strings.
///
/// `type_name` and `is_value_type` describe the declared type; they only
/// matter for null constants, which render as `default(T)` for value types
/// and `null` otherwise. A missing constant is treated as null. `context`
/// names the element being read for error messages.
pub(crate) fn format_literal(
    value: Option<&ConstantValue>,
    type_name: &str,
    is_value_type: bool,
    context: &str,
) -> Result<String, ReadError> {
    let Some(value) = value else {
        return Ok(null_literal(type_name, is_value_type));
    };
    Ok(match value {
        ConstantValue::NullReference => null_literal(type_name, is_value_type),
        ConstantValue::String(text) => format!("\"{}\"", text),
        ConstantValue::Char(unit) => format!("'{}'", char_from_unit(*unit)),
        ConstantValue::Boolean(true) => "True".to_string(),
        ConstantValue::Boolean(false) => "False".to_string(),
        ConstantValue::SByte(v) => v.to_string(),
        ConstantValue::Byte(v) => v.to_string(),
        ConstantValue::Int16(v) => v.to_string(),
        ConstantValue::UInt16(v) => v.to_string(),
        ConstantValue::Int32(v) => v.to_string(),
        ConstantValue::UInt32(v) => v.to_string(),
        ConstantValue::Int64(v) => v.to_string(),
        ConstantValue::UInt64(v) => v.to_string(),
        ConstantValue::Single(v) => float_literal(
            f64::from(*v),
            v.to_string(),
            format!("{:e}", v),
            SINGLE_PRECISION,
        ),
        ConstantValue::Double(v) => {
            float_literal(*v, v.to_string(), format!("{:e}", v), DOUBLE_PRECISION)
        }
        ConstantValue::Unsupported(element_type) => {
            return Err(ReadError::UnsupportedLiteral {
                element_type: *element_type,
                context: context.to_string(),
            })
        }
    })
}

fn null_literal(type_name: &str, is_value_type: bool) -> String {
    if is_value_type {
        format!("default({})", type_name)
    } else {
        "null".to_string()
    }
}

fn char_from_unit(unit: u16) -> char {
    char::decode_utf16([unit])
        .next()
        .and_then(Result::ok)
        .unwrap_or(char::REPLACEMENT_CHARACTER)
}

/// Decimal exponents at or above which .NET switches to exponent notation.
const SINGLE_PRECISION: i32 = 7;
const DOUBLE_PRECISION: i32 = 15;
/// Exponents below this also use exponent notation (`1E-05`).
const MIN_PLAIN_EXPONENT: i32 = -4;

/// Render a float the way .NET's invariant `ToString()` does: shortest
/// round-trip digits, plain for moderate magnitudes, otherwise `1.5E+20`.
/// `plain` and `exponent_form` are the `Display` and `{:e}` renderings.
fn float_literal(value: f64, plain: String, exponent_form: String, precision: i32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    } else if value == f64::INFINITY {
        return "Infinity".to_string();
    } else if value == f64::NEG_INFINITY {
        return "-Infinity".to_string();
    }
    let Some((mantissa, exponent)) = exponent_form.split_once('e') else {
        return plain;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return plain;
    };
    if value == 0.0 || (MIN_PLAIN_EXPONENT..precision).contains(&exponent) {
        return plain;
    }
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{}E{}{:02}", mantissa, sign, exponent.abs())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(value: ConstantValue) -> String {
        format_literal(Some(&value), "System.Object", false, "test").unwrap()
    }

    #[test]
    fn test_numbers_and_booleans() {
        assert_eq!(format(ConstantValue::Int32(-42)), "-42");
        assert_eq!(format(ConstantValue::UInt64(u64::MAX)), "18446744073709551615");
        assert_eq!(format(ConstantValue::Byte(7)), "7");
        assert_eq!(format(ConstantValue::Boolean(true)), "True");
        assert_eq!(format(ConstantValue::Boolean(false)), "False");
    }

    #[test]
    fn test_floating_point() {
        assert_eq!(format(ConstantValue::Double(1.5)), "1.5");
        assert_eq!(format(ConstantValue::Double(10.0)), "10");
        assert_eq!(format(ConstantValue::Single(0.1)), "0.1");
        assert_eq!(format(ConstantValue::Double(f64::NAN)), "NaN");
        assert_eq!(format(ConstantValue::Single(f32::INFINITY)), "Infinity");
        assert_eq!(format(ConstantValue::Double(f64::NEG_INFINITY)), "-Infinity");
    }

    #[test]
    fn test_floating_point_exponent_form() {
        assert_eq!(format(ConstantValue::Double(1e20)), "1E+20");
        assert_eq!(format(ConstantValue::Double(-1.5e300)), "-1.5E+300");
        assert_eq!(format(ConstantValue::Double(1e-7)), "1E-07");
        assert_eq!(format(ConstantValue::Double(1e15)), "1E+15");
        assert_eq!(format(ConstantValue::Double(1e14)), "100000000000000");
        assert_eq!(format(ConstantValue::Double(0.0001)), "0.0001");
        assert_eq!(format(ConstantValue::Double(0.00001)), "1E-05");
        assert_eq!(format(ConstantValue::Double(f64::MAX)), "1.7976931348623157E+308");
        assert_eq!(format(ConstantValue::Single(1e7)), "1E+07");
        assert_eq!(format(ConstantValue::Single(1234567.0)), "1234567");
        assert_eq!(format(ConstantValue::Single(f32::MAX)), "3.4028235E+38");
        assert_eq!(format(ConstantValue::Double(0.0)), "0");
    }

    #[test]
    fn test_text() {
        assert_eq!(format(ConstantValue::String("hi".to_string())), "\"hi\"");
        assert_eq!(format(ConstantValue::Char(u16::from(b'x'))), "'x'");
    }

    #[test]
    fn test_null_defaults() {
        assert_eq!(format(ConstantValue::NullReference), "null");
        assert_eq!(
            format_literal(
                Some(&ConstantValue::NullReference),
                "System.Threading.CancellationToken",
                true,
                "token"
            )
            .unwrap(),
            "default(System.Threading.CancellationToken)"
        );
        assert_eq!(
            format_literal(None, "System.String", false, "name").unwrap(),
            "null"
        );
    }

    #[test]
    fn test_unsupported_literal() {
        let err = format_literal(
            Some(&ConstantValue::Unsupported(0x1c)),
            "System.Object",
            false,
            "Widget.Tag",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ReadError::UnsupportedLiteral {
                element_type: 0x1c,
                ..
            }
        ));
        assert!(err.to_string().contains("Widget.Tag"));
    }
}
