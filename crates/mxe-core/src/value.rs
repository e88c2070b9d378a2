//! Value codec: converts single cells between text and typed values
//!
//! Every field in a parameter table is declared with a [`FieldType`] by the
//! type catalog. [`decode`] turns the cell text into a validated [`Value`];
//! [`encode`] is the inverse and always emits the canonical text form
//! (lowercase `0x` hex, exactly 4 space-joined color components). Both are
//! pure functions; errors carry only the offending text and are wrapped with
//! parameter context by the calling marshaller.

use crate::error::ValueError;
use serde::{Deserialize, Serialize};

/// Semantic type of a single parameter field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Hex8,
    Hex16,
    Hex32,
    Hex64,
    Float16,
    Float32,
    Float64,
    Pad8,
    Pad16,
    Pad32,
    Pad64,
    /// Reference into the path-graph collection, or -1 for none
    Path,
    /// Reference into the asset collection, or -1 for none
    Asset,
    Pointer32,
    Utf8String,
    SjisString,
    Color32,
    Color128,
}

/// A decoded field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Hex(u64),
    Float(f64),
    Str(String),
    Color32([u8; 4]),
    Color128([f32; 4]),
}

impl Value {
    /// The reference held by a `path`/`asset` field, if this is one
    pub fn as_ref_id(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

// Smallest magnitude that rounds to infinity in IEEE binary16.
const F16_OVERFLOW: f64 = 65520.0;

/// Decode cell text into a value of the declared field type
pub fn decode(text: &str, ty: FieldType) -> Result<Value, ValueError> {
    use FieldType::*;
    match ty {
        Int8 => signed(text, i8::MIN as i128, i8::MAX as i128, "a signed 8-bit integer"),
        Int16 => signed(text, i16::MIN as i128, i16::MAX as i128, "a signed 16-bit integer"),
        Int32 => signed(text, i32::MIN as i128, i32::MAX as i128, "a signed 32-bit integer"),
        Int64 => signed(text, i64::MIN as i128, i64::MAX as i128, "a signed 64-bit integer"),
        Uint8 => unsigned(text, u8::MAX as u128, "an unsigned 8-bit integer"),
        Uint16 => unsigned(text, u16::MAX as u128, "an unsigned 16-bit integer"),
        Uint32 => unsigned(text, u32::MAX as u128, "an unsigned 32-bit integer"),
        Uint64 => unsigned(text, u64::MAX as u128, "an unsigned 64-bit integer"),
        Hex8 => hex(text, u8::MAX as u128, "an unsigned 8-bit integer"),
        Hex16 => hex(text, u16::MAX as u128, "an unsigned 16-bit integer"),
        Hex32 => hex(text, u32::MAX as u128, "an unsigned 32-bit integer"),
        Hex64 => hex(text, u64::MAX as u128, "an unsigned 64-bit integer"),
        Float16 => float16(text),
        Float32 => float32(text),
        Float64 => Ok(Value::Float(parse_float(text, "a 64-bit float")?)),
        Pad8 | Pad16 | Pad32 | Pad64 => pad(text),
        Path => signed(text, i32::MIN as i128, i32::MAX as i128, "a signed 32-bit integer"),
        Asset => signed(text, i64::MIN as i128, i64::MAX as i128, "a signed 64-bit integer"),
        Pointer32 => unsigned(text, u32::MAX as u128, "an unsigned 32-bit integer"),
        Utf8String | SjisString => Ok(Value::Str(text.to_string())),
        Color32 => color32(text),
        Color128 => color128(text),
    }
}

/// Render a value back to its canonical cell text
pub fn encode(value: &Value) -> String {
    match value {
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Hex(h) => format!("{:#x}", h),
        Value::Float(f) => f.to_string(),
        Value::Str(s) => s.clone(),
        Value::Color32(c) => c.map(|v| v.to_string()).join(" "),
        Value::Color128(c) => c.map(|v| v.to_string()).join(" "),
    }
}

fn parse_int(text: &str, expected: &'static str) -> Result<i128, ValueError> {
    text.trim().parse::<i128>().map_err(|_| ValueError::Malformed {
        text: text.to_string(),
        expected,
    })
}

fn parse_float(text: &str, expected: &'static str) -> Result<f64, ValueError> {
    text.trim().parse::<f64>().map_err(|_| ValueError::Malformed {
        text: text.to_string(),
        expected,
    })
}

fn signed(text: &str, min: i128, max: i128, expected: &'static str) -> Result<Value, ValueError> {
    let v = parse_int(text, "an integer")?;
    if v < min || v > max {
        return Err(ValueError::OutOfRange {
            text: text.to_string(),
            expected,
        });
    }
    Ok(Value::Int(v as i64))
}

fn unsigned(text: &str, max: u128, expected: &'static str) -> Result<Value, ValueError> {
    let v = parse_int(text, "an integer")?;
    if v < 0 || v as u128 > max {
        return Err(ValueError::OutOfRange {
            text: text.to_string(),
            expected,
        });
    }
    Ok(Value::UInt(v as u64))
}

fn hex(text: &str, max: u128, expected: &'static str) -> Result<Value, ValueError> {
    let trimmed = text.trim();
    let Some(digits) = trimmed.strip_prefix("0x") else {
        return Err(ValueError::BadHexPrefix {
            text: text.to_string(),
        });
    };
    let v = u128::from_str_radix(digits, 16).map_err(|_| ValueError::Malformed {
        text: text.to_string(),
        expected: "a hexadecimal string",
    })?;
    if v > max {
        return Err(ValueError::OutOfRange {
            text: text.to_string(),
            expected,
        });
    }
    Ok(Value::Hex(v as u64))
}

fn float16(text: &str) -> Result<Value, ValueError> {
    let v = parse_float(text, "a 16-bit float")?;
    if v.is_finite() && v.abs() >= F16_OVERFLOW {
        return Err(ValueError::OutOfRange {
            text: text.to_string(),
            expected: "a 16-bit float",
        });
    }
    Ok(Value::Float(v))
}

fn float32(text: &str) -> Result<Value, ValueError> {
    let v = parse_float(text, "a 32-bit float")?;
    if v.is_finite() && (v as f32).is_infinite() {
        return Err(ValueError::OutOfRange {
            text: text.to_string(),
            expected: "a 32-bit float",
        });
    }
    Ok(Value::Float(v))
}

fn pad(text: &str) -> Result<Value, ValueError> {
    let v = parse_int(text, "an integer")?;
    if v != 0 {
        return Err(ValueError::PadNonZero {
            text: text.to_string(),
        });
    }
    Ok(Value::UInt(0))
}

fn bad_list(bad: &[(usize, &str)]) -> String {
    bad.iter()
        .map(|(i, tok)| format!("{} ('{}')", i, tok))
        .collect::<Vec<_>>()
        .join(", ")
}

fn color32(text: &str) -> Result<Value, ValueError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() > 4 {
        return Err(ValueError::TooManyComponents {
            kind: "color32",
            text: text.to_string(),
            count: tokens.len(),
            max: 4,
        });
    }

    let mut out = [0u8; 4];
    let mut malformed = Vec::new();
    let mut overflowed = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        match tok.parse::<i128>() {
            Err(_) => malformed.push((i, *tok)),
            Ok(v) if !(0..=u8::MAX as i128).contains(&v) => overflowed.push((i, *tok)),
            Ok(v) => out[i] = v as u8,
        }
    }
    if !malformed.is_empty() {
        return Err(ValueError::ComponentsMalformed {
            kind: "color32",
            text: text.to_string(),
            expected: "integers",
            bad: bad_list(&malformed),
        });
    }
    if !overflowed.is_empty() {
        return Err(ValueError::ComponentsOutOfRange {
            kind: "color32",
            text: text.to_string(),
            expected: "unsigned 8-bit integers",
            bad: bad_list(&overflowed),
        });
    }
    Ok(Value::Color32(out))
}

fn color128(text: &str) -> Result<Value, ValueError> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() > 4 {
        return Err(ValueError::TooManyComponents {
            kind: "color128",
            text: text.to_string(),
            count: tokens.len(),
            max: 4,
        });
    }

    let mut out = [0f32; 4];
    let mut malformed = Vec::new();
    let mut overflowed = Vec::new();
    for (i, tok) in tokens.iter().enumerate() {
        match tok.parse::<f64>() {
            Err(_) => malformed.push((i, *tok)),
            Ok(v) if v.is_finite() && (v as f32).is_infinite() => overflowed.push((i, *tok)),
            Ok(v) => out[i] = v as f32,
        }
    }
    if !malformed.is_empty() {
        return Err(ValueError::ComponentsMalformed {
            kind: "color128",
            text: text.to_string(),
            expected: "floats",
            bad: bad_list(&malformed),
        });
    }
    if !overflowed.is_empty() {
        return Err(ValueError::ComponentsOutOfRange {
            kind: "color128",
            text: text.to_string(),
            expected: "32-bit floats",
            bad: bad_list(&overflowed),
        });
    }
    Ok(Value::Color128(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_int_widths() {
        assert_eq!(decode("42", FieldType::Int8).unwrap(), Value::Int(42));
        assert_eq!(decode("-128", FieldType::Int8).unwrap(), Value::Int(-128));
        assert!(matches!(
            decode("128", FieldType::Int8),
            Err(ValueError::OutOfRange { .. })
        ));
        assert!(matches!(
            decode("abc", FieldType::Int8),
            Err(ValueError::Malformed { .. })
        ));
    }

    #[test]
    fn test_decode_uint_widths() {
        assert_eq!(decode("255", FieldType::Uint8).unwrap(), Value::UInt(255));
        assert!(matches!(
            decode("256", FieldType::Uint8),
            Err(ValueError::OutOfRange { .. })
        ));
        assert!(matches!(
            decode("-1", FieldType::Uint8),
            Err(ValueError::OutOfRange { .. })
        ));
        assert_eq!(
            decode("18446744073709551615", FieldType::Uint64).unwrap(),
            Value::UInt(u64::MAX)
        );
    }

    #[test]
    fn test_decode_hex() {
        assert_eq!(decode("0xFF", FieldType::Hex8).unwrap(), Value::Hex(255));
        assert_eq!(decode("0xff", FieldType::Hex8).unwrap(), Value::Hex(255));
        assert!(matches!(
            decode("FF", FieldType::Hex8),
            Err(ValueError::BadHexPrefix { .. })
        ));
        assert!(matches!(
            decode("0x1FF", FieldType::Hex8),
            Err(ValueError::OutOfRange { .. })
        ));
        assert!(matches!(
            decode("0xZZ", FieldType::Hex8),
            Err(ValueError::Malformed { .. })
        ));
    }

    #[test]
    fn test_hex_round_trip_is_lowercase() {
        let v = decode("0xABCD", FieldType::Hex16).unwrap();
        assert_eq!(encode(&v), "0xabcd");
        assert_eq!(decode("0xabcd", FieldType::Hex16).unwrap(), v);
    }

    #[test]
    fn test_decode_pad_must_be_zero() {
        assert_eq!(decode("0", FieldType::Pad16).unwrap(), Value::UInt(0));
        assert!(matches!(
            decode("1", FieldType::Pad16),
            Err(ValueError::PadNonZero { .. })
        ));
        assert!(matches!(
            decode("1", FieldType::Pad64),
            Err(ValueError::PadNonZero { .. })
        ));
    }

    #[test]
    fn test_decode_float16_overflow() {
        assert_eq!(
            decode("1.5", FieldType::Float16).unwrap(),
            Value::Float(1.5)
        );
        assert_eq!(
            decode("65504", FieldType::Float16).unwrap(),
            Value::Float(65504.0)
        );
        assert!(matches!(
            decode("70000", FieldType::Float16),
            Err(ValueError::OutOfRange { .. })
        ));
        // Infinity is representable in every float width
        assert_eq!(
            decode("inf", FieldType::Float16).unwrap(),
            Value::Float(f64::INFINITY)
        );
    }

    #[test]
    fn test_decode_float32_overflow() {
        assert_eq!(
            decode("3.5", FieldType::Float32).unwrap(),
            Value::Float(3.5)
        );
        assert!(matches!(
            decode("1e39", FieldType::Float32),
            Err(ValueError::OutOfRange { .. })
        ));
        assert_eq!(
            decode("1e39", FieldType::Float64).unwrap(),
            Value::Float(1e39)
        );
    }

    #[test]
    fn test_decode_path_and_asset_sentinels() {
        assert_eq!(decode("-1", FieldType::Path).unwrap(), Value::Int(-1));
        assert_eq!(decode("-1", FieldType::Asset).unwrap(), Value::Int(-1));
        assert_eq!(decode("7", FieldType::Path).unwrap().as_ref_id(), Some(7));
        assert!(matches!(
            decode("2147483648", FieldType::Path),
            Err(ValueError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_decode_color32_pads_missing_components() {
        assert_eq!(
            decode("1 2 3", FieldType::Color32).unwrap(),
            Value::Color32([1, 2, 3, 0])
        );
        assert_eq!(
            decode("", FieldType::Color32).unwrap(),
            Value::Color32([0, 0, 0, 0])
        );
    }

    #[test]
    fn test_decode_color32_too_many_components() {
        assert!(matches!(
            decode("1 2 3 4 5", FieldType::Color32),
            Err(ValueError::TooManyComponents { count: 5, .. })
        ));
    }

    #[test]
    fn test_decode_color32_collects_every_bad_component() {
        let err = decode("1 x 3 y", FieldType::Color32).unwrap_err();
        match err {
            ValueError::ComponentsMalformed { bad, .. } => {
                assert!(bad.contains("1 ('x')"));
                assert!(bad.contains("3 ('y')"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let err = decode("1 300 3 900", FieldType::Color32).unwrap_err();
        match err {
            ValueError::ComponentsOutOfRange { bad, .. } => {
                assert!(bad.contains("1 ('300')"));
                assert!(bad.contains("3 ('900')"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_color128() {
        assert_eq!(
            decode("0.5 1.25", FieldType::Color128).unwrap(),
            Value::Color128([0.5, 1.25, 0.0, 0.0])
        );
        assert!(matches!(
            decode("1e39 0 0 0", FieldType::Color128),
            Err(ValueError::ComponentsOutOfRange { .. })
        ));
    }

    #[test]
    fn test_encode_colors_emit_four_components() {
        assert_eq!(encode(&Value::Color32([1, 2, 3, 0])), "1 2 3 0");
        assert_eq!(encode(&Value::Color128([0.5, 0.0, 0.0, 0.0])), "0.5 0 0 0");
    }

    #[test]
    fn test_strings_pass_through() {
        assert_eq!(
            decode("hello, world", FieldType::Utf8String).unwrap(),
            Value::Str("hello, world".to_string())
        );
        assert_eq!(
            decode("  spaced  ", FieldType::SjisString).unwrap(),
            Value::Str("  spaced  ".to_string())
        );
    }

    #[test]
    fn test_round_trip_scalars() {
        for (text, ty) in [
            ("42", FieldType::Uint8),
            ("-7", FieldType::Int32),
            ("3.25", FieldType::Float32),
            ("0", FieldType::Pad32),
            ("-1", FieldType::Path),
        ] {
            let v = decode(text, ty).unwrap();
            assert_eq!(encode(&v), text);
        }
    }

    #[test]
    fn test_field_type_tags() {
        let ty: FieldType = serde_json::from_str("\"uint8\"").unwrap();
        assert_eq!(ty, FieldType::Uint8);
        let ty: FieldType = serde_json::from_str("\"utf8_string\"").unwrap();
        assert_eq!(ty, FieldType::Utf8String);
        assert!(serde_json::from_str::<FieldType>("\"uint128\"").is_err());
    }
}
