/*!
Single-value binary serialization.

The min/max bounds embedded in manifests use Iceberg's single-value
binary format (Appendix D of the table spec): little-endian fixed-width
numerics, raw UTF-8 for strings, big-endian two's-complement for
decimals. [Value] carries a typed value, [Value::to_bytes] produces the
bound encoding and [Value::from_bytes] reads one back.
*/

use std::collections::{BTreeMap, HashMap};

use num_bigint::BigInt;
use serde_bytes::ByteBuf;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::schema::{PrimitiveType, Schema, SchemaType};

/// A single typed value as it appears in column bounds.
#[derive(Debug, PartialEq, Clone)]
pub enum Value {
    /// A boolean.
    Boolean(bool),
    /// A 32-bit integer.
    Int(i32),
    /// A 64-bit integer.
    Long(i64),
    /// A 32-bit float.
    Float(f32),
    /// A 64-bit float.
    Double(f64),
    /// Days since 1970-01-01.
    Date(i32),
    /// Microseconds since midnight.
    Time(i64),
    /// Microseconds since the epoch, with or without timezone.
    Timestamp(i64),
    /// A UTF-8 string.
    String(String),
    /// A UUID.
    Uuid(Uuid),
    /// A fixed-length byte array.
    Fixed(Vec<u8>),
    /// An arbitrary byte array.
    Binary(Vec<u8>),
    /// An unscaled decimal value; scale comes from the column type.
    Decimal(BigInt),
}

impl Value {
    /// Encode into the single-value binary form.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Value::Boolean(b) => vec![*b as u8],
            Value::Int(n) => n.to_le_bytes().to_vec(),
            Value::Long(n) => n.to_le_bytes().to_vec(),
            Value::Float(f) => f.to_le_bytes().to_vec(),
            Value::Double(f) => f.to_le_bytes().to_vec(),
            Value::Date(days) => days.to_le_bytes().to_vec(),
            Value::Time(micros) => micros.to_le_bytes().to_vec(),
            Value::Timestamp(micros) => micros.to_le_bytes().to_vec(),
            Value::String(s) => s.as_bytes().to_vec(),
            Value::Uuid(uuid) => uuid.as_bytes().to_vec(),
            Value::Fixed(bytes) => bytes.clone(),
            Value::Binary(bytes) => bytes.clone(),
            // Minimal-length two's-complement, big-endian.
            Value::Decimal(unscaled) => unscaled.to_signed_bytes_be(),
        }
    }

    /// Decode a single-value binary form for the given column type.
    pub fn from_bytes(field_type: &PrimitiveType, bytes: &[u8]) -> Result<Value> {
        let fixed_width = |expected: usize| -> Result<()> {
            if bytes.len() == expected {
                Ok(())
            } else {
                Err(Error::InvalidValue(format!(
                    "expected {} bytes for {}, got {}",
                    expected,
                    field_type,
                    bytes.len()
                )))
            }
        };
        match field_type {
            PrimitiveType::Boolean => {
                fixed_width(1)?;
                Ok(Value::Boolean(bytes[0] != 0))
            }
            PrimitiveType::Int => {
                fixed_width(4)?;
                Ok(Value::Int(i32::from_le_bytes(bytes.try_into().unwrap())))
            }
            PrimitiveType::Long => {
                fixed_width(8)?;
                Ok(Value::Long(i64::from_le_bytes(bytes.try_into().unwrap())))
            }
            PrimitiveType::Float => {
                fixed_width(4)?;
                Ok(Value::Float(f32::from_le_bytes(bytes.try_into().unwrap())))
            }
            PrimitiveType::Double => {
                fixed_width(8)?;
                Ok(Value::Double(f64::from_le_bytes(bytes.try_into().unwrap())))
            }
            PrimitiveType::Date => {
                fixed_width(4)?;
                Ok(Value::Date(i32::from_le_bytes(bytes.try_into().unwrap())))
            }
            PrimitiveType::Time => {
                fixed_width(8)?;
                Ok(Value::Time(i64::from_le_bytes(bytes.try_into().unwrap())))
            }
            PrimitiveType::Timestamp | PrimitiveType::Timestamptz => {
                fixed_width(8)?;
                Ok(Value::Timestamp(i64::from_le_bytes(
                    bytes.try_into().unwrap(),
                )))
            }
            PrimitiveType::String => String::from_utf8(bytes.to_vec())
                .map(Value::String)
                .map_err(|err| Error::InvalidValue(format!("invalid utf-8: {}", err))),
            PrimitiveType::Uuid => {
                fixed_width(16)?;
                Uuid::from_slice(bytes)
                    .map(Value::Uuid)
                    .map_err(|err| Error::InvalidValue(format!("invalid uuid: {}", err)))
            }
            PrimitiveType::Fixed(len) => {
                fixed_width(*len as usize)?;
                Ok(Value::Fixed(bytes.to_vec()))
            }
            PrimitiveType::Binary => Ok(Value::Binary(bytes.to_vec())),
            PrimitiveType::Decimal { .. } => {
                Ok(Value::Decimal(BigInt::from_signed_bytes_be(bytes)))
            }
        }
    }

    /// Whether this value can be encoded as a bound for the given
    /// column type.
    fn fits(&self, field_type: &PrimitiveType) -> bool {
        matches!(
            (self, field_type),
            (Value::Boolean(_), PrimitiveType::Boolean)
                | (Value::Int(_), PrimitiveType::Int)
                | (Value::Long(_), PrimitiveType::Long)
                | (Value::Float(_), PrimitiveType::Float)
                | (Value::Double(_), PrimitiveType::Double)
                | (Value::Date(_), PrimitiveType::Date)
                | (Value::Int(_), PrimitiveType::Date)
                | (Value::Time(_), PrimitiveType::Time)
                | (Value::Timestamp(_), PrimitiveType::Timestamp)
                | (Value::Timestamp(_), PrimitiveType::Timestamptz)
                | (Value::String(_), PrimitiveType::String)
                | (Value::Uuid(_), PrimitiveType::Uuid)
                | (Value::Fixed(_), PrimitiveType::Fixed(_))
                | (Value::Binary(_), PrimitiveType::Binary)
                | (Value::Decimal(_), PrimitiveType::Decimal { .. })
        )
    }
}

/// Encode a `{column-id → value}` mapping to the `{column-id → bytes}`
/// form stored in `lower_bounds`/`upper_bounds`. Entries whose column id
/// is not a primitive column of `schema`, or whose value does not fit
/// the column type, are dropped.
pub fn encode_bounds(
    bounds: &HashMap<i32, Value>,
    schema: &Schema,
) -> BTreeMap<i32, ByteBuf> {
    bounds
        .iter()
        .filter_map(|(column_id, value)| {
            let field = schema.field_by_id(*column_id)?;
            match &field.field_type {
                SchemaType::Primitive(primitive) if value.fits(primitive) => {
                    Some((*column_id, ByteBuf::from(value.to_bytes())))
                }
                _ => None,
            }
        })
        .collect()
}
