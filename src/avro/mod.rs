/*!
Avro encoding.

Iceberg manifests and manifest lists are Avro
[Object Container Files](https://avro.apache.org/docs/1.11.1/specification/#object-container-files).
This package contains the integer codec ([codec]), the value tree
([AvroValue]) and the container-file writer ([writer::OcfWriter]). Values
are built by the manifest writers to mirror their declared schema, so
encoding never consults the schema and is total.
*/

pub mod codec;
pub mod writer;

/// An Avro value, self-describing enough to encode without a schema.
/// The writer that builds the value is responsible for matching the
/// declared writer schema (fields in order, unions by branch index).
#[derive(Debug, Clone, PartialEq)]
pub enum AvroValue {
    /// Null. Encodes to nothing.
    Null,
    /// A single 0/1 byte.
    Boolean(bool),
    /// Zigzag varint.
    Int(i32),
    /// Zigzag varint.
    Long(i64),
    /// 4 bytes little-endian IEEE-754.
    Float(f32),
    /// 8 bytes little-endian IEEE-754.
    Double(f64),
    /// Length-prefixed raw bytes.
    Bytes(Vec<u8>),
    /// Length-prefixed UTF-8.
    String(String),
    /// Raw bytes, no prefix. Length comes from the schema.
    Fixed(Vec<u8>),
    /// Record fields in declared order.
    Record(Vec<AvroValue>),
    /// Block-encoded array.
    Array(Vec<AvroValue>),
    /// Block-encoded map. Avro map keys must be strings; Iceberg's
    /// integer-keyed "maps" are arrays of key/value records instead.
    Map(Vec<(String, AvroValue)>),
    /// Union branch index plus the branch payload.
    Union(usize, Box<AvroValue>),
}

impl AvroValue {
    /// Shorthand for the `["null", T]` union with a null payload.
    pub fn null_union() -> AvroValue {
        AvroValue::Union(0, Box::new(AvroValue::Null))
    }

    /// Shorthand for the `["null", T]` union carrying a value.
    pub fn some(value: AvroValue) -> AvroValue {
        AvroValue::Union(1, Box::new(value))
    }

    /// Lift an option into the `["null", T]` union.
    pub fn option<T, F: FnOnce(T) -> AvroValue>(value: Option<T>, f: F) -> AvroValue {
        match value {
            Some(v) => AvroValue::some(f(v)),
            None => AvroValue::null_union(),
        }
    }

    /// Append this value's binary encoding to `buf`.
    pub fn encode(&self, buf: &mut Vec<u8>) {
        match self {
            AvroValue::Null => {}
            AvroValue::Boolean(b) => buf.push(*b as u8),
            AvroValue::Int(n) => codec::write_int(*n, buf),
            AvroValue::Long(n) => codec::write_long(*n, buf),
            AvroValue::Float(f) => buf.extend_from_slice(&f.to_le_bytes()),
            AvroValue::Double(f) => buf.extend_from_slice(&f.to_le_bytes()),
            AvroValue::Bytes(bytes) => {
                codec::write_long(bytes.len() as i64, buf);
                buf.extend_from_slice(bytes);
            }
            AvroValue::String(s) => {
                codec::write_long(s.len() as i64, buf);
                buf.extend_from_slice(s.as_bytes());
            }
            AvroValue::Fixed(bytes) => buf.extend_from_slice(bytes),
            AvroValue::Record(fields) => {
                for field in fields {
                    field.encode(buf);
                }
            }
            AvroValue::Array(items) => {
                if !items.is_empty() {
                    codec::write_long(items.len() as i64, buf);
                    for item in items {
                        item.encode(buf);
                    }
                }
                codec::write_long(0, buf);
            }
            AvroValue::Map(entries) => {
                if !entries.is_empty() {
                    codec::write_long(entries.len() as i64, buf);
                    for (key, value) in entries {
                        AvroValue::String(key.clone()).encode(buf);
                        value.encode(buf);
                    }
                }
                codec::write_long(0, buf);
            }
            AvroValue::Union(branch, value) => {
                codec::write_long(*branch as i64, buf);
                value.encode(buf);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_encodes_to_nothing() {
        let mut buf = Vec::new();
        AvroValue::Null.encode(&mut buf);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_string_is_length_prefixed() {
        let mut buf = Vec::new();
        AvroValue::String("abc".to_string()).encode(&mut buf);
        assert_eq!(vec![0x06, b'a', b'b', b'c'], buf);
    }

    #[test]
    fn test_empty_array_is_single_zero() {
        let mut buf = Vec::new();
        AvroValue::Array(vec![]).encode(&mut buf);
        assert_eq!(vec![0x00], buf);
    }

    #[test]
    fn test_array_has_terminator() {
        let mut buf = Vec::new();
        AvroValue::Array(vec![AvroValue::Long(1), AvroValue::Long(2)]).encode(&mut buf);
        // count 2, items 1 and 2, terminator 0
        assert_eq!(vec![0x04, 0x02, 0x04, 0x00], buf);
    }

    #[test]
    fn test_union_branches() {
        let mut buf = Vec::new();
        AvroValue::null_union().encode(&mut buf);
        assert_eq!(vec![0x00], buf);

        let mut buf = Vec::new();
        AvroValue::some(AvroValue::Long(3)).encode(&mut buf);
        assert_eq!(vec![0x02, 0x06], buf);
    }
}
