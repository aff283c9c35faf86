/*!
 * Avro Object Container File framing.
*/

use crate::avro::{codec, AvroValue};
use crate::error::{Error, Result};

/// The four magic bytes opening every container file: `Obj` plus
/// format version 1.
pub const MAGIC: [u8; 4] = [0x4f, 0x62, 0x6a, 0x01];

/// Writes a complete Object Container File: magic, header metadata map,
/// sync marker, then one data block holding every appended object.
///
/// The writer schema is passed as JSON text and stored verbatim under
/// `avro.schema`; values appended through [OcfWriter::append] must be
/// built to match it.
pub struct OcfWriter {
    schema_json: String,
    metadata: Vec<(String, Vec<u8>)>,
    sync: [u8; 16],
    body: Vec<u8>,
    count: i64,
}

impl OcfWriter {
    /// Create a writer for the given writer-schema JSON.
    pub fn new(schema_json: impl Into<String>) -> Result<Self> {
        let mut sync = [0u8; 16];
        getrandom::getrandom(&mut sync)
            .map_err(|err| Error::InvalidValue(format!("rng failure: {}", err)))?;
        Ok(OcfWriter {
            schema_json: schema_json.into(),
            metadata: Vec::new(),
            sync,
            body: Vec::new(),
            count: 0,
        })
    }

    /// Attach a user metadata key. The Iceberg manifest writers use this
    /// for `schema`, `schema-id`, `partition-spec`, `partition-spec-id`
    /// and `format-version`. Reserved `avro.*` keys are written by the
    /// writer itself and rejected here.
    pub fn add_metadata(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Result<()> {
        let key = key.into();
        if key.starts_with("avro.") {
            return Err(Error::InvalidValue(format!(
                "reserved avro metadata key: {}",
                key
            )));
        }
        self.metadata.push((key, value.into()));
        Ok(())
    }

    /// Append one object to the file body.
    pub fn append(&mut self, value: &AvroValue) {
        value.encode(&mut self.body);
        self.count += 1;
    }

    /// Number of objects appended so far.
    pub fn count(&self) -> i64 {
        self.count
    }

    /// Finish the file and return its bytes. A file with zero appended
    /// objects is legal and contains no data block.
    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + self.schema_json.len() + 128);
        out.extend_from_slice(&MAGIC);

        // Header metadata: an Avro map<string, bytes>.
        let mut entries: Vec<(String, Vec<u8>)> = vec![
            ("avro.schema".to_string(), self.schema_json.into_bytes()),
            ("avro.codec".to_string(), b"null".to_vec()),
        ];
        entries.extend(self.metadata);
        codec::write_long(entries.len() as i64, &mut out);
        for (key, value) in &entries {
            AvroValue::String(key.clone()).encode(&mut out);
            AvroValue::Bytes(value.clone()).encode(&mut out);
        }
        codec::write_long(0, &mut out);
        out.extend_from_slice(&self.sync);

        if self.count > 0 {
            codec::write_long(self.count, &mut out);
            codec::write_long(self.body.len() as i64, &mut out);
            out.extend_from_slice(&self.body);
            out.extend_from_slice(&self.sync);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_schema() -> &'static str {
        r#"{
            "type": "record",
            "name": "point",
            "fields": [
                {"name": "x", "type": "long"},
                {"name": "label", "type": ["null", "string"], "default": null}
            ]
        }"#
    }

    fn point(x: i64, label: Option<&str>) -> AvroValue {
        AvroValue::Record(vec![
            AvroValue::Long(x),
            AvroValue::option(label, |s| AvroValue::String(s.to_string())),
        ])
    }

    #[test]
    fn test_magic_bytes() {
        let writer = OcfWriter::new(record_schema()).unwrap();
        let bytes = writer.into_bytes();
        assert_eq!(&bytes[..4], &MAGIC);
    }

    #[test]
    fn test_sync_markers_are_random_per_file() {
        let a = OcfWriter::new(record_schema()).unwrap().into_bytes();
        let b = OcfWriter::new(record_schema()).unwrap().into_bytes();
        // Identical header apart from the trailing 16-byte sync marker.
        assert_ne!(a[a.len() - 16..], b[b.len() - 16..]);
    }

    #[test]
    fn test_reserved_metadata_keys_rejected() {
        let mut writer = OcfWriter::new(record_schema()).unwrap();
        assert!(writer.add_metadata("avro.codec", b"deflate".to_vec()).is_err());
        assert!(writer.add_metadata("format-version", b"2".to_vec()).is_ok());
    }

    #[test]
    fn test_reference_reader_roundtrip() {
        let mut writer = OcfWriter::new(record_schema()).unwrap();
        writer.add_metadata("format-version", b"2".to_vec()).unwrap();
        writer.append(&point(7, Some("a")));
        writer.append(&point(-3, None));
        let bytes = writer.into_bytes();

        let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
        assert_eq!(
            reader.user_metadata().get("format-version"),
            Some(&b"2".to_vec())
        );
        let values: Vec<_> = reader.map(|v| v.unwrap()).collect();
        assert_eq!(2, values.len());
        match &values[0] {
            apache_avro::types::Value::Record(fields) => {
                assert_eq!(fields[0].1, apache_avro::types::Value::Long(7));
                assert_eq!(
                    fields[1].1,
                    apache_avro::types::Value::Union(
                        1,
                        Box::new(apache_avro::types::Value::String("a".to_string()))
                    )
                );
            }
            other => panic!("expected record, got {:?}", other),
        }
        match &values[1] {
            apache_avro::types::Value::Record(fields) => {
                assert_eq!(fields[0].1, apache_avro::types::Value::Long(-3));
                assert_eq!(
                    fields[1].1,
                    apache_avro::types::Value::Union(0, Box::new(apache_avro::types::Value::Null))
                );
            }
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_file_is_readable() {
        let writer = OcfWriter::new(record_schema()).unwrap();
        let bytes = writer.into_bytes();
        let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
        assert_eq!(0, reader.count());
    }
}
