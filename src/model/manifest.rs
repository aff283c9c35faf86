/*!
Manifest files.

A manifest is an Avro container file with one `manifest_entry` record
per data file. The writer schema carries the Iceberg v2 field-id
annotations; engines resolve columns by those ids, so they are spelled
out literally here. Iceberg forbids non-string Avro map keys, so the
column-keyed stats maps are declared as `array<record{key,value}>` with
`logicalType: "map"`.
*/

use itertools::Itertools;
use serde_json::json;
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::avro::writer::OcfWriter;
use crate::avro::AvroValue;
use crate::error::Result;
use crate::model::partition::{resolve_partition_value, PartitionSpec, PartitionValue};
use crate::model::schema::Schema;
use crate::model::values::encode_bounds;
use crate::stats::DataFileStats;

#[derive(Debug, Serialize_repr, Deserialize_repr, PartialEq, Eq, Clone)]
#[repr(u8)]
/// Used to track additions and deletions
pub enum Status {
    /// Existing files
    Existing = 0,
    /// Added files
    Added = 1,
    /// Deleted files
    Deleted = 2,
}

#[derive(Debug, Serialize_repr, Deserialize_repr, PartialEq, Eq, Clone)]
#[repr(u8)]
/// Type of content stored by a data file. Only [Content::Data] is
/// written; the delete variants are reserved for delete manifests.
pub enum Content {
    /// Data.
    Data = 0,
    /// Deletes at position.
    PositionDeletes = 1,
    /// Delete by equality.
    EqualityDeletes = 2,
}

/// Totals accumulated while writing a manifest, reported to the
/// manifest-list writer and the snapshot summary.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ManifestTotals {
    /// Entries written with ADDED status.
    pub added_files: i64,
    /// Rows across the added files.
    pub added_rows: i64,
    /// Bytes across the added files.
    pub added_size: i64,
}

/// The Avro union for a column-keyed stats "map":
/// `array<record{key, value}>` tagged with `logicalType: "map"`.
fn map_field(
    name: &str,
    field_id: i32,
    key_id: i32,
    value_id: i32,
    value_type: &str,
) -> serde_json::Value {
    json!({
        "name": name,
        "type": ["null", {
            "type": "array",
            "items": {
                "type": "record",
                "name": format!("k{}_v{}", key_id, value_id),
                "fields": [
                    {"name": "key", "type": "int", "field-id": key_id},
                    {"name": "value", "type": value_type, "field-id": value_id}
                ]
            },
            "logicalType": "map"
        }],
        "default": null,
        "field-id": field_id
    })
}

/// The `r102` partition record derived from the partition spec. Field
/// types follow the transforms: time-derived and bucket values are
/// ints, identity and truncate values are strings.
fn partition_record_schema(spec: &PartitionSpec) -> serde_json::Value {
    let fields: Vec<serde_json::Value> = spec
        .fields
        .iter()
        .map(|field| {
            let avro_type = if field.transform.produces_int() {
                "int"
            } else {
                "string"
            };
            json!({
                "name": field.name,
                "type": ["null", avro_type],
                "default": null,
                "field-id": field.field_id
            })
        })
        .collect();
    json!({
        "type": "record",
        "name": "r102",
        "fields": fields
    })
}

/// The complete `manifest_entry` writer schema for the given partition
/// spec, with the Iceberg v2 field ids.
pub fn manifest_entry_schema(spec: &PartitionSpec) -> serde_json::Value {
    json!({
        "type": "record",
        "name": "manifest_entry",
        "fields": [
            {"name": "status", "type": "int", "field-id": 0},
            {"name": "snapshot_id", "type": ["null", "long"], "default": null, "field-id": 1},
            {"name": "sequence_number", "type": ["null", "long"], "default": null, "field-id": 3},
            {"name": "file_sequence_number", "type": ["null", "long"], "default": null, "field-id": 4},
            {"name": "data_file", "field-id": 2, "type": {
                "type": "record",
                "name": "r2",
                "fields": [
                    {"name": "content", "type": "int", "field-id": 134},
                    {"name": "file_path", "type": "string", "field-id": 100},
                    {"name": "file_format", "type": "string", "field-id": 101},
                    {"name": "partition", "type": partition_record_schema(spec), "field-id": 102},
                    {"name": "record_count", "type": "long", "field-id": 103},
                    {"name": "file_size_in_bytes", "type": "long", "field-id": 104},
                    map_field("column_sizes", 108, 117, 118, "long"),
                    map_field("value_counts", 109, 119, 120, "long"),
                    map_field("null_value_counts", 110, 121, 122, "long"),
                    map_field("nan_value_counts", 137, 138, 139, "long"),
                    map_field("lower_bounds", 125, 126, 127, "bytes"),
                    map_field("upper_bounds", 128, 129, 130, "bytes"),
                    {"name": "key_metadata", "type": ["null", "bytes"], "default": null, "field-id": 131},
                    {"name": "split_offsets", "type": ["null", {"type": "array", "items": "long", "element-id": 133}], "default": null, "field-id": 132},
                    {"name": "equality_ids", "type": ["null", {"type": "array", "items": "int", "element-id": 136}], "default": null, "field-id": 135},
                    {"name": "sort_order_id", "type": ["null", "int"], "default": null, "field-id": 140}
                ]
            }}
        ]
    })
}

/// Flatten an integer-keyed map to the `array<record{key,value}>` form,
/// entries sorted by key so output is deterministic.
fn map_value<T, F>(entries: Option<&std::collections::HashMap<i32, T>>, encode: F) -> AvroValue
where
    F: Fn(&T) -> AvroValue,
{
    match entries {
        Some(map) => AvroValue::some(AvroValue::Array(
            map.iter()
                .sorted_by_key(|(key, _)| **key)
                .map(|(key, value)| AvroValue::Record(vec![AvroValue::Int(*key), encode(value)]))
                .collect(),
        )),
        None => AvroValue::null_union(),
    }
}

/// Writes a manifest for one snapshot: one ADDED entry per data file.
///
/// Sequence numbers are left null so readers inherit them from the
/// manifest list, per the v2 inheritance rules.
pub struct ManifestWriter<'a> {
    writer: OcfWriter,
    snapshot_id: i64,
    spec: &'a PartitionSpec,
    schema: Option<&'a Schema>,
    totals: ManifestTotals,
}

impl<'a> ManifestWriter<'a> {
    /// Create a writer for the given snapshot, partition spec and
    /// schema. The schema, when provided, is embedded in the header and
    /// used to type the bound values.
    pub fn new(
        snapshot_id: i64,
        spec: &'a PartitionSpec,
        schema: Option<&'a Schema>,
        schema_id: i32,
    ) -> Result<Self> {
        let entry_schema = manifest_entry_schema(spec);
        let mut writer = OcfWriter::new(entry_schema.to_string())?;
        writer.add_metadata("format-version", b"2".to_vec())?;
        writer.add_metadata("partition-spec-id", spec.spec_id.to_string())?;
        writer.add_metadata(
            "partition-spec",
            serde_json::to_vec(&spec.fields)?,
        )?;
        writer.add_metadata("schema-id", schema_id.to_string())?;
        if let Some(schema) = schema {
            writer.add_metadata("schema", serde_json::to_vec(schema)?)?;
        }
        writer.add_metadata("content", b"data".to_vec())?;
        Ok(ManifestWriter {
            writer,
            snapshot_id,
            spec,
            schema,
            totals: ManifestTotals::default(),
        })
    }

    /// Append one ADDED entry for a data file.
    pub fn append(&mut self, stats: &DataFileStats) -> Result<()> {
        let partition = AvroValue::Record(
            self.spec
                .fields
                .iter()
                .map(|field| {
                    AvroValue::option(
                        resolve_partition_value(field, &stats.partition_values),
                        |value| match value {
                            PartitionValue::Int(n) => AvroValue::Int(n),
                            PartitionValue::Text(s) => AvroValue::String(s),
                        },
                    )
                })
                .collect(),
        );

        let bounds = |values: Option<&std::collections::HashMap<i32, crate::model::values::Value>>| {
            match (values, self.schema) {
                (Some(values), Some(schema)) => {
                    let encoded = encode_bounds(values, schema);
                    if encoded.is_empty() {
                        AvroValue::null_union()
                    } else {
                        AvroValue::some(AvroValue::Array(
                            encoded
                                .into_iter()
                                .map(|(key, value)| {
                                    AvroValue::Record(vec![
                                        AvroValue::Int(key),
                                        AvroValue::Bytes(value.into_vec()),
                                    ])
                                })
                                .collect(),
                        ))
                    }
                }
                _ => AvroValue::null_union(),
            }
        };

        let data_file = AvroValue::Record(vec![
            AvroValue::Int(Content::Data as i32),
            AvroValue::String(stats.file_path.clone()),
            AvroValue::String("PARQUET".to_string()),
            partition,
            AvroValue::Long(stats.record_count),
            AvroValue::Long(stats.file_size_in_bytes),
            map_value(stats.column_sizes.as_ref(), |n| AvroValue::Long(*n)),
            map_value(stats.value_counts.as_ref(), |n| AvroValue::Long(*n)),
            map_value(stats.null_value_counts.as_ref(), |n| AvroValue::Long(*n)),
            map_value(stats.nan_value_counts.as_ref(), |n| AvroValue::Long(*n)),
            bounds(stats.lower_bounds.as_ref()),
            bounds(stats.upper_bounds.as_ref()),
            AvroValue::null_union(),
            AvroValue::option(stats.split_offsets.clone(), |offsets| {
                AvroValue::Array(offsets.into_iter().map(AvroValue::Long).collect())
            }),
            AvroValue::null_union(),
            AvroValue::null_union(),
        ]);

        let entry = AvroValue::Record(vec![
            AvroValue::Int(Status::Added as i32),
            AvroValue::some(AvroValue::Long(self.snapshot_id)),
            AvroValue::null_union(),
            AvroValue::null_union(),
            data_file,
        ]);
        self.writer.append(&entry);
        self.totals.added_files += 1;
        self.totals.added_rows += stats.record_count;
        self.totals.added_size += stats.file_size_in_bytes;
        Ok(())
    }

    /// Finish the manifest, returning the file bytes and the totals.
    pub fn into_bytes(self) -> (Vec<u8>, ManifestTotals) {
        (self.writer.into_bytes(), self.totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::partition::Transform;
    use crate::model::schema::{Field, PrimitiveType, SchemaType};
    use crate::model::values::Value;
    use apache_avro::types::Value as ReaderValue;
    use std::collections::{BTreeMap, HashMap};

    fn table_schema() -> Schema {
        Schema::new(
            0,
            vec![
                Field {
                    id: 1,
                    name: "id".to_string(),
                    required: true,
                    field_type: SchemaType::Primitive(PrimitiveType::Long),
                    doc: None,
                },
                Field {
                    id: 2,
                    name: "name".to_string(),
                    required: false,
                    field_type: SchemaType::Primitive(PrimitiveType::String),
                    doc: None,
                },
            ],
        )
    }

    fn stats(path: &str, records: i64, size: i64) -> DataFileStats {
        DataFileStats {
            file_path: path.to_string(),
            file_size_in_bytes: size,
            record_count: records,
            partition_values: BTreeMap::new(),
            column_sizes: None,
            value_counts: None,
            null_value_counts: None,
            nan_value_counts: None,
            lower_bounds: None,
            upper_bounds: None,
            split_offsets: None,
        }
    }

    fn record_fields(value: ReaderValue) -> HashMap<String, ReaderValue> {
        match value {
            ReaderValue::Record(fields) => fields.into_iter().collect(),
            other => panic!("expected record, got {:?}", other),
        }
    }

    #[test]
    fn test_schema_declares_spec_map_encoding() {
        let schema = manifest_entry_schema(&PartitionSpec::unpartitioned());
        let data_file = &schema["fields"][4]["type"];
        let value_counts = data_file["fields"]
            .as_array()
            .unwrap()
            .iter()
            .find(|f| f["name"] == "value_counts")
            .unwrap();
        assert_eq!(value_counts["field-id"], 109);
        let array = &value_counts["type"][1];
        assert_eq!(array["type"], "array");
        assert_eq!(array["logicalType"], "map");
        let record = &array["items"];
        assert_eq!(record["fields"][0]["field-id"], 119);
        assert_eq!(record["fields"][1]["field-id"], 120);
    }

    #[test]
    fn test_schema_field_ids() {
        let schema = manifest_entry_schema(&PartitionSpec::unpartitioned());
        assert_eq!(schema["fields"][0]["field-id"], 0);
        assert_eq!(schema["fields"][1]["field-id"], 1);
        assert_eq!(schema["fields"][2]["field-id"], 3);
        assert_eq!(schema["fields"][3]["field-id"], 4);
        assert_eq!(schema["fields"][4]["field-id"], 2);
        let data_file_fields = schema["fields"][4]["type"]["fields"].as_array().unwrap();
        let id_of = |name: &str| {
            data_file_fields
                .iter()
                .find(|f| f["name"] == name)
                .unwrap()["field-id"]
                .as_i64()
                .unwrap()
        };
        assert_eq!(134, id_of("content"));
        assert_eq!(100, id_of("file_path"));
        assert_eq!(101, id_of("file_format"));
        assert_eq!(102, id_of("partition"));
        assert_eq!(103, id_of("record_count"));
        assert_eq!(104, id_of("file_size_in_bytes"));
        assert_eq!(108, id_of("column_sizes"));
        assert_eq!(110, id_of("null_value_counts"));
        assert_eq!(137, id_of("nan_value_counts"));
        assert_eq!(125, id_of("lower_bounds"));
        assert_eq!(128, id_of("upper_bounds"));
        assert_eq!(131, id_of("key_metadata"));
        assert_eq!(132, id_of("split_offsets"));
        assert_eq!(135, id_of("equality_ids"));
        assert_eq!(140, id_of("sort_order_id"));
    }

    #[test]
    fn test_entries_are_added_with_snapshot_id() {
        let spec = PartitionSpec::unpartitioned();
        let schema = table_schema();
        let mut writer = ManifestWriter::new(42, &spec, Some(&schema), 0).unwrap();
        writer.append(&stats("s3://b/t/data/a.parquet", 2, 100)).unwrap();
        writer.append(&stats("s3://b/t/data/b.parquet", 3, 150)).unwrap();
        let (bytes, totals) = writer.into_bytes();

        assert_eq!(2, totals.added_files);
        assert_eq!(5, totals.added_rows);
        assert_eq!(250, totals.added_size);

        let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
        assert_eq!(
            reader.user_metadata().get("format-version"),
            Some(&b"2".to_vec())
        );
        assert_eq!(
            reader.user_metadata().get("partition-spec-id"),
            Some(&b"0".to_vec())
        );
        let entries: Vec<_> = reader.map(|v| v.unwrap()).collect();
        assert_eq!(2, entries.len());
        let fields = record_fields(entries[0].clone());
        assert_eq!(ReaderValue::Int(1), fields["status"]);
        assert_eq!(
            ReaderValue::Union(1, Box::new(ReaderValue::Long(42))),
            fields["snapshot_id"]
        );
        assert_eq!(
            ReaderValue::Union(0, Box::new(ReaderValue::Null)),
            fields["sequence_number"]
        );
    }

    #[test]
    fn test_value_counts_map_roundtrip() {
        let spec = PartitionSpec::unpartitioned();
        let schema = table_schema();
        let mut writer = ManifestWriter::new(1, &spec, Some(&schema), 0).unwrap();
        let mut file = stats("s3://b/t/data/a.parquet", 30, 100);
        file.value_counts = Some([(1, 10i64), (2, 20i64)].into_iter().collect());
        writer.append(&file).unwrap();
        let (bytes, _) = writer.into_bytes();

        let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
        let entry = reader.map(|v| v.unwrap()).next().unwrap();
        let data_file = record_fields(record_fields(entry)["data_file"].clone());
        let value_counts = match &data_file["value_counts"] {
            ReaderValue::Union(1, inner) => match inner.as_ref() {
                ReaderValue::Array(items) => items.clone(),
                other => panic!("expected array, got {:?}", other),
            },
            other => panic!("expected union branch 1, got {:?}", other),
        };
        assert_eq!(2, value_counts.len());
        let first = record_fields(value_counts[0].clone());
        assert_eq!(ReaderValue::Int(1), first["key"]);
        assert_eq!(ReaderValue::Long(10), first["value"]);
    }

    #[test]
    fn test_day_partition_from_hive_parts() {
        let spec = PartitionSpec::new(
            0,
            vec![("timestamp_day".to_string(), Transform::Day, 1)],
        );
        let mut writer = ManifestWriter::new(1, &spec, None, 0).unwrap();
        let mut file = stats("s3://b/t/data/year=2024/month=1/day=15/a.parquet", 1, 10);
        file.partition_values = [
            ("year".to_string(), "2024".to_string()),
            ("month".to_string(), "1".to_string()),
            ("day".to_string(), "15".to_string()),
        ]
        .into_iter()
        .collect();
        writer.append(&file).unwrap();
        let (bytes, _) = writer.into_bytes();

        let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
        let entry = reader.map(|v| v.unwrap()).next().unwrap();
        let data_file = record_fields(record_fields(entry)["data_file"].clone());
        let partition = record_fields(data_file["partition"].clone());
        assert_eq!(
            ReaderValue::Union(1, Box::new(ReaderValue::Int(19737))),
            partition["timestamp_day"]
        );
    }

    #[test]
    fn test_bounds_encoded_through_schema() {
        let spec = PartitionSpec::unpartitioned();
        let schema = table_schema();
        let mut writer = ManifestWriter::new(1, &spec, Some(&schema), 0).unwrap();
        let mut file = stats("s3://b/t/data/a.parquet", 2, 64);
        file.lower_bounds = Some(
            [(1, Value::Long(5)), (2, Value::String("a".to_string()))]
                .into_iter()
                .collect(),
        );
        writer.append(&file).unwrap();
        let (bytes, _) = writer.into_bytes();

        let reader = apache_avro::Reader::new(&bytes[..]).unwrap();
        let entry = reader.map(|v| v.unwrap()).next().unwrap();
        let data_file = record_fields(record_fields(entry)["data_file"].clone());
        let lower = match &data_file["lower_bounds"] {
            ReaderValue::Union(1, inner) => match inner.as_ref() {
                ReaderValue::Array(items) => items.clone(),
                other => panic!("expected array, got {:?}", other),
            },
            other => panic!("expected union branch 1, got {:?}", other),
        };
        let first = record_fields(lower[0].clone());
        assert_eq!(ReaderValue::Int(1), first["key"]);
        assert_eq!(
            ReaderValue::Bytes(5i64.to_le_bytes().to_vec()),
            first["value"]
        );
    }
}
