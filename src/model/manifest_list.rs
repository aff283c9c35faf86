/*!
 * Manifest lists.
 *
 * A manifest list is an Avro container file with one `manifest_file`
 * record per manifest in the snapshot, carrying the summary counts that
 * let planners skip manifests.
*/

use serde::{Deserialize, Serialize};
use serde_bytes::ByteBuf;
use serde_json::json;

use crate::avro::writer::OcfWriter;
use crate::avro::AvroValue;
use crate::error::Result;
use crate::model::manifest::{Content, ManifestTotals};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// Summary of one partition field across a manifest's data files.
pub struct FieldSummary {
    /// Whether the manifest contains at least one partition with a null value for the field
    pub contains_null: bool,
    /// Whether the manifest contains at least one partition with a NaN value for the field
    pub contains_nan: Option<bool>,
    /// Lower bound for the non-null, non-NaN values in the partition field.
    pub lower_bound: Option<ByteBuf>,
    /// Upper bound for the non-null, non-NaN values in the partition field.
    pub upper_bound: Option<ByteBuf>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
/// One manifest tracked by a manifest list.
pub struct ManifestFile {
    /// Location of the manifest file
    pub manifest_path: String,
    /// Length of the manifest file in bytes
    pub manifest_length: i64,
    /// ID of the partition spec used to write the manifest
    pub partition_spec_id: i32,
    /// ID of the snapshot where the manifest file was added
    pub added_snapshot_id: i64,
    /// Number of entries in the manifest with ADDED status
    pub added_data_files_count: i32,
    /// Number of entries in the manifest with EXISTING status
    pub existing_data_files_count: i32,
    /// Number of entries in the manifest with DELETED status
    pub deleted_data_files_count: i32,
    /// Number of rows in files with ADDED status
    pub added_rows_count: i64,
    /// Number of rows in files with EXISTING status
    pub existing_rows_count: i64,
    /// Number of rows in files with DELETED status
    pub deleted_rows_count: i64,
    /// Per-partition-field summaries, when collected
    pub partitions: Option<Vec<FieldSummary>>,
}

impl ManifestFile {
    /// Describe a freshly uploaded data manifest from its path, byte
    /// length and write totals.
    pub fn new(
        manifest_path: impl Into<String>,
        manifest_length: i64,
        partition_spec_id: i32,
        added_snapshot_id: i64,
        totals: &ManifestTotals,
    ) -> Self {
        ManifestFile {
            manifest_path: manifest_path.into(),
            manifest_length,
            partition_spec_id,
            added_snapshot_id,
            added_data_files_count: totals.added_files as i32,
            existing_data_files_count: 0,
            deleted_data_files_count: 0,
            added_rows_count: totals.added_rows,
            existing_rows_count: 0,
            deleted_rows_count: 0,
            partitions: None,
        }
    }
}

/// The `manifest_file` writer schema with the Iceberg v2 field ids.
pub fn manifest_file_schema() -> serde_json::Value {
    json!({
        "type": "record",
        "name": "manifest_file",
        "fields": [
            {"name": "manifest_path", "type": "string", "field-id": 500},
            {"name": "manifest_length", "type": "long", "field-id": 501},
            {"name": "partition_spec_id", "type": "int", "field-id": 502},
            {"name": "content", "type": "int", "field-id": 517},
            {"name": "sequence_number", "type": "long", "field-id": 515},
            {"name": "min_sequence_number", "type": "long", "field-id": 516},
            {"name": "added_snapshot_id", "type": "long", "field-id": 503},
            {"name": "added_data_files_count", "type": "int", "field-id": 504},
            {"name": "existing_data_files_count", "type": "int", "field-id": 505},
            {"name": "deleted_data_files_count", "type": "int", "field-id": 506},
            {"name": "added_rows_count", "type": "long", "field-id": 512},
            {"name": "existing_rows_count", "type": "long", "field-id": 513},
            {"name": "deleted_rows_count", "type": "long", "field-id": 514},
            {"name": "partitions", "field-id": 507, "default": null, "type": ["null", {
                "type": "array",
                "element-id": 508,
                "items": {
                    "type": "record",
                    "name": "field_summary",
                    "fields": [
                        {"name": "contains_null", "type": "boolean", "field-id": 509},
                        {"name": "contains_nan", "type": ["null", "boolean"], "default": null, "field-id": 518},
                        {"name": "lower_bound", "type": ["null", "bytes"], "default": null, "field-id": 510},
                        {"name": "upper_bound", "type": ["null", "bytes"], "default": null, "field-id": 511}
                    ]
                }
            }]},
            {"name": "key_metadata", "type": ["null", "bytes"], "default": null, "field-id": 519}
        ]
    })
}

/// Writes the manifest list for one snapshot. Every entry carries the
/// snapshot's sequence number as both `sequence_number` and
/// `min_sequence_number`; only data manifests (`content = 0`) are in
/// scope.
pub struct ManifestListWriter {
    writer: OcfWriter,
    sequence_number: i64,
}

impl ManifestListWriter {
    /// Create a writer for a snapshot committing at `sequence_number`.
    pub fn new(sequence_number: i64) -> Result<Self> {
        let writer = OcfWriter::new(manifest_file_schema().to_string())?;
        Ok(ManifestListWriter {
            writer,
            sequence_number,
        })
    }

    /// Append one manifest entry.
    pub fn append(&mut self, manifest: &ManifestFile) {
        let partitions = match &manifest.partitions {
            Some(summaries) => AvroValue::some(AvroValue::Array(
                summaries
                    .iter()
                    .map(|summary| {
                        AvroValue::Record(vec![
                            AvroValue::Boolean(summary.contains_null),
                            AvroValue::option(summary.contains_nan, AvroValue::Boolean),
                            AvroValue::option(summary.lower_bound.clone(), |b| {
                                AvroValue::Bytes(b.into_vec())
                            }),
                            AvroValue::option(summary.upper_bound.clone(), |b| {
                                AvroValue::Bytes(b.into_vec())
                            }),
                        ])
                    })
                    .collect(),
            )),
            None => AvroValue::null_union(),
        };
        let record = AvroValue::Record(vec![
            AvroValue::String(manifest.manifest_path.clone()),
            AvroValue::Long(manifest.manifest_length),
            AvroValue::Int(manifest.partition_spec_id),
            AvroValue::Int(Content::Data as i32),
            AvroValue::Long(self.sequence_number),
            AvroValue::Long(self.sequence_number),
            AvroValue::Long(manifest.added_snapshot_id),
            AvroValue::Int(manifest.added_data_files_count),
            AvroValue::Int(manifest.existing_data_files_count),
            AvroValue::Int(manifest.deleted_data_files_count),
            AvroValue::Long(manifest.added_rows_count),
            AvroValue::Long(manifest.existing_rows_count),
            AvroValue::Long(manifest.deleted_rows_count),
            partitions,
            AvroValue::null_union(),
        ]);
        self.writer.append(&record);
    }

    /// Finish the manifest list and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.writer.into_bytes()
    }
}
