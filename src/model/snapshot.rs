/*!
Details of [snapshots](https://iceberg.apache.org/spec/#snapshots) for a table.

A [Snapshot] points at the manifest list it was committed with plus the
summary data readers display. Snapshots are append-only inside the table
metadata; they are produced by the snapshot writer and spliced in by
[add_snapshot](crate::model::metadata::TableMetadata::add_snapshot).
*/
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "lowercase")]
/// The type of operation included in the snapshot; lets readers skip
/// irrelevant snapshots.
pub enum Operation {
    /// Only data files were added and no files were removed.
    Append,
    /// Data files were added and removed without changing table data.
    Replace,
    /// Data files were added and removed in a logical overwrite operation.
    Overwrite,
    /// Data files were removed and their contents logically deleted.
    Delete,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// Summarises the changes in the snapshot. All non-operation values are
/// strings, per the Iceberg summary convention.
pub struct Summary {
    /// The type of operation in the snapshot
    pub operation: Operation,
    /// Other summary data: `added-data-files`, `added-records`,
    /// `added-files-size`, totals, and `source-file` for registered
    /// files.
    #[serde(flatten)]
    pub other: HashMap<String, String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// A point-in-time view of the table.
pub struct Snapshot {
    /// A unique long ID
    pub snapshot_id: i64,
    /// A monotonically increasing long that tracks the order of
    /// changes to a table.
    pub sequence_number: i64,
    /// A timestamp when the snapshot was created, used for garbage
    /// collection and table inspection
    pub timestamp_ms: i64,
    /// The location of a manifest list for this snapshot that
    /// tracks manifest files with additional metadata.
    pub manifest_list: String,
    /// A string map that summarizes the snapshot changes, including operation.
    pub summary: Summary,
    /// ID of the table's current schema when the snapshot was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// A log of when each snapshot was made.
pub struct SnapshotLog {
    /// Id of the snapshot.
    pub snapshot_id: i64,
    /// Timestamp of the commit.
    pub timestamp_ms: i64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// Encodes changes to the previous metadata files for the table
pub struct MetadataLog {
    /// The previous metadata file.
    pub metadata_file: String,
    /// Time the new metadata was created.
    pub timestamp_ms: i64,
}
