/*!
Defines the [table metadata](https://iceberg.apache.org/spec/#table-metadata).
The main struct here is [TableMetadata], the immutable `v{N}.metadata.json`
document. All mutation happens through pure methods that return or update
the in-memory value; persistence lives in [crate::table::state].
*/
use std::cmp;
use std::collections::HashMap;
use std::time::SystemTime;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{
    partition::{PartitionSpec, PARTITION_FIELD_ID_START},
    schema::{build_name_mapping, Schema},
    snapshot::{MetadataLog, Snapshot, SnapshotLog},
    sort::SortOrder,
};
use crate::util;

/// The table property holding the default name mapping JSON.
pub const NAME_MAPPING_PROPERTY: &str = "schema.name-mapping.default";

/// Sentinel for a table with no current snapshot.
pub const NO_CURRENT_SNAPSHOT: i64 = -1;

#[derive(Debug, PartialEq, Eq, Clone)]
/// Marker for the only format version this crate writes. Serializes to
/// the integer `2` and refuses anything else on input.
pub struct FormatVersion;

impl Serialize for FormatVersion {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i32(2)
    }
}

impl<'de> Deserialize<'de> for FormatVersion {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let version = i32::deserialize(deserializer)?;
        if version == 2 {
            Ok(FormatVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported format version: {}",
                version
            )))
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// Fields for version 2 of the table metadata.
pub struct TableMetadata {
    /// Integer version for the format, always 2.
    pub format_version: FormatVersion,
    /// A UUID that identifies the table
    pub table_uuid: Uuid,
    /// Location tables base location
    pub location: String,
    /// The table's highest assigned sequence number; monotone
    /// non-decreasing.
    pub last_sequence_number: i64,
    /// Timestamp in milliseconds from the unix epoch when the table was last updated.
    pub last_updated_ms: i64,
    /// An integer; the highest assigned column ID for the table. Field
    /// ids are never reused, so this never decreases.
    pub last_column_id: i32,
    /// A list of schemas, stored as objects with schema-id. Never
    /// shrinks; historical schemas are retained for readers of old
    /// snapshots.
    pub schemas: Vec<Schema>,
    /// ID of the table's current schema.
    pub current_schema_id: i32,
    /// A list of partition specs, stored as full partition spec objects.
    pub partition_specs: Vec<PartitionSpec>,
    /// ID of the "current" spec that writers should use by default.
    pub default_spec_id: i32,
    /// An integer; the highest assigned partition field ID across all partition specs for the table.
    pub last_partition_id: i32,
    /// A string to string map of table properties. Includes the
    /// `schema.name-mapping.default` mapping on every table this crate
    /// creates.
    pub properties: HashMap<String, String>,
    /// ID of the current table snapshot, or `-1` when the table has
    /// none.
    pub current_snapshot_id: i64,
    /// A list of valid snapshots, appended to on every commit.
    pub snapshots: Vec<Snapshot>,
    /// A list of timestamp and snapshot ID pairs that encodes changes
    /// to the current snapshot for the table. Parallel to `snapshots`.
    pub snapshot_log: Vec<SnapshotLog>,
    /// A list of timestamp and metadata file location pairs recording
    /// the previous metadata documents.
    pub metadata_log: Vec<MetadataLog>,
    /// A list of sort orders, stored as full sort order objects.
    pub sort_orders: Vec<SortOrder>,
    /// Default sort order id of the table.
    pub default_sort_order_id: i32,
}

/// Milliseconds since the unix epoch.
pub(crate) fn current_time_ms() -> Result<i64> {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|duration| duration.as_millis() as i64)
        .map_err(|err| Error::InvalidValue(format!("system clock before epoch: {}", err)))
}

impl TableMetadata {
    /// Create the initial metadata for a new table. The schema is
    /// installed with id 0, `last-column-id` is the highest field id in
    /// the schema, and the default name mapping property is built from
    /// the schema. Caller-provided `properties` win over generated ones.
    pub fn new(
        location: impl Into<String>,
        schema: Schema,
        partition_spec: PartitionSpec,
        properties: HashMap<String, String>,
    ) -> Result<Self> {
        let mut schema = schema;
        schema.schema_id = 0;
        let last_column_id = schema.max_field_id();
        let last_partition_id = cmp::max(PARTITION_FIELD_ID_START - 1, partition_spec.max_field_id());

        let mut merged = HashMap::new();
        merged.insert(
            NAME_MAPPING_PROPERTY.to_string(),
            serde_json::to_string(&build_name_mapping(&[], &schema))?,
        );
        merged.extend(properties);

        Ok(TableMetadata {
            format_version: FormatVersion,
            table_uuid: Uuid::new_v4(),
            location: location.into(),
            last_sequence_number: 0,
            last_updated_ms: current_time_ms()?,
            last_column_id,
            schemas: vec![schema],
            current_schema_id: 0,
            partition_specs: vec![partition_spec],
            default_spec_id: 0,
            last_partition_id,
            properties: merged,
            current_snapshot_id: NO_CURRENT_SNAPSHOT,
            snapshots: vec![],
            snapshot_log: vec![],
            metadata_log: vec![],
            sort_orders: vec![SortOrder::unsorted()],
            default_sort_order_id: 0,
        })
    }

    /// Get the current schema of the table.
    pub fn current_schema(&self) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|schema| schema.schema_id == self.current_schema_id)
    }

    /// Get the default partition spec for the table.
    pub fn default_spec(&self) -> Option<&PartitionSpec> {
        self.partition_specs
            .iter()
            .find(|spec| spec.spec_id == self.default_spec_id)
    }

    /// Get the current snapshot, if the table has one.
    pub fn current_snapshot(&self) -> Option<&Snapshot> {
        if self.current_snapshot_id == NO_CURRENT_SNAPSHOT {
            return None;
        }
        self.snapshots
            .iter()
            .find(|snapshot| snapshot.snapshot_id == self.current_snapshot_id)
    }

    /// Splice a committed snapshot into the table: bumps the sequence
    /// number, repoints the current snapshot, appends to the snapshot
    /// list and log, and records the superseded metadata document in the
    /// metadata log. Pure; persisting the result is a separate save.
    pub fn add_snapshot(mut self, snapshot: Snapshot) -> Self {
        let prior_version = self.last_sequence_number;
        let prior_updated_ms = self.last_updated_ms;
        self.metadata_log.push(MetadataLog {
            metadata_file: util::metadata_file_path(&self.location, prior_version),
            timestamp_ms: prior_updated_ms,
        });

        self.last_sequence_number += 1;
        self.current_snapshot_id = snapshot.snapshot_id;
        self.last_updated_ms = snapshot.timestamp_ms;
        self.snapshot_log.push(SnapshotLog {
            snapshot_id: snapshot.snapshot_id,
            timestamp_ms: snapshot.timestamp_ms,
        });
        self.snapshots.push(snapshot);
        self
    }

    /// Append an evolved schema, repoint `current-schema-id`, raise the
    /// column high-water mark and rebuild the name mapping property.
    /// Historical schemas are preserved.
    pub fn apply_schema(&mut self, mut schema: Schema) -> Result<()> {
        let next_schema_id = self
            .schemas
            .iter()
            .map(|s| s.schema_id)
            .max()
            .unwrap_or(-1)
            + 1;
        schema.schema_id = next_schema_id;
        self.last_column_id = cmp::max(self.last_column_id, schema.max_field_id());
        self.current_schema_id = next_schema_id;
        let mapping = serde_json::to_string(&build_name_mapping(&self.schemas, &schema))?;
        self.properties
            .insert(NAME_MAPPING_PROPERTY.to_string(), mapping);
        self.schemas.push(schema);
        self.last_updated_ms = current_time_ms()?;
        Ok(())
    }

    /// Rebuild the `schema.name-mapping.default` property from the
    /// current schema. Returns false when the table has no resolvable
    /// current schema.
    pub fn rebuild_name_mapping(&mut self) -> Result<bool> {
        let current = match self.current_schema() {
            Some(schema) => schema.clone(),
            None => return Ok(false),
        };
        let historical: Vec<Schema> = self
            .schemas
            .iter()
            .filter(|schema| schema.schema_id != current.schema_id)
            .cloned()
            .collect();
        let mapping = serde_json::to_string(&build_name_mapping(&historical, &current))?;
        self.properties
            .insert(NAME_MAPPING_PROPERTY.to_string(), mapping);
        Ok(true)
    }
}
