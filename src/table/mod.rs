/*!
Defining the [Table] struct that represents an iceberg table.

[Table] is the public face of the writer: create a table, overwrite it
from a query, register externally produced files, and evolve its
schema. Every operation is a blocking sequence of IO steps against the
storage and compute collaborators; callers must serialize concurrent
writers to the same table externally.
*/

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

pub mod commit;
pub mod state;

use crate::compute::{Compute, WriteOptions};
use crate::error::{Error, Result};
use crate::evolution::{self, validate::Mode, NewField};
use crate::model::metadata::{current_time_ms, TableMetadata, NAME_MAPPING_PROPERTY};
use crate::model::partition::PartitionSpec;
use crate::model::schema::{PrimitiveType, Schema};
use crate::model::snapshot::{Operation, Snapshot};
use crate::storage::Storage;
use crate::util;

/// Handle to one Iceberg table, addressed by its store-relative path.
pub struct Table {
    path: String,
    storage: Storage,
    compute: Arc<dyn Compute>,
}

impl Table {
    /// A handle for the table at `path` under the given collaborators.
    pub fn new(path: impl Into<String>, storage: Storage, compute: Arc<dyn Compute>) -> Self {
        Table {
            path: path.into(),
            storage,
            compute,
        }
    }

    /// The store-relative table path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Create the table. Refuses to overwrite: an existing table at the
    /// path is an error.
    pub async fn create(
        &self,
        schema: Schema,
        partition_spec: PartitionSpec,
        properties: HashMap<String, String>,
    ) -> Result<TableMetadata> {
        if state::exists(&self.storage, &self.path).await? {
            return Err(Error::AlreadyExists(self.path.clone()));
        }
        let metadata =
            state::create_initial(&self.storage, &self.path, schema, partition_spec, properties)
                .await?;
        info!(table = self.path.as_str(), "created table");
        Ok(metadata)
    }

    /// Whether the table exists.
    pub async fn exists(&self) -> Result<bool> {
        state::exists(&self.storage, &self.path).await
    }

    /// Load the current table metadata.
    pub async fn load(&self) -> Result<TableMetadata> {
        state::load(&self.storage, &self.path).await
    }

    /// Replace the table's data with the result of `source_sql`: clear
    /// the data directory, have the compute backend write new Parquet
    /// files, and commit a snapshot over them.
    pub async fn insert_overwrite(&self, source_sql: &str) -> Result<(TableMetadata, Snapshot)> {
        let metadata = self.load().await?;
        self.clear_data_directory().await;

        let data_url = self.storage.absolute_url(&util::data_dir_path(&self.path));
        let partition_by = metadata
            .default_spec()
            .map(|spec| spec.fields.iter().map(|field| field.name.clone()).collect())
            .unwrap_or_default();
        self.compute
            .write_data_files(source_sql, &data_url, &WriteOptions { partition_by })
            .await
            .map_err(|err| Error::CopyFailed(err.to_string()))?;

        let data_glob = format!("{}**/*.parquet", data_url);
        self.commit_snapshot(metadata, &data_glob, Operation::Overwrite, None)
            .await
    }

    /// Commit a snapshot over files that were produced outside this
    /// writer. No data is written or cleared; an empty glob commits a
    /// legal zero-file snapshot.
    pub async fn register_files(
        &self,
        file_glob: &str,
        source_file: Option<String>,
    ) -> Result<(TableMetadata, Snapshot)> {
        let metadata = self.load().await?;
        self.commit_snapshot(metadata, file_glob, Operation::Append, source_file)
            .await
    }

    /// Install the `schema.name-mapping.default` property on tables
    /// created before it existed. Idempotent: a table that already has
    /// the property is returned unchanged.
    pub async fn ensure_name_mapping(&self) -> Result<TableMetadata> {
        let mut metadata = self.load().await?;
        if metadata.properties.contains_key(NAME_MAPPING_PROPERTY) {
            return Ok(metadata);
        }
        if !metadata.rebuild_name_mapping()? {
            return Ok(metadata);
        }
        metadata.last_updated_ms = current_time_ms()?;
        state::save(&self.storage, &self.path, &metadata).await?;
        Ok(metadata)
    }

    /// Merge properties into the table and persist.
    pub async fn update_properties(
        &self,
        properties: HashMap<String, String>,
    ) -> Result<TableMetadata> {
        state::update_properties(&self.storage, &self.path, properties).await
    }

    /// Add a column. The field id is assigned from the table's column
    /// high-water mark. `table_empty` overrides the derived emptiness
    /// check for callers that know better.
    pub async fn add_column(
        &self,
        field: NewField,
        mode: Mode,
        table_empty: Option<bool>,
    ) -> Result<(TableMetadata, Vec<String>)> {
        state::evolve_schema(&self.storage, &self.path, move |schema, mut ctx| {
            if let Some(table_empty) = table_empty {
                ctx.table_empty = table_empty;
            }
            evolution::add_column(schema, field, &ctx, mode)
        })
        .await
    }

    /// Drop a column by name. Its field id is never reused.
    pub async fn drop_column(
        &self,
        name: &str,
        mode: Mode,
    ) -> Result<(TableMetadata, Vec<String>)> {
        let name = name.to_string();
        state::evolve_schema(&self.storage, &self.path, move |schema, _ctx| {
            evolution::drop_column(schema, &name, mode)
        })
        .await
    }

    /// Rename a column, preserving its id and type.
    pub async fn rename_column(
        &self,
        old: &str,
        new: &str,
        mode: Mode,
    ) -> Result<(TableMetadata, Vec<String>)> {
        let (old, new) = (old.to_string(), new.to_string());
        state::evolve_schema(&self.storage, &self.path, move |schema, _ctx| {
            evolution::rename_column(schema, &old, &new, mode)
        })
        .await
    }

    /// Change a column's type, preserving its id and name.
    pub async fn update_column_type(
        &self,
        name: &str,
        new_type: PrimitiveType,
        mode: Mode,
    ) -> Result<(TableMetadata, Vec<String>)> {
        let name = name.to_string();
        state::evolve_schema(&self.storage, &self.path, move |schema, _ctx| {
            evolution::update_column_type(schema, &name, new_type, mode)
        })
        .await
    }

    /// Assemble a snapshot over `data_glob`, splice it into `metadata`
    /// and save. The sequence number the snapshot commits at is the
    /// table's next one; `add_snapshot` advances the metadata to match.
    async fn commit_snapshot(
        &self,
        metadata: TableMetadata,
        data_glob: &str,
        operation: Operation,
        source_file: Option<String>,
    ) -> Result<(TableMetadata, Snapshot)> {
        let default_spec = metadata
            .default_spec()
            .cloned()
            .unwrap_or_else(PartitionSpec::unpartitioned);
        let schema = metadata.current_schema().cloned();
        let snapshot = commit::create_snapshot(
            self.compute.as_ref(),
            &self.storage,
            &self.path,
            data_glob,
            commit::SnapshotOptions {
                partition_spec: &default_spec,
                sequence_number: metadata.last_sequence_number + 1,
                operation,
                source_file,
                snapshot_id: None,
                table_schema: schema.as_ref(),
                schema_id: metadata.current_schema_id,
            },
        )
        .await?;

        let metadata = metadata.add_snapshot(snapshot.clone());
        state::save(&self.storage, &self.path, &metadata).await?;
        info!(
            table = self.path.as_str(),
            snapshot_id = snapshot.snapshot_id,
            version = metadata.last_sequence_number,
            "committed snapshot"
        );
        Ok((metadata, snapshot))
    }

    /// Delete everything under the table's data directory. Failures are
    /// logged and swallowed: the files are about to be superseded and
    /// the new write is authoritative.
    async fn clear_data_directory(&self) {
        let prefix = util::data_dir_path(&self.path);
        let paths = match self.storage.list(&prefix).await {
            Ok(paths) => paths,
            Err(err) => {
                warn!(
                    table = self.path.as_str(),
                    error = %err,
                    "failed to list data directory before overwrite"
                );
                return;
            }
        };
        for path in paths {
            if let Err(err) = self.storage.delete(&path).await {
                warn!(
                    table = self.path.as_str(),
                    object = path.as_str(),
                    error = %err,
                    "failed to delete data file before overwrite"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::Row;
    use crate::model::schema::{Field, SchemaType};
    use async_trait::async_trait;
    use object_store::memory::InMemory;
    use serde_json::json;
    use std::sync::Mutex;

    const BASE: &str = "mem://warehouse";

    /// Compute stand-in: `write_data_files` drops one Parquet-named
    /// object per call with one record per SELECT in the source query;
    /// the stats query then reports exactly what was written.
    struct MockCompute {
        storage: Storage,
        written: Mutex<Vec<(String, i64, i64)>>,
    }

    impl MockCompute {
        fn new(storage: Storage) -> Self {
            MockCompute {
                storage,
                written: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl Compute for MockCompute {
        async fn query(&self, _sql: &str) -> Result<Vec<Row>> {
            Ok(self
                .written
                .lock()
                .unwrap()
                .iter()
                .map(|(path, size, records)| {
                    [
                        ("file_path".to_string(), json!(path)),
                        ("file_size_in_bytes".to_string(), json!(size)),
                        ("record_count".to_string(), json!(records)),
                    ]
                    .into_iter()
                    .collect()
                })
                .collect())
        }

        async fn execute(&self, _sql: &str) -> Result<u64> {
            Ok(0)
        }

        async fn write_data_files(
            &self,
            source_sql: &str,
            dest_url: &str,
            _options: &WriteOptions,
        ) -> Result<()> {
            let records = source_sql.matches("SELECT").count() as i64;
            let relative = dest_url
                .strip_prefix(&format!("{}/", BASE))
                .expect("destination under base url");
            let path = format!("{}part-0.parquet", relative);
            let bytes = vec![0u8; 128];
            self.storage.upload(&path, bytes).await?;
            // Overwrite semantics: the destination was cleared first.
            let mut written = self.written.lock().unwrap();
            written.clear();
            written.push((format!("{}/{}", BASE, path), 128, records));
            Ok(())
        }
    }

    fn two_column_schema() -> Schema {
        Schema::new(
            0,
            vec![
                Field {
                    id: 1,
                    name: "id".to_string(),
                    required: true,
                    field_type: SchemaType::Primitive(PrimitiveType::String),
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

    fn table_at(path: &str) -> (Table, Storage) {
        let storage = Storage::new(Arc::new(InMemory::new()), BASE);
        let compute = Arc::new(MockCompute::new(storage.clone()));
        (Table::new(path, storage.clone(), compute), storage)
    }

    #[tokio::test]
    async fn test_create_minimal_table() {
        let (table, storage) = table_at("wh/t");
        table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap();

        assert!(table.exists().await.unwrap());
        let hint = storage.download("wh/t/metadata/version-hint.text").await.unwrap();
        assert_eq!(b"0".to_vec(), hint);

        let document = storage
            .download("wh/t/metadata/v0.metadata.json")
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&document).unwrap();
        assert_eq!(json["format-version"], 2);
        assert_eq!(json["current-snapshot-id"], -1);
        assert_eq!(json["last-column-id"], 2);
        assert!(json["snapshots"].as_array().unwrap().is_empty());
        assert_eq!(
            json["properties"]["schema.name-mapping.default"],
            r#"[{"field-id":1,"names":["id"]},{"field-id":2,"names":["name"]}]"#
        );
    }

    #[tokio::test]
    async fn test_create_refuses_existing_table() {
        let (table, _storage) = table_at("wh/t");
        table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap();
        let err = table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_exists_is_false_for_unknown_table() {
        let (table, _storage) = table_at("wh/unknown");
        assert!(!table.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_insert_overwrite() {
        let (table, storage) = table_at("wh/t");
        table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap();

        let source_sql = "SELECT '1' AS id, 'a' AS name UNION ALL SELECT '2', 'b'";
        let (metadata, snapshot) = table.insert_overwrite(source_sql).await.unwrap();

        assert_eq!(1, metadata.last_sequence_number);
        assert_eq!(snapshot.snapshot_id, metadata.current_snapshot_id);
        assert_eq!(1, metadata.snapshots.len());
        assert_eq!("2", snapshot.summary.other["added-records"]);
        assert_eq!("1", snapshot.summary.other["added-data-files"]);

        // Data landed under data/.
        let data = storage.list("wh/t/data").await.unwrap();
        assert_eq!(1, data.len());
        assert!(data[0].ends_with(".parquet"));

        // v1 metadata plus hint advanced to 1.
        let hint = storage.download("wh/t/metadata/version-hint.text").await.unwrap();
        assert_eq!(b"1".to_vec(), hint);
        let document = storage
            .download("wh/t/metadata/v1.metadata.json")
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&document).unwrap();
        assert_eq!(json["last-sequence-number"], 1);

        // Manifest list and manifest both exist, and the manifest holds
        // one ADDED entry for the written file.
        let metadata_files = storage.list("wh/t/metadata").await.unwrap();
        let manifest_list = metadata_files
            .iter()
            .find(|path| path.contains("snap-"))
            .expect("manifest list");
        assert!(snapshot.manifest_list.ends_with(manifest_list.as_str()));
        let manifest = metadata_files
            .iter()
            .find(|path| path.ends_with(".avro") && !path.contains("snap-"))
            .expect("manifest");
        let manifest_bytes = storage.download(manifest).await.unwrap();
        let reader = apache_avro::Reader::new(&manifest_bytes[..]).unwrap();
        let entries: Vec<_> = reader.map(|v| v.unwrap()).collect();
        assert_eq!(1, entries.len());
        if let apache_avro::types::Value::Record(fields) = &entries[0] {
            let fields: HashMap<_, _> = fields.clone().into_iter().collect();
            assert_eq!(apache_avro::types::Value::Int(1), fields["status"]);
        } else {
            panic!("expected record");
        }
    }

    #[tokio::test]
    async fn test_insert_overwrite_clears_previous_data() {
        let (table, storage) = table_at("wh/t");
        table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap();
        storage
            .upload("wh/t/data/stale.parquet", vec![1, 2, 3])
            .await
            .unwrap();

        table.insert_overwrite("SELECT 1 AS id").await.unwrap();

        let data = storage.list("wh/t/data").await.unwrap();
        assert!(!data.iter().any(|path| path.ends_with("stale.parquet")));
        assert_eq!(1, data.len());
    }

    #[tokio::test]
    async fn test_add_column_after_insert() {
        let (table, _storage) = table_at("wh/t");
        table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap();
        table
            .insert_overwrite("SELECT '1' AS id, 'a' AS name UNION ALL SELECT '2', 'b'")
            .await
            .unwrap();

        let (metadata, warnings) = table
            .add_column(
                NewField {
                    name: "email".to_string(),
                    field_type: SchemaType::Primitive(PrimitiveType::String),
                    required: false,
                    doc: None,
                },
                Mode::Strict,
                Some(true),
            )
            .await
            .unwrap();

        assert!(warnings.is_empty());
        assert_eq!(2, metadata.schemas.len());
        assert_eq!(1, metadata.current_schema_id);
        assert_eq!(3, metadata.last_column_id);
        let email = metadata.current_schema().unwrap().field("email").unwrap();
        assert_eq!(3, email.id);
        assert!(metadata.properties[NAME_MAPPING_PROPERTY].contains("email"));
    }

    #[tokio::test]
    async fn test_drop_then_add_preserves_id_discipline() {
        let (table, _storage) = table_at("wh/t");
        let schema = Schema::new(
            0,
            vec![
                Field {
                    id: 1,
                    name: "a".to_string(),
                    required: false,
                    field_type: SchemaType::Primitive(PrimitiveType::String),
                    doc: None,
                },
                Field {
                    id: 2,
                    name: "b".to_string(),
                    required: false,
                    field_type: SchemaType::Primitive(PrimitiveType::String),
                    doc: None,
                },
                Field {
                    id: 3,
                    name: "c".to_string(),
                    required: false,
                    field_type: SchemaType::Primitive(PrimitiveType::String),
                    doc: None,
                },
            ],
        );
        table
            .create(schema, PartitionSpec::unpartitioned(), HashMap::new())
            .await
            .unwrap();

        table.drop_column("b", Mode::None).await.unwrap();
        let (metadata, _) = table
            .add_column(
                NewField {
                    name: "d".to_string(),
                    field_type: SchemaType::Primitive(PrimitiveType::String),
                    required: false,
                    doc: None,
                },
                Mode::Strict,
                None,
            )
            .await
            .unwrap();

        let current = metadata.current_schema().unwrap();
        let ids: Vec<i32> = current.fields().iter().map(|field| field.id).collect();
        assert_eq!(vec![1, 3, 4], ids);
        assert_eq!(4, metadata.last_column_id);
    }

    #[tokio::test]
    async fn test_rename_and_retype_wrappers() {
        let (table, _storage) = table_at("wh/t");
        let schema = Schema::new(
            0,
            vec![Field {
                id: 1,
                name: "count".to_string(),
                required: false,
                field_type: SchemaType::Primitive(PrimitiveType::Int),
                doc: None,
            }],
        );
        table
            .create(schema, PartitionSpec::unpartitioned(), HashMap::new())
            .await
            .unwrap();

        let (metadata, _) = table
            .update_column_type("count", PrimitiveType::Long, Mode::Strict)
            .await
            .unwrap();
        assert_eq!(
            SchemaType::Primitive(PrimitiveType::Long),
            metadata.current_schema().unwrap().field("count").unwrap().field_type
        );

        let (metadata, _) = table
            .rename_column("count", "total", Mode::Strict)
            .await
            .unwrap();
        let renamed = metadata.current_schema().unwrap().field("total").unwrap();
        assert_eq!(1, renamed.id);
        // The rename chain is recorded in the name mapping.
        assert!(metadata.properties[NAME_MAPPING_PROPERTY].contains("count"));
        assert!(metadata.properties[NAME_MAPPING_PROPERTY].contains("total"));
    }

    #[tokio::test]
    async fn test_register_files_with_empty_glob() {
        let (table, _storage) = table_at("wh/t");
        table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap();

        let (metadata, snapshot) = table
            .register_files(
                "mem://warehouse/wh/elsewhere/*.parquet",
                Some("mem://warehouse/wh/elsewhere".to_string()),
            )
            .await
            .unwrap();

        assert_eq!(1, metadata.last_sequence_number);
        assert_eq!("0", snapshot.summary.other["added-data-files"]);
        assert_eq!(Operation::Append, snapshot.summary.operation);
        assert_eq!(
            "mem://warehouse/wh/elsewhere",
            snapshot.summary.other["source-file"]
        );
    }

    #[tokio::test]
    async fn test_register_files_rejects_bad_glob() {
        let (table, _storage) = table_at("wh/t");
        table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap();
        let err = table
            .register_files("wh/t/data/*.parquet'; --", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidFilePattern(_)));
    }

    #[tokio::test]
    async fn test_sequence_numbers_match_snapshot_log_length() {
        let (table, _storage) = table_at("wh/t");
        table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap();

        for round in 1..=3i64 {
            let (metadata, _) = table.insert_overwrite("SELECT 1 AS id").await.unwrap();
            assert_eq!(round, metadata.last_sequence_number);
            assert_eq!(round as usize, metadata.snapshot_log.len());
            // Snapshot list and log stay parallel.
            for (snapshot, log) in metadata.snapshots.iter().zip(&metadata.snapshot_log) {
                assert_eq!(snapshot.snapshot_id, log.snapshot_id);
            }
        }
    }

    #[tokio::test]
    async fn test_ensure_name_mapping_is_idempotent() {
        let (table, storage) = table_at("wh/t");
        table
            .create(
                two_column_schema(),
                PartitionSpec::unpartitioned(),
                HashMap::new(),
            )
            .await
            .unwrap();

        // Already present: no change.
        let before = table.load().await.unwrap();
        let after = table.ensure_name_mapping().await.unwrap();
        assert_eq!(before.properties, after.properties);

        // Strip the property to simulate a table created before it
        // existed, then reinstall it.
        let mut stripped = before;
        stripped.properties.remove(NAME_MAPPING_PROPERTY);
        state::save(&storage, "wh/t", &stripped).await.unwrap();

        let restored = table.ensure_name_mapping().await.unwrap();
        assert_eq!(
            r#"[{"field-id":1,"names":["id"]},{"field-id":2,"names":["name"]}]"#,
            restored.properties[NAME_MAPPING_PROPERTY]
        );
    }
}
