/*!
Snapshot assembly.

One commit produces two immutable Avro artifacts: a manifest listing
the added data files and a manifest list pointing at that manifest.
Upload order matters — manifest before manifest list, manifest list
before the metadata document that will reference it — so a failure at
any stage leaves the table at its last durable state.
*/

use std::collections::HashMap;

use tracing::{debug, info};
use uuid::Uuid;

use crate::compute::Compute;
use crate::error::{Error, Result};
use crate::model::manifest::ManifestWriter;
use crate::model::manifest_list::{ManifestFile, ManifestListWriter};
use crate::model::metadata::current_time_ms;
use crate::model::partition::PartitionSpec;
use crate::model::schema::Schema;
use crate::model::snapshot::{Operation, Snapshot, Summary};
use crate::stats;
use crate::storage::Storage;
use crate::util;

/// Options for assembling one snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotOptions<'a> {
    /// The partition spec the data files were written under.
    pub partition_spec: &'a PartitionSpec,
    /// The sequence number this snapshot will commit at.
    pub sequence_number: i64,
    /// The operation recorded in the summary.
    pub operation: Operation,
    /// Recorded in the summary as `source-file` when present.
    pub source_file: Option<String>,
    /// Explicit snapshot id; defaults to the millisecond clock.
    pub snapshot_id: Option<i64>,
    /// The table schema, used to embed in the manifest and type bounds.
    pub table_schema: Option<&'a Schema>,
    /// The id of that schema.
    pub schema_id: i32,
}

/// Extract stats for `data_glob`, write and upload the manifest and
/// manifest list, and return the snapshot record ready to be spliced
/// into the table metadata. An empty glob still yields a legal snapshot
/// with zero added files.
pub async fn create_snapshot(
    compute: &dyn Compute,
    storage: &Storage,
    table_path: &str,
    data_glob: &str,
    options: SnapshotOptions<'_>,
) -> Result<Snapshot> {
    let files = stats::extract_stats(compute, data_glob).await?;
    let snapshot_id = match options.snapshot_id {
        Some(id) => id,
        None => current_time_ms()?,
    };

    let mut manifest_writer = ManifestWriter::new(
        snapshot_id,
        options.partition_spec,
        options.table_schema,
        options.schema_id,
    )?;
    for file in &files {
        manifest_writer.append(file)?;
    }
    let (manifest_bytes, totals) = manifest_writer.into_bytes();
    let manifest_length = manifest_bytes.len() as i64;

    let manifest_path = util::manifest_path(table_path, &Uuid::new_v4());
    storage
        .upload(&manifest_path, manifest_bytes)
        .await
        .map_err(|err| Error::ManifestUpload(Box::new(err)))?;
    debug!(
        manifest = manifest_path.as_str(),
        files = totals.added_files,
        "uploaded manifest"
    );

    let manifest_file = ManifestFile::new(
        storage.absolute_url(&manifest_path),
        manifest_length,
        options.partition_spec.spec_id,
        snapshot_id,
        &totals,
    );
    let mut list_writer = ManifestListWriter::new(options.sequence_number)?;
    list_writer.append(&manifest_file);

    let manifest_list_path = util::manifest_list_path(table_path, snapshot_id, &Uuid::new_v4());
    storage
        .upload(&manifest_list_path, list_writer.into_bytes())
        .await
        .map_err(|err| Error::ManifestListUpload(Box::new(err)))?;

    let mut summary_extras: HashMap<String, String> = [
        ("added-data-files", totals.added_files.to_string()),
        ("added-records", totals.added_rows.to_string()),
        ("added-files-size", totals.added_size.to_string()),
        ("total-data-files", totals.added_files.to_string()),
        ("total-records", totals.added_rows.to_string()),
        ("total-files-size", totals.added_size.to_string()),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect();
    if let Some(source_file) = options.source_file {
        summary_extras.insert("source-file".to_string(), source_file);
    }

    let snapshot = Snapshot {
        snapshot_id,
        sequence_number: options.sequence_number,
        timestamp_ms: current_time_ms()?,
        manifest_list: storage.absolute_url(&manifest_list_path),
        summary: Summary {
            operation: options.operation,
            other: summary_extras,
        },
        schema_id: Some(options.schema_id),
    };
    info!(
        snapshot_id = snapshot_id,
        files = totals.added_files,
        records = totals.added_rows,
        "assembled snapshot"
    );
    Ok(snapshot)
}
