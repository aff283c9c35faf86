/*!
Persistence of the table metadata document.

The table is addressed by `version-hint.text`: a tiny file holding the
decimal sequence number N of the newest `v{N}.metadata.json`. Saves
write the metadata document first and the hint second, so a failed hint
write leaves the table readable at its previous version.
*/

use std::collections::HashMap;

use tracing::debug;

use crate::error::{Error, Result};
use crate::evolution::{Evolved, EvolutionContext};
use crate::model::metadata::{current_time_ms, TableMetadata};
use crate::model::partition::PartitionSpec;
use crate::model::schema::Schema;
use crate::storage::Storage;
use crate::util;

/// Create and persist the initial metadata for a new table. Does not
/// check for an existing table; the facade guards that.
pub async fn create_initial(
    storage: &Storage,
    table_path: &str,
    schema: Schema,
    partition_spec: PartitionSpec,
    properties: HashMap<String, String>,
) -> Result<TableMetadata> {
    let metadata = TableMetadata::new(
        storage.absolute_url(table_path),
        schema,
        partition_spec,
        properties,
    )?;
    save(storage, table_path, &metadata).await?;
    Ok(metadata)
}

/// Upload `v{N}.metadata.json` (N = `last-sequence-number`) and then the
/// version hint. Both writes must succeed; if the hint write fails the
/// new metadata file is orphaned but the table still reads at N-1.
pub async fn save(storage: &Storage, table_path: &str, metadata: &TableMetadata) -> Result<()> {
    let version = metadata.last_sequence_number;
    let document = serde_json::to_vec_pretty(metadata)
        .map_err(|err| Error::MetadataSave(Box::new(err.into())))?;
    storage
        .upload(&util::metadata_file_path(table_path, version), document)
        .await
        .map_err(|err| Error::MetadataSave(Box::new(err)))?;
    storage
        .upload(
            &util::version_hint_path(table_path),
            version.to_string().into_bytes(),
        )
        .await
        .map_err(|err| Error::MetadataSave(Box::new(err)))?;
    debug!(table_path = table_path, version = version, "saved table metadata");
    Ok(())
}

/// Read the current metadata document. A missing hint falls back to
/// `v1.metadata.json`; when that is missing too the table does not
/// exist.
pub async fn load(storage: &Storage, table_path: &str) -> Result<TableMetadata> {
    let version = match storage.download(&util::version_hint_path(table_path)).await {
        Ok(bytes) => String::from_utf8_lossy(&bytes)
            .trim()
            .parse::<i64>()
            .map_err(|err| {
                Error::MetadataLoad(Box::new(Error::InvalidValue(format!(
                    "unreadable version hint: {}",
                    err
                ))))
            })?,
        Err(err) if err.is_not_found() => 1,
        Err(err) => return Err(Error::MetadataLoad(Box::new(err))),
    };

    let bytes = storage
        .download(&util::metadata_file_path(table_path, version))
        .await
        .map_err(|err| {
            if err.is_not_found() {
                Error::NotFound(table_path.to_string())
            } else {
                Error::MetadataLoad(Box::new(err))
            }
        })?;
    serde_json::from_slice(&bytes).map_err(|err| Error::MetadataLoad(Box::new(err.into())))
}

/// Whether a table exists at the path. This is the hint check only.
pub async fn exists(storage: &Storage, table_path: &str) -> Result<bool> {
    storage.exists(&util::version_hint_path(table_path)).await
}

/// Load the table, run a pure evolution function against its current
/// schema, and persist the result. The new schema gets the next schema
/// id; historical schemas are preserved. Returns the saved metadata
/// plus any permissive-mode warnings.
pub async fn evolve_schema<F>(
    storage: &Storage,
    table_path: &str,
    evolve: F,
) -> Result<(TableMetadata, Vec<String>)>
where
    F: FnOnce(&Schema, EvolutionContext) -> Result<Evolved>,
{
    let mut metadata = load(storage, table_path).await?;
    let current = metadata
        .current_schema()
        .ok_or_else(|| {
            Error::Validation(format!(
                "table has no schema with id {}",
                metadata.current_schema_id
            ))
        })?
        .clone();
    let context = EvolutionContext {
        next_field_id: metadata.last_column_id + 1,
        historical_schemas: metadata.schemas.clone(),
        table_empty: metadata.current_snapshot().is_none(),
    };
    let (schema, warnings) = evolve(&current, context)?;
    metadata.apply_schema(schema)?;
    save(storage, table_path, &metadata).await?;
    Ok((metadata, warnings))
}

/// Merge properties into the table and persist.
pub async fn update_properties(
    storage: &Storage,
    table_path: &str,
    properties: HashMap<String, String>,
) -> Result<TableMetadata> {
    let mut metadata = load(storage, table_path).await?;
    metadata.properties.extend(properties);
    metadata.last_updated_ms = current_time_ms()?;
    save(storage, table_path, &metadata).await?;
    Ok(metadata)
}
