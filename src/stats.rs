/*!
Per-file statistics for newly written Parquet files.

The extractor asks the compute backend for row-group level Parquet
metadata under a file glob and folds it into one [DataFileStats] record
per file. The glob is the only caller-supplied string that reaches the
SQL layer, so it is validated against a strict character allowlist
first.
*/

use std::collections::{BTreeMap, HashMap};

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use crate::compute::{Compute, Row};
use crate::error::{Error, Result};
use crate::model::values::Value;

lazy_static! {
    static ref FILE_PATTERN: Regex = Regex::new(r"^[A-Za-z0-9/*._:\-]+$").unwrap();
}

/// Everything the manifest writer needs to know about one data file.
/// The count and bound maps are a permitted extension; when a backend
/// does not collect them the manifest carries nulls.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataFileStats {
    /// Full URI of the file.
    pub file_path: String,
    /// Total file size in bytes.
    pub file_size_in_bytes: i64,
    /// Number of records in the file.
    pub record_count: i64,
    /// Hive-style partition values parsed from the path.
    pub partition_values: BTreeMap<String, String>,
    /// Column id to on-disk byte size.
    pub column_sizes: Option<HashMap<i32, i64>>,
    /// Column id to value count.
    pub value_counts: Option<HashMap<i32, i64>>,
    /// Column id to null count.
    pub null_value_counts: Option<HashMap<i32, i64>>,
    /// Column id to NaN count.
    pub nan_value_counts: Option<HashMap<i32, i64>>,
    /// Column id to typed minimum value.
    pub lower_bounds: Option<HashMap<i32, Value>>,
    /// Column id to typed maximum value.
    pub upper_bounds: Option<HashMap<i32, Value>>,
    /// Offsets at which the file can be split for parallel reads.
    pub split_offsets: Option<Vec<i64>>,
}

/// Reject any glob containing characters outside the allowlist. This is
/// the only defense against SQL injection into the compute layer.
pub fn validate_file_pattern(file_glob: &str) -> Result<()> {
    if FILE_PATTERN.is_match(file_glob) {
        Ok(())
    } else {
        Err(Error::InvalidFilePattern(file_glob.to_string()))
    }
}

/// Parse hive-style `key=value` path segments into partition values.
pub fn parse_hive_partition_values(file_path: &str) -> BTreeMap<String, String> {
    file_path
        .split('/')
        .filter_map(|segment| {
            segment
                .split_once('=')
                .filter(|(key, _)| !key.is_empty())
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect()
}

/// Parquet metadata reports one row per column chunk, so the inner
/// select first deduplicates to the row-group level; only then are
/// sizes and counts summed per file.
fn stats_sql(file_glob: &str) -> String {
    format!(
        "SELECT file_path, \
                SUM(row_group_bytes) AS file_size_in_bytes, \
                SUM(row_group_rows) AS record_count \
         FROM ( \
             SELECT DISTINCT file_name AS file_path, \
                    row_group_id, \
                    row_group_bytes, \
                    row_group_num_rows AS row_group_rows \
             FROM parquet_metadata('{}') \
         ) row_groups \
         GROUP BY file_path \
         ORDER BY file_path",
        file_glob
    )
}

fn as_i64(value: Option<&serde_json::Value>) -> Option<i64> {
    match value? {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn row_to_stats(row: &Row) -> Option<DataFileStats> {
    let file_path = row.get("file_path")?.as_str()?.to_string();
    let partition_values = parse_hive_partition_values(&file_path);
    Some(DataFileStats {
        file_size_in_bytes: as_i64(row.get("file_size_in_bytes"))?,
        record_count: as_i64(row.get("record_count"))?,
        partition_values,
        file_path,
        ..DataFileStats::default()
    })
}

/// Query the compute backend for every file matching `file_glob` and
/// normalize the result rows. An empty match yields an empty vector,
/// not an error.
pub async fn extract_stats(compute: &dyn Compute, file_glob: &str) -> Result<Vec<DataFileStats>> {
    validate_file_pattern(file_glob)?;
    let rows = compute.query(&stats_sql(file_glob)).await?;
    let stats: Vec<DataFileStats> = rows.iter().filter_map(row_to_stats).collect();
    debug!(
        file_glob = file_glob,
        files = stats.len(),
        "extracted parquet stats"
    );
    Ok(stats)
}
