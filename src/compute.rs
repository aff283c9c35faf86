/*!
The compute collaborator.

The SQL engine that scans Parquet metadata and writes data files is
external to this crate. [Compute] is the contract it must satisfy; the
writer core never constructs SQL from untrusted input except the
regex-restricted file glob in [crate::stats].
*/

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// A result row: column name to JSON value. Keys are plain strings;
/// backends must normalize whatever native key type they use on the way
/// in.
pub type Row = HashMap<String, serde_json::Value>;

/// Options for [Compute::write_data_files].
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Columns to hive-partition the output by.
    pub partition_by: Vec<String>,
}

/// Connection to the SQL engine executing over Parquet files.
#[async_trait]
pub trait Compute: Send + Sync {
    /// Run a query and return its rows.
    async fn query(&self, sql: &str) -> Result<Vec<Row>>;

    /// Run a statement for its side effects; returns the affected row
    /// count when the backend reports one.
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Execute `source_sql` and write the result as Parquet files under
    /// `dest_url`, hive-partitioned per the options.
    async fn write_data_files(
        &self,
        source_sql: &str,
        dest_url: &str,
        options: &WriteOptions,
    ) -> Result<()>;
}
