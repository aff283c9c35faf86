#![deny(missing_docs)]
/*!
# Floe

Floe is a writer for the [Apache Iceberg](https://iceberg.apache.org/)
v2 table format: given a table schema and freshly written Parquet data
files, it produces the metadata that makes them a readable, versioned
Iceberg table — `v{N}.metadata.json` documents, Avro manifest and
manifest-list files, snapshots, and the version hint — so that engines
like DuckDB, Spark, Trino and PyIceberg can read the table directly.

The [model] package holds the serde-typed Iceberg structures, [avro]
the container-file encoder, [evolution] the schema evolution rules, and
[table] the public operations: [table::Table::create],
[table::Table::insert_overwrite], [table::Table::register_files] and
the schema evolution wrappers.

Reading tables is out of scope, as are row-level deletes and partition
evolution.
*/
pub mod avro;
pub mod compute;
pub mod error;
pub mod evolution;
pub mod model;
pub mod stats;
pub mod storage;
pub mod table;
pub(crate) mod util;

pub use error::{Error, Result};
pub use object_store;
