/*!
 * Path helpers shared by the metadata state machine and the snapshot writer.
*/

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref S3A: Regex = Regex::new("s3a://[^/]*/").unwrap();
    static ref S3: Regex = Regex::new("s3://[^/]*/").unwrap();
    static ref GS: Regex = Regex::new("gs://[^/]*/").unwrap();
}

/// Strip the scheme and bucket from an absolute object URL, leaving the
/// key relative to the store root.
pub fn strip_prefix(path: &str) -> String {
    if path.starts_with("s3a://") {
        S3A.replace(path, "").to_string()
    } else if path.starts_with("s3://") {
        S3.replace(path, "").to_string()
    } else if path.starts_with("gs://") {
        GS.replace(path, "").to_string()
    } else {
        path.to_owned()
    }
}

/// Path of the metadata document for version `n`, relative to the table root.
pub fn metadata_file_path(table_path: &str, n: i64) -> String {
    format!("{}/metadata/v{}.metadata.json", table_path.trim_end_matches('/'), n)
}

/// Path of the version hint file, relative to the table root.
pub fn version_hint_path(table_path: &str) -> String {
    format!("{}/metadata/version-hint.text", table_path.trim_end_matches('/'))
}

/// Path of a new manifest file. The embedded UUID keeps concurrent
/// snapshots of different tables from colliding.
pub fn manifest_path(table_path: &str, uuid: &uuid::Uuid) -> String {
    format!("{}/metadata/{}.avro", table_path.trim_end_matches('/'), uuid)
}

/// Path of a new manifest list for the given snapshot.
pub fn manifest_list_path(table_path: &str, snapshot_id: i64, uuid: &uuid::Uuid) -> String {
    format!(
        "{}/metadata/snap-{}-{}.avro",
        table_path.trim_end_matches('/'),
        snapshot_id,
        uuid
    )
}

/// Path of the data directory written by the compute backend.
pub fn data_dir_path(table_path: &str) -> String {
    format!("{}/data/", table_path.trim_end_matches('/'))
}
