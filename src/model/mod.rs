/*!
Structs that model the Iceberg spec.
*/

pub mod manifest;
pub mod manifest_list;
pub mod metadata;
pub mod partition;
pub mod schema;
pub mod snapshot;
pub mod sort;
pub mod values;
