/*!
Definition of [Sort orders](https://iceberg.apache.org/spec/#sorting) for a Table.

A [SortOrder] is composed of a list of [SortField] where each field has a [Transform],
[SortDirection] and [NullOrder]. Sort orders are carried in the metadata
document; this crate never enforces them, so the default unsorted order 0
is what every table starts with.
*/
use crate::model::partition::Transform;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// Defines the sort order for a field.
pub enum SortDirection {
    /// Sort the field ascending.
    #[serde(rename = "asc")]
    Ascending,
    /// Sort the field descending.
    #[serde(rename = "desc")]
    Descending,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// Defines the sort order for nulls in a field.
pub enum NullOrder {
    #[serde(rename = "nulls-first")]
    /// Place the nulls first in the sort.
    First,
    #[serde(rename = "nulls-last")]
    /// Place the nulls last in the sort.
    Last,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// Definition of how a field should be used within a sort.
pub struct SortField {
    /// A source column id from the table's schema
    pub source_id: i32,
    /// A transform that is used to produce values to be sorted on from the source column.
    pub transform: Transform,
    /// A sort direction, that can only be either asc or desc
    pub direction: SortDirection,
    /// A null order that describes the order of null values when sorted.
    pub null_order: NullOrder,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// A sort order is defined by a sort order id and a list of sort fields.
pub struct SortOrder {
    /// Identifier for SortOrder, order_id `0` is no sort order.
    pub order_id: i32,
    /// Details of the sort
    pub fields: Vec<SortField>,
}

impl SortOrder {
    /// The unsorted order, `{order-id: 0, fields: []}`, present on every
    /// table.
    pub fn unsorted() -> Self {
        SortOrder {
            order_id: 0,
            fields: vec![],
        }
    }
}
