/*!
 Partition specs define what the partition values are and how they are
derived from the source fields.
*/
use std::collections::BTreeMap;

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{
    de::{self, IntoDeserializer},
    Deserialize, Deserializer, Serialize,
};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "lowercase", remote = "Self")]
/// A Transformation applied to each source column to produce a value.
pub enum Transform {
    /// Source value, unmodified
    Identity,
    /// Extract a date or timestamp year as years from 1970
    Year,
    /// Extract a date or timestamp month as months from 1970-01-01
    Month,
    /// Extract a date or timestamp day as days from 1970-01-01
    Day,
    /// Extract a date or timestamp hour as hours from 1970-01-01 00:00:00
    Hour,
    /// Hash of value, mod N
    Bucket(u32),
    /// Value truncated to width
    Truncate(u32),
}

impl<'de> Deserialize<'de> for Transform {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.starts_with("bucket") {
            deserialize_bucket(s.into_deserializer())
        } else if s.starts_with("truncate") {
            deserialize_truncate(s.into_deserializer())
        } else {
            Transform::deserialize(s.into_deserializer())
        }
    }
}

impl Serialize for Transform {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use Transform::*;
        match self {
            Bucket(mod_n) => serializer.serialize_str(&format!("bucket[{mod_n}]")),
            Truncate(width) => serializer.serialize_str(&format!("truncate[{width}]")),
            _ => Transform::serialize(self, serializer),
        }
    }
}

impl Transform {
    /// Whether the partition value produced by this transform is an
    /// integer. Time-derived transforms and buckets yield ints; identity
    /// and truncate pass the source value through as text.
    pub fn produces_int(&self) -> bool {
        matches!(
            self,
            Transform::Year
                | Transform::Month
                | Transform::Day
                | Transform::Hour
                | Transform::Bucket(_)
        )
    }
}

fn deserialize_bucket<'de, D>(deserializer: D) -> Result<Transform, D::Error>
where
    D: Deserializer<'de>,
{
    let this = String::deserialize(deserializer)?;
    lazy_static! {
        static ref RE: Regex = Regex::new(r#"^bucket\[(?P<n>\d+)\]$"#).unwrap();
    }
    let err_msg = format!("Invalid bucket format {}", this);

    let caps = RE
        .captures(&this)
        .ok_or_else(|| de::Error::custom(&err_msg))?;
    let bucket: u32 = caps
        .name("n")
        .ok_or_else(|| de::Error::custom(&err_msg))
        .and_then(|p| {
            p.as_str()
                .parse()
                .map_err(|_| de::Error::custom("bucket not u32"))
        })?;
    Ok(Transform::Bucket(bucket))
}

fn deserialize_truncate<'de, D>(deserializer: D) -> Result<Transform, D::Error>
where
    D: Deserializer<'de>,
{
    let this = String::deserialize(deserializer)?;
    lazy_static! {
        static ref RE: Regex = Regex::new(r#"^truncate\[(?P<w>\d+)\]$"#).unwrap();
    }
    let err_msg = format!("Invalid truncate format {}", this);

    let caps = RE
        .captures(&this)
        .ok_or_else(|| de::Error::custom(&err_msg))?;
    let width: u32 = caps
        .name("w")
        .ok_or_else(|| de::Error::custom(&err_msg))
        .and_then(|p| {
            p.as_str()
                .parse()
                .map_err(|_| de::Error::custom("truncate not u32"))
        })?;
    Ok(Transform::Truncate(width))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// Tables are configured with a partition spec that defines how to produce a tuple of partition values from a record.
pub struct PartitionField {
    /// A source column id from the table's schema
    pub source_id: i32,
    /// A partition field id that is used to identify a partition field and is unique within a partition spec.
    /// In v2 table metadata, it is unique across all partition specs.
    pub field_id: i32,
    /// A partition name.
    pub name: String,
    /// A transform that is applied to the source column to produce a partition value.
    pub transform: Transform,
}

/// Partition field ids are assigned from this value upward, per the
/// Iceberg spec, to stay clear of data field ids.
pub const PARTITION_FIELD_ID_START: i32 = 1000;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// A definition of how partition values are derived from data fields.
pub struct PartitionSpec {
    /// Identifier for the specification
    pub spec_id: i32,
    /// Fields for the specification
    pub fields: Vec<PartitionField>,
}

impl PartitionSpec {
    /// The unpartitioned spec.
    pub fn unpartitioned() -> Self {
        PartitionSpec {
            spec_id: 0,
            fields: vec![],
        }
    }

    /// A spec with the given id and fields; partition field ids are
    /// assigned from [PARTITION_FIELD_ID_START] in field order.
    pub fn new(spec_id: i32, fields: Vec<(String, Transform, i32)>) -> Self {
        PartitionSpec {
            spec_id,
            fields: fields
                .into_iter()
                .enumerate()
                .map(|(index, (name, transform, source_id))| PartitionField {
                    source_id,
                    field_id: PARTITION_FIELD_ID_START + index as i32,
                    name,
                    transform,
                })
                .collect(),
        }
    }

    /// The highest partition field id in this spec, or 0 when
    /// unpartitioned.
    pub fn max_field_id(&self) -> i32 {
        self.fields
            .iter()
            .map(|field| field.field_id)
            .max()
            .unwrap_or(0)
    }
}

/// A single partition value as it appears in a manifest entry's
/// partition tuple.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PartitionValue {
    /// Produced by the time-derived and bucket transforms.
    Int(i32),
    /// Produced by identity and truncate transforms.
    Text(String),
}

/// Resolve the partition tuple value for one partition field from a
/// file's raw (string-keyed) partition values.
///
/// For the `day` transform a file that lacks the derived day value but
/// carries hive-style `year`/`month`/`day` keys gets its value computed
/// as days since 1970-01-01.
pub fn resolve_partition_value(
    field: &PartitionField,
    raw: &BTreeMap<String, String>,
) -> Option<PartitionValue> {
    if let Some(value) = raw.get(&field.name) {
        return if field.transform.produces_int() {
            value.parse::<i32>().ok().map(PartitionValue::Int)
        } else {
            Some(PartitionValue::Text(value.clone()))
        };
    }
    if field.transform == Transform::Day {
        return epoch_day_from_hive_parts(raw).map(PartitionValue::Int);
    }
    None
}

/// Compute days since 1970-01-01 from hive-style `year`/`month`/`day`
/// partition values.
fn epoch_day_from_hive_parts(raw: &BTreeMap<String, String>) -> Option<i32> {
    let year: i32 = raw.get("year")?.parse().ok()?;
    let month: u32 = raw.get("month")?.parse().ok()?;
    let day: u32 = raw.get("day")?.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1)?;
    Some((date - epoch).num_days() as i32)
}
