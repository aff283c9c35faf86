/*!
A table's [schema](https://iceberg.apache.org/spec/#schemas-and-data-types) is a list of named columns, represented by [Schema].
All data types are either [primitives](PrimitiveType) or nested types, which are [Map], [List], or [StructType]. A table [Schema] is also a [StructType].
*/

use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{
    de::{self, IntoDeserializer},
    Deserialize, Deserializer, Serialize,
};

use crate::error::{Error, Result};

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[serde(remote = "Self")]
/// Primitive Types within a schema.
pub enum PrimitiveType {
    /// True or False
    Boolean,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit IEEE 754 floating point.
    Float,
    /// 64-bit IEEE 754 floating point.
    Double,
    /// Fixed point decimal
    Decimal {
        /// The number of digits in the number.
        precision: i32,
        /// The number of digits to the right of the decimal point.
        scale: u8,
    },
    /// Calendar date without timezone or time.
    Date,
    /// Time of day without date or timezone.
    Time,
    /// Timestamp without timezone
    Timestamp,
    /// Timestamp with timezone
    Timestamptz,
    /// Arbitrary-length character sequences
    String,
    /// Universally Unique Identifiers
    Uuid,
    /// Fixed length byte array
    Fixed(u64),
    /// Arbitrary-length byte array.
    Binary,
}

/// Serialize for PrimitiveType with special handling for
/// Decimal and Fixed types.
impl Serialize for PrimitiveType {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use PrimitiveType::*;
        match self {
            Decimal {
                precision: p,
                scale: s,
            } => serializer.serialize_str(&format!("decimal({p},{s})")),
            Fixed(l) => serializer.serialize_str(&format!("fixed[{l}]")),
            _ => PrimitiveType::serialize(self, serializer),
        }
    }
}

/// Deserialize for PrimitiveType with special handling for
/// Decimal and Fixed types.
impl<'de> Deserialize<'de> for PrimitiveType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if s.starts_with("decimal") {
            deserialize_decimal(s.into_deserializer())
        } else if s.starts_with("fixed") {
            deserialize_fixed(s.into_deserializer())
        } else {
            PrimitiveType::deserialize(s.into_deserializer())
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PrimitiveType::Boolean => write!(f, "boolean"),
            PrimitiveType::Int => write!(f, "int"),
            PrimitiveType::Long => write!(f, "long"),
            PrimitiveType::Float => write!(f, "float"),
            PrimitiveType::Double => write!(f, "double"),
            PrimitiveType::Decimal { precision, scale } => {
                write!(f, "decimal({},{})", precision, scale)
            }
            PrimitiveType::Date => write!(f, "date"),
            PrimitiveType::Time => write!(f, "time"),
            PrimitiveType::Timestamp => write!(f, "timestamp"),
            PrimitiveType::Timestamptz => write!(f, "timestamptz"),
            PrimitiveType::String => write!(f, "string"),
            PrimitiveType::Uuid => write!(f, "uuid"),
            PrimitiveType::Fixed(l) => write!(f, "fixed[{}]", l),
            PrimitiveType::Binary => write!(f, "binary"),
        }
    }
}

impl PrimitiveType {
    /// Parse an Iceberg type string. Anything ambiguous or
    /// unparameterized is rejected: `"decimal"` without precision and
    /// scale is an error, as is `"fixed"` without a length.
    pub fn parse(s: &str) -> Result<Self> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
            .map_err(|_| Error::Validation(format!("unknown type string: {}", s)))
    }
}

/// Parsing for the Decimal PrimitiveType
fn deserialize_decimal<'de, D>(deserializer: D) -> std::result::Result<PrimitiveType, D::Error>
where
    D: Deserializer<'de>,
{
    let this = String::deserialize(deserializer)?;
    lazy_static! {
        static ref RE: Regex = Regex::new(r#"^decimal\((?P<p>\d+),\s*(?P<s>\d+)\)$"#).unwrap();
    }

    let err_msg = format!("Invalid decimal format {}", this);

    let caps = RE
        .captures(&this)
        .ok_or_else(|| de::Error::custom(&err_msg))?;
    let precision: i32 = caps
        .name("p")
        .ok_or_else(|| de::Error::custom(&err_msg))
        .and_then(|p| {
            p.as_str()
                .parse()
                .map_err(|_| de::Error::custom("precision not i32"))
        })?;
    let scale: u8 = caps
        .name("s")
        .ok_or_else(|| de::Error::custom(&err_msg))
        .and_then(|p| {
            p.as_str()
                .parse()
                .map_err(|_| de::Error::custom("scale not u8"))
        })?;
    Ok(PrimitiveType::Decimal { precision, scale })
}

/// Deserialize for the Fixed PrimitiveType
fn deserialize_fixed<'de, D>(deserializer: D) -> std::result::Result<PrimitiveType, D::Error>
where
    D: Deserializer<'de>,
{
    let this = String::deserialize(deserializer)?;
    lazy_static! {
        static ref RE: Regex = Regex::new(r#"^fixed\[(?P<l>\d+)\]$"#).unwrap();
    }

    let err_msg = format!("Invalid fixed format {}", this);

    let caps = RE
        .captures(&this)
        .ok_or_else(|| de::Error::custom(&err_msg))?;
    let length: u64 = caps
        .name("l")
        .ok_or_else(|| de::Error::custom(&err_msg))
        .and_then(|p| {
            p.as_str()
                .parse()
                .map_err(|_| de::Error::custom("length not u64"))
        })?;
    Ok(PrimitiveType::Fixed(length))
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(untagged)]
/// A union type of all allowed Schema types.
pub enum SchemaType {
    /// All the primitive types
    Primitive(PrimitiveType),
    /// A Struct type
    Struct(StructType),
    /// A List type.
    List(List),
    /// A Map type
    Map(Map),
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchemaType::Primitive(primitive) => write!(f, "{}", primitive),
            SchemaType::Struct(_) => write!(f, "struct"),
            SchemaType::List(_) => write!(f, "list"),
            SchemaType::Map(_) => write!(f, "map"),
        }
    }
}

impl From<PrimitiveType> for SchemaType {
    fn from(primitive: PrimitiveType) -> Self {
        SchemaType::Primitive(primitive)
    }
}

impl SchemaType {
    /// Every field id used inside this type, including the ids of list
    /// elements and map keys/values.
    pub fn nested_field_ids(&self) -> Vec<i32> {
        match self {
            SchemaType::Primitive(_) => vec![],
            SchemaType::Struct(s) => s
                .fields
                .iter()
                .flat_map(|field| {
                    let mut ids = vec![field.id];
                    ids.extend(field.field_type.nested_field_ids());
                    ids
                })
                .collect(),
            SchemaType::List(l) => {
                let mut ids = vec![l.element_id];
                ids.extend(l.element.nested_field_ids());
                ids
            }
            SchemaType::Map(m) => {
                let mut ids = vec![m.key_id, m.value_id];
                ids.extend(m.key.nested_field_ids());
                ids.extend(m.value.nested_field_ids());
                ids
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(tag = "type", rename = "struct")]
/// A struct is a tuple of typed values. Each field in the tuple is
/// named and has an integer id that is unique in the table schema.
/// Each field can be either optional or required, meaning that values can (or cannot) be null.
pub struct StructType {
    /// The fields of the struct.
    pub fields: Vec<Field>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
/// A named column within a struct or schema.
pub struct Field {
    /// Unique Id
    pub id: i32,
    /// Field Name
    pub name: String,
    /// Optional or required, meaning that values can (or can not be) null
    pub required: bool,
    /// Field can have any type
    #[serde(rename = "type")]
    pub field_type: SchemaType,
    /// Fields can have any optional comment or doc string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case", tag = "type", rename = "list")]
/// A Schema type that contains List elements.
pub struct List {
    /// Unique identifier for the element
    pub element_id: i32,

    /// If the element is mandatory.
    pub element_required: bool,

    /// The type of the element.
    pub element: Box<SchemaType>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case", tag = "type", rename = "map")]
/// A Schema type that contains Map elements.
/// A map is a collection of key-value pairs with a key type and a value type.
/// Both the key field and value field each have an integer id that is unique
/// in the table schema. Map keys are required and map values can be either
/// optional or required.
pub struct Map {
    ///Unique key field id
    pub key_id: i32,
    ///Type of the map key
    pub key: Box<SchemaType>,
    ///Unique id for the value field
    pub value_id: i32,
    ///Indicates if the value is required.
    pub value_required: bool,
    ///Type of the value.
    pub value: Box<SchemaType>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// Names and types of fields in a table. This crate only writes v2
/// tables, so there is a single schema struct.
pub struct Schema {
    /// Identifier of the schema
    pub schema_id: i32,
    /// Set of primitive fields that identify rows in a table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier_field_ids: Option<Vec<i32>>,

    #[serde(flatten)]
    /// The struct fields
    pub struct_fields: StructType,
}

impl Schema {
    /// A schema with the given id and top-level fields.
    pub fn new(schema_id: i32, fields: Vec<Field>) -> Self {
        Schema {
            schema_id,
            identifier_field_ids: None,
            struct_fields: StructType { fields },
        }
    }

    /// The top-level fields.
    pub fn fields(&self) -> &[Field] {
        &self.struct_fields.fields
    }

    /// Find a top-level field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.struct_fields
            .fields
            .iter()
            .find(|field| field.name == name)
    }

    /// Find a top-level field by id.
    pub fn field_by_id(&self, id: i32) -> Option<&Field> {
        self.struct_fields
            .fields
            .iter()
            .find(|field| field.id == id)
    }

    /// Every field id used anywhere in the schema, nested ids included.
    pub fn all_field_ids(&self) -> Vec<i32> {
        SchemaType::Struct(self.struct_fields.clone()).nested_field_ids()
    }

    /// The highest field id used anywhere in the schema, or 0 for an
    /// empty schema.
    pub fn max_field_id(&self) -> i32 {
        self.all_field_ids().into_iter().max().unwrap_or(0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "kebab-case")]
/// One entry of the `schema.name-mapping.default` table property. These
/// mappings provide fallback field ids to be used when a data file does
/// not contain field id information.
pub struct NameMapping {
    /// The Iceberg field ID used when a field's name is present in names
    pub field_id: i32,
    /// A list of names for the field, oldest first when the field has
    /// been renamed.
    pub names: Vec<String>,
}

/// Build the default name mapping for `current`, folding in any earlier
/// names a field id carried in `historical` schemas so renames stay
/// resolvable.
pub fn build_name_mapping(historical: &[Schema], current: &Schema) -> Vec<NameMapping> {
    current
        .fields()
        .iter()
        .map(|field| {
            let mut names: Vec<String> = Vec::new();
            for schema in historical {
                if let Some(prior) = schema.field_by_id(field.id) {
                    if !names.contains(&prior.name) {
                        names.push(prior.name.clone());
                    }
                }
            }
            if !names.contains(&field.name) {
                names.push(field.name.clone());
            }
            NameMapping {
                field_id: field.id,
                names,
            }
        })
        .collect()
}
