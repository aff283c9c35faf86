/*!
Schema evolution.

Evolution operations are pure: given a schema, a context and an
operation they produce the next schema (plus any permissive-mode
warnings) or an error. They never mutate table state; the metadata
state machine applies the result, assigns the new schema id and raises
the column high-water mark.

Two rules are absolute regardless of mode: new fields always take the
next field id from the context, and a dropped field's id is never
returned to the pool.
*/

pub mod validate;

use crate::error::{Error, Result};
use crate::model::schema::{Field, PrimitiveType, Schema, SchemaType};
use validate::{
    is_nested, validate_add_column, validate_drop_column, validate_field_id_not_reused,
    validate_rename_column, validate_required_promotion, validate_type_promotion, Mode,
};

/// Context an evolution operation runs in, supplied by the metadata
/// state machine.
#[derive(Debug, Clone, Default)]
pub struct EvolutionContext {
    /// The id for the next new field: the table's `last-column-id` + 1.
    pub next_field_id: i32,
    /// Every schema version the table has ever had, for id-reuse checks.
    pub historical_schemas: Vec<Schema>,
    /// Whether the table is known to hold no data.
    pub table_empty: bool,
}

/// A column to be added: everything but the id, which the context
/// assigns.
#[derive(Debug, Clone)]
pub struct NewField {
    /// Column name.
    pub name: String,
    /// Column type.
    pub field_type: SchemaType,
    /// Whether values are mandatory.
    pub required: bool,
    /// Optional doc string.
    pub doc: Option<String>,
}

/// An evolved schema plus any warnings raised in permissive mode.
pub type Evolved = (Schema, Vec<String>);

fn collect(check: validate::Check, warnings: &mut Vec<String>) {
    if let Some(warning) = check {
        warnings.push(warning);
    }
}

/// Add a column. The new field receives `ctx.next_field_id`; that id
/// must never have been used before.
pub fn add_column(
    schema: &Schema,
    field: NewField,
    ctx: &EvolutionContext,
    mode: Mode,
) -> Result<Evolved> {
    let mut warnings = Vec::new();
    collect(
        validate_add_column(schema, &field.name, field.required, mode, ctx.table_empty)?,
        &mut warnings,
    );
    collect(
        validate_field_id_not_reused(schema, ctx.next_field_id, &ctx.historical_schemas)?,
        &mut warnings,
    );

    let mut next = schema.clone();
    next.struct_fields.fields.push(Field {
        id: ctx.next_field_id,
        name: field.name,
        required: field.required,
        field_type: field.field_type,
        doc: field.doc,
    });
    Ok((next, warnings))
}

/// Drop a column by name. The field's id leaves the schema but stays
/// burned: the high-water mark in the metadata never comes back down.
pub fn drop_column(schema: &Schema, name: &str, mode: Mode) -> Result<Evolved> {
    let mut warnings = Vec::new();
    collect(validate_drop_column(schema, name, mode)?, &mut warnings);
    if schema.field(name).is_none() {
        return Err(Error::Validation(format!("column {} does not exist", name)));
    }

    let mut next = schema.clone();
    next.struct_fields.fields.retain(|field| field.name != name);
    Ok((next, warnings))
}

/// Rename a column, preserving its id and type.
pub fn rename_column(schema: &Schema, old: &str, new: &str, mode: Mode) -> Result<Evolved> {
    let mut warnings = Vec::new();
    collect(validate_rename_column(schema, old, new, mode)?, &mut warnings);

    let mut next = schema.clone();
    let field = next
        .struct_fields
        .fields
        .iter_mut()
        .find(|field| field.name == old)
        .ok_or_else(|| Error::Validation(format!("column {} does not exist", old)))?;
    field.name = new.to_string();
    Ok((next, warnings))
}

/// Change a column's type, preserving its id and name. Only primitive
/// columns can be re-typed.
pub fn update_column_type(
    schema: &Schema,
    name: &str,
    new_type: PrimitiveType,
    mode: Mode,
) -> Result<Evolved> {
    let field = schema
        .field(name)
        .ok_or_else(|| Error::Validation(format!("column {} does not exist", name)))?;
    if is_nested(&field.field_type) {
        return Err(Error::Validation(format!(
            "column {} is a nested type and cannot be re-typed",
            name
        )));
    }
    let old_type = match &field.field_type {
        SchemaType::Primitive(primitive) => primitive.clone(),
        _ => unreachable!(),
    };

    let mut warnings = Vec::new();
    collect(
        validate_type_promotion(&old_type, &new_type, mode)?,
        &mut warnings,
    );

    let mut next = schema.clone();
    if let Some(field) = next
        .struct_fields
        .fields
        .iter_mut()
        .find(|field| field.name == name)
    {
        field.field_type = SchemaType::Primitive(new_type);
    }
    Ok((next, warnings))
}

/// Flip a column's required flag.
pub fn set_required(schema: &Schema, name: &str, required: bool, mode: Mode) -> Result<Evolved> {
    let field = schema
        .field(name)
        .ok_or_else(|| Error::Validation(format!("column {} does not exist", name)))?;

    let mut warnings = Vec::new();
    collect(
        validate_required_promotion(field.required, required, mode)?,
        &mut warnings,
    );

    let mut next = schema.clone();
    if let Some(field) = next
        .struct_fields
        .fields
        .iter_mut()
        .find(|field| field.name == name)
    {
        field.required = required;
    }
    Ok((next, warnings))
}

/// Replace a column's doc string. Safe in every mode.
pub fn update_column_doc(schema: &Schema, name: &str, doc: Option<String>) -> Result<Evolved> {
    let mut next = schema.clone();
    let field = next
        .struct_fields
        .fields
        .iter_mut()
        .find(|field| field.name == name)
        .ok_or_else(|| Error::Validation(format!("column {} does not exist", name)))?;
    field.doc = doc;
    Ok((next, vec![]))
}
