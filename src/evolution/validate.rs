/*!
Validation rules for schema evolution.

Every check is parameterized by a [Mode]. `None` short-circuits to ok,
`Strict` turns every rule violation into an error, and `Permissive`
downgrades the non-fatal ones to warnings. Structural impossibilities
(a missing column, a name collision, a reused field id) are fatal in
every checked mode.
*/

use crate::error::{Error, Result};
use crate::model::schema::{PrimitiveType, Schema, SchemaType};

/// How strictly an evolution operation is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Every rule violation is an error.
    Strict,
    /// Non-fatal violations become warnings.
    Permissive,
    /// Skip validation entirely.
    None,
}

/// Outcome of a single check: ok, possibly with a warning to surface.
pub type Check = Option<String>;

fn violation(mode: Mode, message: String) -> Result<Check> {
    match mode {
        Mode::Strict => Err(Error::Validation(message)),
        Mode::Permissive => Ok(Some(message)),
        Mode::None => Ok(None),
    }
}

/// Validate adding a column. A duplicate name is always fatal; adding a
/// required column to a table that may already hold data is a rule
/// violation.
pub fn validate_add_column(
    schema: &Schema,
    name: &str,
    required: bool,
    mode: Mode,
    table_empty: bool,
) -> Result<Check> {
    if mode == Mode::None {
        return Ok(None);
    }
    if schema.field(name).is_some() {
        return Err(Error::Validation(format!(
            "column {} already exists",
            name
        )));
    }
    if required && !table_empty {
        return violation(
            mode,
            format!(
                "adding required column {} to a non-empty table makes existing rows unreadable",
                name
            ),
        );
    }
    Ok(None)
}

/// Validate dropping a column. A missing column is always fatal;
/// dropping a required column is a rule violation.
pub fn validate_drop_column(schema: &Schema, name: &str, mode: Mode) -> Result<Check> {
    if mode == Mode::None {
        return Ok(None);
    }
    let field = schema
        .field(name)
        .ok_or_else(|| Error::Validation(format!("column {} does not exist", name)))?;
    if field.required {
        return violation(mode, format!("dropping required column {}", name));
    }
    Ok(None)
}

/// Validate renaming a column. Both a missing source and a taken target
/// name are fatal.
pub fn validate_rename_column(schema: &Schema, old: &str, new: &str, mode: Mode) -> Result<Check> {
    if mode == Mode::None {
        return Ok(None);
    }
    if schema.field(old).is_none() {
        return Err(Error::Validation(format!("column {} does not exist", old)));
    }
    if schema.field(new).is_some() {
        return Err(Error::Validation(format!("column {} already exists", new)));
    }
    Ok(None)
}

/// Validate a type change. The identity change is always ok; the safe
/// widening promotions are `int → long` and `float → double`.
pub fn validate_type_promotion(
    old: &PrimitiveType,
    new: &PrimitiveType,
    mode: Mode,
) -> Result<Check> {
    if mode == Mode::None {
        return Ok(None);
    }
    if old == new {
        return Ok(None);
    }
    let safe = matches!(
        (old, new),
        (PrimitiveType::Int, PrimitiveType::Long)
            | (PrimitiveType::Float, PrimitiveType::Double)
    );
    if safe {
        Ok(None)
    } else {
        violation(mode, format!("unsafe type promotion {} to {}", old, new))
    }
}

/// Validate a change of the required flag. Promoting optional to
/// required is allowed; relaxing required to optional is a rule
/// violation outside permissive mode.
pub fn validate_required_promotion(
    old_required: bool,
    new_required: bool,
    mode: Mode,
) -> Result<Check> {
    if mode == Mode::None {
        return Ok(None);
    }
    if old_required && !new_required {
        return match mode {
            Mode::Permissive => Ok(Some(
                "relaxing a required column to optional".to_string(),
            )),
            _ => Err(Error::Validation(
                "cannot relax a required column to optional".to_string(),
            )),
        };
    }
    Ok(None)
}

/// Reject a field id that has already been used in the current schema
/// or any prior schema version. Field ids are never recycled.
pub fn validate_field_id_not_reused(
    schema: &Schema,
    id: i32,
    historical_schemas: &[Schema],
) -> Result<Check> {
    let reused = schema.all_field_ids().contains(&id)
        || historical_schemas
            .iter()
            .any(|prior| prior.all_field_ids().contains(&id));
    if reused {
        Err(Error::Validation(format!("field id {} was already used", id)))
    } else {
        Ok(None)
    }
}

/// True when the type is a nested (non-primitive) type. Promotion rules
/// only apply to primitives; nested rewrites are never safe.
pub fn is_nested(field_type: &SchemaType) -> bool {
    !matches!(field_type, SchemaType::Primitive(_))
}
