//! Record validation against declared field constraints.

use serde_json::{Map, Value};

use crate::error::{ApiError, FieldError, Violation};
use crate::schema::{FieldRule, ResourceSchema};
use crate::types::json_type_name;

/// Which write a payload is validated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Full record: every required field must be present.
    Create,
    /// Partial record: only supplied fields are checked.
    Patch,
}

/// Validate a candidate record against a resource schema.
///
/// Every offending field is reported, declared fields first (in declaration
/// order), then unknown fields (in payload order).
///
/// # Errors
///
/// Returns `ApiError::BadRequest` if the payload isn't a JSON object, or
/// `ApiError::InvalidRecord` listing each field that breaks a constraint.
pub fn validate_record(
    schema: &ResourceSchema,
    payload: &Value,
    kind: WriteKind,
) -> Result<(), ApiError> {
    let Some(record) = payload.as_object() else {
        return Err(ApiError::BadRequest {
            message: format!("expected a JSON object, got {}", json_type_name(payload)),
        });
    };

    let errors = collect_errors(schema, record, kind);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::InvalidRecord { errors })
    }
}

fn collect_errors(
    schema: &ResourceSchema,
    record: &Map<String, Value>,
    kind: WriteKind,
) -> Vec<FieldError> {
    let mut errors = Vec::new();

    for (name, rule) in &schema.fields {
        let violation = match record.get(name) {
            None if kind == WriteKind::Create && rule.required => Some(Violation::Missing),
            None => None,
            Some(value) => check_value(rule, value),
        };
        if let Some(violation) = violation {
            errors.push(FieldError {
                field: name.clone(),
                violation,
            });
        }
    }

    // `_id` and any undeclared key are rejected the same way
    for key in record.keys() {
        if !schema.fields.contains_key(key) {
            errors.push(FieldError {
                field: key.clone(),
                violation: Violation::Unknown,
            });
        }
    }

    errors
}

fn check_value(rule: &FieldRule, value: &Value) -> Option<Violation> {
    if !rule.field_type.matches(value) {
        return Some(Violation::WrongType {
            expected: rule.field_type.name(),
        });
    }

    let Some(text) = value.as_str() else {
        return None;
    };
    let actual = text.chars().count();
    let min = rule.min_length.unwrap_or(0);
    let max = rule.max_length.unwrap_or(usize::MAX);
    if actual < min || actual > max {
        return Some(Violation::Length { min, max, actual });
    }

    None
}
