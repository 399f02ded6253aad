//! Validation and casting of raw variable input against declared types.

use serde_json::Value;

use crate::error::ValidationError;
use crate::extract::{TypeRef, VariableDefinition};

/// Validate raw input for a variable and cast it to a JSON value.
///
/// `None` or empty input is "absent": rejected for non-null types, otherwise
/// replaced by the declared default or `null`.
pub fn coerce_input(raw: Option<&str>, def: &VariableDefinition) -> Result<Value, ValidationError> {
    let fail = |message: String| ValidationError {
        variable: def.name.clone(),
        type_name: def.type_ref.to_string(),
        message,
    };

    match raw.filter(|s| !s.is_empty()) {
        None if def.type_ref.is_non_null() => Err(fail("a value is required".to_string())),
        None => Ok(def.default_value.clone().unwrap_or(Value::Null)),
        Some(text) => coerce_text(text, &def.type_ref).map_err(fail),
    }
}

/// Coerce textual input against a type.
pub fn coerce_text(text: &str, ty: &TypeRef) -> Result<Value, String> {
    match ty {
        TypeRef::NonNull(inner) => {
            if text.is_empty() {
                Err("a value is required".to_string())
            } else {
                coerce_text(text, inner)
            }
        }
        TypeRef::List(item) => split_list(text)?
            .into_iter()
            .map(|element| coerce_element(element, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        TypeRef::Named(name) => coerce_scalar(text, name),
    }
}

/// One element of list input, before coercion.
enum ListElement {
    Text(String),
    Null,
}

/// Split list input: JSON array syntax or a comma-separated sequence.
fn split_list(text: &str) -> Result<Vec<ListElement>, String> {
    let trimmed = text.trim();
    if trimmed.starts_with('[') {
        let Value::Array(items) = serde_json::from_str::<Value>(trimmed)
            .map_err(|e| format!("not a valid list: {}", e))?
        else {
            return Err("not a valid list".to_string());
        };
        return Ok(items
            .into_iter()
            .map(|item| match item {
                Value::Null => ListElement::Null,
                Value::String(s) => ListElement::Text(s),
                other => ListElement::Text(other.to_string()),
            })
            .collect());
    }

    Ok(trimmed
        .split(',')
        .map(|part| ListElement::Text(part.trim().to_string()))
        .collect())
}

fn coerce_element(element: ListElement, ty: &TypeRef) -> Result<Value, String> {
    match element {
        ListElement::Null if ty.is_non_null() => Err("list contains null for a non-null item".to_string()),
        ListElement::Null => Ok(Value::Null),
        ListElement::Text(text) => coerce_text(&text, ty),
    }
}

fn coerce_scalar(text: &str, name: &str) -> Result<Value, String> {
    match name {
        "Int" => {
            let value: i64 = text
                .trim()
                .parse()
                .map_err(|_| format!("'{}' is not a valid Int", text))?;
            i32::try_from(value).map_err(|_| format!("{} is out of range for Int", value))?;
            Ok(Value::from(value))
        }
        "Float" => {
            let value: f64 = text
                .trim()
                .parse()
                .map_err(|_| format!("'{}' is not a valid Float", text))?;
            serde_json::Number::from_f64(value)
                .map(Value::Number)
                .ok_or_else(|| format!("'{}' is not a finite Float", text))
        }
        "Boolean" => match text.trim() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(format!("'{}' is not a valid Boolean (expected true or false)", text)),
        },
        "String" | "ID" => Ok(Value::String(text.to_string())),
        _ => {
            // Enums, custom scalars, input objects.
            match serde_json::from_str::<Value>(text) {
                Ok(object @ Value::Object(_)) => Ok(object),
                _ => Ok(Value::String(text.to_string())),
            }
        }
    }
}
