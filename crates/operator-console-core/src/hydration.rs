//! Pre-filling form fields from a stored credential.

use serde_json::{Map, Value};

use crate::protocol::ProtocolDescriptor;

/// Field values to write into the form for a hydrated credential.
///
/// Accepts either a flat object or one wrapping the values in `defaults`;
/// dotted schema names are looked up inside their group object. Fields the
/// body does not mention are left out rather than blanked.
pub fn hydrated_values(descriptor: &ProtocolDescriptor, body: &Value) -> Vec<(String, String)> {
    let Some(root) = body.as_object() else {
        return Vec::new();
    };
    let nested_defaults = root.get("defaults").and_then(Value::as_object);
    descriptor
        .fields
        .iter()
        .filter_map(|field| {
            let value = lookup(root, field.name)
                .or_else(|| nested_defaults.and_then(|defaults| lookup(defaults, field.name)))?;
            Some((field.name.to_string(), value))
        })
        .collect()
}

/// Sanitized summary defaults; never includes sensitive fields.
pub fn summary_values(descriptor: &ProtocolDescriptor, defaults: &Map<String, Value>) -> Vec<(String, String)> {
    descriptor
        .fields
        .iter()
        .filter(|field| !field.sensitive)
        .filter_map(|field| Some((field.name.to_string(), lookup(defaults, field.name)?)))
        .collect()
}

fn lookup(object: &Map<String, Value>, name: &str) -> Option<String> {
    let value = match name.split_once('.') {
        Some((group, leaf)) => object
            .get(name)
            .or_else(|| object.get(group)?.as_object()?.get(leaf))
            .or_else(|| object.get(leaf)),
        None => object.get(name),
    }?;
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
