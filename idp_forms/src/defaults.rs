use crate::schema::{PropertySchema, PropertyValue, ValueSet};

/// Merges declared defaults into a create-mode value set.
///
/// Only absent or null entries are filled; an empty string is a deliberate
/// user choice and stays. Returns `None` when nothing had to change, so a
/// second application over the same values is a no-op.
pub fn apply_defaults(schemas: &[PropertySchema], values: &ValueSet) -> Option<ValueSet> {
    let mut merged: Option<ValueSet> = None;

    for schema in schemas {
        let Some(default) = schema.default_value.as_ref().filter(|d| !d.is_null()) else {
            continue;
        };
        let unset = values.get(&schema.property_name).map_or(true, PropertyValue::is_null);
        if unset {
            merged
                .get_or_insert_with(|| values.clone())
                .insert(schema.property_name.clone(), default.clone());
        }
    }

    merged
}
