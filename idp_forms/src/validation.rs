use crate::schema::{ListRules, NumberRules, PropertySchema, PropertyValue, StringRules, ValidationErrors, ValidationRules, ValueSet, format_number};
use log::warn;
use regex::Regex;

/// Checks working values against property schemas. Never fails: problems come back as messages.
pub struct Validator;

impl Validator {
    /// Validates every schema entry once and collects the messages of the failing ones.
    pub fn validate_all(&self, schemas: &[PropertySchema], values: &ValueSet) -> ValidationErrors {
        schemas
            .iter()
            .filter_map(|schema| {
                self.validate_property(schema, values.get(&schema.property_name))
                    .map(|message| (schema.property_name.clone(), message))
            })
            .collect()
    }

    /// First failing rule for one value, or `None` when it passes.
    pub fn validate_property(&self, schema: &PropertySchema, value: Option<&PropertyValue>) -> Option<String> {
        let name = &schema.display_name;
        let value = match value {
            Some(v) if !v.is_empty() => v,
            _ if schema.required => return Some(format!("{} is required", name)),
            _ => return None,
        };

        match &schema.rules {
            ValidationRules::String(rules) => self.check_string(name, rules, value),
            ValidationRules::Number(rules) => self.check_number(name, rules, value),
            ValidationRules::List(rules) => self.check_list(name, rules, value),
            ValidationRules::Boolean => None,
        }
    }

    fn check_string(&self, name: &str, rules: &StringRules, value: &PropertyValue) -> Option<String> {
        let text = value.as_text()?;

        if let Some(pattern) = &rules.pattern {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(&text) => {
                    return Some(
                        rules
                            .pattern_message
                            .clone()
                            .unwrap_or_else(|| format!("{} does not match the required format", name)),
                    );
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping invalid pattern '{}' for {}: {}", pattern, name, e),
            }
        }

        let length = text.chars().count();
        if let Some(min) = rules.min_length {
            if length < min {
                return Some(format!("{} must be at least {} characters", name, min));
            }
        }
        if let Some(max) = rules.max_length {
            if length > max {
                return Some(format!("{} must be at most {} characters", name, max));
            }
        }
        None
    }

    fn check_number(&self, name: &str, rules: &NumberRules, value: &PropertyValue) -> Option<String> {
        let Some(n) = value.as_number() else {
            return Some(format!("{} must be a valid number", name));
        };

        match (rules.min, rules.max) {
            (Some(min), Some(max)) if n < min || n > max => Some(format!(
                "{} must be between {} and {}",
                name,
                format_number(min),
                format_number(max)
            )),
            (Some(min), None) if n < min => Some(format!("{} must be at least {}", name, format_number(min))),
            (None, Some(max)) if n > max => Some(format!("{} must be at most {}", name, format_number(max))),
            _ => None,
        }
    }

    fn check_list(&self, name: &str, rules: &ListRules, value: &PropertyValue) -> Option<String> {
        let candidates = match value {
            PropertyValue::List(items) => {
                if let Some(min) = rules.min_items {
                    if items.len() < min {
                        return Some(format!("{} must have at least {} selections", name, min));
                    }
                }
                if let Some(max) = rules.max_items {
                    if items.len() > max {
                        return Some(format!("{} must have at most {} selections", name, max));
                    }
                }
                items.clone()
            }
            scalar => scalar.as_text().into_iter().collect(),
        };

        if candidates.iter().all(|c| rules.allows(c)) {
            return None;
        }
        let allowed = rules
            .allowed_values
            .iter()
            .map(|v| v.value.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Some(format!("{} must be one of: {}", name, allowed))
    }
}

pub fn validate_property(schema: &PropertySchema, value: Option<&PropertyValue>) -> Option<String> {
    Validator.validate_property(schema, value)
}

pub fn validate_all(schemas: &[PropertySchema], values: &ValueSet) -> ValidationErrors {
    Validator.validate_all(schemas, values)
}
