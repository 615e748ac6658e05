use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Working values of a dynamic form, keyed by property name.
pub type ValueSet = BTreeMap<String, PropertyValue>;

/// Validation messages keyed by property name. A missing key means the field is valid.
pub type ValidationErrors = BTreeMap<String, String>;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    String,
    Number,
    Boolean,
    List,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "STRING",
            DataType::Number => "NUMBER",
            DataType::Boolean => "BOOLEAN",
            DataType::List => "LIST",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema namespace. The same mapping can expose different properties
/// depending on whether it is edited from a blueprint or a stack.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SchemaContext {
    Blueprint,
    Stack,
}

impl SchemaContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaContext::Blueprint => "blueprint",
            SchemaContext::Stack => "stack",
        }
    }

    /// Collection segment used by the backend for this context.
    pub fn collection(&self) -> &'static str {
        match self {
            SchemaContext::Blueprint => "blueprints",
            SchemaContext::Stack => "stacks",
        }
    }
}

impl fmt::Display for SchemaContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SchemaContext {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "blueprint" | "blueprints" => Ok(SchemaContext::Blueprint),
            "stack" | "stacks" => Ok(SchemaContext::Stack),
            other => Err(format!("Unknown schema context '{}'", other)),
        }
    }
}

/// Identifies one cached schema: a mapping seen through a context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    pub resource_type_id: String,
    pub cloud_provider_id: String,
    pub context: SchemaContext,
}

impl SchemaKey {
    pub fn new(resource_type_id: impl Into<String>, cloud_provider_id: impl Into<String>, context: SchemaContext) -> Self {
        Self {
            resource_type_id: resource_type_id.into(),
            cloud_provider_id: cloud_provider_id.into(),
            context,
        }
    }

    /// Builds a key only when both ids are present and non-blank.
    pub fn from_selection(resource_type_id: Option<&str>, cloud_provider_id: Option<&str>, context: SchemaContext) -> Option<Self> {
        let rt = resource_type_id.map(str::trim).filter(|s| !s.is_empty())?;
        let cp = cloud_provider_id.map(str::trim).filter(|s| !s.is_empty())?;
        Some(Self::new(rt, cp, context))
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.context, self.resource_type_id, self.cloud_provider_id)
    }
}

/// Runtime value of a single property.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Boolean(bool),
    Number(f64),
    String(String),
    List(Vec<String>),
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    /// Null, the empty string and an empty selection all count as "no value".
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Null => true,
            PropertyValue::String(s) => s.is_empty(),
            PropertyValue::List(items) => items.is_empty(),
            PropertyValue::Boolean(_) | PropertyValue::Number(_) => false,
        }
    }

    /// Scalar rendering used for string comparisons and text controls.
    pub fn as_text(&self) -> Option<String> {
        match self {
            PropertyValue::String(s) => Some(s.clone()),
            PropertyValue::Number(n) => Some(format_number(*n)),
            PropertyValue::Boolean(b) => Some(b.to_string()),
            PropertyValue::Null | PropertyValue::List(_) => None,
        }
    }

    /// Numeric coercion. Strings are parsed after trimming; anything non-finite is rejected.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            PropertyValue::Number(n) => *n,
            PropertyValue::String(s) => s.trim().parse::<f64>().ok()?,
            _ => return None,
        };
        n.is_finite().then_some(n)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            PropertyValue::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
            PropertyValue::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(PropertyValue::Null),
            Value::Bool(b) => Some(PropertyValue::Boolean(*b)),
            Value::Number(n) => n.as_f64().map(PropertyValue::Number),
            Value::String(s) => Some(PropertyValue::String(s.clone())),
            Value::Array(items) => items.iter().map(scalar_text).collect::<Option<Vec<_>>>().map(PropertyValue::List),
            Value::Object(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::Null => Value::Null,
            PropertyValue::Boolean(b) => Value::Bool(*b),
            PropertyValue::Number(n) => serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::List(items) => Value::Array(items.iter().cloned().map(Value::String).collect()),
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Number(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Number(value as f64)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Number(f64::from(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        PropertyValue::List(value)
    }
}

/// Formats a number the way it is shown in messages and controls: `1` rather than `1.0`.
pub fn format_number(n: f64) -> String {
    format!("{}", n)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => n.as_f64().map(format_number),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct StringRules {
    pub pattern: Option<String>,
    pub pattern_message: Option<String>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NumberRules {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListRules {
    pub allowed_values: Vec<AllowedValue>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

impl ListRules {
    pub fn allows(&self, candidate: &str) -> bool {
        self.allowed_values.is_empty() || self.allowed_values.iter().any(|v| v.value == candidate)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AllowedValue {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl AllowedValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self { value: value.into(), label: None }
    }

    pub fn labelled(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: Some(label.into()) }
    }

    pub fn display_label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.value)
    }

    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Object(obj) => {
                let v = obj.get("value").and_then(scalar_text)?;
                let label = obj.get("label").and_then(scalar_text);
                Some(Self { value: v, label })
            }
            other => scalar_text(other).map(Self::new),
        }
    }
}

/// Validation rules, one variant per data type.
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationRules {
    String(StringRules),
    Number(NumberRules),
    Boolean,
    List(ListRules),
}

impl ValidationRules {
    /// Rules of the given type with no constraints.
    pub fn unconstrained(data_type: DataType) -> Self {
        match data_type {
            DataType::String => ValidationRules::String(StringRules::default()),
            DataType::Number => ValidationRules::Number(NumberRules::default()),
            DataType::Boolean => ValidationRules::Boolean,
            DataType::List => ValidationRules::List(ListRules::default()),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ValidationRules::String(_) => DataType::String,
            ValidationRules::Number(_) => DataType::Number,
            ValidationRules::Boolean => DataType::Boolean,
            ValidationRules::List(_) => DataType::List,
        }
    }

    /// Reads the loose wire representation. Keys that do not belong to the data type are ignored.
    pub fn from_wire(data_type: DataType, bag: Option<&Map<String, Value>>) -> Self {
        let Some(bag) = bag else {
            return Self::unconstrained(data_type);
        };
        match data_type {
            DataType::String => ValidationRules::String(StringRules {
                pattern: bag.get("pattern").and_then(Value::as_str).filter(|p| !p.is_empty()).map(str::to_string),
                pattern_message: bag.get("patternMessage").and_then(Value::as_str).map(str::to_string),
                min_length: count_rule(bag, "minLength"),
                max_length: count_rule(bag, "maxLength"),
            }),
            DataType::Number => ValidationRules::Number(NumberRules {
                min: number_rule(bag, "min"),
                max: number_rule(bag, "max"),
            }),
            DataType::Boolean => ValidationRules::Boolean,
            DataType::List => {
                let allowed_values = match bag.get("allowedValues") {
                    Some(Value::Array(items)) => items
                        .iter()
                        .filter_map(|item| {
                            let parsed = AllowedValue::from_json(item);
                            if parsed.is_none() {
                                warn!("Ignoring malformed allowed value {}", item);
                            }
                            parsed
                        })
                        .collect(),
                    _ => Vec::new(),
                };
                ValidationRules::List(ListRules {
                    allowed_values,
                    min_items: count_rule(bag, "minItems"),
                    max_items: count_rule(bag, "maxItems"),
                })
            }
        }
    }

    /// Writes the loose wire representation. Returns `None` when there is nothing to send.
    pub fn to_wire(&self) -> Option<Map<String, Value>> {
        let mut bag = Map::new();
        match self {
            ValidationRules::String(rules) => {
                if let Some(p) = &rules.pattern {
                    bag.insert("pattern".into(), Value::String(p.clone()));
                }
                if let Some(m) = &rules.pattern_message {
                    bag.insert("patternMessage".into(), Value::String(m.clone()));
                }
                if let Some(n) = rules.min_length {
                    bag.insert("minLength".into(), Value::from(n));
                }
                if let Some(n) = rules.max_length {
                    bag.insert("maxLength".into(), Value::from(n));
                }
            }
            ValidationRules::Number(rules) => {
                if let Some(n) = rules.min.and_then(serde_json::Number::from_f64) {
                    bag.insert("min".into(), Value::Number(n));
                }
                if let Some(n) = rules.max.and_then(serde_json::Number::from_f64) {
                    bag.insert("max".into(), Value::Number(n));
                }
            }
            ValidationRules::Boolean => {}
            ValidationRules::List(rules) => {
                if !rules.allowed_values.is_empty() {
                    let values = rules
                        .allowed_values
                        .iter()
                        .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
                        .collect();
                    bag.insert("allowedValues".into(), Value::Array(values));
                }
                if let Some(n) = rules.min_items {
                    bag.insert("minItems".into(), Value::from(n));
                }
                if let Some(n) = rules.max_items {
                    bag.insert("maxItems".into(), Value::from(n));
                }
            }
        }
        (!bag.is_empty()).then_some(bag)
    }
}

fn number_rule(bag: &Map<String, Value>, key: &str) -> Option<f64> {
    let raw = bag.get(key)?;
    let parsed = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Null => return None,
        _ => None,
    };
    if parsed.is_none() {
        warn!("Ignoring non-numeric validation rule {}={}", key, raw);
    }
    parsed.filter(|n| n.is_finite())
}

fn count_rule(bag: &Map<String, Value>, key: &str) -> Option<usize> {
    number_rule(bag, key).filter(|n| *n >= 0.0).map(|n| n.floor() as usize)
}

/// One configurable property of a resource type on a cloud provider.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(from = "PropertySchemaRecord", into = "PropertySchemaRecord")]
pub struct PropertySchema {
    pub id: String,
    pub mapping_id: String,
    pub property_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub required: bool,
    pub default_value: Option<PropertyValue>,
    pub rules: ValidationRules,
    pub display_order: Option<i32>,
}

impl PropertySchema {
    pub fn new(property_name: impl Into<String>, display_name: impl Into<String>, rules: ValidationRules) -> Self {
        Self {
            id: String::new(),
            mapping_id: String::new(),
            property_name: property_name.into(),
            display_name: display_name.into(),
            description: None,
            required: false,
            default_value: None,
            rules,
            display_order: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_mapping(mut self, mapping_id: impl Into<String>) -> Self {
        self.mapping_id = mapping_id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_default(mut self, value: impl Into<PropertyValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn with_display_order(mut self, order: i32) -> Self {
        self.display_order = Some(order);
        self
    }

    pub fn data_type(&self) -> DataType {
        self.rules.data_type()
    }
}

/// JSON shape of a property schema as exchanged with the backend.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchemaRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_id: Option<String>,
    pub property_name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub data_type: DataType,
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
}

impl From<PropertySchemaRecord> for PropertySchema {
    fn from(record: PropertySchemaRecord) -> Self {
        let default_value = match record.default_value {
            None | Some(Value::Null) => None,
            Some(raw) => {
                let parsed = PropertyValue::from_json(&raw);
                if parsed.is_none() {
                    warn!("Ignoring unsupported default value for '{}': {}", record.property_name, raw);
                }
                parsed
            }
        };
        let display_name = record
            .display_name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| record.property_name.clone());

        PropertySchema {
            id: record.id.unwrap_or_default(),
            mapping_id: record.mapping_id.unwrap_or_default(),
            rules: ValidationRules::from_wire(record.data_type, record.validation_rules.as_ref()),
            property_name: record.property_name,
            display_name,
            description: record.description,
            required: record.required.unwrap_or(false),
            default_value,
            display_order: record.display_order,
        }
    }
}

impl From<PropertySchema> for PropertySchemaRecord {
    fn from(schema: PropertySchema) -> Self {
        PropertySchemaRecord {
            id: Some(schema.id).filter(|id| !id.is_empty()),
            mapping_id: Some(schema.mapping_id).filter(|id| !id.is_empty()),
            property_name: schema.property_name,
            display_name: Some(schema.display_name),
            description: schema.description,
            data_type: schema.rules.data_type(),
            required: Some(schema.required),
            default_value: schema.default_value.as_ref().map(PropertyValue::to_json),
            validation_rules: schema.rules.to_wire(),
            display_order: schema.display_order,
        }
    }
}

/// Partial update of a property schema. Only `Some` fields are sent.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PropertySchemaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<PropertyValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_rules: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_order: Option<i32>,
}

impl PropertySchemaPatch {
    pub fn display_order(order: i32) -> Self {
        Self { display_order: Some(order), ..Default::default() }
    }

    /// Replaces type and rules together so they cannot drift apart.
    pub fn with_rules(mut self, rules: &ValidationRules) -> Self {
        self.data_type = Some(rules.data_type());
        self.validation_rules = Some(rules.to_wire().unwrap_or_default());
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Association of a resource type with a cloud provider. Owns a set of property schemas.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTypeCloudMapping {
    pub id: String,
    pub resource_type_id: String,
    #[serde(default)]
    pub resource_type_name: Option<String>,
    pub cloud_provider_id: String,
    #[serde(default)]
    pub cloud_provider_name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CloudProvider {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
