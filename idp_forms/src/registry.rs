use crate::schema::DataType;
use crate::traits::ElementRenderer;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TypeMappingConfig {
    pub mappings: HashMap<DataType, DefaultFieldConfig>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DefaultFieldConfig {
    pub component: String,
    #[serde(default)]
    pub default_props: Value,
}

impl DefaultFieldConfig {
    pub fn component(name: &str) -> Self {
        Self { component: name.to_string(), default_props: Value::Null }
    }
}

#[derive(Default)]
pub struct TypeRegistry {
    /// Maps data types (e.g. LIST) to default configs (e.g. component="select-input")
    mapping: HashMap<DataType, DefaultFieldConfig>,
    /// Maps component names (e.g. "select-input") to actual renderers
    element_renderers: HashMap<String, Arc<dyn ElementRenderer>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the standard data type to component mapping.
    pub fn with_default_mappings() -> Self {
        let mut registry = Self::new();
        registry.load_from_config(TypeMappingConfig {
            mappings: [
                (DataType::String, DefaultFieldConfig::component("text-input")),
                (DataType::Number, DefaultFieldConfig::component("number-input")),
                (DataType::Boolean, DefaultFieldConfig::component("checkbox")),
                (DataType::List, DefaultFieldConfig::component("select-input")),
            ]
            .into_iter()
            .collect(),
        });
        registry
    }

    pub fn load_from_config(&mut self, config: TypeMappingConfig) {
        self.mapping.extend(config.mappings);
    }

    pub fn resolve_component_config(&self, data_type: DataType) -> Option<&DefaultFieldConfig> {
        self.mapping.get(&data_type)
    }

    pub fn register_element_renderer(&mut self, name: &str, renderer: Arc<dyn ElementRenderer>) {
        self.element_renderers.insert(name.to_string(), renderer);
    }

    pub fn get_element_renderer(&self, component_name: &str) -> Option<Arc<dyn ElementRenderer>> {
        self.element_renderers.get(component_name).cloned()
    }
}
