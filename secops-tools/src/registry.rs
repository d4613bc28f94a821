use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::RegistryError;
use crate::spec::{InputMode, ToolSpec, ValueKind};

/// Read-only table of tool contracts, built once at startup and shared.
#[derive(Debug, Clone, Default)]
pub struct ToolSpecRegistry {
    tools: HashMap<String, Arc<ToolSpec>>,
    /// Registration order, used for stable listings.
    order: Vec<String>,
}

impl ToolSpecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ToolSpec) -> Result<&mut Self, RegistryError> {
        spec.validate()?;
        if self.tools.contains_key(&spec.name) {
            return Err(RegistryError::DuplicateTool(spec.name));
        }
        info!("Registered tool: {} (binary: {})", spec.name, spec.binary);
        self.order.push(spec.name.clone());
        self.tools.insert(spec.name.clone(), Arc::new(spec));
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<Arc<ToolSpec>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<String> {
        self.order.clone()
    }

    pub fn specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name).map(|spec| spec.as_ref()))
    }

    pub fn count(&self) -> usize {
        self.tools.len()
    }

    /// Points a tool at a different executable.
    pub fn override_binary(&mut self, name: &str, binary: &str) -> Result<(), RegistryError> {
        let spec = self.spec_mut(name)?;
        if binary.trim().is_empty() {
            return Err(RegistryError::invalid(name, "empty binary override"));
        }
        spec.binary = binary.to_string();
        Ok(())
    }

    fn spec_mut(&mut self, name: &str) -> Result<&mut ToolSpec, RegistryError> {
        self.tools
            .get_mut(name)
            .map(Arc::make_mut)
            .ok_or_else(|| RegistryError::UnknownTool(name.to_string()))
    }

    /// Function-calling schemas for the host registration layer.
    pub fn schemas(&self) -> Vec<Value> {
        self.specs()
            .map(|spec| {
                json!({
                    "type": "function",
                    "function": {
                        "name": spec.name,
                        "description": spec.description,
                        "parameters": parameter_schema(spec)
                    }
                })
            })
            .collect()
    }
}

fn parameter_schema(spec: &ToolSpec) -> Value {
    let mut targets = json!({
        "type": "array",
        "items": {"type": "string"},
        "minItems": 1,
        "description": "Targets to scan"
    });
    if !spec.supports(InputMode::List) {
        targets["maxItems"] = json!(1);
    }

    let mut properties = Map::new();
    properties.insert("targets".to_string(), targets);

    let mut required = vec![json!("targets")];
    for flag in &spec.flag_templates {
        let mut property = json!({
            "type": flag.kind.json_type(),
            "description": flag.description,
        });
        match &flag.kind {
            ValueKind::Choice(values) => property["enum"] = json!(values),
            ValueKind::ChoiceList(values) => {
                property["items"] = json!({"type": "string", "enum": values})
            }
            ValueKind::IntegerList { min, max } => {
                property["items"] = json!({"type": "integer", "minimum": min, "maximum": max})
            }
            ValueKind::Integer { min, max } => {
                property["minimum"] = json!(min);
                property["maximum"] = json!(max);
            }
            ValueKind::TextList => property["items"] = json!({"type": "string"}),
            ValueKind::Pattern(pattern) => property["pattern"] = json!(pattern.as_str()),
            _ => {}
        }
        if let Some(default) = &flag.default {
            property["default"] = default.clone();
        }
        if flag.required {
            required.push(json!(flag.name));
        }
        properties.insert(flag.name.clone(), property);
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}
