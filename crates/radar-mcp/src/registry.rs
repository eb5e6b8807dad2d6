//! The set of tools a session exposes to the model.

use crate::tool::ToolDescriptor;
use radar_types::FunctionSpec;

/// Ordered collection of tool descriptors, unique by name.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Build a registry, keeping the first descriptor for any repeated name.
    pub fn new(tools: Vec<ToolDescriptor>) -> Self {
        let mut unique: Vec<ToolDescriptor> = Vec::with_capacity(tools.len());
        for tool in tools {
            if unique.iter().any(|t| t.name == tool.name) {
                tracing::warn!("Ignoring duplicate tool '{}'", tool.name);
                continue;
            }
            unique.push(tool);
        }
        Self { tools: unique }
    }

    /// Restrict the registry to `allowed`, preserving server order.
    ///
    /// `None` keeps every tool.
    pub fn filter(self, allowed: Option<&[String]>) -> Self {
        let Some(allowed) = allowed else {
            return self;
        };

        for name in allowed {
            if !self.tools.iter().any(|t| &t.name == name) {
                tracing::warn!("Allowed tool '{name}' is not offered by the MCP server");
            }
        }

        let tools = self
            .tools
            .into_iter()
            .filter(|t| allowed.contains(&t.name))
            .collect();
        Self { tools }
    }

    /// Function definitions in the shape the model API expects.
    pub fn to_model_schema(&self) -> Vec<FunctionSpec> {
        self.tools
            .iter()
            .map(|t| FunctionSpec {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: parameters_or_default(t.input_schema.as_ref()),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn parameters_or_default(schema: Option<&serde_json::Value>) -> serde_json::Value {
    match schema {
        Some(serde_json::Value::Null) | None => empty_object_schema(),
        Some(serde_json::Value::Object(map)) if map.is_empty() => empty_object_schema(),
        Some(schema) => schema.clone(),
    }
}

fn empty_object_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}
