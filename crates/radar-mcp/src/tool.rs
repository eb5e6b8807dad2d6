//! Tool metadata and call results as reported by an MCP server.

use serde::Deserialize;

/// A tool advertised by `tools/list`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, rename = "inputSchema")]
    pub input_schema: Option<serde_json::Value>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: serde_json::Value) -> Self {
        self.input_schema = Some(schema);
        self
    }
}

/// A content block in a `tools/call` result.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ToolContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    #[serde(other)]
    Other,
}

/// Decoded `tools/call` result.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(default, rename = "isError")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Concatenate the text blocks in order. Non-text blocks are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ToolContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Deserialize)]
pub(crate) struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_descriptor_with_schema() {
        let json = r#"{
            "name": "navigate_page",
            "description": "Open a URL",
            "inputSchema": {
                "type": "object",
                "properties": {"url": {"type": "string"}},
                "required": ["url"]
            }
        }"#;
        let tool: ToolDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(tool.name, "navigate_page");
        assert_eq!(tool.description, "Open a URL");
        assert_eq!(tool.input_schema.unwrap()["required"][0], "url");
    }

    #[test]
    fn deserialize_descriptor_without_description_or_schema() {
        let tool: ToolDescriptor = serde_json::from_str(r#"{"name": "take_snapshot"}"#).unwrap();
        assert_eq!(tool.description, "");
        assert!(tool.input_schema.is_none());
    }

    #[test]
    fn text_concatenates_without_separator() {
        let json = r#"{
            "content": [
                {"type": "text", "text": "Hello, "},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "text", "text": "world"}
            ]
        }"#;
        let result: ToolCallResult = serde_json::from_str(json).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "Hello, world");
    }

    #[test]
    fn unknown_block_types_are_tolerated() {
        let json = r#"{
            "content": [
                {"type": "resource", "resource": {"uri": "file:///x"}},
                {"type": "text", "text": "ok"}
            ],
            "isError": true
        }"#;
        let result: ToolCallResult = serde_json::from_str(json).unwrap();
        assert!(result.is_error);
        assert_eq!(result.content[0], ToolContent::Other);
        assert_eq!(result.text(), "ok");
    }

    #[test]
    fn missing_content_is_empty() {
        let result: ToolCallResult = serde_json::from_str("{}").unwrap();
        assert!(result.content.is_empty());
        assert_eq!(result.text(), "");
    }

    #[test]
    fn tools_list_tolerates_missing_array() {
        let list: ToolsListResult = serde_json::from_str("{}").unwrap();
        assert!(list.tools.is_empty());
    }
}
