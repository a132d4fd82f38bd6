use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One content block of an Anthropic message, covering the three shapes the
/// tool-calling loop has to round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageParam {
    pub role: String,
    pub content: Vec<ContentBlock>,
}

impl MessageParam {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![ContentBlock::Text { text: text.into() }],
        }
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self {
            role: "assistant".to_string(),
            content,
        }
    }

    pub fn user(content: Vec<ContentBlock>) -> Self {
        Self {
            role: "user".to_string(),
            content,
        }
    }
}

/// Request parameters for one Messages API call.
#[derive(Debug, Clone)]
pub struct MessagesRequest {
    pub system: String,
    pub messages: Vec<MessageParam>,
    /// Tool definitions; `tool_choice: auto` is attached whenever present.
    pub tools: Option<Vec<Value>>,
    pub temperature: f64,
    pub max_tokens: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub stop_reason: Option<String>,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl ModelResponse {
    pub fn wants_tools(&self) -> bool {
        self.stop_reason.as_deref() == Some("tool_use")
    }

    /// Text of the first text block, which is how final answers arrive.
    pub fn first_text(&self) -> String {
        self.content
            .iter()
            .find_map(|block| match block {
                ContentBlock::Text { text } => Some(text.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }
}
