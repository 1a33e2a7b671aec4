// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tool, resource, and prompt descriptors returned by the `*/list` methods.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    /// Short description; for the full story, point readers at the
    /// matching `about` tool rather than inlining prose here.
    pub description: String,
    pub input_schema: Value,
    pub streaming: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
    Json { value: Value },
}

/// Result of a non-streaming `tools/call`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallToolResult {
    pub content: Vec<ContentItem>,
    pub is_error: bool,
}

impl CallToolResult {
    pub fn ok_text(text: impl Into<String>) -> Self {
        Self { content: vec![ContentItem::Text { text: text.into() }], is_error: false }
    }

    pub fn ok_json(value: Value) -> Self {
        Self { content: vec![ContentItem::Json { value }], is_error: false }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { content: vec![ContentItem::Text { text: message.into() }], is_error: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_text_is_not_an_error() {
        let r = CallToolResult::ok_text("done");
        assert!(!r.is_error);
        assert_eq!(r.content.len(), 1);
    }

    #[test]
    fn error_result_sets_flag() {
        let r = CallToolResult::error("boom");
        assert!(r.is_error);
    }
}
