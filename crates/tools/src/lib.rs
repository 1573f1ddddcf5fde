pub mod browser;
pub mod narration;
pub mod registry;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use voicewrite_core::{ActionCategory, Error, Result};

pub use browser::{Launcher, PageDriver};
pub use registry::ToolRegistry;

/// Settle delay after a narration, before the action runs.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(500);

/// One item of a tool result's `content` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } => None,
        }
    }
}

/// Structured result of a `tools/call`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub content: Vec<ContentItem>,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(content: Vec<ContentItem>) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: true,
        }
    }

    /// All text items joined by newlines.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentItem::as_text)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// What a tool hands back to the dispatcher on success.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub content: Vec<ContentItem>,
    /// Append an accessibility snapshot of the page after the action.
    pub snapshot: bool,
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            snapshot: true,
        }
    }
}

/// Whether the action waits for its narration to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NarrationSync {
    Await,
    /// Narration runs in the background while the action proceeds.
    Detached,
}

/// Pre-action narration for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Narration {
    pub text: String,
    pub category: ActionCategory,
    pub sync: NarrationSync,
    /// Pause between narration start and the action. Skipped when voice
    /// is off.
    pub settle: Duration,
}

impl Narration {
    pub fn awaited(text: impl Into<String>, category: ActionCategory) -> Self {
        Self {
            text: text.into(),
            category,
            sync: NarrationSync::Await,
            settle: DEFAULT_SETTLE,
        }
    }
}

#[derive(Clone)]
pub struct ToolContext {
    pub page: Arc<dyn PageDriver>,
}

pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;

    /// Argument checks that need no browser. Failing here means the call is
    /// answered without narration or session start.
    fn validate(&self, params: &Value) -> Result<()>;

    /// Narration to speak before the action, if any.
    fn narration(&self, _params: &Value) -> Result<Option<Narration>> {
        Ok(None)
    }

    async fn execute(&self, ctx: &ToolContext, params: &Value) -> Result<ToolOutput>;
}

/// Non-empty string argument, or a validation error with `message`.
pub fn required_str<'a>(params: &'a Value, key: &str, message: &str) -> Result<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| Error::Validation(message.to_string()))
}

/// Truncate to at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
