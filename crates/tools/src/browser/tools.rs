//! The `browser_*` tools. Each one checks its arguments, says what it is
//! about to do, and performs one page action.

use super::driver::{SCROLL_ANIMATION, SELECTOR_TIMEOUT};
use crate::{
    required_str, ContentItem, Narration, NarrationSync, Tool, ToolContext, ToolOutput, ToolSchema,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use voicewrite_core::{ActionCategory, Error, Result};

const DEFAULT_SCROLL_AMOUNT: f64 = 500.0;
const TYPE_SETTLE: Duration = Duration::from_millis(300);

pub struct NavigateTool;

#[async_trait]
impl Tool for NavigateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "browser_navigate",
            description: "Navigates to a URL. Narrates the action based on mode setting.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "url": { "type": "string", "description": "The URL to navigate to" }
                },
                "required": ["url"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "url", "URL is required").map(|_| ())
    }

    fn narration(&self, params: &Value) -> Result<Option<Narration>> {
        let url = required_str(params, "url", "URL is required")?;
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::Action(format!("Invalid URL \"{}\": {}", url, e)))?;
        // Opaque URLs (about:, data:) have no host; speak the whole thing.
        let target = parsed.host_str().unwrap_or(url);
        Ok(Some(Narration::awaited(
            format!("Navigating to {}", target),
            ActionCategory::Navigate,
        )))
    }

    async fn execute(&self, ctx: &ToolContext, params: &Value) -> Result<ToolOutput> {
        let url = required_str(params, "url", "URL is required")?;
        ctx.page.goto(url).await?;
        Ok(ToolOutput::text(format!("Navigated to {}", url)))
    }
}

pub struct ClickTool;

#[async_trait]
impl Tool for ClickTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "browser_click",
            description: "Clicks an element. Narrates the action based on mode setting.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "selector": { "type": "string", "description": "CSS selector" },
                    "narration": { "type": "string", "description": "Optional custom spoken text" }
                },
                "required": ["selector"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "selector", "Selector is required").map(|_| ())
    }

    fn narration(&self, params: &Value) -> Result<Option<Narration>> {
        let selector = required_str(params, "selector", "Selector is required")?;
        let text = params
            .get("narration")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Clicking {}", selector));
        Ok(Some(Narration::awaited(text, ActionCategory::Click)))
    }

    async fn execute(&self, ctx: &ToolContext, params: &Value) -> Result<ToolOutput> {
        let selector = required_str(params, "selector", "Selector is required")?;
        ctx.page.click(selector, SELECTOR_TIMEOUT).await?;
        Ok(ToolOutput::text(format!("Clicked {}", selector)))
    }
}

pub struct TypeTool;

impl TypeTool {
    fn args(params: &Value) -> Result<(&str, &str)> {
        let selector = params
            .get("selector")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty());
        // Whitespace is legitimate text to type.
        let text = params
            .get("text")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty());
        match (selector, text) {
            (Some(selector), Some(text)) => Ok((selector, text)),
            _ => Err(Error::Validation(
                "Selector and text are required".to_string(),
            )),
        }
    }
}

#[async_trait]
impl Tool for TypeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "browser_type",
            description: "Types text into a field. Narrates the action based on mode setting.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "selector": { "type": "string", "description": "CSS selector" },
                    "text": { "type": "string", "description": "Text to type" }
                },
                "required": ["selector", "text"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        Self::args(params).map(|_| ())
    }

    fn narration(&self, params: &Value) -> Result<Option<Narration>> {
        let (selector, _) = Self::args(params)?;
        Ok(Some(Narration {
            text: format!("Typing into {}", selector),
            category: ActionCategory::Type,
            sync: NarrationSync::Detached,
            settle: TYPE_SETTLE,
        }))
    }

    async fn execute(&self, ctx: &ToolContext, params: &Value) -> Result<ToolOutput> {
        let (selector, text) = Self::args(params)?;
        ctx.page.fill(selector, text, SELECTOR_TIMEOUT).await?;
        Ok(ToolOutput::text(format!("Typed text into {}", selector)))
    }
}

pub struct ScreenshotTool;

#[async_trait]
impl Tool for ScreenshotTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "browser_screenshot",
            description: "Takes a screenshot and returns it as an image.",
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    fn validate(&self, _params: &Value) -> Result<()> {
        Ok(())
    }

    fn narration(&self, _params: &Value) -> Result<Option<Narration>> {
        Ok(Some(Narration::awaited(
            "Taking a screenshot",
            ActionCategory::Screenshot,
        )))
    }

    async fn execute(&self, ctx: &ToolContext, _params: &Value) -> Result<ToolOutput> {
        let png = ctx.page.screenshot_png().await?;
        debug!(bytes = png.len(), "Screenshot captured");
        Ok(ToolOutput {
            content: vec![
                ContentItem::Image {
                    data: BASE64.encode(&png),
                    mime_type: "image/png".to_string(),
                },
                ContentItem::text(format!("Screenshot taken ({} bytes)", png.len())),
            ],
            snapshot: false,
        })
    }
}

pub struct ScrollTool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScrollDirection {
    Up,
    Down,
}

impl ScrollDirection {
    fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl ScrollTool {
    fn args(params: &Value) -> Result<(ScrollDirection, i64)> {
        let direction = match required_str(params, "direction", "Direction is required")? {
            "up" => ScrollDirection::Up,
            "down" => ScrollDirection::Down,
            other => {
                return Err(Error::Validation(format!(
                    "Direction must be \"up\" or \"down\", got \"{}\"",
                    other
                )))
            }
        };
        let amount = match params.get("amount") {
            None | Some(Value::Null) => DEFAULT_SCROLL_AMOUNT,
            Some(v) => match v.as_f64() {
                Some(n) if n == 0.0 => DEFAULT_SCROLL_AMOUNT,
                Some(n) if n.is_finite() && n > 0.0 => n,
                _ => {
                    return Err(Error::Validation(
                        "Amount must be a positive number of pixels".to_string(),
                    ))
                }
            },
        };
        Ok((direction, amount.round() as i64))
    }
}

#[async_trait]
impl Tool for ScrollTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "browser_scroll",
            description: "Scrolls the page up or down.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "direction": { "type": "string", "enum": ["up", "down"], "description": "Scroll direction" },
                    "amount": { "type": "number", "description": "Pixels to scroll (default: 500)" }
                },
                "required": ["direction"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        Self::args(params).map(|_| ())
    }

    fn narration(&self, params: &Value) -> Result<Option<Narration>> {
        let (direction, _) = Self::args(params)?;
        Ok(Some(Narration::awaited(
            format!("Scrolling {}", direction.name()),
            ActionCategory::Scroll,
        )))
    }

    async fn execute(&self, ctx: &ToolContext, params: &Value) -> Result<ToolOutput> {
        let (direction, amount) = Self::args(params)?;
        let delta = match direction {
            ScrollDirection::Up => -amount,
            ScrollDirection::Down => amount,
        };
        ctx.page.smooth_scroll(delta, SCROLL_ANIMATION).await?;
        Ok(ToolOutput::text(format!(
            "Scrolled {} by {}px",
            direction.name(),
            amount
        )))
    }
}

pub struct EvaluateTool;

#[async_trait]
impl Tool for EvaluateTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "browser_evaluate",
            description: "Executes JavaScript in the browser context.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "script": { "type": "string", "description": "JavaScript code to execute" }
                },
                "required": ["script"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        required_str(params, "script", "Script is required").map(|_| ())
    }

    async fn execute(&self, ctx: &ToolContext, params: &Value) -> Result<ToolOutput> {
        let script = required_str(params, "script", "Script is required")?;
        debug!(len = script.len(), "Executing JavaScript");
        let rendered = match ctx.page.evaluate(script).await? {
            Some(value) => value.to_string(),
            None => "undefined".to_string(),
        };
        Ok(ToolOutput::text(format!(
            "Script executed. Result: {}",
            rendered
        )))
    }
}
