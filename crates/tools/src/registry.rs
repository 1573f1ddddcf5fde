use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::browser::{ClickTool, EvaluateTool, NavigateTool, ScreenshotTool, ScrollTool, TypeTool};
use crate::Tool;

/// Tools by name. `tools/list` reports them in registration order.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(NavigateTool));
        registry.register(Arc::new(ClickTool));
        registry.register(Arc::new(TypeTool));
        registry.register(Arc::new(ScreenshotTool));
        registry.register(Arc::new(ScrollTool));
        registry.register(Arc::new(EvaluateTool));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name.to_string();
        debug!(name = %name, "Registering tool");
        if self.tools.insert(name.clone(), tool).is_some() {
            warn!(name = %name, "Tool registered twice, keeping the latest");
        } else {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }

    /// Catalog entries in the `tools/list` shape.
    pub fn list_tools(&self) -> Vec<Value> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                let schema = tool.schema();
                json!({
                    "name": schema.name,
                    "description": schema.description,
                    "inputSchema": schema.parameters,
                })
            })
            .collect()
    }
}
