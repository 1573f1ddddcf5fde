//! Runs one tool call end to end: lookup, validation, session, narration,
//! settle, action, snapshot.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use voicewrite_core::{ActionCategory, Config, Result};
use voicewrite_tools::browser::snapshot::truncate_snapshot;
use voicewrite_tools::narration::{
    HttpSpeechBackend, Narrator, RetryPolicy, SpeechClient, SpeechRateLimiter,
};
use voicewrite_tools::{
    truncate_chars, ContentItem, Launcher, Narration, NarrationSync, PageDriver, Tool, ToolContext,
    ToolOutput, ToolRegistry, ToolResult,
};

use crate::session::SessionSlot;

/// Characters of an error message repeated in the spoken error.
const SPOKEN_ERROR_CHARS: usize = 50;

const SNAPSHOT_UNAVAILABLE: &str = "Snapshot unavailable.";

pub struct Dispatcher {
    registry: ToolRegistry,
    narrator: Arc<Narrator>,
    session: SessionSlot,
    /// One page action at a time, whatever the transport does.
    exec_lock: Mutex<()>,
    await_all_narration: bool,
}

impl Dispatcher {
    pub fn new(config: &Config, launcher: Arc<dyn Launcher>) -> Result<Self> {
        let backend = HttpSpeechBackend::from_config(config)?;
        debug!(endpoint = backend.endpoint(), "Speech backend configured");
        let speech = SpeechClient::new(
            Arc::new(backend),
            Arc::new(SpeechRateLimiter::default()),
            RetryPolicy::default(),
        );
        let narrator = Narrator::new(config.narration_policy(), Arc::new(speech));
        Ok(Self::with_parts(
            ToolRegistry::with_defaults(),
            Arc::new(narrator),
            launcher,
            config.await_all_narration,
        ))
    }

    pub fn with_parts(
        registry: ToolRegistry,
        narrator: Arc<Narrator>,
        launcher: Arc<dyn Launcher>,
        await_all_narration: bool,
    ) -> Self {
        Self {
            registry,
            narrator,
            session: SessionSlot::new(launcher),
            exec_lock: Mutex::new(()),
            await_all_narration,
        }
    }

    pub fn list_tools(&self) -> Vec<Value> {
        self.registry.list_tools()
    }

    /// Execute `name` with `args`.
    ///
    /// Tool failures come back as `Ok` results with `is_error` set. `Err` is
    /// reserved for failures to bring up the browser, which the caller
    /// reports as a protocol error.
    pub async fn call_tool(&self, name: &str, args: Value) -> Result<ToolResult> {
        let Some(tool) = self.registry.get(name).cloned() else {
            warn!(tool = name, "Unknown tool");
            return Ok(failure(name, &format!("Unknown tool: {}", name)));
        };
        if let Err(e) = tool.validate(&args) {
            warn!(tool = name, "Rejected arguments: {}", e);
            return Ok(failure(name, &e.to_string()));
        }

        let _turn = self.exec_lock.lock().await;
        let page = self.session.ensure().await?;

        info!(tool = name, "Executing tool");
        match self.run(tool.as_ref(), &page, &args).await {
            Ok(output) => Ok(self.finish(output, &page).await),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                let message = e.to_string();
                error!(tool = name, "Error executing {}: {}", name, message);
                let spoken = format!(
                    "I encountered an error: {}",
                    truncate_chars(&message, SPOKEN_ERROR_CHARS)
                );
                self.narrator
                    .narrate(page.as_ref(), &spoken, ActionCategory::Error)
                    .await;
                Ok(failure(name, &message))
            }
        }
    }

    /// Close the browser, if one was started.
    pub async fn shutdown(&self) {
        let _turn = self.exec_lock.lock().await;
        self.session.teardown().await;
    }

    async fn run(
        &self,
        tool: &dyn Tool,
        page: &Arc<dyn PageDriver>,
        args: &Value,
    ) -> Result<ToolOutput> {
        if let Some(narration) = tool.narration(args)? {
            self.announce(narration, page).await;
        }
        let ctx = ToolContext { page: page.clone() };
        tool.execute(&ctx, args).await
    }

    /// Speak the narration (awaited or in the background), then settle.
    /// With voice off there is neither speech nor settle.
    async fn announce(&self, narration: Narration, page: &Arc<dyn PageDriver>) {
        if !self.narrator.policy().enabled() {
            return;
        }
        let settle = narration.settle;
        let sync = if self.await_all_narration {
            NarrationSync::Await
        } else {
            narration.sync
        };

        match sync {
            NarrationSync::Await => {
                self.narrator
                    .narrate(page.as_ref(), &narration.text, narration.category)
                    .await
            }
            NarrationSync::Detached => {
                let narrator = self.narrator.clone();
                let page = page.clone();
                tokio::spawn(async move {
                    narrator
                        .narrate(page.as_ref(), &narration.text, narration.category)
                        .await;
                });
            }
        }
        tokio::time::sleep(settle).await;
    }

    async fn finish(&self, output: ToolOutput, page: &Arc<dyn PageDriver>) -> ToolResult {
        let mut content = output.content;
        if output.snapshot {
            let snapshot = match page.accessibility_snapshot().await {
                Ok(text) if !text.trim().is_empty() => truncate_snapshot(&text),
                Ok(_) => SNAPSHOT_UNAVAILABLE.to_string(),
                Err(e) => {
                    debug!("Snapshot failed: {}", e);
                    SNAPSHOT_UNAVAILABLE.to_string()
                }
            };
            content.push(ContentItem::text(format!(
                "\nAccessibility Snapshot:\n{}",
                snapshot
            )));
        }
        ToolResult::success(content)
    }
}

fn failure(tool: &str, message: &str) -> ToolResult {
    ToolResult::error(format!("Error executing {}: {}", tool, message))
}
