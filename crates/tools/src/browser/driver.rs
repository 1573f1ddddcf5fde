//! The page surface the tools drive, and the launcher that produces it.
//!
//! The agent only ever talks to these traits; the CDP-backed implementation
//! lives in [`super::session`].

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use voicewrite_core::Result;

/// How long click and type wait for their selector to appear.
pub const SELECTOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Duration of the eased scroll animation.
pub const SCROLL_ANIMATION: Duration = Duration::from_millis(1500);

/// Plays synthesized speech inside the page.
#[async_trait]
pub trait AudioBridge: Send + Sync {
    /// Hand a base64 audio payload to the page's playback hook. Returns
    /// `false` when the page has no hook installed.
    async fn play_audio(&self, payload: &str) -> Result<bool>;
}

/// A single controllable browser page.
#[async_trait]
pub trait PageDriver: AudioBridge {
    async fn goto(&self, url: &str) -> Result<()>;

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Replace the value of the matched input with `text`.
    async fn fill(&self, selector: &str, text: &str, timeout: Duration) -> Result<()>;

    /// PNG bytes of the visible viewport.
    async fn screenshot_png(&self) -> Result<Vec<u8>>;

    /// Scroll vertically by `delta_y` pixels with an ease-in-out animation
    /// lasting `duration`. Resolves once the animation has finished.
    async fn smooth_scroll(&self, delta_y: i64, duration: Duration) -> Result<()>;

    /// Run `script` in the page. `None` stands for a JavaScript `undefined`.
    async fn evaluate(&self, script: &str) -> Result<Option<Value>>;

    /// Compact text rendering of the page's accessibility tree.
    async fn accessibility_snapshot(&self) -> Result<String>;

    /// Release the page and the browser behind it.
    async fn close(&self);
}

/// Starts a browser and hands back its page.
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn PageDriver>>;
}
