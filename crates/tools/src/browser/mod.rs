//! Browser automation over the Chrome DevTools Protocol.
//!
//! - `driver`: the page surface tools act on (`PageDriver`, `Launcher`)
//! - `session`: the Chrome process + CDP implementation of it
//! - `snapshot`: accessibility tree rendering
//! - `overlay`: in-page speaking indicator and audio hook
//! - `tools`: the six `browser_*` tools

pub mod cdp;
pub mod driver;
pub mod overlay;
pub mod session;
pub mod snapshot;
pub mod tools;

pub use driver::{AudioBridge, Launcher, PageDriver};
pub use session::{BrowserSession, ChromeLauncher, LaunchOptions};
pub use tools::{ClickTool, EvaluateTool, NavigateTool, ScreenshotTool, ScrollTool, TypeTool};
