//! Chrome-backed page session.
//!
//! [`ChromeLauncher`] starts a Chrome/Chromium process with a remote
//! debugging port, attaches a [`CdpClient`] to its first page target and
//! returns a [`BrowserSession`] implementing [`PageDriver`].

use super::cdp::CdpClient;
use super::driver::{AudioBridge, Launcher, PageDriver};
use super::overlay::{play_expression, OVERLAY_SCRIPT};
use super::snapshot::{parse_ax_tree, render_tree};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use voicewrite_core::{Config, Error, Paths, Result};

pub const VIEWPORT: (u32, u32) = (1280, 800);

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const CDP_READY_TIMEOUT: Duration = Duration::from_secs(15);
const DOCUMENT_READY_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub overlay: bool,
    pub profile_dir: PathBuf,
}

impl LaunchOptions {
    pub fn from_config(config: &Config, paths: &Paths) -> Self {
        Self {
            headless: config.headless,
            overlay: config.overlay,
            profile_dir: paths.profile_dir(&std::process::id().to_string()),
        }
    }
}

pub struct ChromeLauncher {
    options: LaunchOptions,
}

impl ChromeLauncher {
    pub fn new(options: LaunchOptions) -> Self {
        Self { options }
    }

    async fn start(&self) -> Result<BrowserSession> {
        let binary = find_browser_binary().ok_or_else(|| {
            Error::Session("Chrome or Chromium not found. Please install it.".to_string())
        })?;
        std::fs::create_dir_all(&self.options.profile_dir).map_err(|e| {
            Error::Session(format!(
                "failed to create profile dir {}: {}",
                self.options.profile_dir.display(),
                e
            ))
        })?;

        let port = find_free_port().await?;
        let args = build_browser_args(port, &self.options.profile_dir, self.options.headless);
        info!(
            port,
            headless = self.options.headless,
            binary = %binary,
            "Launching browser"
        );

        // kill_on_drop covers every early return below.
        let child = Command::new(&binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Session(format!("failed to start {}: {}", binary, e)))?;

        wait_for_cdp_ready(port).await?;
        let page_ws_url = get_page_ws_url(port).await?;
        let cdp = CdpClient::connect(&page_ws_url).await?;

        for domain in ["Page", "Runtime", "DOM", "Accessibility"] {
            cdp.enable_domain(domain).await?;
        }
        cdp.set_viewport(VIEWPORT.0, VIEWPORT.1).await?;
        cdp.set_user_agent(USER_AGENT).await?;

        if self.options.overlay {
            cdp.add_init_script(OVERLAY_SCRIPT).await?;
            // about:blank is already loaded; install there too.
            if let Err(e) = cdp.evaluate(OVERLAY_SCRIPT, false).await {
                debug!("overlay install on blank page failed: {}", e);
            }
        }

        info!(ws_url = %page_ws_url, "CDP connection established");
        Ok(BrowserSession {
            cdp,
            process: Mutex::new(Some(child)),
            profile_dir: self.options.profile_dir.clone(),
        })
    }
}

#[async_trait]
impl Launcher for ChromeLauncher {
    async fn launch(&self) -> Result<Arc<dyn PageDriver>> {
        let session = self.start().await.map_err(|e| match e {
            Error::Session(_) => e,
            other => Error::Session(other.to_string()),
        })?;
        let page: Arc<dyn PageDriver> = Arc::new(session);
        Ok(page)
    }
}

/// A live Chrome page.
pub struct BrowserSession {
    cdp: CdpClient,
    process: Mutex<Option<Child>>,
    profile_dir: PathBuf,
}

impl BrowserSession {
    /// Evaluate and unwrap the returned value, turning a thrown exception
    /// into an action error.
    async fn eval(&self, expression: &str, await_promise: bool) -> Result<Option<Value>> {
        let response = self.cdp.evaluate(expression, await_promise).await?;
        if let Some(details) = response.get("exceptionDetails") {
            return Err(Error::Action(exception_message(details)));
        }
        let result = response.get("result").cloned().unwrap_or(Value::Null);
        if result.get("type").and_then(|t| t.as_str()) == Some("undefined") {
            return Ok(None);
        }
        Ok(Some(result.get("value").cloned().unwrap_or(Value::Null)))
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let probe = format!("!!document.querySelector({})", Value::from(selector));
        let deadline = Instant::now() + timeout;
        loop {
            match self.eval(&probe, false).await {
                Ok(Some(Value::Bool(true))) => return Ok(()),
                Ok(_) => {}
                // A malformed selector throws; waiting longer will not help.
                Err(Error::Action(msg)) => return Err(Error::Action(msg)),
                Err(e) => debug!("selector probe failed: {}", e),
            }
            if Instant::now() >= deadline {
                return Err(Error::Action(format!(
                    "Timeout {}ms exceeded waiting for selector \"{}\"",
                    timeout.as_millis(),
                    selector
                )));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Wait until the new document has parsed. Evaluation can fail while the
    /// old context is being torn down, so errors just mean "keep polling".
    async fn wait_for_document(&self) {
        let deadline = Instant::now() + DOCUMENT_READY_TIMEOUT;
        while Instant::now() < deadline {
            if let Ok(Some(Value::String(state))) = self.eval("document.readyState", false).await {
                if state != "loading" {
                    return;
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
        debug!("document still loading after {:?}", DOCUMENT_READY_TIMEOUT);
    }
}

#[async_trait]
impl AudioBridge for BrowserSession {
    async fn play_audio(&self, payload: &str) -> Result<bool> {
        let played = self.eval(&play_expression(payload), false).await?;
        Ok(played == Some(Value::Bool(true)))
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn goto(&self, url: &str) -> Result<()> {
        let result = self.cdp.navigate(url).await?;
        if let Some(err) = result
            .get("errorText")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
        {
            return Err(Error::Action(format!("{} at {}", err, url)));
        }
        self.wait_for_document().await;
        Ok(())
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.wait_for_selector(selector, timeout).await?;
        let script = format!(
            "(() => {{ const el = document.querySelector({}); if (!el) return false; \
             el.scrollIntoView({{block: 'center', inline: 'center'}}); el.click(); return true; }})()",
            Value::from(selector)
        );
        match self.eval(&script, false).await? {
            Some(Value::Bool(true)) => Ok(()),
            _ => Err(Error::Action(format!("Element not found: {}", selector))),
        }
    }

    async fn fill(&self, selector: &str, text: &str, timeout: Duration) -> Result<()> {
        self.wait_for_selector(selector, timeout).await?;
        let sel = Value::from(selector);
        let prepare = format!(
            "(() => {{ const el = document.querySelector({sel}); if (!el) return 'missing'; \
             const field = el.tagName === 'TEXTAREA' || (el.tagName === 'INPUT' && \
             !['checkbox', 'radio', 'button', 'submit', 'reset', 'file', 'image', 'hidden', 'range', 'color'].includes(el.type)); \
             if (!field && !el.isContentEditable) return 'not-editable'; \
             if (el.disabled || el.readOnly) return 'read-only'; \
             el.scrollIntoView({{block: 'center'}}); el.focus(); \
             if (field) {{ el.value = ''; el.dispatchEvent(new Event('input', {{bubbles: true}})); }} \
             else {{ el.textContent = ''; }} \
             return 'ok'; }})()"
        );
        fill_target_status(self.eval(&prepare, false).await?, selector)?;
        self.cdp.insert_text(text).await?;
        let commit = format!(
            "(() => {{ const el = document.querySelector({sel}); \
             if (el) el.dispatchEvent(new Event('change', {{bubbles: true}})); }})()"
        );
        self.eval(&commit, false).await?;
        Ok(())
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>> {
        let data = self.cdp.capture_screenshot().await?;
        BASE64
            .decode(data)
            .map_err(|e| Error::Cdp(format!("invalid screenshot data: {}", e)))
    }

    async fn smooth_scroll(&self, delta_y: i64, duration: Duration) -> Result<()> {
        let ms = duration.as_millis();
        let script = format!(
            "new Promise((resolve) => {{ \
               const start = window.scrollY, delta = {delta_y}, ms = {ms}, t0 = performance.now(); \
               const ease = (t) => t < 0.5 ? 2 * t * t : -1 + (4 - 2 * t) * t; \
               let done = false; \
               const finish = () => {{ if (done) return; done = true; window.scrollTo(0, start + delta); resolve(window.scrollY); }}; \
               const step = (now) => {{ \
                 if (done) return; \
                 const p = Math.min((now - t0) / ms, 1); \
                 window.scrollTo(0, start + delta * ease(p)); \
                 if (p < 1) requestAnimationFrame(step); else finish(); \
               }}; \
               requestAnimationFrame(step); \
               setTimeout(finish, ms + 250); \
             }})"
        );
        self.eval(&script, true).await.map(|_| ())
    }

    async fn evaluate(&self, script: &str) -> Result<Option<Value>> {
        self.eval(script, true).await
    }

    async fn accessibility_snapshot(&self) -> Result<String> {
        let tree = self.cdp.full_ax_tree().await?;
        let root = parse_ax_tree(&tree)
            .ok_or_else(|| Error::Action("accessibility tree is empty".to_string()))?;
        Ok(render_tree(&root))
    }

    async fn close(&self) {
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("Browser.close failed (browser may already be gone): {}", e);
        }
        if let Some(mut child) = self.process.lock().await.take() {
            if let Err(e) = child.kill().await {
                debug!("kill failed: {}", e);
            }
        }
        if let Err(e) = std::fs::remove_dir_all(&self.profile_dir) {
            debug!(dir = %self.profile_dir.display(), "profile cleanup failed: {}", e);
        }
        info!("Browser closed");
    }
}

/// First line of a thrown exception's description, or the CDP summary text.
fn exception_message(details: &Value) -> String {
    details
        .get("exception")
        .and_then(|e| e.get("description"))
        .and_then(|d| d.as_str())
        .and_then(|d| d.lines().next())
        .or_else(|| details.get("text").and_then(|t| t.as_str()))
        .unwrap_or("script threw an exception")
        .to_string()
}

fn build_browser_args(port: u16, profile_dir: &Path, headless: bool) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", port),
        format!("--user-data-dir={}", profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-infobars".to_string(),
        "--disable-translate".to_string(),
        "--disable-features=Translate".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--autoplay-policy=no-user-gesture-required".to_string(),
        "--use-fake-ui-for-media-stream".to_string(),
        // Chrome will not start as root inside containers without this.
        "--no-sandbox".to_string(),
        "--password-store=basic".to_string(),
        format!("--window-size={},{}", VIEWPORT.0, VIEWPORT.1),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }
    args.push("about:blank".to_string());
    args
}

/// Map the in-page fill preparation result to an action outcome.
fn fill_target_status(status: Option<Value>, selector: &str) -> Result<()> {
    match status.as_ref().and_then(Value::as_str) {
        Some("ok") => Ok(()),
        Some("not-editable") => Err(Error::Action(format!(
            "Element is not an <input>, <textarea> or [contenteditable] element: {}",
            selector
        ))),
        Some("read-only") => Err(Error::Action(format!(
            "Element is disabled or read-only: {}",
            selector
        ))),
        _ => Err(Error::Action(format!("Element not found: {}", selector))),
    }
}

/// Locate a Chrome-family binary: well-known install paths first, then PATH.
pub fn find_browser_binary() -> Option<String> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ]
    };

    candidates.iter().find_map(|candidate| {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        which::which(candidate)
            .ok()
            .map(|p| p.display().to_string())
    })
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .map_err(|e| Error::Session(format!("failed to reserve a debugging port: {}", e)))?;
    Ok(listener.local_addr()?.port())
}

/// Poll `/json/version` until the debugging endpoint answers.
async fn wait_for_cdp_ready(port: u16) -> Result<()> {
    let url = format!("http://127.0.0.1:{}/json/version", port);
    let deadline = Instant::now() + CDP_READY_TIMEOUT;
    loop {
        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if body.get("webSocketDebuggerUrl").is_some() {
                    return Ok(());
                }
            }
        }
        if Instant::now() >= deadline {
            return Err(Error::Session(format!(
                "browser debugging endpoint not ready after {}s on port {}",
                CDP_READY_TIMEOUT.as_secs(),
                port
            )));
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// WebSocket URL of the first `page` target listed by `/json/list`.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);
    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let Ok(resp) = reqwest::get(&url).await else {
            continue;
        };
        let Ok(targets) = resp.json::<Vec<Value>>().await else {
            continue;
        };
        if let Some(ws) = targets.iter().find_map(page_ws_url) {
            return Ok(ws);
        }
    }
    warn!(port, "no page target appeared");
    Err(Error::Session("no page target found".to_string()))
}

fn page_ws_url(target: &Value) -> Option<String> {
    if target.get("type")?.as_str()? != "page" {
        return None;
    }
    target
        .get("webSocketDebuggerUrl")?
        .as_str()
        .map(str::to_string)
}
