//! In-memory stand-ins for the browser and the speech service.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use voicewrite_core::{Error, NarrationMode, NarrationPolicy, Result};
use voicewrite_tools::browser::AudioBridge;
use voicewrite_tools::narration::{
    Narrator, RetryPolicy, SpeechBackend, SpeechClient, SpeechError, SpeechRateLimiter,
};
use voicewrite_tools::{Launcher, PageDriver, ToolRegistry};

use crate::dispatcher::Dispatcher;

pub struct FakePage {
    events: Mutex<Vec<(Instant, String)>>,
    action_error: Mutex<Option<String>>,
    snapshot: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl FakePage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
            action_error: Mutex::new(None),
            snapshot: Mutex::new(Some("- RootWebArea \"Example Domain\"\n".to_string())),
            closed: AtomicBool::new(false),
        })
    }

    /// Make every page action fail with `message`.
    pub fn fail_actions(&self, message: &str) {
        *self.action_error.lock().unwrap() = Some(message.to_string());
    }

    pub fn set_snapshot(&self, snapshot: Option<String>) {
        *self.snapshot.lock().unwrap() = snapshot;
    }

    pub fn events(&self) -> Vec<(Instant, String)> {
        self.events.lock().unwrap().clone()
    }

    pub fn first(&self, prefix: &str) -> Option<Instant> {
        self.events()
            .into_iter()
            .find(|(_, e)| e.starts_with(prefix))
            .map(|(at, _)| at)
    }

    pub fn closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn record(&self, event: String) -> Result<()> {
        self.events.lock().unwrap().push((Instant::now(), event));
        match self.action_error.lock().unwrap().clone() {
            Some(message) => Err(Error::Action(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AudioBridge for FakePage {
    async fn play_audio(&self, _payload: &str) -> Result<bool> {
        self.events
            .lock()
            .unwrap()
            .push((Instant::now(), "audio".to_string()));
        Ok(true)
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn goto(&self, url: &str) -> Result<()> {
        self.record(format!("goto {}", url))
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<()> {
        self.record(format!("click {}", selector))
    }

    async fn fill(&self, selector: &str, text: &str, _timeout: Duration) -> Result<()> {
        self.record(format!("fill {} {}", selector, text))
    }

    async fn screenshot_png(&self) -> Result<Vec<u8>> {
        self.record("screenshot".to_string())?;
        Ok(vec![1, 2, 3])
    }

    async fn smooth_scroll(&self, delta_y: i64, duration: Duration) -> Result<()> {
        self.record(format!("scroll {}", delta_y))?;
        tokio::time::sleep(duration).await;
        self.events
            .lock()
            .unwrap()
            .push((Instant::now(), "scroll done".to_string()));
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Option<Value>> {
        self.record(format!("eval {}", script))?;
        Ok(Some(Value::from(42)))
    }

    async fn accessibility_snapshot(&self) -> Result<String> {
        self.snapshot
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Cdp("Accessibility.getFullAXTree failed".to_string()))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

pub struct FakeLauncher {
    page: Arc<FakePage>,
    launches: AtomicUsize,
    fail_first: usize,
}

impl FakeLauncher {
    pub fn new(page: Arc<FakePage>) -> Arc<Self> {
        Self::failing(0, page)
    }

    /// Fail the first `n` launches.
    pub fn failing(n: usize, page: Arc<FakePage>) -> Arc<Self> {
        Arc::new(Self {
            page,
            launches: AtomicUsize::new(0),
            fail_first: n,
        })
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Launcher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn PageDriver>> {
        let n = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_first {
            return Err(Error::Session("Chrome or Chromium not found".to_string()));
        }
        let page: Arc<dyn PageDriver> = self.page.clone();
        Ok(page)
    }
}

/// Records each synthesis request; answers with audio or a fixed status.
#[derive(Default)]
pub struct FakeSpeech {
    requests: Mutex<Vec<(Instant, String)>>,
    status: Option<u16>,
}

impl FakeSpeech {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status: Some(status),
            ..Default::default()
        })
    }

    pub fn requests(&self) -> Vec<(Instant, String)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.requests().into_iter().map(|(_, t)| t).collect()
    }
}

#[async_trait]
impl SpeechBackend for FakeSpeech {
    async fn request(&self, text: &str) -> std::result::Result<Vec<u8>, SpeechError> {
        self.requests
            .lock()
            .unwrap()
            .push((Instant::now(), text.to_string()));
        match self.status {
            Some(400) => Err(SpeechError::Rejected),
            Some(code) => Err(SpeechError::Status(code)),
            None => Ok(b"audio".to_vec()),
        }
    }
}

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub page: Arc<FakePage>,
    pub launcher: Arc<FakeLauncher>,
    pub speech: Arc<FakeSpeech>,
}

pub fn harness(voice: bool, mode: NarrationMode) -> Harness {
    harness_with(voice, mode, FakeSpeech::new(), 0)
}

pub fn harness_with(
    voice: bool,
    mode: NarrationMode,
    speech: Arc<FakeSpeech>,
    failing_launches: usize,
) -> Harness {
    let page = FakePage::new();
    let launcher = FakeLauncher::failing(failing_launches, page.clone());
    let client = SpeechClient::new(
        speech.clone(),
        Arc::new(SpeechRateLimiter::default()),
        RetryPolicy::default(),
    );
    let narrator = Narrator::new(NarrationPolicy::new(voice, mode), Arc::new(client));
    let dispatcher = Dispatcher::with_parts(
        ToolRegistry::with_defaults(),
        Arc::new(narrator),
        launcher.clone(),
        false,
    );
    Harness {
        dispatcher: Arc::new(dispatcher),
        page,
        launcher,
        speech,
    }
}
