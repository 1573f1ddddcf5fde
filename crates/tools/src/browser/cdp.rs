//! Chrome DevTools Protocol client over a page-target WebSocket.
//!
//! One writer task owns the sink, one reader task routes command responses
//! back to their callers by id. Events are not consumed.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, warn};
use voicewrite_core::{Error, Result};

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;

pub struct CdpClient {
    ws_tx: mpsc::Sender<String>,
    pending: PendingMap,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl CdpClient {
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (stream, _) = connect_async(ws_url)
            .await
            .map_err(|e| Error::Cdp(format!("failed to connect to {}: {}", ws_url, e)))?;
        let (mut sink, mut source) = stream.split();

        let (ws_tx, mut ws_rx) = mpsc::channel::<String>(64);
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(frame) = ws_rx.recv().await {
                if let Err(e) = sink.send(Message::Text(frame)).await {
                    error!("CDP write failed: {}", e);
                    break;
                }
            }
        });

        let routes = pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(incoming) = source.next().await {
                match incoming {
                    Ok(Message::Text(text)) => {
                        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                            continue;
                        };
                        if let Some(id) = frame.get("id").and_then(|v| v.as_u64()) {
                            if let Some(tx) = routes.lock().await.remove(&id) {
                                let _ = tx.send(frame);
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("CDP socket closed by browser");
                        break;
                    }
                    Err(e) => {
                        warn!("CDP read failed: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
            // Dropping the senders wakes every caller still waiting.
            routes.lock().await.clear();
        });

        Ok(Self {
            ws_tx,
            pending,
            next_id: AtomicU64::new(1),
            reader,
            writer,
        })
    }

    /// Send a command and wait for its `result` object.
    pub async fn send_command(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let frame = json!({ "id": id, "method": method, "params": params });

        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        if self.ws_tx.send(frame.to_string()).await.is_err() {
            self.pending.lock().await.remove(&id);
            return Err(Error::Cdp("connection to the browser is closed".to_string()));
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(response)) => match response.get("error") {
                Some(err) => {
                    let message = err
                        .get("message")
                        .and_then(|m| m.as_str())
                        .map(str::to_string)
                        .unwrap_or_else(|| err.to_string());
                    Err(Error::Cdp(format!("{} failed: {}", method, message)))
                }
                None => Ok(response.get("result").cloned().unwrap_or(Value::Null)),
            },
            Ok(Err(_)) => Err(Error::Cdp(format!(
                "{} aborted: connection to the browser is closed",
                method
            ))),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                Err(Error::Cdp(format!(
                    "{} timed out after {}s",
                    method,
                    COMMAND_TIMEOUT.as_secs()
                )))
            }
        }
    }

    pub async fn enable_domain(&self, domain: &str) -> Result<()> {
        self.send_command(&format!("{}.enable", domain), json!({}))
            .await
            .map(|_| ())
    }

    pub async fn navigate(&self, url: &str) -> Result<Value> {
        self.send_command("Page.navigate", json!({ "url": url })).await
    }

    /// Evaluate an expression, awaiting a returned promise when `await_promise`.
    /// Returns the raw `Runtime.evaluate` result (`result` + optional
    /// `exceptionDetails`).
    pub async fn evaluate(&self, expression: &str, await_promise: bool) -> Result<Value> {
        self.send_command(
            "Runtime.evaluate",
            json!({
                "expression": expression,
                "returnByValue": true,
                "awaitPromise": await_promise,
            }),
        )
        .await
    }

    /// Base64 PNG of the current viewport.
    pub async fn capture_screenshot(&self) -> Result<String> {
        let result = self
            .send_command("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        result
            .get("data")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Cdp("no screenshot data returned".to_string()))
    }

    pub async fn full_ax_tree(&self) -> Result<Value> {
        self.send_command("Accessibility.getFullAXTree", json!({})).await
    }

    pub async fn insert_text(&self, text: &str) -> Result<()> {
        self.send_command("Input.insertText", json!({ "text": text }))
            .await
            .map(|_| ())
    }

    pub async fn set_viewport(&self, width: u32, height: u32) -> Result<()> {
        self.send_command(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": width,
                "height": height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await
        .map(|_| ())
    }

    pub async fn set_user_agent(&self, user_agent: &str) -> Result<()> {
        self.send_command(
            "Emulation.setUserAgentOverride",
            json!({ "userAgent": user_agent }),
        )
        .await
        .map(|_| ())
    }

    /// Register a script that runs in every new document before page scripts.
    pub async fn add_init_script(&self, source: &str) -> Result<()> {
        self.send_command(
            "Page.addScriptToEvaluateOnNewDocument",
            json!({ "source": source }),
        )
        .await
        .map(|_| ())
    }
}

impl Drop for CdpClient {
    fn drop(&mut self) {
        self.reader.abort();
        self.writer.abort();
    }
}
