//! Speech synthesis client.
//!
//! `SpeechClient::synthesize` turns text into a base64 audio payload, or
//! `None` when the service could not produce one. It never returns an error:
//! narration is best-effort and a silent action is better than a failed one.

use super::rate_limit::SpeechRateLimiter;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use voicewrite_core::{Config, Error, Result};

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, PartialEq)]
pub enum SpeechError {
    /// HTTP 400: the service will not accept this text, retrying is useless.
    #[error("synthesis service rejected the request (HTTP 400)")]
    Rejected,

    #[error("synthesis service answered HTTP {0}")]
    Status(u16),

    #[error("synthesis request timed out")]
    Timeout,

    #[error("synthesis request failed: {0}")]
    Transport(String),
}

impl SpeechError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SpeechError::Rejected)
    }
}

/// One synthesis request, no retries.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    async fn request(&self, text: &str) -> std::result::Result<Vec<u8>, SpeechError>;
}

#[derive(Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
    voice: &'a str,
    speed: f32,
}

/// `POST {base}/speak` with `{text, voice, speed}`; only HTTP 200 counts.
pub struct HttpSpeechBackend {
    client: Client,
    endpoint: String,
    voice: String,
    speed: f32,
}

impl HttpSpeechBackend {
    pub fn new(base_url: &str, voice: &str, speed: f32) -> Result<Self> {
        Self::with_timeout(base_url, voice, speed, REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, voice: &str, speed: f32, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build speech HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: format!("{}/speak", base_url.trim_end_matches('/')),
            voice: voice.to_string(),
            speed,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.tts_base(), &config.voice_name, config.speech_speed)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl SpeechBackend for HttpSpeechBackend {
    async fn request(&self, text: &str) -> std::result::Result<Vec<u8>, SpeechError> {
        let body = SpeakRequest {
            text,
            voice: &self.voice,
            speed: self.speed,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(classify)?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::BAD_REQUEST => return Err(SpeechError::Rejected),
            other => return Err(SpeechError::Status(other.as_u16())),
        }
        let bytes = response.bytes().await.map_err(classify)?;
        Ok(bytes.to_vec())
    }
}

fn classify(e: reqwest::Error) -> SpeechError {
    if e.is_timeout() {
        SpeechError::Timeout
    } else {
        SpeechError::Transport(e.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(500),
        }
    }
}

pub struct SpeechClient {
    backend: Arc<dyn SpeechBackend>,
    limiter: Arc<SpeechRateLimiter>,
    retry: RetryPolicy,
}

impl SpeechClient {
    pub fn new(
        backend: Arc<dyn SpeechBackend>,
        limiter: Arc<SpeechRateLimiter>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            limiter,
            retry,
        }
    }

    /// Synthesize `text`, retrying transient failures. Every attempt waits
    /// for the rate limiter; retries additionally wait out the backoff.
    pub async fn synthesize(&self, text: &str) -> Option<String> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            self.limiter.acquire().await;
            match self.backend.request(text).await {
                Ok(audio) => {
                    debug!(attempt, bytes = audio.len(), "Speech synthesized");
                    return Some(BASE64.encode(audio));
                }
                Err(e) if !e.is_retryable() => {
                    warn!(attempt, "Speech synthesis rejected, not retrying: {}", e);
                    return None;
                }
                Err(e) if attempt > self.retry.max_retries => {
                    warn!(attempt, "Speech synthesis failed, giving up: {}", e);
                    return None;
                }
                Err(e) => {
                    debug!(
                        attempt,
                        retries_left = self.retry.max_retries + 1 - attempt,
                        "Speech synthesis failed, retrying: {}",
                        e
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::rate_limit::MIN_DISPATCH_INTERVAL;
    use std::sync::Mutex;
    use tokio::time::Instant;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Replays scripted outcomes and records when each request arrived.
    struct ScriptedBackend {
        outcomes: Mutex<Vec<std::result::Result<Vec<u8>, SpeechError>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedBackend {
        fn new(outcomes: Vec<std::result::Result<Vec<u8>, SpeechError>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SpeechBackend for ScriptedBackend {
        async fn request(&self, _text: &str) -> std::result::Result<Vec<u8>, SpeechError> {
            self.calls.lock().unwrap().push(Instant::now());
            let mut outcomes = self.outcomes.lock().unwrap();
            if outcomes.is_empty() {
                Err(SpeechError::Status(500))
            } else {
                outcomes.remove(0)
            }
        }
    }

    fn client_for(backend: Arc<ScriptedBackend>) -> SpeechClient {
        SpeechClient::new(
            backend,
            Arc::new(SpeechRateLimiter::default()),
            RetryPolicy::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_is_base64() {
        let backend = ScriptedBackend::new(vec![Ok(b"ID3audio".to_vec())]);
        let client = client_for(backend.clone());
        assert_eq!(client.synthesize("hi").await, Some(BASE64.encode(b"ID3audio")));
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_is_not_retried() {
        let backend = ScriptedBackend::new(vec![Err(SpeechError::Rejected)]);
        let client = client_for(backend.clone());
        assert_eq!(client.synthesize("hi").await, None);
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_errors_stop_after_three_attempts() {
        let backend = ScriptedBackend::new(vec![
            Err(SpeechError::Status(500)),
            Err(SpeechError::Status(500)),
            Err(SpeechError::Status(500)),
            Ok(b"never".to_vec()),
        ]);
        let client = client_for(backend.clone());
        assert_eq!(client.synthesize("hi").await, None);

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
            assert!(pair[1] - pair[0] >= MIN_DISPATCH_INTERVAL);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeouts_are_retried() {
        let backend = ScriptedBackend::new(vec![
            Err(SpeechError::Timeout),
            Err(SpeechError::Transport("connection refused".into())),
            Ok(b"ok".to_vec()),
        ]);
        let client = client_for(backend.clone());
        assert_eq!(client.synthesize("hi").await, Some(BASE64.encode(b"ok")));
        assert_eq!(backend.calls().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_timeouts_give_up_without_audio() {
        let backend = ScriptedBackend::new(vec![
            Err(SpeechError::Timeout),
            Err(SpeechError::Timeout),
            Err(SpeechError::Timeout),
            Ok(b"never".to_vec()),
        ]);
        let client = client_for(backend.clone());
        assert_eq!(client.synthesize("hi").await, None);

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        for pair in calls.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_narrations_respect_rate_limit() {
        let backend = ScriptedBackend::new(vec![Ok(b"a".to_vec()), Ok(b"b".to_vec())]);
        let client = client_for(backend.clone());
        client.synthesize("one").await;
        client.synthesize("two").await;
        let calls = backend.calls();
        assert!(calls[1] - calls[0] >= MIN_DISPATCH_INTERVAL);
    }

    fn fast_client(server: &MockServer) -> SpeechClient {
        let backend = HttpSpeechBackend::new(&server.uri(), "af_heart", 1.0).unwrap();
        SpeechClient::new(
            Arc::new(backend),
            Arc::new(SpeechRateLimiter::new(Duration::ZERO)),
            RetryPolicy {
                max_retries: 2,
                backoff: Duration::from_millis(10),
            },
        )
    }

    #[tokio::test]
    async fn test_http_backend_posts_speak_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speak"))
            .and(body_json(serde_json::json!({
                "text": "Navigating to example.com",
                "voice": "af_heart",
                "speed": 1.0
            })))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3-bytes".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let audio = fast_client(&server)
            .synthesize("Navigating to example.com")
            .await;
        assert_eq!(audio, Some(BASE64.encode(b"mp3-bytes")));
    }

    #[tokio::test]
    async fn test_http_400_single_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speak"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(fast_client(&server).synthesize("bad").await, None);
    }

    #[tokio::test]
    async fn test_http_500_three_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speak"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        assert_eq!(fast_client(&server).synthesize("down").await, None);
    }

    #[tokio::test]
    async fn test_http_non_200_success_codes_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speak"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let backend = HttpSpeechBackend::new(&server.uri(), "af_heart", 1.0).unwrap();
        assert_eq!(backend.request("x").await, Err(SpeechError::Status(204)));
    }

    #[tokio::test]
    async fn test_http_redirects_are_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speak"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/elsewhere"))
            .mount(&server)
            .await;

        let backend = HttpSpeechBackend::new(&server.uri(), "af_heart", 1.0).unwrap();
        assert_eq!(backend.request("x").await, Err(SpeechError::Status(302)));
    }

    #[tokio::test]
    async fn test_http_timeout_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/speak"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let backend = HttpSpeechBackend::with_timeout(
            &server.uri(),
            "af_heart",
            1.0,
            Duration::from_millis(100),
        )
        .unwrap();
        assert_eq!(backend.request("slow").await, Err(SpeechError::Timeout));
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let backend = HttpSpeechBackend::new("http://tts.local:8000/", "af_heart", 1.0).unwrap();
        assert_eq!(backend.endpoint(), "http://tts.local:8000/speak");
    }
}
