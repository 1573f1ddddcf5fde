//! Narrator: policy check, synthesis, and hand-off to the page.

use super::speech::SpeechClient;
use crate::browser::AudioBridge;
use std::sync::Arc;
use tracing::{debug, warn};
use voicewrite_core::{ActionCategory, NarrationPolicy};

pub struct Narrator {
    policy: NarrationPolicy,
    speech: Arc<SpeechClient>,
}

impl Narrator {
    pub fn new(policy: NarrationPolicy, speech: Arc<SpeechClient>) -> Self {
        Self { policy, speech }
    }

    pub fn policy(&self) -> &NarrationPolicy {
        &self.policy
    }

    /// Speak `text` through `bridge` if the policy allows `category`.
    /// Every failure on this path is logged and swallowed.
    pub async fn narrate<B>(&self, bridge: &B, text: &str, category: ActionCategory)
    where
        B: AudioBridge + ?Sized,
    {
        let Some(attempt) = self.policy.attempt(text, category) else {
            debug!(%category, "Narration skipped by policy");
            return;
        };
        debug!(
            category = %attempt.category,
            issued_at = %attempt.issued_at,
            text = %attempt.text,
            "Narrating"
        );

        let Some(payload) = self.speech.synthesize(&attempt.text).await else {
            debug!(category = %attempt.category, "No audio, continuing silently");
            return;
        };
        match bridge.play_audio(&payload).await {
            Ok(true) => {}
            Ok(false) => debug!("Page has no audio hook, narration dropped"),
            Err(e) => warn!("Failed to hand audio to the page: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::rate_limit::SpeechRateLimiter;
    use crate::narration::speech::{RetryPolicy, SpeechBackend, SpeechError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use voicewrite_core::{Error, NarrationMode, Result};

    #[derive(Default)]
    struct CountingBackend {
        texts: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl SpeechBackend for CountingBackend {
        async fn request(&self, text: &str) -> std::result::Result<Vec<u8>, SpeechError> {
            self.texts.lock().unwrap().push(text.to_string());
            if self.fail {
                Err(SpeechError::Rejected)
            } else {
                Ok(b"audio".to_vec())
            }
        }
    }

    #[derive(Default)]
    struct RecordingBridge {
        played: AtomicUsize,
        broken: bool,
    }

    #[async_trait]
    impl AudioBridge for RecordingBridge {
        async fn play_audio(&self, _payload: &str) -> Result<bool> {
            if self.broken {
                return Err(Error::Cdp("target closed".into()));
            }
            self.played.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    fn narrator(mode: NarrationMode, backend: Arc<CountingBackend>) -> Narrator {
        let speech = SpeechClient::new(
            backend,
            Arc::new(SpeechRateLimiter::default()),
            RetryPolicy::default(),
        );
        Narrator::new(NarrationPolicy::new(true, mode), Arc::new(speech))
    }

    #[tokio::test(start_paused = true)]
    async fn test_plays_allowed_category() {
        let backend = Arc::new(CountingBackend::default());
        let bridge = RecordingBridge::default();
        narrator(NarrationMode::Full, backend.clone())
            .narrate(&bridge, "Clicking #go", ActionCategory::Click)
            .await;
        assert_eq!(bridge.played.load(Ordering::SeqCst), 1);
        assert_eq!(backend.texts.lock().unwrap().as_slice(), ["Clicking #go"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_skip_never_calls_service() {
        let backend = Arc::new(CountingBackend::default());
        let bridge = RecordingBridge::default();
        narrator(NarrationMode::Silent, backend.clone())
            .narrate(&bridge, "Clicking #go", ActionCategory::Click)
            .await;
        assert!(backend.texts.lock().unwrap().is_empty());
        assert_eq!(bridge.played.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_text_is_truncated_before_synthesis() {
        let backend = Arc::new(CountingBackend::default());
        let bridge = RecordingBridge::default();
        narrator(NarrationMode::Full, backend.clone())
            .narrate(&bridge, &"x".repeat(600), ActionCategory::Navigate)
            .await;
        let texts = backend.texts.lock().unwrap();
        assert_eq!(texts[0].chars().count(), 500);
        assert!(texts[0].ends_with("..."));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_are_swallowed() {
        let backend = Arc::new(CountingBackend {
            fail: true,
            ..Default::default()
        });
        let bridge = RecordingBridge::default();
        narrator(NarrationMode::Full, backend)
            .narrate(&bridge, "hello", ActionCategory::Navigate)
            .await;
        assert_eq!(bridge.played.load(Ordering::SeqCst), 0);

        let broken = RecordingBridge {
            broken: true,
            ..Default::default()
        };
        narrator(NarrationMode::Full, Arc::new(CountingBackend::default()))
            .narrate(&broken, "hello", ActionCategory::Navigate)
            .await;
    }
}
