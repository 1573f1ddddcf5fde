//! Spoken narration: rate-limited, retrying speech synthesis and delivery of
//! the audio to the page.

pub mod narrator;
pub mod rate_limit;
pub mod speech;

pub use narrator::Narrator;
pub use rate_limit::{SpeechRateLimiter, MIN_DISPATCH_INTERVAL};
pub use speech::{HttpSpeechBackend, RetryPolicy, SpeechBackend, SpeechClient, SpeechError};
