//! In-page overlay: a speaking indicator with an Alt+J mute toggle, and the
//! `window.playVoiceWriteAudio` hook narration audio is delivered through.

use serde_json::Value;

/// Installed into every document when the overlay is enabled.
pub const OVERLAY_SCRIPT: &str = include_str!("overlay.js");

/// Expression that hands `payload` to the playback hook without waiting for
/// playback. Evaluates to `true` when the hook exists.
pub fn play_expression(payload: &str) -> String {
    format!(
        "(() => {{ const play = window.playVoiceWriteAudio; \
         if (typeof play !== 'function') return false; \
         play({}); return true; }})()",
        Value::from(payload)
    )
}
