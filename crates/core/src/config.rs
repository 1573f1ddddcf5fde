use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;
use crate::narration::{NarrationMode, NarrationPolicy};
use crate::paths::Paths;

pub const DEFAULT_TTS_URL: &str = "http://localhost:8000";
pub const TTS_URL_ENV: &str = "TTS_SERVICE_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Master switch for voice narration.
    #[serde(default = "default_true")]
    pub voice: bool,
    /// Inject the status indicator / audio bridge into every page.
    #[serde(default = "default_true")]
    pub overlay: bool,
    /// Narration mode name; unknown values behave as `full`.
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Base URL of the speech synthesis service.
    #[serde(default = "default_tts_url")]
    pub tts_url: String,
    #[serde(default)]
    pub headless: bool,
    #[serde(default)]
    pub debug: bool,
    /// Voice id forwarded to the synthesis service.
    #[serde(default = "default_voice_name")]
    pub voice_name: String,
    #[serde(default = "default_speech_speed")]
    pub speech_speed: f32,
    /// Wait for every narration before acting, including the ones the
    /// sequencing table marks as detached.
    #[serde(default)]
    pub await_all_narration: bool,
}

fn default_true() -> bool {
    true
}

fn default_mode() -> String {
    "full".to_string()
}

fn default_tts_url() -> String {
    std::env::var(TTS_URL_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TTS_URL.to_string())
}

fn default_voice_name() -> String {
    "af_heart".to_string()
}

fn default_speech_speed() -> f32 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            voice: true,
            overlay: true,
            mode: default_mode(),
            tts_url: default_tts_url(),
            headless: false,
            debug: false,
            voice_name: default_voice_name(),
            speech_speed: default_speech_speed(),
            await_all_narration: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn narration_mode(&self) -> NarrationMode {
        NarrationMode::from_str(&self.mode)
    }

    pub fn narration_policy(&self) -> NarrationPolicy {
        NarrationPolicy::new(self.voice, self.narration_mode())
    }

    /// `tts_url` without a trailing slash, ready for path joining.
    pub fn tts_base(&self) -> &str {
        self.tts_url.trim().trim_end_matches('/')
    }
}
