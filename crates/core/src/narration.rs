//! Narration policy: which action categories get spoken, and how long the
//! spoken text may be.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Longest narration text sent to the synthesis service, in characters.
pub const MAX_NARRATION_CHARS: usize = 500;

const TRUNCATION_MARKER: &str = "...";

/// Category of an action, used to look up the narration flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionCategory {
    Navigate,
    Click,
    Type,
    Screenshot,
    Scroll,
    Error,
    Success,
}

impl ActionCategory {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Navigate => "navigate",
            Self::Click => "click",
            Self::Type => "type",
            Self::Screenshot => "screenshot",
            Self::Scroll => "scroll",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-category narration switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NarrationFlags {
    pub navigate: bool,
    pub click: bool,
    pub type_text: bool,
    pub screenshot: bool,
    pub scroll: bool,
    pub error: bool,
    pub success: bool,
}

impl NarrationFlags {
    pub fn get(&self, category: ActionCategory) -> bool {
        match category {
            ActionCategory::Navigate => self.navigate,
            ActionCategory::Click => self.click,
            ActionCategory::Type => self.type_text,
            ActionCategory::Screenshot => self.screenshot,
            ActionCategory::Scroll => self.scroll,
            ActionCategory::Error => self.error,
            ActionCategory::Success => self.success,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NarrationMode {
    /// Errors only.
    Silent,
    /// Navigation and errors.
    Minimal,
    #[default]
    Full,
}

impl NarrationMode {
    /// Parse a mode name. Anything unrecognized selects `Full`.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "silent" => Self::Silent,
            "minimal" => Self::Minimal,
            "full" => Self::Full,
            other => {
                warn!(mode = other, "Unknown narration mode, falling back to full");
                Self::Full
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Minimal => "minimal",
            Self::Full => "full",
        }
    }

    pub fn flags(&self) -> NarrationFlags {
        match self {
            Self::Silent => NarrationFlags {
                navigate: false,
                click: false,
                type_text: false,
                screenshot: false,
                scroll: false,
                error: true,
                success: false,
            },
            Self::Minimal => NarrationFlags {
                navigate: true,
                click: false,
                type_text: false,
                screenshot: false,
                scroll: false,
                error: true,
                success: false,
            },
            Self::Full => NarrationFlags {
                navigate: true,
                click: true,
                type_text: true,
                screenshot: true,
                scroll: true,
                error: true,
                success: true,
            },
        }
    }
}

impl fmt::Display for NarrationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decides whether a category is narrated and guards the text length.
#[derive(Debug, Clone, Copy)]
pub struct NarrationPolicy {
    enabled: bool,
    mode: NarrationMode,
    flags: NarrationFlags,
}

impl NarrationPolicy {
    pub fn new(enabled: bool, mode: NarrationMode) -> Self {
        Self {
            enabled,
            mode,
            flags: mode.flags(),
        }
    }

    /// Voice narration switched on at all (independent of mode).
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn mode(&self) -> NarrationMode {
        self.mode
    }

    pub fn should_narrate(&self, category: ActionCategory) -> bool {
        self.enabled && self.flags.get(category)
    }

    /// Truncate to `MAX_NARRATION_CHARS` characters, the last three being
    /// the truncation marker.
    pub fn prepare(&self, text: &str) -> String {
        if text.chars().count() <= MAX_NARRATION_CHARS {
            return text.to_string();
        }
        let keep = MAX_NARRATION_CHARS - TRUNCATION_MARKER.len();
        let mut out: String = text.chars().take(keep).collect();
        out.push_str(TRUNCATION_MARKER);
        out
    }

    /// Build the attempt record for a narration that passed the policy.
    pub fn attempt(&self, text: &str, category: ActionCategory) -> Option<NarrationAttempt> {
        if !self.should_narrate(category) {
            return None;
        }
        Some(NarrationAttempt {
            text: self.prepare(text),
            category,
            issued_at: Utc::now(),
        })
    }
}

/// A narration that passed the policy and is about to be synthesized.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrationAttempt {
    pub text: String,
    pub category: ActionCategory,
    pub issued_at: DateTime<Utc>,
}
