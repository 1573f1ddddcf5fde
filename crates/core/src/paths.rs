use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".voicewrite"))
            .unwrap_or_else(|| PathBuf::from(".voicewrite"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Scratch browser profiles live under the OS cache dir, not `base`,
    /// so they never end up next to the user's config.
    pub fn profile_dir(&self, tag: &str) -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("voicewrite")
            .join(format!("profile-{}", tag))
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}
