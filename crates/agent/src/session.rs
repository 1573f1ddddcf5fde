//! Lazily started browser session shared by every tool call.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use voicewrite_core::{Error, Result};
use voicewrite_tools::{Launcher, PageDriver};

enum SessionState {
    Idle,
    Live(Arc<dyn PageDriver>),
    TornDown,
}

/// Owns the page. The first tool call that needs it launches the browser;
/// a failed launch leaves the slot idle so the next call tries again.
pub struct SessionSlot {
    launcher: Arc<dyn Launcher>,
    state: Mutex<SessionState>,
}

impl SessionSlot {
    pub fn new(launcher: Arc<dyn Launcher>) -> Self {
        Self {
            launcher,
            state: Mutex::new(SessionState::Idle),
        }
    }

    pub async fn ensure(&self) -> Result<Arc<dyn PageDriver>> {
        let mut state = self.state.lock().await;
        match &*state {
            SessionState::Live(page) => return Ok(page.clone()),
            SessionState::TornDown => {
                return Err(Error::Session("browser session has been shut down".to_string()))
            }
            SessionState::Idle => {}
        }

        info!("Launching browser...");
        match self.launcher.launch().await {
            Ok(page) => {
                *state = SessionState::Live(page.clone());
                info!("Browser ready");
                Ok(page)
            }
            Err(e) => {
                error!("Failed to launch browser: {}", e);
                Err(match e {
                    Error::Session(_) => e,
                    other => Error::Session(other.to_string()),
                })
            }
        }
    }

    pub async fn is_live(&self) -> bool {
        matches!(*self.state.lock().await, SessionState::Live(_))
    }

    /// Close the page if one is open. Later `ensure` calls fail.
    pub async fn teardown(&self) {
        let previous = std::mem::replace(&mut *self.state.lock().await, SessionState::TornDown);
        if let SessionState::Live(page) = previous {
            info!("Closing browser");
            page.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeLauncher, FakePage};

    #[tokio::test]
    async fn test_launches_once() {
        let launcher = FakeLauncher::new(FakePage::new());
        let slot = SessionSlot::new(launcher.clone());
        assert!(!slot.is_live().await);

        let first = slot.ensure().await.unwrap();
        let second = slot.ensure().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(launcher.launches(), 1);
        assert!(slot.is_live().await);
    }

    #[tokio::test]
    async fn test_failed_launch_stays_idle() {
        let launcher = FakeLauncher::failing(1, FakePage::new());
        let slot = SessionSlot::new(launcher.clone());

        let err = slot.ensure().await.err().unwrap();
        assert!(matches!(err, Error::Session(_)));
        assert!(!slot.is_live().await);

        assert!(slot.ensure().await.is_ok());
        assert_eq!(launcher.launches(), 2);
    }

    #[tokio::test]
    async fn test_teardown_closes_and_blocks_relaunch() {
        let page = FakePage::new();
        let launcher = FakeLauncher::new(page.clone());
        let slot = SessionSlot::new(launcher.clone());
        slot.ensure().await.unwrap();

        slot.teardown().await;
        assert!(page.closed());
        assert!(slot.ensure().await.is_err());
        assert_eq!(launcher.launches(), 1);
    }

    #[tokio::test]
    async fn test_teardown_without_session() {
        let launcher = FakeLauncher::new(FakePage::new());
        let slot = SessionSlot::new(launcher.clone());
        slot.teardown().await;
        assert_eq!(launcher.launches(), 0);
    }
}
