pub mod config;
pub mod error;
pub mod narration;
pub mod paths;

pub use config::Config;
pub use error::{Error, Result};
pub use narration::{ActionCategory, NarrationAttempt, NarrationMode, NarrationPolicy};
pub use paths::Paths;
