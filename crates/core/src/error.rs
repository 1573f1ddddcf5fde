use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required tool argument is missing or empty.
    #[error("{0}")]
    Validation(String),

    /// The automation primitive itself failed (selector not found,
    /// navigation error, script threw).
    #[error("{0}")]
    Action(String),

    #[error("CDP: {0}")]
    Cdp(String),

    /// The automation target could not be brought up.
    #[error("Session error: {0}")]
    Session(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error must abort the request instead of being folded
    /// into a structured tool result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Session(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_is_bare() {
        let e = Error::Validation("Selector is required".into());
        assert_eq!(e.to_string(), "Selector is required");
        assert!(!e.is_fatal());
    }

    #[test]
    fn test_session_is_fatal() {
        assert!(Error::Session("chrome not found".into()).is_fatal());
        assert!(!Error::Cdp("timeout".into()).is_fatal());
    }
}
