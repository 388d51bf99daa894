use thiserror::Error;

use crate::selector::SelectorError;

/// Rejected policy configuration. Raised once, at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Mode was neither `WHITELIST` nor `BLACKLIST`.
    #[error("invalid mode {0:?}, expected WHITELIST or BLACKLIST")]
    InvalidMode(String),
    /// Enforcement level outside 0-2.
    #[error("enforcement level must be a number 0-2, got {0}")]
    InvalidEnforcementLevel(i64),
    /// A configured selector does not parse.
    #[error("invalid {list} selector: {source}")]
    InvalidSelector {
        list: &'static str,
        #[source]
        source: SelectorError,
    },
}

/// Injection was attempted at the wrong point of the page lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InjectError {
    #[error("click enforcement was already injected into {url}")]
    AlreadyInjected { url: String },
    #[error("page scripts on {url} already registered listeners; injection must run at context creation")]
    PageScriptsStarted { url: String },
}

/// The page event loop is gone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageError {
    #[error("page event loop for {url} has shut down")]
    Closed { url: String },
}
