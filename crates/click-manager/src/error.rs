use std::time::Duration;

use click_runtime::{ConfigError, DomError, InjectError, Mode, PageError, SelectorError};

/// Convenient result alias for host operations.
pub type Result<T> = std::result::Result<T, ClickError>;

/// Why a guarded click was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// Blacklist mode: the target matched this blacklisted selector.
    Blacklisted { matched: String },
    /// Whitelist mode: the target matched no whitelisted selector.
    NotWhitelisted,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blacklisted { matched } => write!(f, "target matches blacklisted selector {matched:?}"),
            Self::NotWhitelisted => f.write_str("target matches no whitelisted selector"),
        }
    }
}

/// Errors surfaced by [`ClickManager`](crate::ClickManager) operations.
#[derive(thiserror::Error, Debug)]
pub enum ClickError {
    /// The manager configuration was rejected at construction.
    #[error("invalid click manager configuration: {0}")]
    Configuration(#[from] ConfigError),
    /// A selector passed to a host operation does not parse.
    #[error("invalid selector: {0}")]
    InvalidSelector(#[from] SelectorError),
    /// The guarded click target is not authorized under the current mode.
    #[error("refusing to click {selector:?} in {mode} mode: {violation}")]
    PolicyViolation {
        selector: String,
        mode: Mode,
        violation: Violation,
    },
    /// The selector matched no element.
    #[error("no element matches {selector:?}")]
    NotFound { selector: String },
    /// A map-each callback failed; `index` is 1-based.
    #[error("callback failed for element {index} of {selector:?}: {source}")]
    Callback {
        selector: String,
        index: usize,
        #[source]
        source: anyhow::Error,
    },
    /// Clicking a map-each element failed; `index` is 1-based.
    #[error("click failed for element {index} of {selector:?}: {source}")]
    Interaction {
        selector: String,
        index: usize,
        #[source]
        source: DomError,
    },
    /// The ready marker did not appear within the polling budget.
    #[error("click manager not ready on {url} after {waited:?}")]
    Timeout { url: String, waited: Duration },
    /// The page has no click enforcement installed.
    #[error("click enforcement is not active on {url}")]
    NotActive { url: String },
    /// Injection into a page failed.
    #[error(transparent)]
    Inject(#[from] InjectError),
    /// The page went away mid-operation.
    #[error(transparent)]
    Page(#[from] PageError),
}

impl ClickError {
    /// Whether the caller may retry with different input on the same page.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::PolicyViolation { .. }
                | Self::NotFound { .. }
                | Self::InvalidSelector(_)
                | Self::Callback { .. }
                | Self::Interaction { .. }
                | Self::Timeout { .. }
        )
    }
}
