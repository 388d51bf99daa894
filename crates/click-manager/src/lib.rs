//! Host-side click manager: installs click enforcement into browsing
//! contexts and drives it on running pages (readiness, list updates, guarded
//! clicks).

pub mod config;
pub mod context;
pub mod error;
pub mod manager;
pub mod routes;

pub use config::{ClickManagerConfig, HostTimings};
pub use context::{BrowserContext, InitScript};
pub use error::{ClickError, Result, Violation};
pub use manager::{ClickManager, LaunchHook};
pub use routes::{Route, RouteAction, RouteDecision, RouteMatcher, COMMON_AD_HOSTS};
