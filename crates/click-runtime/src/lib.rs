//! Page-side click access control: a simulated page (document, listeners,
//! dispatch), the live click policy, the three enforcement mechanisms and the
//! reconciliation loop that keeps pointer interactivity in line with policy.

pub mod blocker;
pub mod dom;
pub mod error;
pub mod event;
pub mod gate;
pub mod inject;
pub mod interceptor;
pub mod page;
pub mod policy;
pub mod ready;
pub mod reconcile;
pub mod runtime;
pub mod selector;
pub mod window;

pub use blocker::PropagationBlocker;
pub use dom::{Document, DomError, Element, NodeId, PointerEvents};
pub use error::{ConfigError, InjectError, PageError};
pub use event::{
    listener, Event, EventTarget, EventType, Listener, ListenerRegistrar, Phase,
    RegistrationOutcome,
};
pub use gate::{ActivationPatterns, GateDecision};
pub use inject::{inject, Activation};
pub use interceptor::ListenerInterceptor;
pub use page::PageHandle;
pub use policy::{
    ActiveList, ClickPolicy, ClickPolicyBuilder, ClickPolicyConfig, EnforcementLevel, Mode,
    PolicyState,
};
pub use ready::{find_ready_marker, remove_ready_marker, READY_MARKER_ID};
pub use reconcile::{reconcile, PassReport, RECONCILE_INTERVAL};
pub use runtime::ClickRuntime;
pub use selector::{Selector, SelectorError};
pub use window::{DebuggerOutcome, DispatchRecord, ReadyState, Window};
