use tracing::{debug, info};

use crate::blocker::PropagationBlocker;
use crate::error::InjectError;
use crate::gate::GateDecision;
use crate::interceptor::ListenerInterceptor;
use crate::policy::{ClickPolicy, EnforcementLevel};
use crate::runtime::ClickRuntime;
use crate::window::Window;

/// What injection did to a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    Active {
        level: EnforcementLevel,
        gate: GateDecision,
    },
    /// The page URL matched no activation pattern; nothing was installed.
    Skipped,
}

impl Activation {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }
}

/// Installs click enforcement into a freshly created page, before any page
/// script runs.
pub fn inject(window: &mut Window, policy: &ClickPolicy) -> Result<Activation, InjectError> {
    let url = window.location().to_string();
    if window.is_injected() {
        return Err(InjectError::AlreadyInjected { url });
    }
    if window.page_scripts_started() {
        return Err(InjectError::PageScriptsStarted { url });
    }
    window.mark_injected();

    let gate = policy.activation().evaluate(window.location());
    if !gate.is_active() {
        debug!(page = %url, "no activation pattern matched; click enforcement skipped");
        return Ok(Activation::Skipped);
    }

    let level = policy.enforcement_level();
    window.runtime = Some(ClickRuntime::new(policy.initial_state(), level));
    match level {
        EnforcementLevel::None => {}
        EnforcementLevel::PropagationBlock => {
            PropagationBlocker::install(window);
        }
        EnforcementLevel::RegistrationBlock => {
            ListenerInterceptor::install(window);
        }
    }
    if policy.block_window_open() {
        window.block_window_open();
    }
    if policy.allow_debugger() {
        window.neutralize_debugger();
    }

    info!(
        page = %url,
        mode = %policy.mode(),
        %level,
        ?gate,
        "click enforcement injected"
    );
    Ok(Activation::Active { level, gate })
}
