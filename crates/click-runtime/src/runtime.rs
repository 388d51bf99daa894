use crate::policy::{EnforcementLevel, PolicyState};

/// Enforcement state installed into a window by injection.
#[derive(Debug, Clone)]
pub struct ClickRuntime {
    pub(crate) policy: PolicyState,
    pub(crate) level: EnforcementLevel,
    pub(crate) interceptor_installed: bool,
    pub(crate) blocker_installed: bool,
    pub(crate) passes: u64,
    pub(crate) marker_created: bool,
}

impl ClickRuntime {
    pub(crate) fn new(policy: PolicyState, level: EnforcementLevel) -> Self {
        Self {
            policy,
            level,
            interceptor_installed: false,
            blocker_installed: false,
            passes: 0,
            marker_created: false,
        }
    }

    pub fn policy(&self) -> &PolicyState {
        &self.policy
    }

    pub fn level(&self) -> EnforcementLevel {
        self.level
    }

    pub fn interceptor_installed(&self) -> bool {
        self.interceptor_installed
    }

    pub fn blocker_installed(&self) -> bool {
        self.blocker_installed
    }

    /// Completed reconciliation passes.
    pub fn passes(&self) -> u64 {
        self.passes
    }

    pub fn marker_created(&self) -> bool {
        self.marker_created
    }
}
