use std::time::Duration;

use tracing::{debug, info};

use crate::dom::{DomError, NodeId, PointerEvents};
use crate::event::{listener, EventTarget, EventType, ListenerSlot, Registration};
use crate::policy::Mode;
use crate::ready::append_ready_marker;
use crate::window::Window;

/// Period between reconciliation passes once the document is ready.
pub const RECONCILE_INTERVAL: Duration = Duration::from_millis(700);

/// Summary of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    /// 1-based pass number.
    pub pass: u64,
    pub mode: Mode,
    /// Elements left with `pointer-events: auto`.
    pub enabled: usize,
    /// Elements left with `pointer-events: none`.
    pub disabled: usize,
    pub guards_attached: usize,
    pub marker_appended: bool,
}

/// Synchronizes every connected element's pointer interactivity with the
/// live policy. Returns `None` on a page without enforcement.
pub fn reconcile(window: &mut Window) -> Result<Option<PassReport>, DomError> {
    let Some(policy) = window.policy().cloned() else {
        return Ok(None);
    };
    let mode = policy.mode();
    let mut enabled = 0;
    let mut disabled = 0;
    let mut unguarded = Vec::new();

    for node in window.document.all_elements() {
        let interactive = match mode {
            Mode::Whitelist => policy.whitelisted_by(&window.document, node).is_some(),
            Mode::Blacklist => policy.blacklisted_by(&window.document, node).is_none(),
        };
        if interactive {
            enabled += 1;
            window
                .document
                .set_pointer_events(node, Some(PointerEvents::Auto))?;
            let guarded = window
                .document
                .element(node)
                .map_or(true, |element| element.has_propagation_guard());
            if mode == Mode::Whitelist && policy.stop_click_propagation() && !guarded {
                unguarded.push(node);
            }
        } else {
            disabled += 1;
            window
                .document
                .set_pointer_events(node, Some(PointerEvents::None))?;
        }
    }

    for node in &unguarded {
        attach_propagation_guard(window, *node);
    }

    let first_marker = window
        .runtime
        .as_ref()
        .map_or(false, |runtime| !runtime.marker_created);
    if first_marker {
        append_ready_marker(&mut window.document)?;
    }

    let Some(runtime) = window.runtime.as_mut() else {
        return Ok(None);
    };
    runtime.passes += 1;
    runtime.marker_created = true;

    let report = PassReport {
        pass: runtime.passes,
        mode,
        enabled,
        disabled,
        guards_attached: unguarded.len(),
        marker_appended: first_marker,
    };
    debug!(
        page = %window.location(),
        pass = report.pass,
        %mode,
        enabled,
        disabled,
        guards = report.guards_attached,
        "reconciliation pass"
    );
    if first_marker {
        info!(page = %window.location(), "click manager ready");
    }
    Ok(Some(report))
}

fn attach_propagation_guard(window: &mut Window, node: NodeId) {
    let guard = listener(|event, _| event.stop_propagation());
    for kind in [EventType::Click, EventType::MouseDown] {
        window.add_native_listener(Registration {
            target: EventTarget::Node(node),
            kind,
            listener: guard.clone(),
            slot: ListenerSlot::Added { capture: false },
        });
    }
    if let Some(element) = window.document.element_mut(node) {
        element.propagation_guard = true;
    }
}
