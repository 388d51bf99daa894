//! Level 1 enforcement: capture-phase halting of unauthorized click-family
//! events before any page listener sees them.

use tracing::{debug, trace};

use crate::event::{listener, EventTarget, EventType, ListenerSlot, Registration};
use crate::window::Window;

pub struct PropagationBlocker;

impl PropagationBlocker {
    /// Installs one window capture listener per click-family event type.
    /// Returns the number installed; zero when already present or no
    /// enforcement is installed.
    pub fn install(window: &mut Window) -> usize {
        match window.runtime.as_mut() {
            Some(runtime) if !runtime.blocker_installed => runtime.blocker_installed = true,
            _ => return 0,
        }

        let mut installed = 0;
        for kind in EventType::POINTER_FAMILY {
            window.add_native_listener(Registration {
                target: EventTarget::Window,
                kind,
                listener: listener(|event, scope| {
                    let (Some(policy), Some(node)) = (scope.policy(), event.target_node()) else {
                        return;
                    };
                    if !policy.permits(scope.document(), node) {
                        trace!(
                            kind = %event.kind(),
                            %node,
                            mode = %policy.mode(),
                            "halted click-family event"
                        );
                        event.stop_immediate_propagation();
                    }
                }),
                slot: ListenerSlot::Added { capture: true },
            });
            installed += 1;
        }
        debug!(page = %window.location(), installed, "click-family propagation blocker installed");
        installed
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::event::Listener;
    use crate::inject::inject;
    use crate::policy::{ClickPolicy, Mode};

    fn counter(hits: &Arc<AtomicUsize>) -> Listener {
        let hits = hits.clone();
        listener(move |_, _| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn injected(policy: ClickPolicy) -> Window {
        let mut window = Window::open_url("https://example.com/").unwrap();
        inject(&mut window, &policy).unwrap();
        window
    }

    fn level_one(mode: Mode) -> ClickPolicy {
        ClickPolicy::builder()
            .mode(mode)
            .whitelist(["#ok"])
            .blacklist([".ad"])
            .enforcement_level(1)
            .build()
            .unwrap()
    }

    #[test]
    fn blacklisted_clicks_never_reach_ancestor_listeners() {
        let mut window = injected(level_one(Mode::Blacklist));
        let body = window.document().body();
        let wrapper = window.document_mut().append_plain(body, "div").unwrap();
        let ad = window
            .document_mut()
            .append_element(wrapper, "a", [("class", "ad")])
            .unwrap();
        let link = window.document_mut().append_plain(wrapper, "a").unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        window.add_event_listener(wrapper, "click", counter(&hits), true);
        window.add_event_listener(wrapper, "click", counter(&hits), false);

        let record = window.click(ad).unwrap();
        assert!(record.stopped);
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        window.click(link).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn whitelist_mode_halts_unlisted_targets() {
        let mut window = injected(level_one(Mode::Whitelist));
        let body = window.document().body();
        let ok = window
            .document_mut()
            .append_element(body, "button", [("id", "ok")])
            .unwrap();
        let other = window.document_mut().append_plain(body, "button").unwrap();

        let hits = Arc::new(AtomicUsize::new(0));
        window.add_event_listener(ok, "mousedown", counter(&hits), false);
        window.add_event_listener(other, "mousedown", counter(&hits), false);

        window.dispatch_event(other, "mousedown").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        window.dispatch_event(ok, "mousedown").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn inline_handlers_are_halted_too() {
        let mut window = injected(level_one(Mode::Blacklist));
        let body = window.document().body();
        let ad = window
            .document_mut()
            .append_element(body, "img", [("class", "ad")])
            .unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        window.set_inline_handler(ad, "click", Some(counter(&hits)));
        assert_eq!(window.listener_count(ad, &EventType::Click), 1);

        window.click(ad).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mode_changes_apply_to_the_next_event() {
        let mut window = injected(level_one(Mode::Whitelist));
        let body = window.document().body();
        let plain = window.document_mut().append_plain(body, "span").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        window.add_event_listener(plain, "click", counter(&hits), false);

        window.click(plain).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        window.policy_mut().unwrap().set_mode(Mode::Blacklist);
        window.click(plain).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn non_click_events_pass_through() {
        let mut window = injected(level_one(Mode::Whitelist));
        let body = window.document().body();
        let input = window.document_mut().append_plain(body, "input").unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        window.add_event_listener(input, "keydown", counter(&hits), false);

        window.dispatch_event(input, "keydown").unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(PropagationBlocker::install(&mut window), 0);
    }
}
