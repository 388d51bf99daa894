//! Level 2 enforcement: click-family listeners never reach the page.

use tracing::{debug, trace};

use crate::event::{
    EventType, ListenerRegistrar, ListenerTable, Registration, RegistrationOutcome,
};
use crate::window::Window;

/// Registration capability decorator that silently drops click-family
/// registrations and hands every other registration to the wrapped capability.
#[derive(Debug)]
pub struct ListenerInterceptor {
    inner: Box<dyn ListenerRegistrar>,
    blocked: Vec<EventType>,
}

impl ListenerInterceptor {
    pub fn new(inner: Box<dyn ListenerRegistrar>) -> Self {
        Self {
            inner,
            blocked: EventType::POINTER_FAMILY.to_vec(),
        }
    }

    pub fn blocks(&self, kind: &EventType) -> bool {
        self.blocked.contains(kind)
    }

    /// Wraps the window's registration capability. Returns false when the
    /// window already has an interceptor or no enforcement is installed.
    pub fn install(window: &mut Window) -> bool {
        let Some(runtime) = window.runtime.as_mut() else {
            return false;
        };
        if runtime.interceptor_installed {
            return false;
        }
        runtime.interceptor_installed = true;
        window.decorate_registrar(|inner| Box::new(ListenerInterceptor::new(inner)));
        debug!(page = %window.location(), "click-family listener registration intercepted");
        true
    }
}

impl ListenerRegistrar for ListenerInterceptor {
    fn register(&self, table: &mut ListenerTable, registration: Registration) -> RegistrationOutcome {
        if self.blocks(&registration.kind) {
            trace!(
                on = %registration.target,
                kind = %registration.kind,
                "dropped click-family listener registration"
            );
            return RegistrationOutcome::Dropped;
        }
        self.inner.register(table, registration)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::event::{listener, EventTarget, ListenerSlot, NativeRegistrar};
    use crate::inject::inject;
    use crate::policy::ClickPolicy;

    fn counter(hits: &Arc<AtomicUsize>) -> crate::event::Listener {
        let hits = hits.clone();
        listener(move |_, _| {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn drops_only_the_click_family() {
        let interceptor = ListenerInterceptor::new(Box::new(NativeRegistrar));
        let mut table = ListenerTable::default();
        let hits = Arc::new(AtomicUsize::new(0));

        for kind in EventType::POINTER_FAMILY {
            let outcome = interceptor.register(
                &mut table,
                Registration {
                    target: EventTarget::Window,
                    kind: kind.clone(),
                    listener: counter(&hits),
                    slot: ListenerSlot::Added { capture: false },
                },
            );
            assert_eq!(outcome, RegistrationOutcome::Dropped, "{kind} should be dropped");
        }
        let outcome = interceptor.register(
            &mut table,
            Registration {
                target: EventTarget::Window,
                kind: EventType::Load,
                listener: counter(&hits),
                slot: ListenerSlot::Added { capture: false },
            },
        );
        assert_eq!(outcome, RegistrationOutcome::Added);
    }

    #[test]
    fn click_listeners_never_fire_while_load_listeners_do() {
        let mut window = Window::open_url("https://example.com/").unwrap();
        let policy = ClickPolicy::builder()
            .enforcement_level(2)
            .activation_patterns(["*"])
            .build()
            .unwrap();
        inject(&mut window, &policy).unwrap();

        let body = window.document().body();
        let img = window.document_mut().append_plain(body, "img").unwrap();
        let clicks = Arc::new(AtomicUsize::new(0));
        let loads = Arc::new(AtomicUsize::new(0));

        window.add_event_listener(img, "click", counter(&clicks), false);
        window.add_event_listener(img, "mousedown", counter(&clicks), true);
        window.set_inline_handler(img, "click", Some(counter(&clicks)));
        window.add_event_listener(img, "load", counter(&loads), false);

        window.click(img).unwrap();
        window.dispatch_event(img, "mousedown").unwrap();
        window.dispatch_event(img, "load").unwrap();

        assert_eq!(clicks.load(Ordering::SeqCst), 0);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(window.listener_count(img, &EventType::Click), 0);
    }

    #[test]
    fn installs_once() {
        let mut window = Window::open_url("https://example.com/").unwrap();
        assert!(!ListenerInterceptor::install(&mut window));

        let policy = ClickPolicy::builder().enforcement_level(2).build().unwrap();
        inject(&mut window, &policy).unwrap();
        assert!(window.runtime().unwrap().interceptor_installed());
        assert!(!ListenerInterceptor::install(&mut window));
    }
}
