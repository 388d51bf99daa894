use serde::{Deserialize, Serialize};
use tracing::{info, trace};
use url::Url;

use crate::dom::{Document, DomError, NodeId};
use crate::event::{
    DispatchScope, Event, EventTarget, EventType, Listener, ListenerRegistrar, ListenerSlot,
    ListenerTable, NativeRegistrar, Phase, Registration, RegistrationOutcome,
};
use crate::policy::{EnforcementLevel, PolicyState};
use crate::runtime::ClickRuntime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadyState {
    Loading,
    Interactive,
    Complete,
}

/// What a `debugger` statement does on this page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebuggerOutcome {
    Paused,
    Skipped,
}

/// One dispatched event, kept in the window's dispatch log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    pub sequence: u64,
    pub kind: EventType,
    pub target: EventTarget,
    pub trusted: bool,
    pub listeners_invoked: usize,
    pub stopped: bool,
}

/// A page: location, document, listeners and the installed enforcement.
#[derive(Debug)]
pub struct Window {
    location: Url,
    pub(crate) document: Document,
    pub(crate) listeners: ListenerTable,
    registrar: Box<dyn ListenerRegistrar>,
    pub(crate) runtime: Option<ClickRuntime>,
    injected: bool,
    scripts_started: bool,
    ready_state: ReadyState,
    window_open_blocked: bool,
    opened_windows: Vec<String>,
    debugger_neutralized: bool,
    dispatch_log: Vec<DispatchRecord>,
    next_sequence: u64,
}

impl Window {
    pub fn new(location: Url) -> Self {
        Self {
            location,
            document: Document::new(),
            listeners: ListenerTable::default(),
            registrar: Box::new(NativeRegistrar),
            runtime: None,
            injected: false,
            scripts_started: false,
            ready_state: ReadyState::Loading,
            window_open_blocked: false,
            opened_windows: Vec::new(),
            debugger_neutralized: false,
            dispatch_log: Vec::new(),
            next_sequence: 0,
        }
    }

    pub fn open_url(location: &str) -> Result<Self, url::ParseError> {
        Ok(Self::new(Url::parse(location)?))
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn ready_state(&self) -> ReadyState {
        self.ready_state
    }

    /// Parsing finished: `readyState` becomes interactive and
    /// `DOMContentLoaded` fires on the window.
    pub fn dom_content_loaded(&mut self) {
        if self.ready_state != ReadyState::Loading {
            return;
        }
        self.ready_state = ReadyState::Interactive;
        self.dispatch(EventType::DomContentLoaded, EventTarget::Window, true);
    }

    /// Subresources finished loading: `readyState` becomes complete and
    /// `load` fires on the window.
    pub fn load_complete(&mut self) {
        self.dom_content_loaded();
        if self.ready_state == ReadyState::Complete {
            return;
        }
        self.ready_state = ReadyState::Complete;
        self.dispatch(EventType::Load, EventTarget::Window, true);
    }

    // --- enforcement state -------------------------------------------------

    pub fn runtime(&self) -> Option<&ClickRuntime> {
        self.runtime.as_ref()
    }

    pub fn policy(&self) -> Option<&PolicyState> {
        self.runtime.as_ref().map(|runtime| &runtime.policy)
    }

    pub fn policy_mut(&mut self) -> Option<&mut PolicyState> {
        self.runtime.as_mut().map(|runtime| &mut runtime.policy)
    }

    pub fn enforcement_level(&self) -> Option<EnforcementLevel> {
        self.runtime.as_ref().map(|runtime| runtime.level)
    }

    pub fn is_injected(&self) -> bool {
        self.injected
    }

    pub(crate) fn mark_injected(&mut self) {
        self.injected = true;
    }

    pub fn page_scripts_started(&self) -> bool {
        self.scripts_started
    }

    /// Whether the reconciliation loop should be ticking.
    pub fn reconciliation_due(&self) -> bool {
        self.runtime.is_some() && self.ready_state != ReadyState::Loading
    }

    /// Replaces the registration capability with `wrap(current)`.
    pub(crate) fn decorate_registrar<F>(&mut self, wrap: F)
    where
        F: FnOnce(Box<dyn ListenerRegistrar>) -> Box<dyn ListenerRegistrar>,
    {
        let current = std::mem::replace(&mut self.registrar, Box::new(NativeRegistrar));
        self.registrar = wrap(current);
    }

    /// Registration through the browser's own capability, bypassing any
    /// decoration. Used by the runtime for its own listeners.
    pub(crate) fn add_native_listener(&mut self, registration: Registration) -> RegistrationOutcome {
        self.listeners.insert(registration)
    }

    // --- page script surface -----------------------------------------------

    /// `target.addEventListener(kind, listener, capture)`. A registration the
    /// capability drops is not reported to the caller.
    pub fn add_event_listener(
        &mut self,
        target: impl Into<EventTarget>,
        kind: impl Into<EventType>,
        listener: Listener,
        capture: bool,
    ) {
        self.register(Registration {
            target: target.into(),
            kind: kind.into(),
            listener,
            slot: ListenerSlot::Added { capture },
        });
    }

    /// `target.on<kind> = handler`; `None` clears the handler.
    pub fn set_inline_handler(
        &mut self,
        target: impl Into<EventTarget>,
        kind: impl Into<EventType>,
        handler: Option<Listener>,
    ) {
        let target = target.into();
        let kind = kind.into();
        match handler {
            Some(listener) => self.register(Registration {
                target,
                kind,
                listener,
                slot: ListenerSlot::Inline,
            }),
            None => {
                self.scripts_started = true;
                self.listeners.remove_inline(target, &kind);
            }
        }
    }

    fn register(&mut self, registration: Registration) {
        self.scripts_started = true;
        let on = registration.target;
        let kind = registration.kind.clone();
        let outcome = self.registrar.register(&mut self.listeners, registration);
        trace!(%on, %kind, ?outcome, "listener registration");
    }

    pub fn listener_count(&self, target: impl Into<EventTarget>, kind: &EventType) -> usize {
        self.listeners.count(target.into(), kind)
    }

    /// `target.dispatchEvent(new Event(kind))`.
    pub fn dispatch_event(
        &mut self,
        target: impl Into<EventTarget>,
        kind: impl Into<EventType>,
    ) -> Result<DispatchRecord, DomError> {
        let target = target.into();
        if let EventTarget::Node(node) = target {
            if self.document.element(node).is_none() {
                return Err(DomError::UnknownNode(node));
            }
        }
        Ok(self.dispatch(kind.into(), target, false))
    }

    /// `element.click()`: one untrusted click, regardless of pointer-events.
    pub fn click(&mut self, node: NodeId) -> Result<DispatchRecord, DomError> {
        self.ensure_connected(node)?;
        Ok(self.dispatch(EventType::Click, EventTarget::Node(node), false))
    }

    /// A real pointer click: the element must be hit-testable, then the full
    /// pointer/mouse/click sequence is dispatched.
    pub fn user_click(&mut self, node: NodeId) -> Result<Vec<DispatchRecord>, DomError> {
        self.ensure_connected(node)?;
        if !self.document.is_hit_testable(node) {
            return Err(DomError::NotInteractive(node));
        }
        let sequence = [
            EventType::PointerDown,
            EventType::MouseDown,
            EventType::PointerUp,
            EventType::MouseUp,
            EventType::Click,
        ];
        Ok(sequence
            .into_iter()
            .map(|kind| self.dispatch(kind, EventTarget::Node(node), true))
            .collect())
    }

    fn ensure_connected(&self, node: NodeId) -> Result<(), DomError> {
        if self.document.element(node).is_none() {
            return Err(DomError::UnknownNode(node));
        }
        if !self.document.is_connected(node) {
            return Err(DomError::Detached(node));
        }
        Ok(())
    }

    fn dispatch(&mut self, kind: EventType, target: EventTarget, trusted: bool) -> DispatchRecord {
        let mut path = Vec::new();
        if let EventTarget::Node(node) = target {
            path.push(EventTarget::Window);
            let mut ancestors: Vec<EventTarget> = self
                .document
                .ancestors(node)
                .map(EventTarget::Node)
                .collect();
            ancestors.reverse();
            path.extend(ancestors);
        }

        let mut event = Event::new(kind.clone(), target, trusted);
        let policy = self.runtime.as_ref().map(|runtime| &runtime.policy);
        let scope = DispatchScope::new(&self.document, policy);
        let table = &self.listeners;
        let mut invoked = 0;

        let mut run = |event: &mut Event, current: EventTarget, phase: Phase| {
            event.enter(current, phase);
            for listener in table.for_phase(current, &kind, phase) {
                listener(&mut *event, &scope);
                invoked += 1;
                if event.immediate_propagation_stopped() {
                    break;
                }
            }
            event.propagation_stopped()
        };

        let mut stopped = path
            .iter()
            .any(|current| run(&mut event, *current, Phase::Capturing));
        if !stopped {
            stopped = run(&mut event, target, Phase::AtTarget);
        }
        if !stopped && kind.bubbles() {
            stopped = path
                .iter()
                .rev()
                .any(|current| run(&mut event, *current, Phase::Bubbling));
        }
        drop(run);

        let record = DispatchRecord {
            sequence: self.next_sequence,
            kind,
            target,
            trusted,
            listeners_invoked: invoked,
            stopped,
        };
        self.next_sequence = self.next_sequence.saturating_add(1);
        self.dispatch_log.push(record.clone());
        record
    }

    pub fn dispatch_log(&self) -> &[DispatchRecord] {
        &self.dispatch_log
    }

    /// Click events dispatched at `node` so far.
    pub fn clicks_dispatched(&self, node: NodeId) -> usize {
        self.dispatch_log
            .iter()
            .filter(|record| {
                record.kind == EventType::Click && record.target == EventTarget::Node(node)
            })
            .count()
    }

    // --- window.open / debugger --------------------------------------------

    /// `window.open(url)`. Returns whether a window was opened.
    pub fn open(&mut self, url: &str) -> bool {
        if self.window_open_blocked {
            info!(page = %self.location, requested = url, "page attempted to open new window with window.open");
            return false;
        }
        self.opened_windows.push(url.to_string());
        true
    }

    pub fn block_window_open(&mut self) {
        self.window_open_blocked = true;
    }

    pub fn window_open_blocked(&self) -> bool {
        self.window_open_blocked
    }

    pub fn opened_windows(&self) -> &[String] {
        &self.opened_windows
    }

    pub(crate) fn neutralize_debugger(&mut self) {
        self.debugger_neutralized = true;
    }

    /// Evaluates a `debugger` statement.
    pub fn debugger(&self) -> DebuggerOutcome {
        if self.debugger_neutralized {
            DebuggerOutcome::Skipped
        } else {
            DebuggerOutcome::Paused
        }
    }
}
