use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId};
use crate::policy::PolicyState;

/// DOM event types the runtime distinguishes. Anything else is `Custom`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    Click,
    MouseDown,
    MouseUp,
    PointerDown,
    PointerUp,
    Load,
    DomContentLoaded,
    Custom(String),
}

impl EventType {
    /// The click family gated by the enforcement mechanisms.
    pub const POINTER_FAMILY: [EventType; 5] = [
        EventType::Click,
        EventType::MouseDown,
        EventType::MouseUp,
        EventType::PointerDown,
        EventType::PointerUp,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            Self::Click => "click",
            Self::MouseDown => "mousedown",
            Self::MouseUp => "mouseup",
            Self::PointerDown => "pointerdown",
            Self::PointerUp => "pointerup",
            Self::Load => "load",
            Self::DomContentLoaded => "DOMContentLoaded",
            Self::Custom(name) => name,
        }
    }

    /// Event type names are case-sensitive, as in the DOM.
    pub fn parse(value: &str) -> Self {
        match value {
            "click" => Self::Click,
            "mousedown" => Self::MouseDown,
            "mouseup" => Self::MouseUp,
            "pointerdown" => Self::PointerDown,
            "pointerup" => Self::PointerUp,
            "load" => Self::Load,
            "DOMContentLoaded" => Self::DomContentLoaded,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn is_pointer_family(&self) -> bool {
        Self::POINTER_FAMILY.contains(self)
    }

    pub fn bubbles(&self) -> bool {
        !matches!(self, Self::Load)
    }
}

impl FromStr for EventType {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(value))
    }
}

impl From<&str> for EventType {
    fn from(value: &str) -> Self {
        Self::parse(value)
    }
}

impl From<String> for EventType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<EventType> for String {
    fn from(value: EventType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTarget {
    Window,
    Node(NodeId),
}

impl From<NodeId> for EventTarget {
    fn from(node: NodeId) -> Self {
        Self::Node(node)
    }
}

impl fmt::Display for EventTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Window => f.write_str("window"),
            Self::Node(node) => write!(f, "{node}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    None,
    Capturing,
    AtTarget,
    Bubbling,
}

/// An event travelling through the dispatch path.
#[derive(Debug, Clone)]
pub struct Event {
    kind: EventType,
    target: EventTarget,
    current_target: EventTarget,
    phase: Phase,
    trusted: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
}

impl Event {
    pub fn new(kind: EventType, target: EventTarget, trusted: bool) -> Self {
        Self {
            kind,
            target,
            current_target: target,
            phase: Phase::None,
            trusted,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
        }
    }

    pub fn kind(&self) -> &EventType {
        &self.kind
    }

    pub fn target(&self) -> EventTarget {
        self.target
    }

    pub fn target_node(&self) -> Option<NodeId> {
        match self.target {
            EventTarget::Node(node) => Some(node),
            EventTarget::Window => None,
        }
    }

    pub fn current_target(&self) -> EventTarget {
        self.current_target
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    /// Remaining listeners on the current target still run.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped
    }

    pub(crate) fn enter(&mut self, current_target: EventTarget, phase: Phase) {
        self.current_target = current_target;
        self.phase = phase;
    }
}

/// Read-only view of the page handed to listeners during dispatch.
pub struct DispatchScope<'a> {
    document: &'a Document,
    policy: Option<&'a PolicyState>,
}

impl<'a> DispatchScope<'a> {
    pub(crate) fn new(document: &'a Document, policy: Option<&'a PolicyState>) -> Self {
        Self { document, policy }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    pub fn policy(&self) -> Option<&'a PolicyState> {
        self.policy
    }
}

pub type Listener = Arc<dyn Fn(&mut Event, &DispatchScope<'_>) + Send + Sync>;

pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&mut Event, &DispatchScope<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// How a listener is attached to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerSlot {
    /// `addEventListener(type, listener, capture)`.
    Added { capture: bool },
    /// `element.on<type> = handler`; one slot per target and type.
    Inline,
}

#[derive(Clone)]
pub struct Registration {
    pub target: EventTarget,
    pub kind: EventType,
    pub listener: Listener,
    pub slot: ListenerSlot,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("target", &self.target)
            .field("kind", &self.kind)
            .field("slot", &self.slot)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Added,
    Replaced,
    Duplicate,
    Dropped,
}

struct ListenerEntry {
    kind: EventType,
    listener: Listener,
    slot: ListenerSlot,
}

impl ListenerEntry {
    fn captures(&self) -> bool {
        matches!(self.slot, ListenerSlot::Added { capture: true })
    }
}

/// Listeners per target, in registration order.
#[derive(Default)]
pub struct ListenerTable {
    entries: HashMap<EventTarget, Vec<ListenerEntry>>,
}

impl ListenerTable {
    pub fn insert(&mut self, registration: Registration) -> RegistrationOutcome {
        let Registration {
            target,
            kind,
            listener,
            slot,
        } = registration;
        let entries = self.entries.entry(target).or_default();

        match slot {
            ListenerSlot::Inline => {
                if let Some(existing) = entries
                    .iter_mut()
                    .find(|entry| entry.slot == ListenerSlot::Inline && entry.kind == kind)
                {
                    existing.listener = listener;
                    return RegistrationOutcome::Replaced;
                }
            }
            ListenerSlot::Added { .. } => {
                let duplicate = entries.iter().any(|entry| {
                    entry.slot == slot && entry.kind == kind && Arc::ptr_eq(&entry.listener, &listener)
                });
                if duplicate {
                    return RegistrationOutcome::Duplicate;
                }
            }
        }

        entries.push(ListenerEntry {
            kind,
            listener,
            slot,
        });
        RegistrationOutcome::Added
    }

    pub fn remove_inline(&mut self, target: EventTarget, kind: &EventType) -> bool {
        let Some(entries) = self.entries.get_mut(&target) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| !(entry.slot == ListenerSlot::Inline && &entry.kind == kind));
        entries.len() != before
    }

    /// Number of listeners of `kind` on `target`, inline handlers included.
    pub fn count(&self, target: EventTarget, kind: &EventType) -> usize {
        self.entries
            .get(&target)
            .map(|entries| entries.iter().filter(|entry| &entry.kind == kind).count())
            .unwrap_or(0)
    }

    /// Listeners to run on `target` for the given phase. At the target,
    /// capturing listeners run before the others.
    pub(crate) fn for_phase(&self, target: EventTarget, kind: &EventType, phase: Phase) -> Vec<Listener> {
        let Some(entries) = self.entries.get(&target) else {
            return Vec::new();
        };
        let of_kind = entries.iter().filter(|entry| &entry.kind == kind);
        match phase {
            Phase::Capturing => of_kind
                .filter(|entry| entry.captures())
                .map(|entry| entry.listener.clone())
                .collect(),
            Phase::Bubbling => of_kind
                .filter(|entry| !entry.captures())
                .map(|entry| entry.listener.clone())
                .collect(),
            Phase::AtTarget => {
                let (capturing, other): (Vec<_>, Vec<_>) =
                    of_kind.partition(|entry| entry.captures());
                capturing
                    .into_iter()
                    .chain(other)
                    .map(|entry| entry.listener.clone())
                    .collect()
            }
            Phase::None => Vec::new(),
        }
    }
}

impl fmt::Debug for ListenerTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<String, usize> = self
            .entries
            .iter()
            .map(|(target, entries)| (target.to_string(), entries.len()))
            .collect();
        f.debug_struct("ListenerTable").field("listeners", &counts).finish()
    }
}

/// The page's capability for registering event listeners. The window holds
/// one; enforcement may decorate it.
pub trait ListenerRegistrar: fmt::Debug + Send + Sync {
    fn register(&self, table: &mut ListenerTable, registration: Registration) -> RegistrationOutcome;
}

/// Registration as the browser performs it.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeRegistrar;

impl ListenerRegistrar for NativeRegistrar {
    fn register(&self, table: &mut ListenerTable, registration: Registration) -> RegistrationOutcome {
        table.insert(registration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() -> Listener {
        listener(|_, _| {})
    }

    fn added(target: EventTarget, kind: EventType, listener: Listener, capture: bool) -> Registration {
        Registration {
            target,
            kind,
            listener,
            slot: ListenerSlot::Added { capture },
        }
    }

    #[test]
    fn event_type_names_round_trip() {
        for kind in EventType::POINTER_FAMILY {
            assert_eq!(EventType::parse(kind.as_str()), kind);
            assert!(kind.is_pointer_family());
        }
        assert_eq!(EventType::parse("Click"), EventType::Custom("Click".into()));
        assert!(!EventType::Load.bubbles());
        assert!(!EventType::Load.is_pointer_family());
    }

    #[test]
    fn duplicate_registrations_are_ignored() {
        let mut table = ListenerTable::default();
        let shared = noop();
        let target = EventTarget::Window;

        let first = table.insert(added(target, EventType::Click, shared.clone(), false));
        let again = table.insert(added(target, EventType::Click, shared.clone(), false));
        let capture = table.insert(added(target, EventType::Click, shared, true));

        assert_eq!(first, RegistrationOutcome::Added);
        assert_eq!(again, RegistrationOutcome::Duplicate);
        assert_eq!(capture, RegistrationOutcome::Added);
        assert_eq!(table.count(target, &EventType::Click), 2);
    }

    #[test]
    fn inline_handlers_keep_a_single_slot() {
        let mut table = ListenerTable::default();
        let target = EventTarget::Window;
        let inline = |listener| Registration {
            target,
            kind: EventType::Click,
            listener,
            slot: ListenerSlot::Inline,
        };

        assert_eq!(table.insert(inline(noop())), RegistrationOutcome::Added);
        assert_eq!(table.insert(inline(noop())), RegistrationOutcome::Replaced);
        assert_eq!(table.count(target, &EventType::Click), 1);
        assert!(table.remove_inline(target, &EventType::Click));
        assert!(!table.remove_inline(target, &EventType::Click));
    }

    #[test]
    fn capturing_listeners_run_first_at_target() {
        let mut table = ListenerTable::default();
        let target = EventTarget::Window;
        let bubble = noop();
        let capture = noop();
        table.insert(added(target, EventType::Click, bubble.clone(), false));
        table.insert(added(target, EventType::Click, capture.clone(), true));

        let at_target = table.for_phase(target, &EventType::Click, Phase::AtTarget);
        assert!(Arc::ptr_eq(&at_target[0], &capture));
        assert!(Arc::ptr_eq(&at_target[1], &bubble));
        assert_eq!(table.for_phase(target, &EventType::Click, Phase::Capturing).len(), 1);
        assert_eq!(table.for_phase(target, &EventType::Click, Phase::Bubbling).len(), 1);
    }
}
