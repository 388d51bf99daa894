use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::selector::Selector;

/// Handle to an element inside one [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Value of the `pointer-events` style property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerEvents {
    Auto,
    None,
}

impl PointerEvents {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::None => "none",
        }
    }
}

impl fmt::Display for PointerEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("{0} is not connected to the document")]
    Detached(NodeId),
    #[error("{0} does not receive pointer events")]
    NotInteractive(NodeId),
    #[error("cannot insert {child} into {parent}: it would become its own ancestor")]
    HierarchyRequest { parent: NodeId, child: NodeId },
    #[error("the document element cannot be removed")]
    RootRemoval,
}

#[derive(Debug, Clone)]
pub struct Element {
    tag: String,
    attributes: IndexMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    pointer_events: Option<PointerEvents>,
    pub(crate) propagation_guard: bool,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: IndexMap::new(),
            text: String::new(),
            parent: None,
            children: Vec::new(),
            pointer_events: None,
            propagation_guard: false,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .unwrap_or_default()
            .split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|candidate| candidate == class)
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Inline `pointer-events` value, if one was set on this element.
    pub fn pointer_events(&self) -> Option<PointerEvents> {
        self.pointer_events
    }

    /// Whether click/mousedown stop-propagation listeners were attached to
    /// this element by reconciliation.
    pub fn has_propagation_guard(&self) -> bool {
        self.propagation_guard
    }
}

/// Element tree of one page: `html` with `head` and `body`.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Element>,
    root: NodeId,
    head: NodeId,
    body: NodeId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            nodes: vec![Element::new("html")],
            root: NodeId(0),
            head: NodeId(0),
            body: NodeId(0),
        };
        document.head = document.create_element("head");
        document.body = document.create_element("body");
        document.attach(document.root, document.head);
        document.attach(document.root, document.body);
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn head(&self) -> NodeId {
        self.head
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn element(&self, node: NodeId) -> Option<&Element> {
        self.nodes.get(node.0)
    }

    pub(crate) fn element_mut(&mut self, node: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(node.0)
    }

    fn checked(&self, node: NodeId) -> Result<&Element, DomError> {
        self.element(node).ok_or(DomError::UnknownNode(node))
    }

    fn checked_mut(&mut self, node: NodeId) -> Result<&mut Element, DomError> {
        self.element_mut(node).ok_or(DomError::UnknownNode(node))
    }

    /// Creates a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Element::new(tag));
        id
    }

    /// Creates an element with the given attributes and appends it to `parent`.
    pub fn append_element<I, K, V>(
        &mut self,
        parent: NodeId,
        tag: &str,
        attributes: I,
    ) -> Result<NodeId, DomError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        self.checked(parent)?;
        let node = self.create_element(tag);
        for (name, value) in attributes {
            self.set_attribute(node, name.as_ref(), value)?;
        }
        self.append_child(parent, node)?;
        Ok(node)
    }

    /// Appends a new attribute-less element to `parent`.
    pub fn append_plain(&mut self, parent: NodeId, tag: &str) -> Result<NodeId, DomError> {
        self.append_element(parent, tag, std::iter::empty::<(&str, String)>())
    }

    /// Moves `child` under `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.checked(parent)?;
        self.checked(child)?;
        if child == self.root || child == parent || self.ancestors(parent).any(|a| a == child) {
            return Err(DomError::HierarchyRequest { parent, child });
        }
        self.detach(child);
        self.attach(parent, child);
        Ok(())
    }

    /// Detaches `node` (and its subtree) from the tree. Returns false when it
    /// had no parent.
    pub fn remove(&mut self, node: NodeId) -> Result<bool, DomError> {
        self.checked(node)?;
        if node == self.root {
            return Err(DomError::RootRemoval);
        }
        Ok(self.detach(node))
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    fn detach(&mut self, node: NodeId) -> bool {
        let Some(parent) = self.nodes[node.0].parent.take() else {
            return false;
        };
        self.nodes[parent.0].children.retain(|child| *child != node);
        true
    }

    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        let element = self.checked_mut(node)?;
        element
            .attributes
            .insert(name.to_ascii_lowercase(), value.into());
        Ok(())
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<bool, DomError> {
        let element = self.checked_mut(node)?;
        Ok(element
            .attributes
            .shift_remove(&name.to_ascii_lowercase())
            .is_some())
    }

    pub fn set_text(&mut self, node: NodeId, text: impl Into<String>) -> Result<(), DomError> {
        self.checked_mut(node)?.text = text.into();
        Ok(())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.element(node).and_then(Element::parent)
    }

    /// Ancestors from the parent up to the document element.
    pub fn ancestors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(node), move |current| self.parent(*current))
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        node == self.root || self.ancestors(node).any(|ancestor| ancestor == self.root)
    }

    /// Every connected element in document order (`querySelectorAll('*')`).
    pub fn all_elements(&self) -> Vec<NodeId> {
        let mut ordered = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            ordered.push(node);
            stack.extend(self.nodes[node.0].children.iter().rev().copied());
        }
        ordered
    }

    pub fn query_selector(&self, selector: &Selector) -> Option<NodeId> {
        self.all_elements()
            .into_iter()
            .find(|node| selector.matches(self, *node))
    }

    pub fn query_selector_all(&self, selector: &Selector) -> Vec<NodeId> {
        self.all_elements()
            .into_iter()
            .filter(|node| selector.matches(self, *node))
            .collect()
    }

    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        self.all_elements()
            .into_iter()
            .find(|node| self.nodes[node.0].id() == Some(id))
    }

    pub fn matches(&self, node: NodeId, selector: &Selector) -> bool {
        selector.matches(self, node)
    }

    pub fn set_pointer_events(
        &mut self,
        node: NodeId,
        value: Option<PointerEvents>,
    ) -> Result<(), DomError> {
        self.checked_mut(node)?.pointer_events = value;
        Ok(())
    }

    /// Resolved `pointer-events`: the nearest inline value on the element or
    /// its ancestors, `auto` when none is set.
    pub fn computed_pointer_events(&self, node: NodeId) -> PointerEvents {
        std::iter::once(node)
            .chain(self.ancestors(node))
            .find_map(|current| self.element(current).and_then(Element::pointer_events))
            .unwrap_or(PointerEvents::Auto)
    }

    /// Whether a real pointer at the element's position would hit it.
    pub fn is_hit_testable(&self, node: NodeId) -> bool {
        self.is_connected(node) && self.computed_pointer_events(node) == PointerEvents::Auto
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_head_and_body() {
        let doc = Document::new();
        assert_eq!(doc.all_elements(), vec![doc.root(), doc.head(), doc.body()]);
        assert_eq!(doc.element(doc.body()).unwrap().tag(), "body");
        assert!(doc.is_connected(doc.body()));
    }

    #[test]
    fn append_and_remove_maintain_document_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let first = doc.append_element(body, "div", [("id", "first")]).unwrap();
        let inner = doc.append_plain(first, "span").unwrap();
        let second = doc.append_element(body, "div", [("id", "second")]).unwrap();

        let order = doc.all_elements();
        assert_eq!(&order[2..], &[body, first, inner, second]);

        assert!(doc.remove(first).unwrap());
        assert!(!doc.is_connected(inner));
        assert_eq!(doc.get_element_by_id("first"), None);
        assert_eq!(doc.get_element_by_id("second"), Some(second));
        assert!(!doc.remove(first).unwrap());
    }

    #[test]
    fn rejects_cycles_and_root_removal() {
        let mut doc = Document::new();
        let outer = doc.append_plain(doc.body(), "div").unwrap();
        let inner = doc.append_plain(outer, "div").unwrap();
        assert_eq!(
            doc.append_child(inner, outer),
            Err(DomError::HierarchyRequest {
                parent: inner,
                child: outer
            })
        );
        assert_eq!(doc.remove(doc.root()), Err(DomError::RootRemoval));
        assert_eq!(
            doc.set_text(NodeId(99), "x"),
            Err(DomError::UnknownNode(NodeId(99)))
        );
    }

    #[test]
    fn pointer_events_inherit_from_nearest_inline_value() {
        let mut doc = Document::new();
        let body = doc.body();
        let outer = doc.append_plain(body, "div").unwrap();
        let inner = doc.append_plain(outer, "a").unwrap();

        assert_eq!(doc.computed_pointer_events(inner), PointerEvents::Auto);
        doc.set_pointer_events(body, Some(PointerEvents::None)).unwrap();
        assert_eq!(doc.computed_pointer_events(inner), PointerEvents::None);
        assert!(!doc.is_hit_testable(inner));

        doc.set_pointer_events(inner, Some(PointerEvents::Auto)).unwrap();
        assert!(doc.is_hit_testable(inner));
        assert!(!doc.is_hit_testable(outer));
    }

    #[test]
    fn query_selector_returns_first_in_document_order() {
        let mut doc = Document::new();
        let body = doc.body();
        let a = doc.append_element(body, "button", [("class", "buy")]).unwrap();
        let b = doc.append_element(body, "button", [("class", "buy")]).unwrap();
        let selector = Selector::parse("button.buy").unwrap();

        assert_eq!(doc.query_selector(&selector), Some(a));
        assert_eq!(doc.query_selector_all(&selector), vec![a, b]);
        assert!(doc.matches(b, &selector));
    }
}
