pub mod layout;
pub mod range;
pub mod walk;

use std::collections::BTreeMap;

use thiserror::Error;

use crate::utils::{char_len, char_slice};

pub use layout::{GridLayout, Layout, Rect};
pub use range::{Boundary, DomRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomError {
    #[error("node {0:?} does not belong to this document")]
    UnknownNode(NodeId),
    #[error("node {0:?} cannot have children")]
    NotAContainer(NodeId),
    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    Cycle { parent: NodeId, child: NodeId },
    #[error("node {0:?} is not a child of the given parent")]
    NotAChild(NodeId),
    #[error("node {0:?} is not a text node")]
    NotText(NodeId),
    #[error("node {0:?} is not a text control")]
    NotAControl(NodeId),
    #[error("offset {offset} is out of bounds for node {node:?}")]
    OffsetOutOfBounds { node: NodeId, offset: usize },
}

/// Undrained events beyond this are discarded oldest first.
pub const MAX_PENDING_EVENTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomEventKind {
    Input,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    pub kind: DomEventKind,
    pub target: NodeId,
    pub bubbles: bool,
    pub trusted: bool,
}

#[derive(Debug, Clone, Default)]
struct ControlState {
    value: String,
    selection_start: usize,
    selection_end: usize,
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
        control: Option<ControlState>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    active_element: Option<NodeId>,
    selection: Option<DomRange>,
    events: Vec<DomEvent>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            nodes: Vec::new(),
            root: NodeId(0),
            body: NodeId(0),
            active_element: None,
            selection: None,
            events: Vec::new(),
        };
        let root = document.create_element("html");
        let body = document.create_element("body");
        document.nodes[body.0].parent = Some(root);
        document.nodes[root.0].children.push(body);
        document.root = root;
        document.body = body;
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let control = matches!(tag.as_str(), "input" | "textarea").then(ControlState::default);
        self.push(NodeData::Element {
            tag,
            attributes: BTreeMap::new(),
            control,
        })
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeData::Text(text.to_string()))
    }

    fn push(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.insert_before(parent, child, None)
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        if self.node(child).is_none() {
            return Err(DomError::UnknownNode(child));
        }
        if !self.is_element(parent) {
            return match self.node(parent) {
                Some(_) => Err(DomError::NotAContainer(parent)),
                None => Err(DomError::UnknownNode(parent)),
            };
        }
        if self.contains(child, parent) {
            return Err(DomError::Cycle { parent, child });
        }
        if let Some(reference) = reference {
            if self.parent(reference) != Some(parent) {
                return Err(DomError::NotAChild(reference));
            }
        }

        self.detach(child);
        let index = match reference {
            Some(reference) => self
                .index_in_parent(reference)
                .ok_or(DomError::NotAChild(reference))?,
            None => self.children(parent).len(),
        };
        self.node_mut(parent)?.children.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn insert_after(&mut self, node: NodeId, new_node: NodeId) -> Result<(), DomError> {
        let parent = self.parent(node).ok_or(DomError::NotAChild(node))?;
        let next = self.next_sibling(node);
        self.insert_before(parent, new_node, next)
    }

    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        if self.node(node).is_none() {
            return Err(DomError::UnknownNode(node));
        }
        self.detach(node);
        if self
            .active_element
            .is_some_and(|active| self.contains(node, active))
        {
            self.active_element = None;
        }
        Ok(())
    }

    fn detach(&mut self, node: NodeId) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        if let Some(parent_node) = self.nodes.get_mut(parent.0) {
            parent_node.children.retain(|child| *child != node);
        }
        if let Some(child_node) = self.nodes.get_mut(node.0) {
            child_node.parent = None;
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|node| node.parent)
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).first().copied()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.children(node).last().copied()
    }

    pub fn index_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        self.children(parent).iter().position(|child| *child == node)
    }

    pub fn previous_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        index
            .checked_sub(1)
            .and_then(|previous| self.children(parent).get(previous).copied())
    }

    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let parent = self.parent(node)?;
        let index = self.index_in_parent(node)?;
        self.children(parent).get(index + 1).copied()
    }

    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.parent(id);
        }
        false
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        self.contains(self.root, node)
    }

    pub fn is_text(&self, node: NodeId) -> bool {
        matches!(self.node(node), Some(Node { data: NodeData::Text(_), .. }))
    }

    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.node(node), Some(Node { data: NodeData::Element { .. }, .. }))
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.node(node)?.data {
            NodeData::Element { tag, .. } => Some(tag.as_str()),
            NodeData::Text(_) => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.node(node)?.data {
            NodeData::Element { attributes, .. } => attributes
                .get(&name.to_ascii_lowercase())
                .map(String::as_str),
            NodeData::Text(_) => None,
        }
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.data {
            NodeData::Element { attributes, .. } => {
                attributes.insert(name.to_ascii_lowercase(), value.to_string());
                Ok(())
            }
            NodeData::Text(_) => Err(DomError::NotAContainer(node)),
        }
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.data {
            NodeData::Element { attributes, .. } => {
                attributes.remove(&name.to_ascii_lowercase());
                Ok(())
            }
            NodeData::Text(_) => Err(DomError::NotAContainer(node)),
        }
    }

    pub fn text(&self, node: NodeId) -> Option<&str> {
        match &self.node(node)?.data {
            NodeData::Text(text) => Some(text.as_str()),
            NodeData::Element { .. } => None,
        }
    }

    pub fn set_text(&mut self, node: NodeId, text: &str) -> Result<(), DomError> {
        match &mut self.node_mut(node)?.data {
            NodeData::Text(content) => {
                *content = text.to_string();
                Ok(())
            }
            NodeData::Element { .. } => Err(DomError::NotText(node)),
        }
    }

    pub fn text_len(&self, node: NodeId) -> usize {
        self.text(node).map(char_len).unwrap_or(0)
    }

    pub fn boundary_len(&self, node: NodeId) -> usize {
        match self.text(node) {
            Some(text) => char_len(text),
            None => self.children(node).len(),
        }
    }

    pub fn text_content(&self, node: NodeId) -> String {
        let mut content = String::new();
        self.collect_text(node, &mut content);
        content
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        if let Some(text) = self.text(node) {
            out.push_str(text);
            return;
        }
        for child in self.children(node) {
            self.collect_text(*child, out);
        }
    }

    pub fn split_text(&mut self, node: NodeId, offset: usize) -> Result<NodeId, DomError> {
        let text = self.text(node).ok_or(DomError::NotText(node))?.to_string();
        if offset > char_len(&text) {
            return Err(DomError::OffsetOutOfBounds { node, offset });
        }
        let head = char_slice(&text, 0, offset).to_string();
        let tail = char_slice(&text, offset, usize::MAX).to_string();
        self.set_text(node, &head)?;
        let tail_node = self.create_text(&tail);
        if self.parent(node).is_some() {
            self.insert_after(node, tail_node)?;
        }
        Ok(tail_node)
    }

    pub fn is_content_editable(&self, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if let Some(value) = self.attribute(id, "contenteditable") {
                match value.trim().to_ascii_lowercase().as_str() {
                    "" | "true" | "plaintext-only" => return true,
                    "false" => return false,
                    _ => {}
                }
            }
            current = self.parent(id);
        }
        false
    }

    pub fn editing_host(&self, node: NodeId) -> Option<NodeId> {
        if !self.is_content_editable(node) {
            return None;
        }
        let mut host = node;
        while let Some(parent) = self.parent(host) {
            if !self.is_content_editable(parent) {
                break;
            }
            host = parent;
        }
        Some(host)
    }

    pub fn closest(&self, node: NodeId, predicate: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        let mut current = Some(node);
        while let Some(id) = current {
            if predicate(self, id) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    fn control(&self, node: NodeId) -> Option<&ControlState> {
        match &self.node(node)?.data {
            NodeData::Element { control, .. } => control.as_ref(),
            NodeData::Text(_) => None,
        }
    }

    fn control_mut(&mut self, node: NodeId) -> Result<&mut ControlState, DomError> {
        match &mut self.node_mut(node)?.data {
            NodeData::Element {
                control: Some(control),
                ..
            } => Ok(control),
            _ => Err(DomError::NotAControl(node)),
        }
    }

    pub fn value(&self, node: NodeId) -> Option<&str> {
        self.control(node).map(|control| control.value.as_str())
    }

    /// Replaces a control's value. Like a browser, the caret moves to the end.
    pub fn set_value(&mut self, node: NodeId, value: &str) -> Result<(), DomError> {
        let control = self.control_mut(node)?;
        control.value = value.to_string();
        let end = char_len(value);
        control.selection_start = end;
        control.selection_end = end;
        Ok(())
    }

    pub fn selection_range(&self, node: NodeId) -> Option<(usize, usize)> {
        self.control(node)
            .map(|control| (control.selection_start, control.selection_end))
    }

    pub fn set_selection_range(
        &mut self,
        node: NodeId,
        start: usize,
        end: usize,
    ) -> Result<(), DomError> {
        let control = self.control_mut(node)?;
        let len = char_len(&control.value);
        let end = end.min(len);
        control.selection_start = start.min(end);
        control.selection_end = end;
        Ok(())
    }

    pub fn active_element(&self) -> Option<NodeId> {
        self.active_element
    }

    pub fn focus(&mut self, node: NodeId) {
        if self.is_connected(node) {
            self.active_element = Some(node);
        }
    }

    pub fn blur(&mut self) {
        self.active_element = None;
    }

    pub fn selection(&self) -> Option<&DomRange> {
        self.selection.as_ref()
    }

    pub fn set_selection(&mut self, range: DomRange) {
        self.selection = Some(range);
    }

    pub fn collapse_selection(&mut self, boundary: Boundary) {
        self.selection = Some(DomRange::collapsed(boundary));
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    pub fn dispatch_input(&mut self, target: NodeId) {
        if self.events.len() >= MAX_PENDING_EVENTS {
            self.events.remove(0);
        }
        self.events.push(DomEvent {
            kind: DomEventKind::Input,
            target,
            bubbles: true,
            trusted: false,
        });
    }

    pub fn events(&self) -> &[DomEvent] {
        &self.events
    }

    pub fn take_events(&mut self) -> Vec<DomEvent> {
        std::mem::take(&mut self.events)
    }
}

pub struct Page {
    pub document: Document,
    pub layout: Box<dyn Layout + Send>,
}

impl Page {
    pub fn new(document: Document, layout: impl Layout + Send + 'static) -> Self {
        Self {
            document,
            layout: Box::new(layout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_keeps_only_the_newest_entries() {
        let mut doc = Document::new();
        let first = doc.create_element("input");
        let last = doc.create_element("textarea");
        doc.dispatch_input(first);
        for _ in 0..MAX_PENDING_EVENTS - 1 {
            doc.dispatch_input(last);
        }
        assert_eq!(doc.events()[0].target, first);

        doc.dispatch_input(last);
        assert_eq!(doc.events().len(), MAX_PENDING_EVENTS);
        assert!(doc.events().iter().all(|event| event.target == last));

        let drained = doc.take_events();
        assert_eq!(drained.len(), MAX_PENDING_EVENTS);
        assert!(doc.events().is_empty());
    }

    #[test]
    fn insert_before_reorders_and_detaches() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        let a = doc.create_text("a");
        let b = doc.create_text("b");
        doc.append_child(doc.body(), div).expect("append div");
        doc.append_child(div, b).expect("append b");
        doc.insert_before(div, a, Some(b)).expect("insert a");

        assert_eq!(doc.children(div), &[a, b]);
        assert_eq!(doc.text_content(div), "ab");

        doc.remove(a).expect("remove a");
        assert_eq!(doc.children(div), &[b]);
        assert!(!doc.is_connected(a));
        assert!(doc.is_connected(b));
    }

    #[test]
    fn cycles_are_rejected() {
        let mut doc = Document::new();
        let outer = doc.create_element("div");
        let inner = doc.create_element("span");
        doc.append_child(outer, inner).expect("append inner");

        assert_eq!(
            doc.append_child(inner, outer),
            Err(DomError::Cycle {
                parent: inner,
                child: outer
            })
        );
    }

    #[test]
    fn contenteditable_inherits_and_respects_false() {
        let mut doc = Document::new();
        let host = doc.create_element("div");
        let inner = doc.create_element("p");
        let locked = doc.create_element("span");
        doc.set_attribute(host, "contenteditable", "").expect("attr");
        doc.set_attribute(locked, "contenteditable", "false").expect("attr");
        doc.append_child(doc.body(), host).expect("append host");
        doc.append_child(host, inner).expect("append inner");
        doc.append_child(inner, locked).expect("append locked");

        assert!(doc.is_content_editable(inner));
        assert!(!doc.is_content_editable(locked));
        assert_eq!(doc.editing_host(inner), Some(host));
        assert_eq!(doc.editing_host(locked), None);
    }

    #[test]
    fn set_value_moves_caret_to_end() {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.set_value(input, "héllo").expect("value");
        assert_eq!(doc.selection_range(input), Some((5, 5)));

        doc.set_selection_range(input, 9, 2).expect("selection");
        assert_eq!(doc.selection_range(input), Some((2, 2)));
    }

    #[test]
    fn split_text_keeps_head_in_place() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let text = doc.create_text("hello world");
        doc.append_child(p, text).expect("append");

        let tail = doc.split_text(text, 5).expect("split");
        assert_eq!(doc.text(text), Some("hello"));
        assert_eq!(doc.text(tail), Some(" world"));
        assert_eq!(doc.children(p), &[text, tail]);
    }
}
