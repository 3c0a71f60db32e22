use super::{Boundary, Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

pub struct TextLeaves<'a> {
    doc: &'a Document,
    root: NodeId,
    current: Option<NodeId>,
    direction: Direction,
}

impl<'a> TextLeaves<'a> {
    pub fn new(doc: &'a Document, root: NodeId, from: NodeId, direction: Direction) -> Self {
        Self {
            doc,
            root,
            current: Some(from),
            direction,
        }
    }

    pub fn forward(doc: &'a Document, root: NodeId, from: NodeId) -> Self {
        Self::new(doc, root, from, Direction::Forward)
    }

    pub fn backward(doc: &'a Document, root: NodeId, from: NodeId) -> Self {
        Self::new(doc, root, from, Direction::Backward)
    }

    fn step(&self, node: NodeId) -> Option<NodeId> {
        let mut current = node;
        loop {
            if current == self.root {
                return None;
            }
            let sibling = match self.direction {
                Direction::Backward => self.doc.previous_sibling(current),
                Direction::Forward => self.doc.next_sibling(current),
            };
            match sibling {
                Some(sibling) => {
                    return Some(match self.direction {
                        Direction::Backward => last_leaf(self.doc, sibling),
                        Direction::Forward => first_leaf(self.doc, sibling),
                    });
                }
                None => current = self.doc.parent(current)?,
            }
        }
    }
}

impl Iterator for TextLeaves<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        loop {
            let from = self.current?;
            let next = self.step(from);
            self.current = next;
            let node = next?;
            if !self.doc.contains(self.root, node) {
                self.current = None;
                return None;
            }
            if self.doc.is_text(node) && self.doc.text_len(node) > 0 {
                return Some(node);
            }
        }
    }
}

pub fn first_leaf(doc: &Document, node: NodeId) -> NodeId {
    let mut current = node;
    while let Some(child) = doc.first_child(current) {
        current = child;
    }
    current
}

pub fn last_leaf(doc: &Document, node: NodeId) -> NodeId {
    let mut current = node;
    while let Some(child) = doc.last_child(current) {
        current = child;
    }
    current
}

pub fn previous_text_node(doc: &Document, node: NodeId, root: NodeId) -> Option<NodeId> {
    TextLeaves::backward(doc, root, node).next()
}

pub fn next_text_node(doc: &Document, node: NodeId, root: NodeId) -> Option<NodeId> {
    TextLeaves::forward(doc, root, node).next()
}

/// Rewrites a boundary as a text position with the same text before it.
/// Element boundaries resolve to the end of the nearest preceding text leaf.
pub fn text_position_before(doc: &Document, root: NodeId, boundary: Boundary) -> Option<Boundary> {
    if doc.is_text(boundary.node) {
        return Some(boundary);
    }
    let children = doc.children(boundary.node);
    let node = match boundary.offset.checked_sub(1).and_then(|index| children.get(index)) {
        Some(child) => {
            let leaf = last_leaf(doc, *child);
            if doc.is_text(leaf) {
                leaf
            } else {
                previous_text_node(doc, leaf, root)?
            }
        }
        None => previous_text_node(doc, boundary.node, root)?,
    };
    Some(Boundary::new(node, doc.text_len(node)))
}

pub fn text_position_after(doc: &Document, root: NodeId, boundary: Boundary) -> Option<Boundary> {
    if doc.is_text(boundary.node) {
        return Some(boundary);
    }
    let node = match doc.children(boundary.node).get(boundary.offset) {
        Some(child) => {
            let leaf = first_leaf(doc, *child);
            if doc.is_text(leaf) {
                leaf
            } else {
                next_text_node(doc, leaf, root)?
            }
        }
        None => next_text_node(doc, boundary.node, root)?,
    };
    Some(Boundary::new(node, 0))
}

/// Moves `boundary` back by `characters`, crossing text nodes inside `root`.
/// Fails when the start of `root` is reached first.
pub fn expand_backward(
    doc: &Document,
    root: NodeId,
    boundary: Boundary,
    characters: usize,
) -> Option<Boundary> {
    let mut position = text_position_before(doc, root, boundary)?;
    let mut remaining = characters;
    let mut leaves = TextLeaves::backward(doc, root, position.node);
    loop {
        let available = position.offset.min(doc.text_len(position.node));
        if available >= remaining {
            return Some(Boundary::new(position.node, available - remaining));
        }
        remaining -= available;
        let previous = leaves.next()?;
        position = Boundary::new(previous, doc.text_len(previous));
    }
}

pub fn expand_forward(
    doc: &Document,
    root: NodeId,
    boundary: Boundary,
    characters: usize,
) -> Option<Boundary> {
    let mut position = text_position_after(doc, root, boundary)?;
    let mut remaining = characters;
    let mut leaves = TextLeaves::forward(doc, root, position.node);
    loop {
        let len = doc.text_len(position.node);
        let available = len.saturating_sub(position.offset);
        if available >= remaining {
            return Some(Boundary::new(position.node, position.offset + remaining));
        }
        remaining -= available;
        let next = leaves.next()?;
        position = Boundary::new(next, 0);
    }
}

pub fn char_after(doc: &Document, root: NodeId, boundary: Boundary) -> Option<char> {
    let end = expand_forward(doc, root, boundary, 1)?;
    let offset = end.offset.checked_sub(1)?;
    doc.text(end.node)?.chars().nth(offset)
}
