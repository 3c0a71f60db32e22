use crate::utils::{char_len, char_slice};

use super::{DomError, Document, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundary {
    pub node: NodeId,
    pub offset: usize,
}

impl Boundary {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }
}

/// A start/end boundary pair. Ranges are snapshots, not live: anything that
/// reads through one re-validates it against the current tree first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomRange {
    pub start: Boundary,
    pub end: Boundary,
}

impl DomRange {
    pub fn new(start: Boundary, end: Boundary) -> Self {
        Self { start, end }
    }

    pub fn collapsed(at: Boundary) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    pub fn offsets_within(&self, doc: &Document, root: NodeId) -> Option<(usize, usize)> {
        let start = offset_within(doc, root, self.start)?;
        let end = offset_within(doc, root, self.end)?;
        (start <= end).then_some((start, end))
    }

    pub fn text_within(&self, doc: &Document, root: NodeId) -> Option<String> {
        let (start, end) = self.offsets_within(doc, root)?;
        let content = doc.text_content(root);
        Some(char_slice(&content, start, end).to_string())
    }
}

pub fn text_before(doc: &Document, root: NodeId, boundary: Boundary) -> Option<String> {
    let offset = offset_within(doc, root, boundary)?;
    let content = doc.text_content(root);
    Some(char_slice(&content, 0, offset).to_string())
}

pub fn offset_within(doc: &Document, root: NodeId, boundary: Boundary) -> Option<usize> {
    if !doc.is_connected(root) || !doc.contains(root, boundary.node) {
        return None;
    }
    if boundary.offset > doc.boundary_len(boundary.node) {
        return None;
    }
    let mut accumulated = 0;
    measure(doc, root, boundary, &mut accumulated).then_some(accumulated)
}

fn measure(doc: &Document, node: NodeId, target: Boundary, accumulated: &mut usize) -> bool {
    if doc.is_text(node) {
        if node == target.node {
            *accumulated += target.offset;
            return true;
        }
        *accumulated += doc.text_len(node);
        return false;
    }
    for (index, child) in doc.children(node).iter().enumerate() {
        if node == target.node && index == target.offset {
            return true;
        }
        if measure(doc, *child, target, accumulated) {
            return true;
        }
    }
    node == target.node
}

/// Removes the range's content and inserts `text` as a new text node at the
/// collapsed start. Both boundaries must sit in text nodes.
pub fn replace_contents(doc: &mut Document, range: &DomRange, text: &str) -> Result<NodeId, DomError> {
    let DomRange { start, end } = *range;
    let start_text = doc
        .text(start.node)
        .ok_or(DomError::NotText(start.node))?
        .to_string();
    let end_text = doc
        .text(end.node)
        .ok_or(DomError::NotText(end.node))?
        .to_string();
    if start.offset > char_len(&start_text) {
        return Err(DomError::OffsetOutOfBounds {
            node: start.node,
            offset: start.offset,
        });
    }
    if end.offset > char_len(&end_text) {
        return Err(DomError::OffsetOutOfBounds {
            node: end.node,
            offset: end.offset,
        });
    }

    if start.node == end.node {
        let merged = format!(
            "{}{}",
            char_slice(&start_text, 0, start.offset),
            char_slice(&start_text, end.offset, usize::MAX)
        );
        doc.set_text(start.node, &merged)?;
    } else {
        let contained = contained_nodes(doc, start.node, end.node);
        doc.set_text(start.node, char_slice(&start_text, 0, start.offset))?;
        doc.set_text(end.node, char_slice(&end_text, end.offset, usize::MAX))?;
        for node in &contained {
            let parent_removed = doc
                .parent(*node)
                .is_some_and(|parent| contained.contains(&parent));
            if !parent_removed {
                doc.remove(*node)?;
            }
        }
    }

    if start.offset < doc.text_len(start.node) {
        doc.split_text(start.node, start.offset)?;
    }
    let inserted = doc.create_text(text);
    doc.insert_after(start.node, inserted)?;
    Ok(inserted)
}

fn contained_nodes(doc: &Document, start: NodeId, end: NodeId) -> Vec<NodeId> {
    let mut nodes = Vec::new();
    let mut current = next_in_order(doc, start);
    while let Some(node) = current {
        if node == end {
            break;
        }
        if !doc.contains(node, end) {
            nodes.push(node);
        }
        current = next_in_order(doc, node);
    }
    nodes
}

fn next_in_order(doc: &Document, node: NodeId) -> Option<NodeId> {
    if let Some(child) = doc.first_child(node) {
        return Some(child);
    }
    let mut current = node;
    loop {
        if let Some(sibling) = doc.next_sibling(current) {
            return Some(sibling);
        }
        current = doc.parent(current)?;
    }
}
