use std::collections::HashMap;

use super::{Document, DomRange, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.left.min(other.left);
        let top = self.top.min(other.top);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }
}

pub trait Layout {
    fn element_rect(&self, doc: &Document, node: NodeId) -> Option<Rect>;
    fn range_rect(&self, doc: &Document, range: &DomRange) -> Option<Rect>;
    fn scroll_offset(&self) -> (f64, f64);
}

#[derive(Debug, Clone, Default)]
pub struct GridLayout {
    element_rects: HashMap<NodeId, Rect>,
    text_origins: HashMap<NodeId, (f64, f64)>,
    glyph_width: f64,
    line_height: f64,
    scroll: (f64, f64),
}

impl GridLayout {
    pub fn new(glyph_width: f64, line_height: f64) -> Self {
        Self {
            glyph_width,
            line_height,
            ..Self::default()
        }
    }

    pub fn place_element(&mut self, node: NodeId, rect: Rect) {
        self.element_rects.insert(node, rect);
    }

    pub fn place_text(&mut self, node: NodeId, left: f64, top: f64) {
        self.text_origins.insert(node, (left, top));
    }

    pub fn set_scroll(&mut self, x: f64, y: f64) {
        self.scroll = (x, y);
    }

    fn glyph_rect(&self, node: NodeId, from: usize, to: usize) -> Option<Rect> {
        let (left, top) = *self.text_origins.get(&node)?;
        Some(Rect::new(
            left + from as f64 * self.glyph_width,
            top,
            to.saturating_sub(from) as f64 * self.glyph_width,
            self.line_height,
        ))
    }
}

impl Layout for GridLayout {
    fn element_rect(&self, _doc: &Document, node: NodeId) -> Option<Rect> {
        self.element_rects.get(&node).copied()
    }

    fn range_rect(&self, doc: &Document, range: &DomRange) -> Option<Rect> {
        let DomRange { start, end } = *range;
        if start.node == end.node {
            if !doc.is_text(start.node) {
                return None;
            }
            // Collapsed carets have no width, like a browser's client rect.
            return self.glyph_rect(start.node, start.offset, end.offset);
        }
        let head = self.glyph_rect(start.node, start.offset, doc.text_len(start.node));
        let tail = self.glyph_rect(end.node, 0, end.offset);
        match (head, tail) {
            (Some(head), Some(tail)) => Some(head.union(&tail)),
            (head, tail) => head.or(tail),
        }
    }

    fn scroll_offset(&self) -> (f64, f64) {
        self.scroll
    }
}
