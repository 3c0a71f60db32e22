use serde::Serialize;
use tracing::debug;

use crate::dom::walk::expand_backward;
use crate::dom::{DomRange, Page, Rect};
use crate::input::shortcut::EventDisposition;
use crate::input::{ActiveField, FieldKind};

pub const INITIAL_MESSAGE: &str = "Start typing to get AI help";
pub const IDLE_MESSAGE: &str = "Type to get AI suggestions";
pub const TRANSLATING_MESSAGE: &str = "Translating...";
pub const INSERTED_MESSAGE: &str = "Inserted suggestion";
pub const CONTENT_CHANGED_MESSAGE: &str = "Text changed, retype to regenerate";
pub const INSERT_FAILED_MESSAGE: &str = "Suggestion could not be inserted";
const ANCHOR_GAP_PX: f64 = 8.0;
const MIN_PANEL_WIDTH_PX: f64 = 220.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum OverlayContent {
    Status { message: String },
    Suggestion { translation: String, hint: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayPosition {
    pub top: f64,
    pub left: f64,
    pub min_width: f64,
}

impl OverlayPosition {
    fn below(anchor: Rect, scroll: (f64, f64)) -> Self {
        let (scroll_x, scroll_y) = scroll;
        Self {
            top: anchor.bottom() + scroll_y + ANCHOR_GAP_PX,
            left: anchor.left + scroll_x,
            min_width: anchor.width.max(MIN_PANEL_WIDTH_PX),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlay {
    visible: bool,
    content: OverlayContent,
    position: Option<OverlayPosition>,
}

impl Overlay {
    pub fn new() -> Self {
        Self {
            visible: false,
            content: OverlayContent::Status {
                message: INITIAL_MESSAGE.to_string(),
            },
            position: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn content(&self) -> &OverlayContent {
        &self.content
    }

    pub fn position(&self) -> Option<OverlayPosition> {
        self.position
    }

    pub fn message(&self) -> &str {
        match &self.content {
            OverlayContent::Status { message } => message,
            OverlayContent::Suggestion { translation, .. } => translation,
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match &self.content {
            OverlayContent::Status { .. } => None,
            OverlayContent::Suggestion { hint, .. } => Some(hint),
        }
    }

    pub fn shows_insert_button(&self) -> bool {
        matches!(self.content, OverlayContent::Suggestion { .. })
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.content = OverlayContent::Status {
            message: message.into(),
        };
    }

    pub fn set_suggestion(&mut self, translation: impl Into<String>, accept_label: &str) {
        self.content = OverlayContent::Suggestion {
            translation: translation.into(),
            hint: format!("Press {accept_label} or use the button to insert"),
        };
    }

    pub fn show(&mut self, page: &Page, field: ActiveField) {
        self.visible = true;
        self.reposition(page, field);
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    /// Moves the panel under the caret, or under the field when no caret
    /// geometry is available. Hidden panels keep their last position.
    pub fn reposition(&mut self, page: &Page, field: ActiveField) {
        if !self.visible {
            return;
        }
        let Some(anchor) = anchor_rect(page, field) else {
            debug!("no geometry for active field; overlay left in place");
            return;
        };
        self.position = Some(OverlayPosition::below(anchor, page.layout.scroll_offset()));
    }

    pub fn handle_pointer_down(&self) -> EventDisposition {
        EventDisposition::PreventDefault
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}

pub fn anchor_rect(page: &Page, field: ActiveField) -> Option<Rect> {
    if field.kind == FieldKind::Rich {
        if let Some(rect) = caret_rect(page, field) {
            return Some(rect);
        }
    }
    page.layout.element_rect(&page.document, field.node)
}

fn caret_rect(page: &Page, field: ActiveField) -> Option<Rect> {
    let doc = &page.document;
    let selection = doc.selection()?;
    if !selection.is_collapsed() {
        return page.layout.range_rect(doc, selection);
    }
    if !doc.contains(field.node, selection.start.node) {
        return None;
    }

    let usable = |rect: Option<Rect>| rect.filter(|rect| !rect.is_degenerate());
    if let Some(rect) = usable(page.layout.range_rect(doc, selection)) {
        return Some(rect);
    }
    // A collapsed caret has no width; measure the character before it instead.
    let previous = expand_backward(doc, field.node, selection.start, 1)?;
    usable(page.layout.range_rect(doc, &DomRange::new(previous, selection.start)))
}
