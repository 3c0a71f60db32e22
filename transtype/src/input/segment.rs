use crate::dom::range::text_before;
use crate::dom::walk::expand_backward;
use crate::dom::{Boundary, Document, DomRange, NodeId};
use crate::utils::{char_len, char_slice, is_cjk, is_segment_char};

use super::{ActiveField, FieldKind};

pub const MAX_SEGMENT_LENGTH: usize = 80;
pub const MIN_SEGMENT_CHARS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentLocation {
    Plain { start: usize, end: usize },
    Rich { range: DomRange },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    text: String,
    location: SegmentLocation,
}

impl Segment {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn location(&self) -> &SegmentLocation {
        &self.location
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewMatch {
    pub text: String,
    pub local_start: usize,
    pub local_end: usize,
}

pub fn extract_from_preview(preview: &str) -> Option<PreviewMatch> {
    let chars: Vec<char> = preview.chars().collect();
    let len = chars.len();

    let cjk_run = trailing_run(&chars, is_cjk);
    if cjk_run > 0 {
        let local_start = len - cjk_run;
        return Some(PreviewMatch {
            text: chars[local_start..].iter().collect(),
            local_start,
            local_end: len,
        });
    }

    let word_run = trailing_run(&chars, is_segment_char);
    if word_run == 0 {
        return None;
    }
    let raw = &chars[len - word_run..];
    let leading = raw.iter().take_while(|c| c.is_whitespace()).count();
    if leading == raw.len() {
        return None;
    }
    let trailing = raw.iter().rev().take_while(|c| c.is_whitespace()).count();
    let trimmed: String = raw[leading..raw.len() - trailing].iter().collect();
    if char_len(&trimmed) < MIN_SEGMENT_CHARS {
        return None;
    }

    Some(PreviewMatch {
        text: trimmed,
        local_start: len - word_run + leading,
        local_end: len - trailing,
    })
}

fn trailing_run(chars: &[char], predicate: impl Fn(char) -> bool) -> usize {
    chars.iter().rev().take_while(|c| predicate(**c)).count()
}

pub fn plain_segment(value: &str, caret: usize) -> Option<Segment> {
    let caret = caret.min(char_len(value));
    let preview_start = caret.saturating_sub(MAX_SEGMENT_LENGTH);
    let preview = char_slice(value, preview_start, caret);
    let found = extract_from_preview(preview)?;
    Some(Segment {
        text: found.text,
        location: SegmentLocation::Plain {
            start: preview_start + found.local_start,
            end: preview_start + found.local_end,
        },
    })
}

pub fn rich_segment(doc: &Document, root: NodeId, caret: Boundary) -> Option<Segment> {
    let before = text_before(doc, root, caret)?;
    let before_len = char_len(&before);
    let preview = char_slice(&before, before_len.saturating_sub(MAX_SEGMENT_LENGTH), before_len);
    let found = extract_from_preview(preview)?;

    let trailing = char_len(preview) - found.local_end;
    let end = expand_backward(doc, root, caret, trailing)?;
    let start = expand_backward(doc, root, end, char_len(&found.text))?;
    Some(Segment {
        text: found.text,
        location: SegmentLocation::Rich {
            range: DomRange::new(start, end),
        },
    })
}

pub fn extract_segment(doc: &Document, field: ActiveField) -> Option<Segment> {
    match field.kind {
        FieldKind::Plain => {
            let value = doc.value(field.node)?;
            let caret = doc
                .selection_range(field.node)
                .map(|(start, _)| start)
                .unwrap_or_else(|| char_len(value));
            plain_segment(value, caret)
        }
        FieldKind::Rich => {
            let selection = doc.selection()?;
            if !selection.is_collapsed() || !doc.contains(field.node, selection.start.node) {
                return None;
            }
            rich_segment(doc, field.node, selection.start)
        }
    }
}
