use thiserror::Error;
use tracing::debug;

use crate::dom::range::replace_contents;
use crate::dom::walk::char_after;
use crate::dom::{Boundary, Document, DomError, DomRange, NodeId};
use crate::state::Candidate;
use crate::utils::{char_len, char_slice, rfind_chars};

use super::segment::SegmentLocation;
use super::{ActiveField, FieldKind, ValidationError, validate_translation};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InsertError {
    #[error("field content no longer matches the suggested segment")]
    ContentChanged,
    #[error("invalid translation: {0}")]
    Validation(#[from] ValidationError),
    #[error("failed to update the document: {0}")]
    Dom(#[from] DomError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Insertion {
    pub node: NodeId,
    pub caret: usize,
    pub added_space: bool,
}

/// Re-locates the candidate's segment in the live field and replaces it with
/// the translation. The field is left untouched on any failure.
pub fn insert_candidate(
    doc: &mut Document,
    field: ActiveField,
    candidate: &Candidate,
) -> Result<Insertion, InsertError> {
    let translation = validate_translation(&candidate.translation)?;
    match (field.kind, candidate.segment.location()) {
        (FieldKind::Plain, SegmentLocation::Plain { start, end }) => insert_into_text_control(
            doc,
            field.node,
            (*start, *end),
            candidate.segment.text(),
            &translation,
        ),
        (FieldKind::Rich, SegmentLocation::Rich { range }) => insert_into_content_editable(
            doc,
            field.node,
            range,
            candidate.segment.text(),
            &translation,
        ),
        _ => Err(InsertError::ContentChanged),
    }
}

pub fn resolve_plain_span(value: &str, span: (usize, usize), text: &str) -> Option<(usize, usize)> {
    let (start, end) = span;
    if end <= char_len(value) && char_slice(value, start, end) == text {
        return Some(span);
    }
    let relocated = rfind_chars(value, text)?;
    Some((relocated, relocated + char_len(text)))
}

pub fn needs_separating_space(following: Option<char>) -> bool {
    following.is_some_and(|ch| !ch.is_whitespace())
}

fn insert_into_text_control(
    doc: &mut Document,
    field: NodeId,
    span: (usize, usize),
    text: &str,
    translation: &str,
) -> Result<Insertion, InsertError> {
    let value = doc
        .value(field)
        .ok_or(DomError::NotAControl(field))?
        .to_string();
    let (start, end) = resolve_plain_span(&value, span, text).ok_or(InsertError::ContentChanged)?;
    if (start, end) != span {
        debug!(
            original_start = span.0,
            relocated_start = start,
            "segment moved since extraction; using last occurrence"
        );
    }

    let before = char_slice(&value, 0, start);
    let after = char_slice(&value, end, usize::MAX);
    let added_space = needs_separating_space(after.chars().next());
    let inserted = if added_space {
        format!("{translation} ")
    } else {
        translation.to_string()
    };

    let caret = char_len(before) + char_len(&inserted);
    doc.set_value(field, &format!("{before}{inserted}{after}"))?;
    doc.focus(field);
    doc.set_selection_range(field, caret, caret)?;
    doc.dispatch_input(field);

    debug!(caret, added_space, "inserted suggestion into text control");
    Ok(Insertion {
        node: field,
        caret,
        added_space,
    })
}

fn insert_into_content_editable(
    doc: &mut Document,
    field: NodeId,
    range: &DomRange,
    text: &str,
    translation: &str,
) -> Result<Insertion, InsertError> {
    match range.text_within(doc, field) {
        Some(current) if current == text => {}
        _ => return Err(InsertError::ContentChanged),
    }

    let added_space = needs_separating_space(char_after(doc, field, range.end));
    let inserted = if added_space {
        format!("{translation} ")
    } else {
        translation.to_string()
    };

    let node = replace_contents(doc, range, &inserted)?;
    let caret = char_len(&inserted);
    doc.collapse_selection(Boundary::new(node, caret));
    doc.dispatch_input(field);

    debug!(caret, added_space, "inserted suggestion into content-editable field");
    Ok(Insertion {
        node,
        caret,
        added_space,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomEventKind;
    use crate::input::segment::{extract_segment, plain_segment, rich_segment};

    fn text_field(value: &str) -> (Document, ActiveField) {
        let mut doc = Document::new();
        let input = doc.create_element("input");
        doc.append_child(doc.body(), input).expect("input");
        doc.set_value(input, value).expect("value");
        (doc, ActiveField { node: input, kind: FieldKind::Plain })
    }

    fn rich_field(parts: &[&str]) -> (Document, ActiveField, Vec<NodeId>) {
        let mut doc = Document::new();
        let host = doc.create_element("div");
        doc.set_attribute(host, "contenteditable", "true").expect("attr");
        doc.append_child(doc.body(), host).expect("host");
        let nodes = parts
            .iter()
            .map(|part| {
                let node = doc.create_text(part);
                doc.append_child(host, node).expect("text");
                node
            })
            .collect();
        (doc, ActiveField { node: host, kind: FieldKind::Rich }, nodes)
    }

    #[test]
    fn replaces_whole_value_without_trailing_space() {
        let (mut doc, field) = text_field("Hello, how are you");
        let segment = extract_segment(&doc, field).expect("segment");
        let candidate = Candidate::new(segment, "¿Cómo estás?");

        let insertion = insert_candidate(&mut doc, field, &candidate).expect("insert");
        assert_eq!(doc.value(field.node), Some("¿Cómo estás?"));
        assert!(!insertion.added_space);
        assert_eq!(doc.selection_range(field.node), Some((12, 12)));
        assert_eq!(doc.active_element(), Some(field.node));
        assert_eq!(doc.events().len(), 1);
        assert_eq!(doc.events()[0].kind, DomEventKind::Input);
    }

    #[test]
    fn adds_space_when_text_follows() {
        let (mut doc, field) = text_field("gracias!");
        doc.set_selection_range(field.node, 7, 7).expect("caret");
        let segment = extract_segment(&doc, field).expect("segment");
        let candidate = Candidate::new(segment, "thanks");

        let insertion = insert_candidate(&mut doc, field, &candidate).expect("insert");
        assert_eq!(doc.value(field.node), Some("thanks !"));
        assert!(insertion.added_space);
        assert_eq!(doc.selection_range(field.node), Some((7, 7)));
    }

    #[test]
    fn no_space_when_whitespace_follows() {
        let (mut doc, field) = text_field("merci beaucoup tout");
        let segment = plain_segment("merci beaucoup tout", 14).expect("segment");
        let candidate = Candidate::new(segment, "thank you very much");

        insert_candidate(&mut doc, field, &candidate).expect("insert");
        assert_eq!(doc.value(field.node), Some("thank you very much tout"));
    }

    #[test]
    fn relocates_moved_segment_by_last_occurrence() {
        let (mut doc, field) = text_field("hello");
        let segment = extract_segment(&doc, field).expect("segment");
        doc.set_value(field.node, "hi hello world").expect("external edit");

        assert_eq!(resolve_plain_span("hi hello world", (0, 5), "hello"), Some((3, 8)));
        let candidate = Candidate::new(segment, "hola");
        insert_candidate(&mut doc, field, &candidate).expect("insert");
        assert_eq!(doc.value(field.node), Some("hi hola world"));
    }

    #[test]
    fn vanished_segment_leaves_field_untouched() {
        let (mut doc, field) = text_field("good night");
        let segment = extract_segment(&doc, field).expect("segment");
        doc.set_value(field.node, "something else").expect("external edit");

        let candidate = Candidate::new(segment, "buenas noches");
        let result = insert_candidate(&mut doc, field, &candidate);
        assert_eq!(result, Err(InsertError::ContentChanged));
        assert_eq!(doc.value(field.node), Some("something else"));
        assert!(doc.events().is_empty());
    }

    #[test]
    fn rich_insertion_probes_next_node_for_space() {
        let (mut doc, field, nodes) = rich_field(&["see you ", "later", "!"]);
        let segment = rich_segment(&doc, field.node, Boundary::new(nodes[1], 5)).expect("segment");
        assert_eq!(segment.text(), "see you later");
        let candidate = Candidate::new(segment, "à plus tard");

        let insertion = insert_candidate(&mut doc, field, &candidate).expect("insert");
        assert!(insertion.added_space);
        assert_eq!(doc.text_content(field.node), "à plus tard !");
        let caret = doc.selection().expect("selection");
        assert!(caret.is_collapsed());
        assert_eq!(caret.start, Boundary::new(insertion.node, 12));
        assert_eq!(doc.events().len(), 1);
    }

    #[test]
    fn rich_insertion_at_field_end_skips_space() {
        let (mut doc, field, nodes) = rich_field(&["Bis ", "bald"]);
        let segment = rich_segment(&doc, field.node, Boundary::new(nodes[1], 4)).expect("segment");
        let candidate = Candidate::new(segment, "See you soon");

        let insertion = insert_candidate(&mut doc, field, &candidate).expect("insert");
        assert!(!insertion.added_space);
        assert_eq!(doc.text_content(field.node), "See you soon");
    }

    #[test]
    fn rich_insertion_fails_when_range_text_changed() {
        let (mut doc, field, nodes) = rich_field(&["guten morgen"]);
        let segment = rich_segment(&doc, field.node, Boundary::new(nodes[0], 12)).expect("segment");
        doc.set_text(nodes[0], "guten abend!").expect("edit");

        let candidate = Candidate::new(segment, "good morning");
        let result = insert_candidate(&mut doc, field, &candidate);
        assert_eq!(result, Err(InsertError::ContentChanged));
        assert_eq!(doc.text_content(field.node), "guten abend!");
    }

    #[test]
    fn rich_insertion_fails_when_node_left_field() {
        let (mut doc, field, nodes) = rich_field(&["ciao ", "bella"]);
        let segment = rich_segment(&doc, field.node, Boundary::new(nodes[1], 5)).expect("segment");
        doc.remove(nodes[1]).expect("remove");
        doc.append_child(doc.body(), nodes[1]).expect("move outside");

        let candidate = Candidate::new(segment, "hi beautiful");
        assert_eq!(
            insert_candidate(&mut doc, field, &candidate),
            Err(InsertError::ContentChanged)
        );
    }

    #[test]
    fn rich_field_never_searches_for_relocation() {
        let (mut doc, field, nodes) = rich_field(&["hello"]);
        let segment = rich_segment(&doc, field.node, Boundary::new(nodes[0], 5)).expect("segment");
        doc.set_text(nodes[0], "hi hello").expect("edit");

        let candidate = Candidate::new(segment, "hola");
        assert_eq!(
            insert_candidate(&mut doc, field, &candidate),
            Err(InsertError::ContentChanged)
        );
    }
}
