use std::time::{SystemTime, UNIX_EPOCH};

pub fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or(0)
}

/// Checks if a character belongs to the kana or CJK ideograph blocks that form
/// a segment on their own, without word separators.
pub fn is_cjk(ch: char) -> bool {
    matches!(
        ch as u32,
        0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xF900..=0xFAFF
    )
}

pub fn is_segment_char(ch: char) -> bool {
    ch.is_alphabetic()
        || ch.is_numeric()
        || ch.is_whitespace()
        || matches!(ch, ',' | '\'' | '"' | '-')
}

pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

pub fn byte_index(text: &str, char_offset: usize) -> usize {
    text.char_indices()
        .nth(char_offset)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

pub fn char_slice(text: &str, start: usize, end: usize) -> &str {
    let start_byte = byte_index(text, start);
    let end_byte = byte_index(text, end.max(start));
    &text[start_byte..end_byte]
}

pub fn rfind_chars(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .rfind(needle)
        .map(|byte| haystack[..byte].chars().count())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cjk_covers_kana_and_ideographs() {
        assert!(is_cjk('も'));
        assert!(is_cjk('カ'));
        assert!(is_cjk('少'));
        assert!(is_cjk('豈'));
        assert!(!is_cjk('a'));
        assert!(!is_cjk('，'));
        assert!(!is_cjk('한'));
    }

    #[test]
    fn char_slice_uses_scalar_offsets() {
        assert_eq!(char_slice("¿Cómo estás?", 1, 5), "Cómo");
        assert_eq!(char_slice("abc", 2, 10), "c");
        assert_eq!(char_slice("abc", 3, 1), "");
    }

    #[test]
    fn rfind_reports_char_offset() {
        assert_eq!(rfind_chars("héllo hello", "hello"), Some(6));
        assert_eq!(rfind_chars("abc", "x"), None);
    }
}
