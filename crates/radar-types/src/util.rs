//! Log-friendly string previews.

/// Collapse `s` to a single line of at most `max_chars` characters.
///
/// Newlines become spaces; truncation happens on a char boundary and is
/// marked with `...`.
pub fn preview(s: &str, max_chars: usize) -> String {
    let mut out = String::with_capacity(s.len().min(max_chars + 3));
    for (i, ch) in s.chars().enumerate() {
        if i == max_chars {
            out.push_str("...");
            return out;
        }
        out.push(if ch == '\n' || ch == '\r' { ' ' } else { ch });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_input_is_unchanged() {
        assert_eq!(preview("hello", 10), "hello");
    }

    #[test]
    fn exact_length_has_no_marker() {
        assert_eq!(preview("hello", 5), "hello");
    }

    #[test]
    fn long_input_is_marked() {
        assert_eq!(preview("hello world", 5), "hello...");
    }

    #[test]
    fn newlines_are_flattened() {
        assert_eq!(preview("# Title\n\nBody", 50), "# Title  Body");
    }

    #[test]
    fn multibyte_chars_are_counted_whole() {
        // CJK chars are 3 bytes each but count as one char.
        assert_eq!(preview("\u{4e16}\u{754c}\u{4eba}", 2), "\u{4e16}\u{754c}...");
        assert_eq!(preview("\u{1F600}\u{1F601}", 1), "\u{1F600}...");
    }

    #[test]
    fn zero_max_yields_marker_only() {
        assert_eq!(preview("abc", 0), "...");
        assert_eq!(preview("", 0), "");
    }
}
