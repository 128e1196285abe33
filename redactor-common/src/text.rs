//! Text utilities applied between generation stages

/// Markdown code fence delimiter
pub const CODE_FENCE: &str = "```";

/// Return the first `max_chars` characters of `text` and whether anything was cut
///
/// Counts Unicode scalar values, so the cut never lands inside a UTF-8 sequence.
pub fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => (&text[..byte_index], true),
        None => (text, false),
    }
}

/// Remove every code fence delimiter, along with an `html` language tag right after one
///
/// Repeats until no delimiter is left, since removing one can join backticks
/// on either side into a new one.
pub fn strip_code_fences(text: &str) -> String {
    let mut current = text.to_string();
    while current.contains(CODE_FENCE) {
        current = strip_once(&current);
    }
    current
}

fn strip_once(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(CODE_FENCE) {
        out.push_str(&rest[..pos]);
        rest = &rest[pos + CODE_FENCE.len()..];
        if rest
            .get(..4)
            .is_some_and(|tag| tag.eq_ignore_ascii_case("html"))
        {
            rest = &rest[4..];
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_exact_prefix() {
        let draft: String = (0..20_000).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        let (view, truncated) = truncate_chars(&draft, 12_000);
        assert!(truncated);
        assert_eq!(view.len(), 12_000);
        assert_eq!(view.as_bytes(), &draft.as_bytes()[..12_000]);
    }

    #[test]
    fn test_truncate_short_text_untouched() {
        let (view, truncated) = truncate_chars("short", 12_000);
        assert_eq!(view, "short");
        assert!(!truncated);
    }

    #[test]
    fn test_truncate_at_exact_length_is_not_truncation() {
        let (view, truncated) = truncate_chars("abcde", 5);
        assert_eq!(view, "abcde");
        assert!(!truncated);
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let (view, truncated) = truncate_chars("ñandú añejo", 5);
        assert_eq!(view, "ñandú");
        assert!(truncated);
    }

    #[test]
    fn test_strip_fences_at_every_position() {
        let cases = [
            ("```html\n<h1>T</h1>", "\n<h1>T</h1>"),
            ("<h1>T</h1>\n```", "<h1>T</h1>\n"),
            ("<p>a</p>```<p>b</p>", "<p>a</p><p>b</p>"),
            ("```html<p>x</p>```", "<p>x</p>"),
            ("<p>no fences</p>", "<p>no fences</p>"),
            ("```HTML<p>x</p>", "<p>x</p>"),
        ];
        for (input, expected) in cases {
            let cleaned = strip_code_fences(input);
            assert_eq!(cleaned, expected, "input: {:?}", input);
            assert!(!cleaned.contains(CODE_FENCE));
        }
    }

    #[test]
    fn test_strip_fences_rejoined_backticks() {
        let cleaned = strip_code_fences("``````` `");
        assert!(!cleaned.contains(CODE_FENCE));

        let cleaned = strip_code_fences("``` ```html``");
        assert!(!cleaned.contains(CODE_FENCE));
    }
}
