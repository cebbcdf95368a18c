//! Pure transcript heuristics.
//!
//! Everything here is string-in/string-out with no session state, so
//! the ad hoc cleanup rules stay independently testable instead of
//! being buried in the orchestrator's event handlers.

/// Non-speech markers that transcription backends emit inside
/// parentheses. Bracketed `[...]` groups are always stripped; `(...)`
/// groups only when the content matches one of these.
const PAREN_MARKERS: &[&str] = &[
    "blank_audio",
    "blank audio",
    "inaudible",
    "music",
    "applause",
    "laughter",
    "static",
    "noise",
];

/// Minimum remainder length for the leading-fragment rule to apply.
/// Below this the "remainder" is not a real sentence and the prefix is
/// probably all there is.
const MIN_SENTENCE_REMAINDER: usize = 8;

/// Normalizes raw transcript text.
///
/// - strips `[...]` marker groups and known non-speech `(...)` groups
///   (a purely bracketed string normalizes to empty);
/// - collapses whitespace runs;
/// - drops a spurious 1-3 character leading fragment ("Hi," / "A.")
///   when what follows is long enough to be a real sentence.
pub fn normalize(text: &str) -> String {
    let stripped = strip_markers(text);
    let collapsed = collapse_whitespace(&stripped);
    drop_leading_fragment(&collapsed)
}

/// Removes bracketed non-speech markers.
fn strip_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match c {
            '[' => {
                if let Some(end) = text[i..].find(']') {
                    // Skip the whole group regardless of content.
                    let close = i + end;
                    while let Some(&(j, _)) = chars.peek() {
                        if j > close {
                            break;
                        }
                        chars.next();
                    }
                } else {
                    out.push(c);
                }
            }
            '(' => {
                if let Some(end) = text[i..].find(')') {
                    let close = i + end;
                    let inner = text[i + 1..close].trim().to_lowercase();
                    if PAREN_MARKERS.iter().any(|m| inner == *m) {
                        while let Some(&(j, _)) = chars.peek() {
                            if j > close {
                                break;
                            }
                            chars.next();
                        }
                    } else {
                        out.push(c);
                    }
                } else {
                    out.push(c);
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Collapses whitespace runs to single spaces and trims.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drops a short leading fragment (1-3 word characters followed by
/// punctuation) when the remainder is long enough to stand alone.
/// Applied once; repeated application would eat real short sentences.
fn drop_leading_fragment(text: &str) -> String {
    let trimmed = text.trim();

    let mut boundary = None;
    for (i, c) in trimmed.char_indices() {
        if c.is_alphanumeric() {
            if i >= 3 {
                break; // prefix too long to be a fragment
            }
            continue;
        }
        if matches!(c, ',' | '.' | ':' | ';') && i >= 1 && i <= 3 {
            boundary = Some(i + c.len_utf8());
        }
        break;
    }

    if let Some(end) = boundary {
        let remainder = trimmed[end..].trim_start();
        if remainder.len() >= MIN_SENTENCE_REMAINDER {
            return remainder.to_string();
        }
    }
    trimmed.to_string()
}

/// Joins two consecutive transcript fragments.
///
/// When the fragments are temporally adjacent (the first recording was
/// chopped mid-word, e.g. at the max-duration cap) a trailing
/// hyphenated word is glued directly to the next fragment's start;
/// otherwise the fragments join with a single space.
pub fn coalesce(prev: &str, next: &str, adjacent: bool) -> String {
    let prev = prev.trim_end();
    let next = next.trim_start();

    if prev.is_empty() {
        return next.to_string();
    }
    if next.is_empty() {
        return prev.to_string();
    }

    if adjacent && prev.ends_with('-') {
        let mut joined = prev[..prev.len() - 1].to_string();
        joined.push_str(next);
        return joined;
    }

    format!("{} {}", prev, next)
}

/// Formats a reply chunk for radio transmission.
///
/// Collapses whitespace, truncates to the first full sentence or to
/// `max_chars` (whichever is shorter, cut back to a word boundary),
/// and appends the station identification if the text does not already
/// carry it.
pub fn format_for_tx(text: &str, callsign: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        return String::new();
    }

    let mut cut = first_sentence_end(&collapsed).unwrap_or(collapsed.len());
    if cut > max_chars {
        cut = word_boundary_before(&collapsed, max_chars);
    }
    let mut out = collapsed[..cut].trim_end().to_string();

    if !out.to_lowercase().contains(&callsign.to_lowercase()) {
        if !out.ends_with(['.', '!', '?']) {
            out.push('.');
        }
        out.push(' ');
        out.push_str(callsign);
    }
    out
}

/// Byte index just past the first sentence terminator, or None.
fn first_sentence_end(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    for (i, c) in text.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let next = i + 1;
            if next >= bytes.len() || bytes[next] == b' ' {
                return Some(next);
            }
        }
    }
    None
}

/// Largest char-safe index ≤ max that lands on a word boundary.
fn word_boundary_before(text: &str, max: usize) -> usize {
    if text.len() <= max {
        return text.len();
    }
    let mut cut = max;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    match text[..cut].rfind(' ') {
        Some(space) if space > 0 => space,
        _ => cut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_blank_audio_variants() {
        assert_eq!(normalize("[BLANK_AUDIO]"), "");
        assert_eq!(normalize("(blank audio)"), "");
        assert_eq!(normalize("[silence marker]"), "");
    }

    #[test]
    fn test_normalize_purely_bracketed_is_empty() {
        assert_eq!(normalize("[MUSIC] [APPLAUSE]"), "");
    }

    #[test]
    fn test_normalize_strips_inline_markers() {
        assert_eq!(normalize("Hello [BLANK_AUDIO] world"), "Hello world");
        assert_eq!(normalize("over (inaudible) and out"), "over and out");
    }

    #[test]
    fn test_normalize_keeps_real_parentheticals() {
        assert_eq!(
            normalize("meet at the tower (the old one) at noon"),
            "meet at the tower (the old one) at noon"
        );
    }

    #[test]
    fn test_normalize_collapses_whitespace() {
        assert_eq!(normalize("  hello   there \n world "), "hello there world");
    }

    #[test]
    fn test_normalize_drops_short_leading_fragment() {
        assert_eq!(normalize("Hi, GC. How copy?"), "GC. How copy?");
        assert_eq!(normalize("A. Please repeat your last"), "Please repeat your last");
    }

    #[test]
    fn test_normalize_keeps_fragment_when_remainder_short() {
        // Remainder too short to be a real sentence: keep everything.
        assert_eq!(normalize("Hi, GC."), "Hi, GC.");
        assert_eq!(normalize("Ok, ten"), "Ok, ten");
    }

    #[test]
    fn test_normalize_keeps_long_first_word() {
        assert_eq!(
            normalize("Negative, stay off the ridge road"),
            "Negative, stay off the ridge road"
        );
    }

    #[test]
    fn test_coalesce_plain_join() {
        assert_eq!(coalesce("first part", "second part", false), "first part second part");
    }

    #[test]
    fn test_coalesce_hyphen_glue_when_adjacent() {
        assert_eq!(
            coalesce("heading to the camp-", "ground now", true),
            "heading to the campground now"
        );
    }

    #[test]
    fn test_coalesce_hyphen_kept_when_not_adjacent() {
        assert_eq!(
            coalesce("heading to the camp-", "ground now", false),
            "heading to the camp- ground now"
        );
    }

    #[test]
    fn test_coalesce_empty_sides() {
        assert_eq!(coalesce("", "hello", true), "hello");
        assert_eq!(coalesce("hello", "", true), "hello");
    }

    #[test]
    fn test_format_for_tx_truncates_to_first_sentence() {
        let text = "Weather looks clear. Winds around five knots. More later.";
        assert_eq!(
            format_for_tx(text, "K7ABC", 220),
            "Weather looks clear. K7ABC"
        );
    }

    #[test]
    fn test_format_for_tx_hard_cap_on_word_boundary() {
        let text = "this reply just keeps going without any sentence break at all forever";
        let out = format_for_tx(text, "K7ABC", 30);
        assert!(out.len() <= 30 + ". K7ABC".len() + 1);
        assert!(out.ends_with("K7ABC"));
        // Cut lands between words, not inside one
        let body = out.trim_end_matches("K7ABC").trim_end_matches(['.', ' ']);
        assert!(text.starts_with(body));
    }

    #[test]
    fn test_format_for_tx_keeps_existing_callsign() {
        let out = format_for_tx("QSL from K7ABC.", "K7ABC", 220);
        assert_eq!(out, "QSL from K7ABC.");
    }

    #[test]
    fn test_format_for_tx_decimal_not_sentence_end() {
        let out = format_for_tx("Frequency is 146.52 tonight", "K7ABC", 220);
        assert_eq!(out, "Frequency is 146.52 tonight. K7ABC");
    }

    #[test]
    fn test_format_for_tx_empty() {
        assert_eq!(format_for_tx("   ", "K7ABC", 220), "");
    }
}
