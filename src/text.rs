//! Boundary-aware text segmentation
//!
//! `truncate` shortens oversized input before it reaches the tutor and
//! `chunk` splits oversized output into deliverable pieces. Both measure
//! length in characters, never bytes, so Korean text is never split inside
//! a code point.

/// Cut `text` to at most `max_len` characters, preferring a sentence end.
///
/// A period is used only when it lands past half of the limit; otherwise
/// the last space is used, and a hard cut is the fallback. Input that
/// already fits is returned unchanged.
pub fn truncate(text: &str, max_len: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return text.to_string();
    }

    // Keeping the period means the cut ends at index + 1, so it must sit below max_len
    let period = chars[..max_len].iter().rposition(|&c| c == '.');
    if let Some(pos) = period {
        if pos * 2 > max_len {
            return chars[..=pos].iter().collect();
        }
    }

    let space = chars[..=max_len].iter().rposition(|&c| c == ' ');
    match space {
        Some(pos) if pos > 0 => chars[..pos].iter().collect(),
        _ => chars[..max_len].iter().collect(),
    }
}

/// Split `text` into pieces of at most `max_len` characters.
///
/// Within each window the last paragraph break wins, then the last line
/// break, then the last space, as long as it sits at least 40% into the
/// window. Pieces are trimmed and blank ones dropped; the final remainder
/// is kept verbatim. Never returns an empty list.
pub fn chunk(text: &str, max_len: usize) -> Vec<String> {
    let max_len = max_len.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_len {
        return vec![text.to_string()];
    }

    let min_break = max_len * 2 / 5;
    let mut chunks = Vec::new();
    let mut cursor = 0;

    while cursor < chars.len() {
        let hard_end = (cursor + max_len).min(chars.len());
        if hard_end == chars.len() {
            chunks.push(chars[cursor..].iter().collect());
            break;
        }

        let window = &chars[cursor..hard_end];
        let break_pos = [
            rfind_seq(window, &['\n', '\n']),
            rfind_seq(window, &['\n']),
            rfind_seq(window, &[' ']),
        ]
        .into_iter()
        .flatten()
        .find(|&pos| pos >= min_break);

        let end = break_pos.map_or(hard_end, |pos| cursor + pos + 1);
        let piece: String = chars[cursor..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        cursor = end;
    }

    if chunks.is_empty() {
        chunks.push(chars[..max_len].iter().collect());
    }
    chunks
}

fn rfind_seq(haystack: &[char], needle: &[char]) -> Option<usize> {
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
