//! Char-boundary-safe truncation helpers. All lengths are counted in chars.

pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn byte_offset(s: &str, chars: usize) -> usize {
    s.char_indices().nth(chars).map(|(i, _)| i).unwrap_or(s.len())
}

/// First `n` chars of `s`.
pub fn head(s: &str, n: usize) -> &str {
    &s[..byte_offset(s, n)]
}

/// Last `n` chars of `s`.
pub fn tail(s: &str, n: usize) -> &str {
    let len = char_len(s);
    if len <= n {
        return s;
    }
    &s[byte_offset(s, len - n)..]
}

/// Keep the head of `s` and append `marker` so the result is at most `max` chars.
/// Text already within `max` is returned unchanged.
pub fn truncate_with_marker(s: &str, max: usize, marker: &str) -> String {
    if char_len(s) <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(char_len(marker));
    let mut out = head(s, keep).to_string();
    out.push_str(marker);
    out
}

/// Keep both ends of `s` around `marker` so the result is at most `max` chars.
/// Text already within `max` is returned unchanged.
pub fn truncate_middle(s: &str, max: usize, marker: &str) -> String {
    let len = char_len(s);
    if len <= max {
        return s.to_string();
    }
    let budget = max.saturating_sub(char_len(marker));
    let head_len = budget / 2;
    let tail_len = budget - head_len;
    format!("{}{}{}", head(s, head_len), marker, tail(s, tail_len))
}
