// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Content-line syntax: unfolding, folding and text escaping.

/// Maximum octets per physical line before folding, excluding CRLF.
const FOLD_WIDTH: usize = 75;

/// Unfolds vCard text into logical lines.
///
/// A physical line starting with a space or tab continues the previous
/// logical line (RFC 2426 §2.6); one leading whitespace character is
/// consumed. Bare LF line endings are tolerated alongside CRLF. Empty
/// physical lines are dropped.
#[must_use]
pub fn unfold(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if !raw.is_empty() {
            lines.push(raw.to_string());
        }
    }
    lines
}

/// Folds a logical line into physical lines of at most [`FOLD_WIDTH`]
/// octets, joined with CRLF-space continuations. Splits only at
/// character boundaries.
#[must_use]
pub fn fold(line: &str) -> String {
    if line.len() <= FOLD_WIDTH {
        return line.to_string();
    }

    let mut out = String::with_capacity(line.len() + line.len() / FOLD_WIDTH * 3);
    let mut width = 0;
    // continuation lines lose one octet to the leading space
    let mut limit = FOLD_WIDTH;
    for ch in line.chars() {
        if width + ch.len_utf8() > limit {
            out.push_str("\r\n ");
            width = 0;
            limit = FOLD_WIDTH - 1;
        }
        out.push(ch);
        width += ch.len_utf8();
    }
    out
}

/// Escapes a text value (backslash, newline, comma, semicolon).
#[must_use]
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            ',' => out.push_str("\\,"),
            ';' => out.push_str("\\;"),
            '\r' => {}
            _ => out.push(ch),
        }
    }
    out
}

/// Reverses [`escape_text`].
#[must_use]
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            match chars.next() {
                Some('n' | 'N') => out.push('\n'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(ch);
        }
    }
    out
}

/// Splits a compound value on unescaped separators, leaving each
/// component escaped.
#[must_use]
pub fn split_unescaped(value: &str, separator: char) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for ch in value.chars() {
        if escaped {
            current.push(ch);
            escaped = false;
        } else if ch == '\\' {
            current.push(ch);
            escaped = true;
        } else if ch == separator {
            parts.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
    }
    parts.push(current);
    parts
}

/// Splits a structured value (`N`, `ADR`) on unescaped semicolons and
/// unescapes each component.
#[must_use]
pub fn split_structured(value: &str) -> Vec<String> {
    split_unescaped(value, ';')
        .iter()
        .map(|part| unescape_text(part))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unfold_joins_continuation_lines() {
        let text = "FN:Jane\r\n  Public\r\nNICKNAME:JP\r\n";
        assert_eq!(unfold(text), vec!["FN:Jane Public", "NICKNAME:JP"]);
    }

    #[test]
    fn unfold_tolerates_bare_lf() {
        let text = "FN:Jane\n\tPublic\nEMAIL:a@b.c";
        assert_eq!(unfold(text), vec!["FN:JanePublic", "EMAIL:a@b.c"]);
    }

    #[test]
    fn fold_short_line_is_unchanged() {
        assert_eq!(fold("FN:Jane"), "FN:Jane");
    }

    #[test]
    fn fold_long_line_round_trips_through_unfold() {
        let line = format!("NOTE:{}", "x".repeat(200));
        let folded = fold(&line);
        assert!(folded.lines().all(|l| l.len() <= 75));
        assert_eq!(unfold(&folded), vec![line]);
    }

    #[test]
    fn escape_round_trip() {
        let value = "semi;colon, comma\\ and\nnewline";
        assert_eq!(unescape_text(&escape_text(value)), value);
    }

    #[test]
    fn split_structured_respects_escapes() {
        let parts = split_structured("Public;Jane\\;Q;;;");
        assert_eq!(parts, vec!["Public", "Jane;Q", "", "", ""]);
    }
}
