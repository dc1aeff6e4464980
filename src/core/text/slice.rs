//! Column-addressed slicing and ANSI-aware word wrapping.

use unicode_segmentation::UnicodeSegmentation;

use super::ansi::{extract_escape, StyleState};
use super::width::{grapheme_width, visible_width};

/// Slice plus the visible width it actually covers (strict mode may drop
/// boundary-straddling wide clusters, so the width can be less than requested).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceResult {
    pub text: String,
    pub width: usize,
}

/// Before/after segments around a spliced-in span, with their visible widths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segments {
    pub before: String,
    pub before_width: usize,
    pub after: String,
    pub after_width: usize,
}

pub fn slice_by_column(line: &str, start_col: usize, length: usize, strict: bool) -> String {
    slice_with_width(line, start_col, length, strict).text
}

/// Extract the columns `start_col..start_col+length` of `line`.
///
/// Escape sequences inside the requested range are kept; sequences before the
/// range are carried forward so the slice starts with the correct style. In
/// strict mode a wide cluster that would cross the end boundary is dropped
/// (the caller pads with spaces to preserve total width).
pub fn slice_with_width(line: &str, start_col: usize, length: usize, strict: bool) -> SliceResult {
    if length == 0 {
        return SliceResult {
            text: String::new(),
            width: 0,
        };
    }

    let end_col = start_col.saturating_add(length);
    let mut result = String::new();
    let mut result_width = 0;
    let mut current_col = 0;
    let mut idx = 0;
    let mut pending_ansi = String::new();

    while idx < line.len() && current_col < end_col {
        if let Some(escape) = extract_escape(line, idx) {
            if current_col >= start_col && current_col < end_col {
                result.push_str(&escape.code);
            } else if current_col < start_col {
                pending_ansi.push_str(&escape.code);
            }
            idx += escape.length;
            continue;
        }

        let text_end = next_escape_or_end(line, idx);
        for grapheme in line[idx..text_end].graphemes(true) {
            let width = grapheme_width(grapheme);
            let in_range = current_col >= start_col && current_col < end_col;
            let fits = !strict || current_col + width <= end_col;

            if in_range && fits {
                if !pending_ansi.is_empty() {
                    result.push_str(&pending_ansi);
                    pending_ansi.clear();
                }
                result.push_str(grapheme);
                result_width += width;
            }

            current_col += width;
            if current_col >= end_col {
                break;
            }
        }
        idx = text_end;
    }

    SliceResult {
        text: result,
        width: result_width,
    }
}

/// Split `line` into the segment before column `before_end` and the segment
/// covering `after_start..after_start+after_len`, for overlay splicing.
///
/// The after segment re-asserts the style that was active where it begins, so
/// SGR state carried by the skipped middle span is not lost.
pub fn extract_segments(
    line: &str,
    before_end: usize,
    after_start: usize,
    after_len: usize,
    strict_after: bool,
) -> Segments {
    let mut before = String::new();
    let mut after = String::new();
    let mut before_width = 0;
    let mut after_width = 0;

    let mut style = StyleState::default();
    let mut current_col = 0;
    let mut idx = 0;
    let mut pending_ansi_before = String::new();
    let mut after_started = false;
    let after_end = after_start.saturating_add(after_len);

    while idx < line.len() {
        if let Some(escape) = extract_escape(line, idx) {
            style.process(&escape.code);
            if current_col < before_end {
                pending_ansi_before.push_str(&escape.code);
            } else if current_col >= after_start && current_col < after_end && after_started {
                after.push_str(&escape.code);
            }
            idx += escape.length;
            continue;
        }

        let text_end = next_escape_or_end(line, idx);
        for grapheme in line[idx..text_end].graphemes(true) {
            let width = grapheme_width(grapheme);

            if current_col < before_end {
                if !pending_ansi_before.is_empty() {
                    before.push_str(&pending_ansi_before);
                    pending_ansi_before.clear();
                }
                before.push_str(grapheme);
                before_width += width;
            } else if current_col >= after_start && current_col < after_end && after_len > 0 {
                let fits = !strict_after || current_col + width <= after_end;
                if fits {
                    if !after_started {
                        after.push_str(&style.active_codes());
                        after_started = true;
                    }
                    after.push_str(grapheme);
                    after_width += width;
                }
            }

            current_col += width;
            if after_len == 0 {
                if current_col >= before_end {
                    break;
                }
            } else if current_col >= after_end {
                break;
            }
        }

        idx = text_end;
        if after_len == 0 {
            if current_col >= before_end {
                break;
            }
        } else if current_col >= after_end {
            break;
        }
    }

    Segments {
        before,
        before_width,
        after,
        after_width,
    }
}

/// Greedy word wrap that keeps escape-sequence state across physical lines.
///
/// Style active at a break point is closed with a reset and re-asserted at the
/// start of the continuation line. Breaks prefer the last space before the
/// limit; words wider than the limit hard-break at the column boundary.
pub fn wrap_text_with_ansi(text: &str, width: usize) -> Vec<String> {
    if text.is_empty() || width == 0 {
        return vec![String::new()];
    }

    let mut result = Vec::new();
    let mut style = StyleState::default();

    for input_line in text.split('\n') {
        let prefix = if result.is_empty() {
            String::new()
        } else {
            style.active_codes()
        };
        let line = format!("{}{}", prefix, input_line);
        let mut wrapped = wrap_single_line(&line, width);
        update_style_from_text(input_line, &mut style);
        if !style.is_plain() {
            if let Some(last) = wrapped.last_mut() {
                if !last.is_empty() {
                    last.push_str(&style.line_end_reset());
                }
            }
        }
        result.append(&mut wrapped);
    }

    if result.is_empty() {
        vec![String::new()]
    } else {
        result
            .into_iter()
            .map(|line| line.trim_end().to_string())
            .collect()
    }
}

fn wrap_single_line(line: &str, width: usize) -> Vec<String> {
    if line.is_empty() {
        return vec![String::new()];
    }

    let line_width = visible_width(line);
    if line_width <= width {
        return vec![line.to_string()];
    }

    let tokens = split_into_tokens_with_ansi(line);
    let mut style = StyleState::default();
    let mut wrapped = Vec::new();

    let mut current_line = String::new();
    let mut current_width = 0;

    for token in tokens {
        let token_width = visible_width(&token);
        let is_whitespace = token_is_blank(&token);

        if token_width > width && !is_whitespace {
            if !current_line.is_empty() {
                let mut finished = current_line.trim_end().to_string();
                finished.push_str(&style.line_end_reset());
                wrapped.push(finished);
                current_line.clear();
                current_width = 0;
            }

            let broken = break_long_word(&token, width, &mut style);
            if let Some((last, rest)) = broken.split_last() {
                wrapped.extend_from_slice(rest);
                current_line = last.clone();
                current_width = visible_width(&current_line);
            }
            continue;
        }

        let total_needed = current_width + token_width;
        if total_needed > width && current_width > 0 {
            let mut finished = current_line.trim_end().to_string();
            finished.push_str(&style.line_end_reset());
            wrapped.push(finished);

            if is_whitespace {
                // The dropped whitespace token may carry escape codes; apply
                // them before re-asserting style on the continuation line.
                update_style_from_text(&token, &mut style);
                current_line = style.active_codes();
                current_width = 0;
                continue;
            }
            current_line = style.active_codes();
            current_line.push_str(&token);
            current_width = token_width;
        } else {
            current_line.push_str(&token);
            current_width += token_width;
        }

        update_style_from_text(&token, &mut style);
    }

    if !current_line.is_empty() {
        wrapped.push(current_line);
    }

    wrapped
}

fn split_into_tokens_with_ansi(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut pending_ansi = String::new();
    let mut in_whitespace = false;
    let mut idx = 0;

    while idx < text.len() {
        if let Some(escape) = extract_escape(text, idx) {
            pending_ansi.push_str(&escape.code);
            idx += escape.length;
            continue;
        }

        let Some(ch) = text[idx..].chars().next() else {
            break;
        };
        let is_space = ch == ' ';

        if is_space != in_whitespace && !current.is_empty() {
            tokens.push(current);
            current = String::new();
        }

        if !pending_ansi.is_empty() {
            current.push_str(&pending_ansi);
            pending_ansi.clear();
        }

        in_whitespace = is_space;
        current.push(ch);
        idx += ch.len_utf8();
    }

    if !pending_ansi.is_empty() {
        current.push_str(&pending_ansi);
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}

fn break_long_word(word: &str, width: usize, style: &mut StyleState) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = style.active_codes();
    let mut current_width = 0;
    let mut idx = 0;

    while idx < word.len() {
        if let Some(escape) = extract_escape(word, idx) {
            current_line.push_str(&escape.code);
            style.process(&escape.code);
            idx += escape.length;
            continue;
        }

        let text_end = next_escape_or_end(word, idx);
        for grapheme in word[idx..text_end].graphemes(true) {
            let grapheme_cols = grapheme_width(grapheme);
            if current_width + grapheme_cols > width {
                current_line.push_str(&style.line_end_reset());
                lines.push(current_line);
                current_line = style.active_codes();
                current_width = 0;
            }

            current_line.push_str(grapheme);
            current_width += grapheme_cols;
        }
        idx = text_end;
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        vec![String::new()]
    } else {
        lines
    }
}

fn token_is_blank(token: &str) -> bool {
    let mut idx = 0;
    while idx < token.len() {
        if let Some(escape) = extract_escape(token, idx) {
            idx += escape.length;
            continue;
        }
        let Some(ch) = token[idx..].chars().next() else {
            break;
        };
        if ch != ' ' {
            return false;
        }
        idx += ch.len_utf8();
    }
    true
}

fn update_style_from_text(text: &str, style: &mut StyleState) {
    let mut idx = 0;
    while idx < text.len() {
        if let Some(escape) = extract_escape(text, idx) {
            style.process(&escape.code);
            idx += escape.length;
        } else {
            let Some(ch) = text[idx..].chars().next() else {
                break;
            };
            idx += ch.len_utf8();
        }
    }
}

fn next_escape_or_end(line: &str, mut idx: usize) -> usize {
    while idx < line.len() {
        if extract_escape(line, idx).is_some() {
            break;
        }
        let Some(ch) = line[idx..].chars().next() else {
            break;
        };
        idx += ch.len_utf8();
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::{extract_segments, slice_by_column, wrap_text_with_ansi};
    use crate::core::text::width::visible_width;

    #[test]
    fn word_wrap_splits_on_spaces() {
        assert_eq!(wrap_text_with_ansi("word word", 4), vec!["word", "word"]);
    }

    #[test]
    fn no_leading_whitespace_on_continuation() {
        let wrapped = wrap_text_with_ansi("word  word", 4);
        assert_eq!(wrapped.len(), 2);
        assert!(!wrapped[1].starts_with(' '));
    }

    #[test]
    fn long_word_hard_breaks_at_boundary() {
        let wrapped = wrap_text_with_ansi("abcdefghij", 4);
        assert_eq!(wrapped, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn styles_replayed_and_closed_across_wraps() {
        let wrapped = wrap_text_with_ansi("\x1b[31mword word", 4);
        assert_eq!(wrapped.len(), 2);
        assert!(wrapped[0].starts_with("\x1b[31m"));
        assert!(wrapped[0].ends_with("\x1b[0m"));
        assert!(wrapped[1].starts_with("\x1b[31m"));
    }

    #[test]
    fn closed_style_leaves_no_trailing_reset() {
        let wrapped = wrap_text_with_ansi("\x1b[31mword\x1b[0m word", 4);
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[1], "word");
    }

    #[test]
    fn wrap_reconstructs_text_modulo_whitespace() {
        let text = "the quick brown fox jumps over the lazy dog";
        for width in 1..=12 {
            let wrapped = wrap_text_with_ansi(text, width);
            let rejoined = wrapped.join(" ");
            let normalized: Vec<&str> = rejoined.split_whitespace().collect();
            let expected: Vec<&str> = text.split_whitespace().collect();
            assert_eq!(normalized, expected, "width {width}");
        }
    }

    #[test]
    fn slice_of_full_width_reproduces_visible_content() {
        let line = "\x1b[1mhello\x1b[0m world";
        let sliced = slice_by_column(line, 0, visible_width(line), false);
        assert_eq!(visible_width(&sliced), visible_width(line));
        assert!(sliced.contains("hello"));
        assert!(sliced.contains("world"));
    }

    #[test]
    fn strict_slicing_drops_boundary_wide_clusters() {
        assert_eq!(slice_by_column("a😀b", 1, 1, true), "");
        assert_eq!(slice_by_column("a😀b", 1, 2, true), "😀");
    }

    #[test]
    fn non_strict_slicing_keeps_boundary_wide_clusters() {
        assert_eq!(slice_by_column("a😀b", 1, 1, false), "😀");
    }

    #[test]
    fn extract_segments_inherits_styles() {
        let line = "\x1b[31mredblue";
        let segments = extract_segments(line, 3, 3, 4, false);
        assert_eq!(segments.before, "\x1b[31mred");
        assert_eq!(segments.before_width, 3);
        assert_eq!(segments.after, "\x1b[31mblue");
        assert_eq!(segments.after_width, 4);
    }

    #[test]
    fn extract_segments_skips_middle_span() {
        let line = "aaabbbccc";
        let segments = extract_segments(line, 3, 6, 3, true);
        assert_eq!(segments.before, "aaa");
        assert_eq!(segments.after, "ccc");
    }
}
