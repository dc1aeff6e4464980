//! Misc text helpers shared by widgets built on the Component contract.

use unicode_segmentation::UnicodeSegmentation;

use super::ansi::extract_escape;
use super::width::visible_width;

const ANSI_RESET: &str = "\x1b[0m";

pub fn grapheme_segments(text: &str) -> unicode_segmentation::Graphemes<'_> {
    UnicodeSegmentation::graphemes(text, true)
}

pub fn is_whitespace_char(ch: char) -> bool {
    ch.is_whitespace()
}

pub fn is_punctuation_char(ch: char) -> bool {
    matches!(
        ch,
        '(' | ')'
            | '{'
            | '}'
            | '['
            | ']'
            | '<'
            | '>'
            | '.'
            | ','
            | ';'
            | ':'
            | '\''
            | '"'
            | '!'
            | '?'
            | '+'
            | '-'
            | '='
            | '*'
            | '/'
            | '\\'
            | '|'
            | '&'
            | '%'
            | '^'
            | '$'
            | '#'
            | '@'
            | '~'
            | '`'
    )
}

/// Pad `line` to `width` columns and pass it through a background styler.
pub fn apply_background_to_line(
    line: &str,
    width: usize,
    bg_fn: &dyn Fn(&str) -> String,
) -> String {
    let visible_len = visible_width(line);
    let padding_needed = width.saturating_sub(visible_len);
    let mut with_padding = String::with_capacity(line.len() + padding_needed);
    with_padding.push_str(line);
    if padding_needed > 0 {
        with_padding.push_str(&" ".repeat(padding_needed));
    }
    bg_fn(&with_padding)
}

/// Truncate `text` to `max_width` visible columns, appending `ellipsis`.
///
/// Escape codes up to the cut point are kept; a reset is inserted before the
/// ellipsis so it renders unstyled.
pub fn truncate_to_width(text: &str, max_width: usize, ellipsis: &str, pad: bool) -> String {
    if max_width == 0 {
        return String::new();
    }

    let text_width = visible_width(text);
    if text_width <= max_width {
        if pad {
            return format!("{text}{}", " ".repeat(max_width - text_width));
        }
        return text.to_string();
    }

    let ellipsis_width = visible_width(ellipsis);
    let target_width = max_width.saturating_sub(ellipsis_width);
    if target_width == 0 {
        return ellipsis.chars().take(max_width).collect();
    }

    let mut segments: Vec<Segment> = Vec::new();
    let mut idx = 0;
    while idx < text.len() {
        if let Some(escape) = extract_escape(text, idx) {
            segments.push(Segment::Escape(escape.code));
            idx += escape.length;
            continue;
        }

        let text_end = next_escape_or_end(text, idx);
        for grapheme in grapheme_segments(&text[idx..text_end]) {
            segments.push(Segment::Grapheme(grapheme.to_string()));
        }
        idx = text_end;
    }

    let mut truncated = String::new();
    let mut current_width = 0;
    for segment in segments {
        match segment {
            Segment::Escape(code) => truncated.push_str(&code),
            Segment::Grapheme(grapheme) => {
                let width = visible_width(&grapheme);
                if current_width + width > target_width {
                    break;
                }
                truncated.push_str(&grapheme);
                current_width += width;
            }
        }
    }

    let mut result = String::with_capacity(truncated.len() + ellipsis.len() + ANSI_RESET.len());
    result.push_str(&truncated);
    result.push_str(ANSI_RESET);
    result.push_str(ellipsis);

    if pad {
        let result_width = visible_width(&result);
        if result_width < max_width {
            result.push_str(&" ".repeat(max_width - result_width));
        }
    }

    result
}

enum Segment {
    Escape(String),
    Grapheme(String),
}

fn next_escape_or_end(input: &str, mut idx: usize) -> usize {
    while idx < input.len() {
        if extract_escape(input, idx).is_some() {
            break;
        }
        let Some(ch) = input[idx..].chars().next() else {
            break;
        };
        idx += ch.len_utf8();
    }
    idx
}
