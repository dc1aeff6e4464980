//! Measurement and wrapping properties.

use loom_tui::core::text::slice::slice_by_column;
use loom_tui::{visible_width, wrap_text_with_ansi};

#[test]
fn width_is_invariant_under_sgr_wrapping() {
    let samples = ["hello", "a b c", "wide 你好 text", "emoji 😀 here", ""];
    for sample in samples {
        let styled = format!("\x1b[1m{sample}\x1b[0m");
        assert_eq!(
            visible_width(&styled),
            visible_width(sample),
            "sample {sample:?}"
        );
    }
}

#[test]
fn wrap_reconstructs_text_for_all_widths() {
    let text = "the quick brown fox jumps over the lazy dog";
    let expected: Vec<&str> = text.split_whitespace().collect();
    for width in 1..=50 {
        let wrapped = wrap_text_with_ansi(text, width);
        for line in &wrapped {
            assert!(
                visible_width(line) <= width,
                "line {line:?} exceeds width {width}"
            );
        }
        let rejoined = wrapped.join(" ");
        let normalized: Vec<&str> = rejoined.split_whitespace().collect();
        assert_eq!(normalized, expected, "width {width}");
    }
}

#[test]
fn wrap_of_styled_text_reconstructs_after_stripping_codes() {
    let text = "\x1b[31mthe quick\x1b[0m brown \x1b[4mfox jumps\x1b[0m over";
    let plain = "the quick brown fox jumps over";
    let expected: Vec<&str> = plain.split_whitespace().collect();
    for width in 3..=30 {
        let wrapped = wrap_text_with_ansi(text, width);
        let stripped: Vec<String> = wrapped.iter().map(|line| strip_codes(line)).collect();
        let rejoined = stripped.join(" ");
        let normalized: Vec<&str> = rejoined.split_whitespace().collect();
        assert_eq!(normalized, expected, "width {width}");
    }
}

#[test]
fn full_width_slice_reproduces_visible_content() {
    let lines = [
        "plain text",
        "\x1b[1mbold\x1b[0m and plain",
        "wide 你好 cluster",
        "tab\thandled",
    ];
    for line in lines {
        let width = visible_width(line);
        let sliced = slice_by_column(line, 0, width, false);
        assert_eq!(strip_codes(&sliced), strip_codes(line), "line {line:?}");
        assert_eq!(visible_width(&sliced), width, "line {line:?}");
    }
}

fn strip_codes(input: &str) -> String {
    use loom_tui::core::text::ansi::extract_escape;
    let mut out = String::new();
    let mut idx = 0;
    while idx < input.len() {
        if let Some(escape) = extract_escape(input, idx) {
            idx += escape.length;
            continue;
        }
        let Some(ch) = input[idx..].chars().next() else {
            break;
        };
        out.push(ch);
        idx += ch.len_utf8();
    }
    out
}
