//! Wrapped text block with padding and an optional background styler.

use crate::core::component::Component;
use crate::core::text::slice::wrap_text_with_ansi;
use crate::core::text::utils::apply_background_to_line;
use crate::core::text::width::visible_width;

pub type TextBgFn = Box<dyn Fn(&str) -> String>;

pub struct Text {
    text: String,
    padding_x: usize,
    padding_y: usize,
    custom_bg_fn: Option<TextBgFn>,
    cached_text: Option<String>,
    cached_width: Option<usize>,
    cached_lines: Option<Vec<String>>,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_padding(text, 1, 1)
    }

    pub fn with_padding(text: impl Into<String>, padding_x: usize, padding_y: usize) -> Self {
        Self {
            text: text.into(),
            padding_x,
            padding_y,
            custom_bg_fn: None,
            cached_text: None,
            cached_width: None,
            cached_lines: None,
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.invalidate();
    }

    pub fn set_padding(&mut self, padding_x: usize, padding_y: usize) {
        self.padding_x = padding_x;
        self.padding_y = padding_y;
        self.invalidate();
    }

    pub fn set_custom_bg_fn(&mut self, custom_bg_fn: Option<TextBgFn>) {
        self.custom_bg_fn = custom_bg_fn;
        self.invalidate();
    }

    fn render_lines(&mut self, width: usize) -> Vec<String> {
        if let Some(cached) = self.cached_lines.as_ref() {
            if self.cached_text.as_deref() == Some(&self.text) && self.cached_width == Some(width) {
                return cached.clone();
            }
        }

        let result = if self.text.trim().is_empty() {
            Vec::new()
        } else {
            let normalized = self.text.replace('\t', "   ");
            let content_width = width.saturating_sub(self.padding_x * 2).max(1);
            let wrapped = wrap_text_with_ansi(&normalized, content_width);

            let margin = " ".repeat(self.padding_x);
            let mut content_lines = Vec::new();
            for line in wrapped {
                let line_with_margins = format!("{margin}{line}{margin}");
                if let Some(bg_fn) = self.custom_bg_fn.as_ref() {
                    content_lines.push(apply_background_to_line(&line_with_margins, width, bg_fn));
                } else {
                    let visible_len = visible_width(&line_with_margins);
                    let padding_needed = width.saturating_sub(visible_len);
                    content_lines
                        .push(format!("{line_with_margins}{}", " ".repeat(padding_needed)));
                }
            }

            let empty_line = " ".repeat(width);
            let mut empty_lines = Vec::new();
            for _ in 0..self.padding_y {
                if let Some(bg_fn) = self.custom_bg_fn.as_ref() {
                    empty_lines.push(apply_background_to_line(&empty_line, width, bg_fn));
                } else {
                    empty_lines.push(empty_line.clone());
                }
            }

            let mut lines = Vec::new();
            lines.extend(empty_lines.iter().cloned());
            lines.extend(content_lines);
            lines.extend(empty_lines);
            lines
        };

        self.cached_text = Some(self.text.clone());
        self.cached_width = Some(width);
        self.cached_lines = Some(result.clone());

        result
    }
}

impl Component for Text {
    fn render(&mut self, width: usize) -> Vec<String> {
        self.render_lines(width)
    }

    fn invalidate(&mut self) {
        self.cached_text = None;
        self.cached_width = None;
        self.cached_lines = None;
    }
}

#[cfg(test)]
mod tests {
    use super::Text;
    use crate::core::component::Component;
    use crate::core::text::width::visible_width;

    #[test]
    fn wraps_and_stays_within_width() {
        let mut text = Text::with_padding("word word", 0, 0);
        let lines = text.render(4);
        assert_eq!(lines, vec!["word", "word"]);
        assert!(lines.iter().all(|line| visible_width(line) <= 4));
    }

    #[test]
    fn padding_adds_blank_rows_and_margins() {
        let mut text = Text::with_padding("hi", 1, 1);
        let lines = text.render(6);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "      ");
        assert!(lines[1].starts_with(" hi"));
    }

    #[test]
    fn cache_is_invalidated_on_set_text(){
        let mut text = Text::with_padding("one", 0, 0);
        assert_eq!(text.render(10), vec!["one"]);
        text.set_text("two");
        assert_eq!(text.render(10), vec!["two"]);
    }

    #[test]
    fn background_fn_wraps_padded_lines() {
        let mut text = Text::with_padding("hi", 0, 0);
        text.set_custom_bg_fn(Some(Box::new(|line| format!("<{line}>"))));
        let lines = text.render(4);
        assert_eq!(lines, vec!["<hi  >"]);
    }
}
