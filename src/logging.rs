//! Best-effort debug logging for render decisions.
//!
//! Two append-only sinks, each enabled by pointing an environment variable at
//! a file path: `LOOM_DEBUG_REDRAW` records why full redraws happen,
//! `LOOM_DEBUG` records a dump of every diff pass. Writers swallow I/O errors;
//! diagnostics must never affect the render path.

use std::env;
use std::fs::OpenOptions;
use std::io::Write;

pub fn debug_redraw_enabled() -> bool {
    env_path("LOOM_DEBUG_REDRAW").is_some()
}

pub fn tui_debug_enabled() -> bool {
    env_path("LOOM_DEBUG").is_some()
}

/// Record a full-redraw decision and the frame sizes around it.
pub fn log_debug_redraw(reason: &str, previous_lines: usize, new_lines: usize, height: usize) {
    let Some(path) = env_path("LOOM_DEBUG_REDRAW") else {
        return;
    };
    let entry = format!(
        "full redraw: {reason} (prev={previous_lines} new={new_lines} height={height})\n"
    );
    append_best_effort(&path, &entry);
}

/// Snapshot of one diff pass, dumped when `LOOM_DEBUG` is set.
pub struct RenderDebugInfo<'a> {
    pub first_changed: usize,
    pub render_end: usize,
    pub viewport_top: usize,
    pub height: usize,
    pub line_diff: i32,
    pub hardware_cursor_row: usize,
    pub final_cursor_row: usize,
    pub new_lines: &'a [String],
    pub previous_lines: &'a [String],
    pub buffer: &'a str,
}

pub fn log_tui_debug(info: &RenderDebugInfo<'_>) {
    let Some(path) = env_path("LOOM_DEBUG") else {
        return;
    };
    let mut entry = String::new();
    entry.push_str(&format!(
        "diff pass: changed {}..={} viewport_top={} height={} line_diff={} hw_row={} final_row={}\n",
        info.first_changed,
        info.render_end,
        info.viewport_top,
        info.height,
        info.line_diff,
        info.hardware_cursor_row,
        info.final_cursor_row,
    ));
    entry.push_str(&format!(
        "  lines: {} -> {}, emitted {} bytes\n",
        info.previous_lines.len(),
        info.new_lines.len(),
        info.buffer.len(),
    ));
    append_best_effort(&path, &entry);
}

fn env_path(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}

fn append_best_effort(path: &str, entry: &str) {
    let _ = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .and_then(|mut file| file.write_all(entry.as_bytes()));
}
