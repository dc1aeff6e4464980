//! Inline terminal UI engine.
//!
//! Two responsibilities, and only these: decoding raw terminal input bytes
//! into canonical key identifiers, and rendering a component tree to the
//! terminal with differential updates, overlay compositing, and cursor
//! management.
//!
//! Invariant: single output gate — only `core::output::OutputGate::flush(..)`
//! writes to the terminal.
//!
//! # Public API Overview
//! - Build components and compose them into a runtime via [`TUI`].
//! - Parse/inspect input with the key and event helpers.
//! - Layer floating UI with `show_overlay` and [`OverlayHandle`].
//! - Use the text helpers for ANSI-safe measurement, wrapping, and slicing.

pub mod config;
pub mod logging;

pub mod core;
pub mod platform;
pub mod render;
pub mod runtime;
pub mod widgets;

/// Keyboard input parsing and matching helpers.
pub use crate::core::input::{
    is_key_release, is_key_repeat, matches_key, parse_key, parse_key_event_type, KeyEventType,
    ParsedKittySequence,
};
pub use crate::core::input_event::{parse_input_events, InputEvent};

/// Runtime component traits and cursor marker helper.
pub use crate::core::component::{Component, Focusable};
pub use crate::core::cursor::{CursorPos, CURSOR_MARKER};

/// Terminal interfaces and the process-backed implementation.
pub use crate::core::terminal::{Terminal, TerminalGuard};
#[cfg(unix)]
pub use crate::platform::ProcessTerminal;

/// Input buffering for chunked terminal streams.
pub use crate::platform::stdin_buffer::{StdinBuffer, StdinEvent};

/// Inline-image passthrough support.
pub use crate::core::graphics::{
    detect_capabilities, is_image_line, CellDimensions, GraphicsState, ImageProtocol,
    TerminalCapabilities,
};

/// Render-layer frame types.
pub use crate::render::{Frame, Line, Span};

/// Overlay layout types.
pub use crate::render::overlay::{
    OverlayAnchor, OverlayLayout, OverlayMargin, OverlayOptions, SizeValue,
};

/// Runtime handles.
pub use crate::runtime::{OverlayHandle, RenderHandle, TuiRuntime};

/// Built-in components.
pub use crate::widgets::{Container, Spacer, Text};

/// Alias for the main runtime type.
pub type TUI<T> = crate::runtime::tui::TuiRuntime<T>;

/// Returns whether a component exposes focus behavior via [`Focusable`].
pub fn is_focusable(component: &mut dyn Component) -> bool {
    component.as_focusable().is_some()
}

/// ANSI-aware wrapping helper.
pub use crate::core::text::slice::wrap_text_with_ansi;
/// ANSI-aware truncation helper.
pub use crate::core::text::utils::truncate_to_width;
/// Visible width helper that ignores escape sequences.
pub use crate::core::text::width::visible_width;
