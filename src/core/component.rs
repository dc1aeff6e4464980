//! Component and Focusable traits.

use crate::core::input_event::InputEvent;

/// Renderable component interface.
///
/// Components never perform terminal I/O; they return lines and the runtime
/// owns the write path.
pub trait Component {
    /// Render to a list of lines at the given width.
    fn render(&mut self, width: usize) -> Vec<String>;

    /// Handle input events. Components that ignore input keep the default.
    fn handle_event(&mut self, _event: &InputEvent) {}

    /// Optional cursor position metadata for this component's last render,
    /// relative to the lines returned from `render()`.
    fn cursor_pos(&self) -> Option<crate::core::cursor::CursorPos> {
        None
    }

    /// Invalidate any cached render state.
    fn invalidate(&mut self) {}

    /// Provide the current terminal row count (optional).
    fn set_terminal_rows(&mut self, _rows: usize) {}

    /// Whether this component wants key-release events delivered.
    fn wants_key_release(&self) -> bool {
        false
    }

    /// Optional focus behavior, queried instead of relying on attribute
    /// presence.
    fn as_focusable(&mut self) -> Option<&mut dyn Focusable> {
        None
    }
}

/// Focus behavior for components that track a focused flag.
pub trait Focusable {
    fn set_focused(&mut self, focused: bool);
    fn is_focused(&self) -> bool;
}
