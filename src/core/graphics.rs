//! Inline-image passthrough support.
//!
//! The engine never decodes image payloads: lines carrying kitty graphics or
//! iTerm2 inline-image sequences are detected so the renderer rewrites them
//! verbatim and the compositor leaves them alone. Cell pixel dimensions
//! (needed by image-producing components to size payloads) are tracked here,
//! fed by the `CSI 16 t` query whose reply the runtime filters out of the
//! input stream.

use std::env;
use std::sync::Mutex;

const KITTY_PREFIX: &str = "\x1b_G";
const ITERM2_PREFIX: &str = "\x1b]1337;File=";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageProtocol {
    Kitty,
    Iterm2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerminalCapabilities {
    pub images: Option<ImageProtocol>,
    pub true_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellDimensions {
    pub width_px: u32,
    pub height_px: u32,
}

impl Default for CellDimensions {
    fn default() -> Self {
        Self {
            width_px: 9,
            height_px: 18,
        }
    }
}

/// Per-engine graphics state: detected capabilities plus the last reported
/// cell size. Owned by the runtime instance; there is no process-wide cache,
/// so independent engines (and tests) never observe each other.
#[derive(Debug, Default)]
pub struct GraphicsState {
    capabilities: Mutex<Option<TerminalCapabilities>>,
    cell_dimensions: Mutex<Option<CellDimensions>>,
}

impl GraphicsState {
    pub fn capabilities(&self) -> TerminalCapabilities {
        let mut cached = self
            .capabilities
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(value) = *cached {
            return value;
        }
        let detected = detect_capabilities();
        *cached = Some(detected);
        detected
    }

    pub fn cell_dimensions(&self) -> CellDimensions {
        self.cell_dimensions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .unwrap_or_default()
    }

    pub fn set_cell_dimensions(&self, dims: CellDimensions) {
        let mut current = self
            .cell_dimensions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *current = Some(dims);
    }
}

/// Environment-based capability sniff.
pub fn detect_capabilities() -> TerminalCapabilities {
    let term_program = env::var("TERM_PROGRAM").unwrap_or_default().to_lowercase();
    let term = env::var("TERM").unwrap_or_default().to_lowercase();
    let color_term = env::var("COLORTERM").unwrap_or_default().to_lowercase();

    if env::var("KITTY_WINDOW_ID").is_ok() || term_program == "kitty" {
        return TerminalCapabilities {
            images: Some(ImageProtocol::Kitty),
            true_color: true,
        };
    }

    if term_program == "ghostty"
        || term.contains("ghostty")
        || env::var("GHOSTTY_RESOURCES_DIR").is_ok()
    {
        return TerminalCapabilities {
            images: Some(ImageProtocol::Kitty),
            true_color: true,
        };
    }

    if env::var("WEZTERM_PANE").is_ok() || term_program == "wezterm" {
        return TerminalCapabilities {
            images: Some(ImageProtocol::Kitty),
            true_color: true,
        };
    }

    if env::var("ITERM_SESSION_ID").is_ok() || term_program == "iterm.app" {
        return TerminalCapabilities {
            images: Some(ImageProtocol::Iterm2),
            true_color: true,
        };
    }

    let true_color = color_term == "truecolor" || color_term == "24bit";
    TerminalCapabilities {
        images: None,
        true_color,
    }
}

/// Whether a rendered line carries an opaque inline-image payload.
pub fn is_image_line(line: &str) -> bool {
    line.contains(KITTY_PREFIX) || line.contains(ITERM2_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::{is_image_line, CellDimensions, GraphicsState};

    #[test]
    fn image_line_detection_matches_both_protocols() {
        assert!(is_image_line("\x1b_Gf=100;data"));
        assert!(is_image_line("prefix\x1b]1337;File=data"));
        assert!(!is_image_line("plain text"));
    }

    #[test]
    fn cell_dimensions_default_and_update() {
        let state = GraphicsState::default();
        assert_eq!(state.cell_dimensions(), CellDimensions::default());
        let updated = CellDimensions {
            width_px: 10,
            height_px: 20,
        };
        state.set_cell_dimensions(updated);
        assert_eq!(state.cell_dimensions(), updated);
    }

    #[test]
    fn independent_states_do_not_share_dimensions() {
        let first = GraphicsState::default();
        let second = GraphicsState::default();
        first.set_cell_dimensions(CellDimensions {
            width_px: 7,
            height_px: 14,
        });
        assert_eq!(second.cell_dimensions(), CellDimensions::default());
    }
}
