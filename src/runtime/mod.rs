//! Runtime orchestration.

pub mod focus;
pub mod ime;
pub mod tui;

pub use tui::{OverlayHandle, RenderHandle, TuiRuntime};
