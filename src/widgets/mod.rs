//! Minimal widgets exercising the Component contract.
//!
//! Richer consumers (editors, markdown views, pickers) live outside this
//! crate and build on the same contract.

pub mod container;
pub mod spacer;
pub mod text;

pub use container::Container;
pub use spacer::Spacer;
pub use text::Text;
