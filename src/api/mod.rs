//! Public API layer, the stable entry points for external consumers.
//!
//! Embedders construct a [`Playground`] through its builder and interact
//! with the system exclusively through it.

mod playground;

pub use playground::{Playground, PlaygroundBuilder};
