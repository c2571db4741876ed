//! Reference sampling of the design space.

pub mod grid;

pub use grid::{uniform_grid, GridSample};
