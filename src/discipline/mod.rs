//! Discipline records and the point-elimination bookkeeper.
//!
//! - `state`: tested points, reference grid, eliminated bucket
//! - `rows`: uniform row moves across flags, arrays and caches
//! - `margin`: pass/fail classification and constraint distances
//! - `sorter`: moving rule-violating rows into the eliminated bucket

pub mod margin;
pub mod rows;
pub mod sorter;
pub mod state;

pub use state::{Discipline, EliminatedBucket, GridPoints, PointSet};
