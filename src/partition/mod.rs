//! Partition proposer: tree-based extraction of eliminable regions.
//!
//! - `labels`: good/bad labels from a failure-magnitude tail fraction
//! - `tree`: CART classifier
//! - `region`: leaf boxes, leaf selection, bound tightening
//! - `review`: the three acceptance gates
//! - `proposer`: the full exploration check

pub mod labels;
pub mod proposer;
pub mod region;
pub mod review;
pub mod tree;

pub use proposer::{ExplorationCheck, Proposal};
pub use review::{Criteria, Review};
