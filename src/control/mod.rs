//! Pace control: forced reductions and exploration budgets.

pub mod explore;
pub mod forced;

pub use explore::ExploreSpace;
pub use forced::{Criterion, CriteriaLimits, ReductionController};
