//! Constraint merging across disciplines.
//!
//! Proposed rules are combined, each discipline forms an opinion of every
//! single rule from its surrogate perception, and rules that another
//! discipline strongly dislikes are vetoed.
//!
//! The multi-output "connected perceptions" surrogate that would share
//! information between disciplines is not implemented; every discipline is
//! perceived independently.

pub mod combos;
pub mod opinion;
pub mod perception;

pub use combos::rule_combinations;
pub use opinion::{dom_decision, form_opinions, BezierCurve, OpinionConfig, OpinionTable};
pub use perception::{partition_space, perceive, perceive_all, Perception, SpaceSplit};
