//! Rule representation for design-space reduction.
//!
//! A rule is a predicate over named, normalised design variables describing
//! the space that remains valid. Rules are built from linear inequalities
//! combined with conjunctions and disjunctions, and are never mutated once
//! created: reductions append new rules instead.

pub mod cache;
pub mod expr;
pub mod filter;

pub use cache::IneqCache;
pub use expr::{Ineq, Relation, Rule};
