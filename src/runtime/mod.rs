//! Runtime: problem loading, sampling and the design-manager cycle.
//!
//! - `problem`: JSON problem definitions and the analysis seam
//! - `cycle`: one reduction cycle over all disciplines

pub mod cycle;
pub mod problem;

pub use cycle::{CheckKind, CycleReport, DesignManager, ManagerConfig, ModelKind};
pub use problem::{sample_and_evaluate, BuiltProblem, DisciplineAnalysis, LinearAnalysis, ProblemDefinition};
