//! # setbased
//!
//! Fragility assessment for Set-Based Design.
//!
//! Several disciplines each keep a shrinking set of candidate design points.
//! Each cycle, disciplines propose rules that eliminate part of their input
//! space, the other disciplines weigh in through surrogate-model opinions,
//! and a fragility model decides whether committing a reduction adds too
//! much risk of discarding good designs.
//!
//! ## Pipeline
//!
//! 1. **Partition**: CART tree over good/bad labels, reviewed by three gates
//! 2. **Merging**: per-discipline GP perceptions, opinions, veto
//! 3. **Fragility**: windfall/regret (PFM) or trajectory entropy (EFM)
//! 4. **Decision**: time-dependent threshold, random non-fragile commit
//! 5. **Bookkeeping**: eliminated rows move to each discipline's bucket
//! 6. **Control**: criteria relax when elimination falls behind pace

pub mod control;
pub mod discipline;
pub mod fragility;
pub mod merging;
pub mod partition;
pub mod rules;
pub mod runtime;
pub mod sampling;
pub mod surrogate;

/// Crate-wide defaults.
pub mod config {
    /// Default tail fraction labelled bad.
    pub const DEFAULT_CDF_CRIT: f64 = 0.2;

    /// Default maximum fraction of passing points in an eliminated region.
    pub const DEFAULT_FAIL_CRIT: f64 = 0.1;

    /// Default maximum nearest-neighbour distance inside a region.
    pub const DEFAULT_DIST_CRIT: f64 = 0.2;

    /// Default maximum centered discrepancy of a region's points.
    pub const DEFAULT_DISC_CRIT: f64 = 0.05;

    /// Criterion increment per forced reduction.
    pub const DEFAULT_RELAX_STEP: f64 = 0.05;

    /// Allowed added risk over time `[p0, p1, p2, p3]`.
    pub const DEFAULT_RISK_SCHEDULE: [f64; 4] = [0.0, 3.0, 1.0, 0.5];

    /// Constant added to the risk threshold.
    pub const DEFAULT_RISK_SHIFT: f64 = 0.05;

    /// Minimum eliminated fraction over time `[p0, p1, p2, p3]`.
    pub const DEFAULT_REDUCTION_SCHEDULE: [f64; 4] = [0.1, 2.0, 1.0, 0.9];

    /// Requested grid size per discipline.
    pub const DEFAULT_GRID_POINTS: usize = 1000;

    /// Exploration budget `[minimum, rate, peak]`.
    pub const DEFAULT_EXPLORE: [f64; 3] = [2.0, 3.0, 4.0];

    /// Default iteration budget of the CLI.
    pub const DEFAULT_ITERS_MAX: usize = 100;
}
