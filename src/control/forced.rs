//! Forced reduction and criteria relaxation.
//!
//! A discipline whose eliminated fraction falls behind the minimum-pace
//! schedule has one of its partition criteria relaxed per call, cycling
//! through `cdf_crit`, `fail_crit`, `dist_crit`, `disc_crit`. Each criterion
//! stops at its ceiling. The counter resets once a committed reduction
//! removes part of that discipline's grid.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config;
use crate::discipline::sorter::SortSummary;
use crate::discipline::Discipline;
use crate::fragility::schedule::{elapsed, ScheduleParams};
use crate::partition::Criteria;

/// Relaxation ceilings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CriteriaLimits {
    pub cdf_crit: f64,
    pub fail_crit: f64,
    pub dist_crit: f64,
    pub disc_crit: f64,
}

impl Default for CriteriaLimits {
    fn default() -> Self {
        Self {
            cdf_crit: 0.5,
            fail_crit: 0.5,
            dist_crit: 0.7,
            disc_crit: 0.7,
        }
    }
}

/// The criterion relaxed by one forced-reduction call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Criterion {
    Cdf,
    Fail,
    Dist,
    Disc,
}

impl Criterion {
    const CYCLE: [Criterion; 4] = [Criterion::Cdf, Criterion::Fail, Criterion::Dist, Criterion::Disc];

    pub fn for_counter(counter: usize) -> Self {
        Self::CYCLE[counter % 4]
    }

    fn slot<'a>(&self, criteria: &'a mut Criteria, limits: &CriteriaLimits) -> (&'a mut f64, f64) {
        match self {
            Criterion::Cdf => (&mut criteria.cdf_crit, limits.cdf_crit),
            Criterion::Fail => (&mut criteria.fail_crit, limits.fail_crit),
            Criterion::Dist => (&mut criteria.dist_crit, limits.dist_crit),
            Criterion::Disc => (&mut criteria.disc_crit, limits.disc_crit),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReductionController {
    pub limits: CriteriaLimits,

    /// Amount added to a criterion per relaxation.
    pub step: f64,
}

impl Default for ReductionController {
    fn default() -> Self {
        Self {
            limits: CriteriaLimits::default(),
            step: config::DEFAULT_RELAX_STEP,
        }
    }
}

impl ReductionController {
    pub fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    /// Whether `discipline` has eliminated less than the schedule demands.
    pub fn is_behind(
        &self,
        discipline: &Discipline,
        schedule: &ScheduleParams,
        iters: usize,
        iters_max: usize,
    ) -> Result<bool> {
        let eliminated = 1.0 - discipline.space_remaining_fraction();
        Ok(eliminated < schedule.min_reduction(elapsed(iters, iters_max))?)
    }

    /// Relax the next criterion of `discipline` and advance its counter.
    pub fn force_reduction(&self, discipline: &mut Discipline) -> Criterion {
        let criterion = Criterion::for_counter(discipline.forced_reductions);
        let (value, ceiling) = criterion.slot(&mut discipline.criteria, &self.limits);
        *value = (*value + self.step).min(ceiling);
        let relaxed_to = *value;
        discipline.forced_reductions += 1;
        info!(
            discipline = %discipline.name,
            ?criterion,
            relaxed_to,
            counter = discipline.forced_reductions,
            "forced reduction"
        );
        criterion
    }

    /// Check every discipline and relax the ones falling behind.
    pub fn check(
        &self,
        disciplines: &mut [Discipline],
        schedule: &ScheduleParams,
        iters: usize,
        iters_max: usize,
    ) -> Result<Vec<Option<Criterion>>> {
        let mut out = Vec::with_capacity(disciplines.len());
        for d in disciplines.iter_mut() {
            let relaxed = if self.is_behind(d, schedule, iters, iters_max)? {
                Some(self.force_reduction(d))
            } else {
                None
            };
            out.push(relaxed);
        }
        Ok(out)
    }

    /// A reduction was committed: reset the counter of every discipline
    /// whose grid actually shrank.
    pub fn committed(&self, disciplines: &mut [Discipline], sorted: &[SortSummary]) {
        for (d, summary) in disciplines.iter_mut().zip(sorted) {
            if summary.space_moved > 0 {
                d.forced_reductions = 0;
            }
        }
    }
}
