//! Fragility decision: flag risky combinations and pick one to commit.

use std::collections::BTreeSet;

use anyhow::{ensure, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::info;

use super::risk::RiskTable;
use super::schedule::{elapsed, ScheduleParams};

/// Progress information a decision strategy may consult.
#[derive(Clone, Copy, Debug)]
pub struct Progress<'a> {
    pub iters: usize,
    pub iters_max: usize,

    /// Remaining-space fraction per discipline, in risk-table column order.
    pub space_fractions: &'a [f64],
}

impl Progress<'_> {
    pub fn elapsed(&self) -> f64 {
        elapsed(self.iters, self.iters_max)
    }
}

/// A strategy for flagging fragile rule combinations.
pub trait FragilityDecision {
    fn name(&self) -> &'static str;

    /// One flag per combination of `table`; `true` = fragile.
    fn fragile(&self, table: &RiskTable, progress: &Progress<'_>) -> Result<Vec<bool>>;
}

/// Global threshold `max(f(t), 0) + shift` against the worst discipline.
#[derive(Clone, Debug, Default)]
pub struct BasicCheck {
    pub schedule: ScheduleParams,
}

impl FragilityDecision for BasicCheck {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn fragile(&self, table: &RiskTable, progress: &Progress<'_>) -> Result<Vec<bool>> {
        let threshold = self.schedule.risk_threshold(progress.elapsed())?;
        Ok((0..table.combos.len())
            .map(|c| table.max_net(c) > threshold)
            .collect())
    }
}

/// Per-discipline threshold `min(T, T·s_d·(1 − t))`: less risk is tolerated
/// as time passes and as a discipline's space shrinks.
#[derive(Clone, Debug, Default)]
pub struct AdaptiveCheck {
    pub schedule: ScheduleParams,
}

impl AdaptiveCheck {
    pub fn threshold(&self, progress: &Progress<'_>, discipline: usize) -> Result<f64> {
        let t = progress.elapsed();
        let base = self.schedule.risk_threshold(t)?;
        let s = progress.space_fractions[discipline];
        Ok(base.min(base * s * (1.0 - t)))
    }
}

impl FragilityDecision for AdaptiveCheck {
    fn name(&self) -> &'static str {
        "adaptive"
    }

    fn fragile(&self, table: &RiskTable, progress: &Progress<'_>) -> Result<Vec<bool>> {
        ensure!(
            progress.space_fractions.len() == table.disciplines.len(),
            "{} space fractions for {} disciplines",
            progress.space_fractions.len(),
            table.disciplines.len()
        );
        let thresholds = (0..table.disciplines.len())
            .map(|d| self.threshold(progress, d))
            .collect::<Result<Vec<f64>>>()?;
        Ok(table
            .records
            .iter()
            .map(|row| row.iter().zip(&thresholds).any(|(r, t)| r.net() > *t))
            .collect())
    }
}

/// Outcome of [`new_combo`].
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ComboChoice {
    /// Index of the committed combination, if any was non-fragile.
    pub accepted: Option<usize>,

    /// Rules that appear only in fragile combinations.
    pub banned: Vec<usize>,
}

/// Choose uniformly among non-fragile combinations and ban rules that are
/// fragile wherever they appear.
pub fn new_combo<R: Rng + ?Sized>(combos: &[Vec<usize>], fragile: &[bool], rng: &mut R) -> Result<ComboChoice> {
    ensure!(
        combos.len() == fragile.len(),
        "{} combinations but {} fragility flags",
        combos.len(),
        fragile.len()
    );

    let mut in_good = BTreeSet::new();
    let mut seen = BTreeSet::new();
    let mut good = Vec::new();
    for (c, combo) in combos.iter().enumerate() {
        seen.extend(combo.iter().copied());
        if fragile[c] {
            info!(combo = ?combo, "fragile combination");
        } else {
            in_good.extend(combo.iter().copied());
            good.push(c);
        }
    }

    Ok(ComboChoice {
        accepted: good.choose(rng).copied(),
        banned: seen.difference(&in_good).copied().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragility::risk::RiskRecord;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn table(nets: &[&[f64]]) -> RiskTable {
        RiskTable {
            combos: (0..nets.len()).map(|c| vec![c]).collect(),
            disciplines: (0..nets[0].len()).map(|d| format!("d{}", d)).collect(),
            records: nets
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|&n| RiskRecord {
                            regret: n,
                            windfall: 0.0,
                        })
                        .collect()
                })
                .collect(),
        }
    }

    fn flat_schedule(shift: f64) -> ScheduleParams {
        ScheduleParams {
            risk: [0.0, 1.0, 1.0, 0.0],
            shift,
            ..Default::default()
        }
    }

    #[test]
    fn test_basic_check_strict_threshold() {
        let check = BasicCheck {
            schedule: flat_schedule(0.1),
        };
        let t = table(&[&[0.05, 0.1], &[0.0, 0.2]]);
        let progress = Progress {
            iters: 1,
            iters_max: 10,
            space_fractions: &[1.0, 1.0],
        };
        assert_eq!(check.fragile(&t, &progress).unwrap(), vec![false, true]);
    }

    #[test]
    fn test_adaptive_is_stricter() {
        let schedule = flat_schedule(0.2);
        let basic = BasicCheck {
            schedule: schedule.clone(),
        };
        let adaptive = AdaptiveCheck { schedule };
        let t = table(&[&[0.15, 0.0], &[0.05, 0.05], &[0.0, 0.19]]);
        let progress = Progress {
            iters: 5,
            iters_max: 10,
            space_fractions: &[0.5, 1.0],
        };
        // Thresholds: basic 0.2; adaptive 0.05 and 0.1.
        assert_eq!(basic.fragile(&t, &progress).unwrap(), vec![false, false, false]);
        assert_eq!(adaptive.fragile(&t, &progress).unwrap(), vec![true, false, true]);
    }

    #[test]
    fn test_new_combo_bans_only_fragile_rules() {
        let combos = vec![vec![0], vec![1], vec![2], vec![0, 1], vec![0, 2], vec![1, 2], vec![0, 1, 2]];
        let fragile = vec![false, true, true, false, true, true, true];
        let mut rng = StdRng::seed_from_u64(7);
        let choice = new_combo(&combos, &fragile, &mut rng).unwrap();
        assert_eq!(choice.banned, vec![2]);
        assert!(matches!(choice.accepted, Some(0) | Some(3)));
    }

    #[test]
    fn test_new_combo_seeded_is_reproducible() {
        let combos = vec![vec![0], vec![1], vec![0, 1]];
        let fragile = vec![false, false, false];
        let a = new_combo(&combos, &fragile, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = new_combo(&combos, &fragile, &mut StdRng::seed_from_u64(3)).unwrap();
        assert_eq!(a, b);
        assert!(a.banned.is_empty());
    }

    #[test]
    fn test_all_fragile() {
        let combos = vec![vec![0], vec![1], vec![0, 1]];
        let choice = new_combo(&combos, &[true, true, true], &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(choice.accepted, None);
        assert_eq!(choice.banned, vec![0, 1]);
    }
}
