//! One design-manager cycle: proposal → merge → fragility → commit.

use anyhow::{Context, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config;
use crate::control::{Criterion, ReductionController};
use crate::discipline::sorter::sort_points;
use crate::discipline::Discipline;
use crate::fragility::{
    assess, new_combo, AdaptiveCheck, BasicCheck, EntropyModel, FragilityDecision, PerceptionHistory,
    PfmModel, Progress, RiskTable, ScheduleParams,
};
use crate::merging::{dom_decision, form_opinions, partition_space, perceive_all, rule_combinations, OpinionConfig};
use crate::partition::tree::TreeConfig;
use crate::partition::ExplorationCheck;
use crate::rules::expr::Rule;
use crate::surrogate::GprConfig;

/// Which risk model feeds the fragility decision.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    #[default]
    Pfm,
    Efm,
}

/// Which fragility threshold strategy is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    #[default]
    Basic,
    Adaptive,
}

/// Design-manager configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    pub schedule: ScheduleParams,
    pub opinion: OpinionConfig,
    pub gpr: GprConfig,
    pub tree: TreeConfig,
    pub controller: ReductionController,
    pub model: ModelKind,
    pub check: CheckKind,

    /// Order of the generalised residual entropy (EFM only).
    pub efm_order: u32,

    /// Exploration budget parameters `[minimum, rate, peak]`.
    pub explore: [f64; 3],
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleParams::default(),
            opinion: OpinionConfig::default(),
            gpr: GprConfig::default(),
            tree: TreeConfig::default(),
            controller: ReductionController::default(),
            model: ModelKind::default(),
            check: CheckKind::default(),
            efm_order: 1,
            explore: config::DEFAULT_EXPLORE,
        }
    }
}

impl ManagerConfig {
    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_check(mut self, check: CheckKind) -> Self {
        self.check = check;
        self
    }
}

/// A rule proposed this cycle.
#[derive(Clone, Debug, Serialize)]
pub struct ProposedRule {
    pub discipline: String,
    pub rule: String,
    pub vetoed: bool,
}

/// What happened in one cycle.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CycleReport {
    pub iters: usize,

    /// Criteria relaxed by forced reductions, per discipline.
    pub relaxed: Vec<(String, Criterion)>,

    pub proposals: Vec<ProposedRule>,

    /// Risk of every combination of surviving rules.
    pub risk: Option<RiskTable>,
    pub fragile: Vec<bool>,

    /// Rules committed this cycle.
    pub committed: Vec<String>,

    /// Rules banned for the rest of this cycle.
    pub banned: Vec<String>,

    /// Remaining-space fraction per discipline after the cycle.
    pub space_remaining: Vec<(String, f64)>,
}

/// Orchestrates reduction cycles over a fixed set of disciplines.
pub struct DesignManager {
    pub config: ManagerConfig,

    /// Every committed input rule, oldest first.
    pub input_rules: Vec<Rule>,

    pub history: PerceptionHistory,
}

impl DesignManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self {
            config,
            input_rules: Vec::new(),
            history: PerceptionHistory::new(),
        }
    }

    pub fn with_history(mut self, history: PerceptionHistory) -> Self {
        self.history = history;
        self
    }

    fn decision(&self) -> Box<dyn FragilityDecision> {
        let schedule = self.config.schedule.clone();
        match self.config.check {
            CheckKind::Basic => Box::new(BasicCheck { schedule }),
            CheckKind::Adaptive => Box::new(AdaptiveCheck { schedule }),
        }
    }

    /// Run one cycle at iteration `iters` of `iters_max`.
    pub fn run_cycle<R: Rng + ?Sized>(
        &mut self,
        disciplines: &mut [Discipline],
        iters: usize,
        iters_max: usize,
        rng: &mut R,
    ) -> Result<CycleReport> {
        self.config.schedule.validate()?;
        let mut report = CycleReport {
            iters,
            ..Default::default()
        };

        let relaxed = self
            .config
            .controller
            .check(disciplines, &self.config.schedule, iters, iters_max)?;
        for (d, r) in disciplines.iter().zip(relaxed) {
            if let Some(criterion) = r {
                report.relaxed.push((d.name.clone(), criterion));
            }
        }

        let proposer = ExplorationCheck::new(self.config.tree.clone());
        let mut rules = Vec::new();
        let mut proposers = Vec::new();
        for (i, d) in disciplines.iter().enumerate() {
            if let Some(p) = proposer.propose(d)? {
                rules.push(p.rule);
                proposers.push(i);
            }
        }
        if rules.is_empty() {
            report.space_remaining = space_fractions(disciplines);
            return Ok(report);
        }

        let perceptions = perceive_all(disciplines, &self.config.gpr)?;
        self.history.record(iters, &perceptions);

        let table = form_opinions(disciplines, &perceptions, &rules, &self.config.opinion)?;
        let fail_crits: Vec<f64> = disciplines.iter().map(|d| d.criteria.fail_crit).collect();
        let keep = dom_decision(&table, &rules, &proposers, &fail_crits)?;
        for ((rule, &p), &k) in rules.iter().zip(&proposers).zip(&keep) {
            report.proposals.push(ProposedRule {
                discipline: disciplines[p].name.clone(),
                rule: rule.to_string(),
                vetoed: !k,
            });
        }
        let survivors: Vec<Rule> = rules
            .into_iter()
            .zip(&keep)
            .filter(|(_, &k)| k)
            .map(|(r, _)| r)
            .collect();
        if survivors.is_empty() {
            report.space_remaining = space_fractions(disciplines);
            return Ok(report);
        }

        let combos = rule_combinations(survivors.len());
        let mut splits = Vec::with_capacity(combos.len());
        for combo in &combos {
            let combo_rules: Vec<&Rule> = combo.iter().map(|&i| &survivors[i]).collect();
            let row = disciplines
                .iter()
                .map(|d| partition_space(d, &combo_rules))
                .collect::<Result<Vec<_>>>()?;
            splits.push(row);
        }

        let risk = match self.config.model {
            ModelKind::Pfm => assess(&PfmModel, &perceptions, &combos, &splits)?,
            ModelKind::Efm => {
                let model = EntropyModel::new(&self.history).with_order(self.config.efm_order);
                assess(&model, &perceptions, &combos, &splits)?
            }
        };

        let fractions: Vec<f64> = disciplines.iter().map(Discipline::space_remaining_fraction).collect();
        let progress = Progress {
            iters,
            iters_max,
            space_fractions: &fractions,
        };
        let fragile = self.decision().fragile(&risk, &progress)?;
        let choice = new_combo(&combos, &fragile, rng)?;
        report.banned = choice.banned.iter().map(|&i| survivors[i].to_string()).collect();

        if let Some(c) = choice.accepted {
            let committed: Vec<Rule> = combos[c].iter().map(|&i| survivors[i].clone()).collect();
            let sorted = sort_points(disciplines, &committed).context("applying committed rules")?;
            self.config.controller.committed(disciplines, &sorted);
            for rule in &committed {
                info!(%rule, "reduction committed");
                report.committed.push(rule.to_string());
            }
            self.input_rules.extend(committed);
        }

        report.risk = Some(risk);
        report.fragile = fragile;
        report.space_remaining = space_fractions(disciplines);
        Ok(report)
    }
}

fn space_fractions(disciplines: &[Discipline]) -> Vec<(String, f64)> {
    disciplines
        .iter()
        .map(|d| (d.name.clone(), d.space_remaining_fraction()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discipline::state::tests::toy_discipline;
    use crate::partition::Criteria;
    use crate::rules::expr::Relation;
    use crate::sampling::uniform_grid;
    use ndarray::{Array1, Array2, Axis};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn loose() -> Criteria {
        Criteria {
            cdf_crit: 0.5,
            fail_crit: 0.1,
            dist_crit: 0.3,
            disc_crit: 0.2,
        }
    }

    /// A 3x3-grid discipline tested on a 6x6 lattice, with one linear output
    /// bounded by `out <= 0.5`.
    fn lattice(name: &str, ins: [&str; 2], out: &str, coefficients: [f64; 2]) -> Discipline {
        let ins: Vec<String> = ins.iter().map(|s| s.to_string()).collect();
        let grid = uniform_grid(9, &ins, &[]).unwrap();
        let rules = vec![Rule::axis(out, Relation::Le, 0.5)];
        let mut d = Discipline::new(name, ins, vec![out.to_string()], grid, &rules, loose()).unwrap();
        let mut flat = Vec::new();
        for i in 0..6 {
            for j in 0..6 {
                flat.push(i as f64 / 5.0);
                flat.push(j as f64 / 5.0);
            }
        }
        let x = Array2::from_shape_vec((36, 2), flat).unwrap();
        let y = x.dot(&Array1::from(coefficients.to_vec())).insert_axis(Axis(1));
        d.add_tested(x, y).unwrap();
        d
    }

    fn explored() -> Discipline {
        lattice("toy", ["x1", "x2"], "y1", [1.0, 0.0])
    }

    fn lenient() -> ManagerConfig {
        let mut config = ManagerConfig::default();
        config.schedule.shift = f64::MAX;
        config
    }

    #[test]
    fn test_cycle_commits_clear_reduction() {
        let mut ds = vec![explored()];
        let mut manager = DesignManager::new(lenient());
        let mut rng = StdRng::seed_from_u64(5);
        let report = manager.run_cycle(&mut ds, 10, 100, &mut rng).unwrap();
        assert_eq!(report.proposals.len(), 1);
        assert_eq!(report.committed.len(), 1);
        assert_eq!(manager.input_rules.len(), 1);
        // Grid rows with x1 = 1.0 are gone; tested rows with x1 > 0.5 moved.
        assert_eq!(ds[0].space_remaining.len(), 6);
        assert_eq!(ds[0].eliminated.tested.len(), 18);
        assert_eq!(ds[0].forced_reductions, 0);
        assert_eq!(manager.history.len(), 1);
    }

    #[test]
    fn test_cycle_without_data_is_quiet() {
        let mut ds = vec![toy_discipline()];
        let mut manager = DesignManager::new(ManagerConfig::default());
        let report = manager.run_cycle(&mut ds, 0, 100, &mut StdRng::seed_from_u64(1)).unwrap();
        assert!(report.proposals.is_empty());
        assert!(report.risk.is_none());
        assert_eq!(report.space_remaining, vec![("toy".to_string(), 1.0)]);
    }

    #[test]
    fn test_efm_cycle_runs() {
        let mut ds = vec![explored()];
        let config = lenient().with_model(ModelKind::Efm).with_check(CheckKind::Adaptive);
        let mut manager = DesignManager::new(config);
        let report = manager.run_cycle(&mut ds, 10, 100, &mut StdRng::seed_from_u64(2)).unwrap();
        let risk = report.risk.expect("risk table");
        assert_eq!(risk.combos, vec![vec![0]]);
        assert!(serde_json::to_string(&report.proposals).is_ok());
    }

    #[test]
    fn test_config_json_defaults() {
        let config: ManagerConfig = serde_json::from_str(r#"{ "model": "efm" }"#).unwrap();
        assert_eq!(config.model, ModelKind::Efm);
        assert_eq!(config.check, CheckKind::Basic);
        assert_eq!(config.efm_order, 1);
    }

    #[test]
    fn test_counter_kept_when_grid_untouched() {
        let mut wing = explored();
        wing.forced_reductions = 2;
        // Always feasible, over variables the committed rule never touches.
        let mut other = lattice("other", ["z1", "z2"], "w1", [0.5, 0.0]);
        other.forced_reductions = 3;

        let mut ds = vec![wing, other];
        let mut manager = DesignManager::new(lenient());
        let report = manager.run_cycle(&mut ds, 10, 100, &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(report.proposals.len(), 1);
        assert_eq!(report.committed.len(), 1);
        assert_eq!(ds[0].forced_reductions, 0);
        assert_eq!(ds[1].space_remaining.len(), 9);
        let relaxed = report.relaxed.iter().filter(|(name, _)| name == "other").count();
        assert_eq!(ds[1].forced_reductions, 3 + relaxed);
    }

    #[test]
    fn test_conflicting_rule_vetoed_other_survives() {
        // "engine" is most feasible at high x1, where "wing" fails.
        let wing = lattice("wing", ["x1", "x2"], "y1", [1.0, 0.0]);
        let engine = lattice("engine", ["x1", "x3"], "y2", [-1.0, 0.0]);
        let tail = lattice("tail", ["z1", "z2"], "y3", [1.0, 0.0]);
        let mut ds = vec![wing, engine, tail];
        let mut manager = DesignManager::new(lenient());
        let report = manager.run_cycle(&mut ds, 10, 100, &mut StdRng::seed_from_u64(3)).unwrap();

        assert_eq!(report.proposals.len(), 2);
        assert_eq!(report.proposals[0].discipline, "wing");
        assert!(report.proposals[0].vetoed);
        assert_eq!(report.proposals[1].discipline, "tail");
        assert!(!report.proposals[1].vetoed);

        let risk = report.risk.expect("risk table");
        assert_eq!(risk.combos, vec![vec![0]]);
        assert_eq!(report.committed, vec![report.proposals[1].rule.clone()]);
        assert_eq!(ds[0].space_remaining.len(), 9);
        assert_eq!(ds[1].space_remaining.len(), 9);
        assert_eq!(ds[2].space_remaining.len(), 6);
    }

    #[test]
    fn test_independent_rules_combine() {
        let wing = lattice("wing", ["x1", "x2"], "y1", [1.0, 0.0]);
        let tail = lattice("tail", ["z1", "z2"], "y3", [1.0, 0.0]);
        let mut ds = vec![wing, tail];
        let mut manager = DesignManager::new(lenient());
        let report = manager.run_cycle(&mut ds, 10, 100, &mut StdRng::seed_from_u64(8)).unwrap();

        assert_eq!(report.proposals.len(), 2);
        assert!(report.proposals.iter().all(|p| !p.vetoed));
        let risk = report.risk.expect("risk table");
        assert_eq!(risk.combos, vec![vec![0], vec![1], vec![0, 1]]);
        assert_eq!(report.fragile, vec![false; 3]);
        assert!(!report.committed.is_empty());
        assert!(report.banned.is_empty());
        assert_eq!(manager.input_rules.len(), report.committed.len());
        let shrunk = ds.iter().filter(|d| d.space_remaining.len() == 6).count();
        assert_eq!(shrunk, report.committed.len());
    }
}
