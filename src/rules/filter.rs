//! Constraint filtering: which rules concern which discipline.

use super::cache::IneqCache;
use super::expr::{Ineq, Rule};

/// Rules whose free variables are all contained in `vars`.
///
/// A rule that is not entirely controlled by the given variables is not the
/// concern of their owner and is dropped.
pub fn rules_for_vars(vars: &[String], rules: &[Rule]) -> Vec<Rule> {
    rules
        .iter()
        .filter(|r| controls(vars, r))
        .cloned()
        .collect()
}

/// Whether every free variable of `rule` appears in `vars`.
pub fn controls(vars: &[String], rule: &Rule) -> bool {
    rule.free_variables().iter().all(|v| vars.contains(v))
}

/// Flatten `rule` into its primitive inequalities and register each of them
/// in `cache` with an empty accumulator. Existing keys keep their values.
pub fn collect_inequalities(rule: &Rule, cache: &mut IneqCache) -> Vec<Ineq> {
    let prims: Vec<Ineq> = rule.primitives().into_iter().cloned().collect();
    for ineq in &prims {
        cache.insert(ineq);
    }
    prims
}
