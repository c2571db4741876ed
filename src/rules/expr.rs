//! Inequality and rule expression trees.
//!
//! Each primitive inequality is a halfspace over named variables:
//! `Σ c_i · x_i  (<= | >)  rhs`. The partition proposer only ever produces
//! axis-aligned inequalities (`x_i <= t` / `x_i > t`), but problem
//! definitions may carry general linear forms.

use std::collections::BTreeSet;
use std::fmt;

use anyhow::{bail, Result};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

/// Relational operator of a primitive inequality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Relation {
    /// `lhs <= rhs`
    Le,
    /// `lhs > rhs`
    Gt,
}

impl Relation {
    /// The complementary relation.
    pub fn flip(self) -> Self {
        match self {
            Relation::Le => Relation::Gt,
            Relation::Gt => Relation::Le,
        }
    }

    /// Whether `lhs (op) rhs` holds.
    pub fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Relation::Le => lhs <= rhs,
            Relation::Gt => lhs > rhs,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            Relation::Le => "<=",
            Relation::Gt => ">",
        }
    }
}

/// A primitive linear inequality.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ineq {
    /// Left-hand side as `(variable, coefficient)` pairs.
    pub terms: Vec<(String, f64)>,

    /// Relational operator.
    pub relation: Relation,

    /// Right-hand side constant.
    pub rhs: f64,
}

impl Ineq {
    /// General linear inequality.
    pub fn new(terms: Vec<(String, f64)>, relation: Relation, rhs: f64) -> Self {
        Self {
            terms,
            relation,
            rhs,
        }
    }

    /// Axis-aligned inequality `var (op) threshold`.
    pub fn axis(var: &str, relation: Relation, threshold: f64) -> Self {
        Self::new(vec![(var.to_string(), 1.0)], relation, threshold)
    }

    /// The variable of an axis-aligned inequality (single term, unit coefficient).
    pub fn axis_var(&self) -> Option<&str> {
        match self.terms.as_slice() {
            [(var, coef)] if *coef == 1.0 => Some(var.as_str()),
            _ => None,
        }
    }

    /// Same inequality with the opposite relation.
    pub fn flipped(&self) -> Self {
        Self {
            terms: self.terms.clone(),
            relation: self.relation.flip(),
            rhs: self.rhs,
        }
    }

    /// Evaluate the left-hand side, failing on an unbound variable.
    pub fn lhs<F>(&self, lookup: &F) -> Result<f64>
    where
        F: Fn(&str) -> Option<f64>,
    {
        let mut acc = 0.0;
        for (var, coef) in &self.terms {
            match lookup(var) {
                Some(v) => acc += coef * v,
                None => bail!("variable '{}' is not bound in '{}'", var, self),
            }
        }
        Ok(acc)
    }

    /// Whether the inequality holds under `lookup`.
    pub fn evaluate<F>(&self, lookup: &F) -> Result<bool>
    where
        F: Fn(&str) -> Option<f64>,
    {
        Ok(self.relation.holds(self.lhs(lookup)?, self.rhs))
    }

    /// Variables appearing on the left-hand side.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.terms.iter().map(|(v, _)| v.as_str())
    }

    /// Bitwise identity used as a cache key (distinguishes `0.0` and `-0.0`).
    pub(crate) fn same_as(&self, other: &Ineq) -> bool {
        self.relation == other.relation
            && self.rhs.to_bits() == other.rhs.to_bits()
            && self.terms.len() == other.terms.len()
            && self
                .terms
                .iter()
                .zip(&other.terms)
                .all(|((va, ca), (vb, cb))| va == vb && ca.to_bits() == cb.to_bits())
    }
}

impl fmt::Display for Ineq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (var, coef)) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            if *coef == 1.0 {
                write!(f, "{}", var)?;
            } else {
                write!(f, "{}*{}", coef, var)?;
            }
        }
        write!(f, " {} {}", self.relation.symbol(), self.rhs)
    }
}

/// A rule: a primitive inequality or a compound of rules.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Rule {
    Ineq(Ineq),
    And(Vec<Rule>),
    Or(Vec<Rule>),
}

impl Rule {
    /// Convenience constructor for an axis-aligned rule.
    pub fn axis(var: &str, relation: Relation, threshold: f64) -> Self {
        Rule::Ineq(Ineq::axis(var, relation, threshold))
    }

    /// All variables the rule depends on.
    pub fn free_variables(&self) -> BTreeSet<String> {
        let mut vars = BTreeSet::new();
        self.collect_vars(&mut vars);
        vars
    }

    fn collect_vars(&self, vars: &mut BTreeSet<String>) {
        match self {
            Rule::Ineq(ineq) => {
                vars.extend(ineq.variables().map(str::to_string));
            }
            Rule::And(parts) | Rule::Or(parts) => {
                for p in parts {
                    p.collect_vars(vars);
                }
            }
        }
    }

    /// Substitute values and evaluate. An empty `And` is true, an empty `Or` false.
    pub fn evaluate<F>(&self, lookup: &F) -> Result<bool>
    where
        F: Fn(&str) -> Option<f64>,
    {
        match self {
            Rule::Ineq(ineq) => ineq.evaluate(lookup),
            Rule::And(parts) => {
                for p in parts {
                    if !p.evaluate(lookup)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Rule::Or(parts) => {
                for p in parts {
                    if p.evaluate(lookup)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Evaluate against one row of points whose columns are named by `vars`.
    pub fn evaluate_row(&self, vars: &[String], row: ArrayView1<f64>) -> Result<bool> {
        self.evaluate(&|name: &str| vars.iter().position(|v| v == name).map(|c| row[c]))
    }

    /// Logical negation by De Morgan's law; primitive relations are flipped.
    pub fn negate(&self) -> Rule {
        match self {
            Rule::Ineq(ineq) => Rule::Ineq(ineq.flipped()),
            Rule::And(parts) => Rule::Or(parts.iter().map(Rule::negate).collect()),
            Rule::Or(parts) => Rule::And(parts.iter().map(Rule::negate).collect()),
        }
    }

    /// Flattened primitive inequalities, in left-to-right order.
    pub fn primitives(&self) -> Vec<&Ineq> {
        let mut out = Vec::new();
        self.collect_primitives(&mut out);
        out
    }

    fn collect_primitives<'a>(&'a self, out: &mut Vec<&'a Ineq>) {
        match self {
            Rule::Ineq(ineq) => out.push(ineq),
            Rule::And(parts) | Rule::Or(parts) => {
                for p in parts {
                    p.collect_primitives(out);
                }
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (parts, sep) = match self {
            Rule::Ineq(ineq) => return write!(f, "{}", ineq),
            Rule::And(parts) => (parts, " & "),
            Rule::Or(parts) => (parts, " | "),
        };
        for (i, p) in parts.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", sep)?;
            }
            match p {
                Rule::Ineq(_) => write!(f, "{}", p)?,
                _ => write!(f, "({})", p)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn lookup(x1: f64, x2: f64) -> impl Fn(&str) -> Option<f64> {
        move |name: &str| match name {
            "x1" => Some(x1),
            "x2" => Some(x2),
            _ => None,
        }
    }

    #[test]
    fn test_relation_flip_and_holds() {
        assert_eq!(Relation::Le.flip(), Relation::Gt);
        assert!(Relation::Le.holds(0.5, 0.5));
        assert!(!Relation::Gt.holds(0.5, 0.5));
    }

    #[test]
    fn test_ineq_evaluate() {
        let ineq = Ineq::new(
            vec![("x1".into(), 1.0), ("x2".into(), 2.0)],
            Relation::Le,
            1.0,
        );
        assert!(ineq.evaluate(&lookup(0.2, 0.3)).unwrap());
        assert!(!ineq.evaluate(&lookup(0.5, 0.3)).unwrap());
    }

    #[test]
    fn test_unbound_variable_errors() {
        let rule = Rule::axis("x3", Relation::Le, 0.5);
        let err = rule.evaluate(&lookup(0.1, 0.1)).unwrap_err();
        assert!(err.to_string().contains("x3"));
    }

    #[test]
    fn test_negate_de_morgan() {
        let region = Rule::And(vec![
            Rule::axis("x1", Relation::Gt, 0.4),
            Rule::axis("x2", Relation::Le, 0.6),
        ]);
        let survivor = region.negate();
        assert!(matches!(survivor, Rule::Or(_)));
        for &(a, b) in &[(0.5, 0.5), (0.1, 0.5), (0.5, 0.9), (0.1, 0.9)] {
            let l = lookup(a, b);
            assert_ne!(region.evaluate(&l).unwrap(), survivor.evaluate(&l).unwrap());
        }
    }

    #[test]
    fn test_free_variables_and_primitives() {
        let rule = Rule::Or(vec![
            Rule::axis("x2", Relation::Le, 0.1),
            Rule::And(vec![
                Rule::axis("x1", Relation::Gt, 0.2),
                Rule::axis("x2", Relation::Gt, 0.3),
            ]),
        ]);
        let vars: Vec<String> = rule.free_variables().into_iter().collect();
        assert_eq!(vars, vec!["x1".to_string(), "x2".to_string()]);
        assert_eq!(rule.primitives().len(), 3);
    }

    #[test]
    fn test_evaluate_row() {
        let vars = vec!["x1".to_string(), "x2".to_string()];
        let rule = Rule::axis("x2", Relation::Gt, 0.5);
        assert!(rule.evaluate_row(&vars, array![0.0, 0.7].view()).unwrap());
        assert!(!rule.evaluate_row(&vars, array![0.9, 0.2].view()).unwrap());
    }

    #[test]
    fn test_display() {
        let rule = Rule::Or(vec![
            Rule::axis("x1", Relation::Le, 0.5),
            Rule::axis("x2", Relation::Gt, 0.25),
        ]);
        assert_eq!(rule.to_string(), "x1 <= 0.5 | x2 > 0.25");
    }

    #[test]
    fn test_empty_compounds() {
        let l = lookup(0.0, 0.0);
        assert!(Rule::And(vec![]).evaluate(&l).unwrap());
        assert!(!Rule::Or(vec![]).evaluate(&l).unwrap());
    }
}
