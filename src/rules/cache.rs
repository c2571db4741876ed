//! Incremental left-hand-side cache for primitive inequalities.
//!
//! For every inequality relevant to a discipline, the cache keeps the value of
//! its left-hand side at every tested point, in tested-point order. New points
//! only extend the accumulators; values for old points are never recomputed.

use anyhow::{ensure, Result};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use super::expr::Ineq;
use crate::discipline::rows::RowStore;

/// One cached inequality with its accumulated left-hand-side values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedIneq {
    pub ineq: Ineq,
    pub lhs: Vec<f64>,
}

/// Inequality → left-hand-side accumulator map.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct IneqCache {
    entries: Vec<CachedIneq>,
}

/// Column naming for one block of point coordinates.
pub type NamedColumns<'a> = (&'a [String], ArrayView2<'a, f64>);

impl IneqCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an inequality with an empty accumulator.
    /// Returns `false` (and leaves the accumulator intact) if already present.
    pub fn insert(&mut self, ineq: &Ineq) -> bool {
        if self.contains(ineq) {
            return false;
        }
        self.entries.push(CachedIneq {
            ineq: ineq.clone(),
            lhs: Vec::new(),
        });
        true
    }

    pub fn contains(&self, ineq: &Ineq) -> bool {
        self.position(ineq).is_some()
    }

    fn position(&self, ineq: &Ineq) -> Option<usize> {
        self.entries.iter().position(|e| e.ineq.same_as(ineq))
    }

    /// Cached left-hand sides for `ineq`.
    pub fn get(&self, ineq: &Ineq) -> Option<&[f64]> {
        self.position(ineq).map(|i| self.entries[i].lhs.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &CachedIneq> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compute left-hand sides for rows beyond each accumulator's length.
    ///
    /// `blocks` name the columns of row-aligned coordinate arrays (typically
    /// the discipline's inputs and outputs); all blocks must have equal rows.
    pub fn extend(&mut self, blocks: &[NamedColumns<'_>]) -> Result<()> {
        let rows = blocks.first().map(|(_, a)| a.nrows()).unwrap_or(0);
        ensure!(
            blocks.iter().all(|(_, a)| a.nrows() == rows),
            "coordinate blocks have mismatched row counts"
        );
        for entry in &mut self.entries {
            ensure!(
                entry.lhs.len() <= rows,
                "cache for '{}' holds {} rows but only {} points exist",
                entry.ineq,
                entry.lhs.len(),
                rows
            );
            for r in entry.lhs.len()..rows {
                let lookup = |name: &str| {
                    blocks.iter().find_map(|(vars, arr)| {
                        vars.iter().position(|v| v == name).map(|c| arr[[r, c]])
                    })
                };
                entry.lhs.push(entry.ineq.lhs(&lookup)?);
            }
        }
        Ok(())
    }

    /// Register every key of `other` that is missing here.
    pub fn adopt_keys(&mut self, other: &IneqCache) {
        for e in &other.entries {
            self.insert(&e.ineq);
        }
    }
}

impl RowStore for IneqCache {
    fn row_count(&self) -> usize {
        self.entries.iter().map(|e| e.lhs.len()).max().unwrap_or(0)
    }

    fn take_rows(&mut self, indices: &[usize]) -> Self {
        let entries = self
            .entries
            .iter_mut()
            .map(|e| CachedIneq {
                ineq: e.ineq.clone(),
                lhs: e.lhs.take_rows(indices),
            })
            .collect();
        Self { entries }
    }

    fn append_rows(&mut self, other: Self) {
        for e in other.entries {
            match self.position(&e.ineq) {
                Some(i) => self.entries[i].lhs.extend(e.lhs),
                None => self.entries.push(e),
            }
        }
    }
}
