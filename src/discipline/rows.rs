//! Row-wise storage shared by every parallel per-point field.
//!
//! Flag lists, scalar arrays, coordinate matrices and inequality caches all
//! move rows the same way, so the bookkeeper can treat them uniformly.

use ndarray::{concatenate, Array1, Array2, Axis};

/// A container whose rows can be moved out and appended elsewhere.
pub trait RowStore {
    /// Number of rows held.
    fn row_count(&self) -> usize;

    /// Remove the rows at `indices` and return them in ascending row order.
    /// Duplicate and out-of-range indices are ignored.
    fn take_rows(&mut self, indices: &[usize]) -> Self;

    /// Append `other`'s rows after the existing ones, preserving order.
    fn append_rows(&mut self, other: Self);
}

/// Ascending, de-duplicated, in-range copy of `indices`.
pub(crate) fn normalise_indices(indices: &[usize], len: usize) -> Vec<usize> {
    let mut idx: Vec<usize> = indices.iter().copied().filter(|&i| i < len).collect();
    idx.sort_unstable();
    idx.dedup();
    idx
}

fn keep_mask(selected: &[usize], len: usize) -> Vec<usize> {
    let mut flags = vec![true; len];
    for &i in selected {
        flags[i] = false;
    }
    (0..len).filter(|&i| flags[i]).collect()
}

impl<T> RowStore for Vec<T> {
    fn row_count(&self) -> usize {
        self.len()
    }

    fn take_rows(&mut self, indices: &[usize]) -> Self {
        let idx = normalise_indices(indices, self.len());
        // High indices first so that lower positions stay valid.
        let mut moved: Vec<T> = idx.iter().rev().map(|&i| self.remove(i)).collect();
        moved.reverse();
        moved
    }

    fn append_rows(&mut self, other: Self) {
        self.extend(other);
    }
}

impl RowStore for Array1<f64> {
    fn row_count(&self) -> usize {
        self.len()
    }

    fn take_rows(&mut self, indices: &[usize]) -> Self {
        let idx = normalise_indices(indices, self.len());
        let moved = self.select(Axis(0), &idx);
        *self = self.select(Axis(0), &keep_mask(&idx, self.len()));
        moved
    }

    fn append_rows(&mut self, other: Self) {
        if other.is_empty() {
            return;
        }
        *self = concatenate![Axis(0), self.view(), other.view()];
    }
}

impl RowStore for Array2<f64> {
    fn row_count(&self) -> usize {
        self.nrows()
    }

    fn take_rows(&mut self, indices: &[usize]) -> Self {
        let idx = normalise_indices(indices, self.nrows());
        let moved = self.select(Axis(0), &idx);
        *self = self.select(Axis(0), &keep_mask(&idx, self.nrows()));
        moved
    }

    fn append_rows(&mut self, other: Self) {
        if other.nrows() == 0 {
            return;
        }
        if self.nrows() == 0 {
            *self = other;
            return;
        }
        *self = concatenate![Axis(0), self.view(), other.view()];
    }
}
