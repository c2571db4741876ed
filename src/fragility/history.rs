//! Time history of feasibility perceptions, the input of the entropy model.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::merging::Perception;

/// One discipline's perception at one iteration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub iter: usize,
    pub ids: Vec<usize>,
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Snapshot {
    /// Row of grid point `id`, if it was still tracked. Ids are kept ascending.
    pub fn position(&self, id: usize) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }
}

/// Snapshots per discipline, oldest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PerceptionHistory {
    disciplines: BTreeMap<String, Vec<Snapshot>>,
}

impl PerceptionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one snapshot per perception at iteration `iter`.
    pub fn record(&mut self, iter: usize, perceptions: &[Perception]) {
        for p in perceptions {
            self.disciplines
                .entry(p.discipline.clone())
                .or_default()
                .push(Snapshot {
                    iter,
                    ids: p.ids.clone(),
                    mean: p.mean.clone(),
                    std: p.std.clone(),
                });
        }
    }

    pub fn snapshots(&self, discipline: &str) -> &[Snapshot] {
        self.disciplines.get(discipline).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of snapshots across disciplines.
    pub fn len(&self) -> usize {
        self.disciplines.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialise the history to bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        bincode::serialize(self).expect("PerceptionHistory serialisation should not fail")
    }

    /// Deserialise a history from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.to_bytes())
            .with_context(|| format!("writing perception history to {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading perception history from {}", path.display()))?;
        Self::from_bytes(&bytes).with_context(|| format!("decoding perception history {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn perception(name: &str, ids: Vec<usize>, mean: Array1<f64>) -> Perception {
        let std = Array1::from_elem(mean.len(), 0.1);
        Perception {
            discipline: name.into(),
            ids,
            mean,
            std,
        }
    }

    #[test]
    fn test_record_and_lookup() {
        let mut h = PerceptionHistory::new();
        h.record(0, &[perception("a", vec![0, 2, 5], array![0.1, -0.2, 0.3])]);
        h.record(4, &[perception("a", vec![2, 5], array![-0.3, 0.4])]);
        assert_eq!(h.len(), 2);
        let snaps = h.snapshots("a");
        assert_eq!(snaps[1].iter, 4);
        assert_eq!(snaps[1].position(5), Some(1));
        assert_eq!(snaps[1].position(0), None);
        assert!(h.snapshots("missing").is_empty());
    }

    #[test]
    fn test_file_roundtrip() {
        let mut h = PerceptionHistory::new();
        h.record(1, &[perception("a", vec![0, 1], array![0.5, -0.5])]);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.bin");
        h.save(&path).unwrap();
        assert_eq!(PerceptionHistory::load(&path).unwrap(), h);
    }

    #[test]
    fn test_load_garbage_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bin");
        std::fs::write(&path, [0xffu8; 3]).unwrap();
        assert!(PerceptionHistory::load(&path).is_err());
        assert!(PerceptionHistory::load(&dir.path().join("absent.bin")).is_err());
    }
}
