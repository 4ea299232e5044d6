use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sparse probability mass over integer outcomes, iterated in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution {
    mass: BTreeMap<i64, f64>,
}

impl Distribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// All mass on a single outcome.
    pub fn point(outcome: i64) -> Self {
        let mut mass = BTreeMap::new();
        mass.insert(outcome, 1.0);
        Self { mass }
    }

    /// Add `p` to `outcome`. Non-positive masses are ignored.
    pub fn add(&mut self, outcome: i64, p: f64) {
        if p > 0.0 {
            *self.mass.entry(outcome).or_insert(0.0) += p;
        }
    }

    pub fn get(&self, outcome: i64) -> f64 {
        self.mass.get(&outcome).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, f64)> + '_ {
        self.mass.iter().map(|(outcome, p)| (*outcome, *p))
    }

    pub fn len(&self) -> usize {
        self.mass.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mass.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.mass.values().sum()
    }

    pub fn mean(&self) -> f64 {
        self.iter().map(|(outcome, p)| outcome as f64 * p).sum()
    }

    pub fn min(&self) -> Option<i64> {
        self.mass.keys().next().copied()
    }

    pub fn max(&self) -> Option<i64> {
        self.mass.keys().next_back().copied()
    }

    /// Distribution of the sum of independent draws from `self` and `other`.
    pub fn convolve(&self, other: &Distribution) -> Distribution {
        let mut out = Distribution::new();
        for (a, pa) in self.iter() {
            for (b, pb) in other.iter() {
                out.add(a + b, pa * pb);
            }
        }
        out
    }

    /// The same masses moved by `offset`. Callers keep every moved outcome
    /// within `i64`.
    pub(crate) fn shifted(&self, offset: i64) -> Distribution {
        if offset == 0 {
            return self.clone();
        }
        Self {
            mass: self.mass.iter().map(|(outcome, p)| (outcome + offset, *p)).collect(),
        }
    }

    /// Scale every mass by `factor` and add into `self`.
    pub fn accumulate_scaled(&mut self, other: &Distribution, factor: f64) {
        for (outcome, p) in other.iter() {
            self.add(outcome, p * factor);
        }
    }

    /// `(outcome, p)` pairs, ascending.
    pub fn to_pairs(&self) -> Vec<(i64, f64)> {
        self.iter().collect()
    }
}

impl FromIterator<(i64, f64)> for Distribution {
    fn from_iter<T: IntoIterator<Item = (i64, f64)>>(iter: T) -> Self {
        let mut out = Distribution::new();
        for (outcome, p) in iter {
            out.add(outcome, p);
        }
        out
    }
}
