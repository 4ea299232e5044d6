//! Closed-form distribution of `n` dice with `s` sides plus a flat modifier.

use std::collections::HashMap;

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};
use serde::{Deserialize, Serialize};

use super::binomial::BinomialTable;
use super::distribution::Distribution;
use super::ExactError;

pub const MAX_EXACT_DICE: u32 = 100;
pub const MAX_EXACT_SIDES: u32 = 1_000;
/// Largest `n * s` accepted, bounding both the support and the binomial rows.
pub const MAX_EXACT_SPAN: u64 = 10_000;

/// A validated `NdS + modifier` roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDice")]
pub struct DiceModel {
    n: u32,
    s: u32,
    modifier: i64,
}

#[derive(Deserialize)]
struct RawDice {
    n: i64,
    s: i64,
    #[serde(default)]
    modifier: i64,
}

impl TryFrom<RawDice> for DiceModel {
    type Error = ExactError;

    fn try_from(raw: RawDice) -> Result<Self, Self::Error> {
        DiceModel::new(raw.n, raw.s, raw.modifier)
    }
}

impl DiceModel {
    pub fn new(n: i64, s: i64, modifier: i64) -> Result<Self, ExactError> {
        if s < 1 {
            return Err(ExactError::ZeroSides);
        }
        if n < 1 || n > i64::from(MAX_EXACT_DICE) {
            return Err(ExactError::InvalidDiceCount(n));
        }
        if s > i64::from(MAX_EXACT_SIDES) || (n * s) as u64 > MAX_EXACT_SPAN {
            return Err(ExactError::TooLarge { n, s });
        }
        if modifier.checked_add(n * s).is_none() || modifier.checked_add(n).is_none() {
            return Err(ExactError::ModifierOutOfRange(modifier));
        }
        Ok(Self {
            n: n as u32,
            s: s as u32,
            modifier,
        })
    }

    pub fn n(&self) -> u32 {
        self.n
    }

    pub fn s(&self) -> u32 {
        self.s
    }

    pub fn modifier(&self) -> i64 {
        self.modifier
    }

    /// Lowest and highest attainable totals.
    pub fn support(&self) -> (i64, i64) {
        let n = i64::from(self.n);
        let s = i64::from(self.s);
        (self.modifier + n, self.modifier + n * s)
    }

    pub fn mean(&self) -> f64 {
        self.modifier as f64 + f64::from(self.n) * (f64::from(self.s) + 1.0) / 2.0
    }

    /// `(n, s)`: models that differ only in their modifier share a shape.
    pub fn shape(&self) -> (u32, u32) {
        (self.n, self.s)
    }

    fn unmodified(&self) -> Self {
        Self {
            modifier: 0,
            ..*self
        }
    }
}

impl std::fmt::Display for DiceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.modifier {
            0 => write!(f, "{}d{}", self.n, self.s),
            m if m > 0 => write!(f, "{}d{}+{}", self.n, self.s, m),
            m => write!(f, "{}d{}{}", self.n, self.s, m),
        }
    }
}

/// Outcomes kept across cached distributions before the caches are flushed.
pub const DEFAULT_CACHED_OUTCOMES: usize = 1_000_000;

/// Exact probability engine. Owns its binomial table and distribution caches;
/// one instance per computation thread.
#[derive(Debug)]
pub struct ExactEngine {
    pub(super) binomials: BinomialTable,
    /// Unmodified single-roll distributions by shape.
    singles: HashMap<(u32, u32), Distribution>,
    /// `multiples[shape][m]` is the unmodified sum of `m` rolls.
    pub(super) multiples: HashMap<(u32, u32), Vec<Distribution>>,
    cached_outcomes: usize,
    capacity: usize,
}

impl Default for ExactEngine {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHED_OUTCOMES)
    }
}

impl ExactEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(outcomes: usize) -> Self {
        Self {
            binomials: BinomialTable::default(),
            singles: HashMap::new(),
            multiples: HashMap::new(),
            cached_outcomes: 0,
            capacity: outcomes.max(1),
        }
    }

    /// Outcomes currently held by the distribution caches.
    pub fn cached_outcomes(&self) -> usize {
        self.cached_outcomes
    }

    /// Account for `outcomes` about to be cached, flushing everything first
    /// when they would not fit.
    pub(super) fn admit(&mut self, outcomes: usize) {
        if self.cached_outcomes > 0 && self.cached_outcomes + outcomes > self.capacity {
            tracing::debug!(outcomes = self.cached_outcomes, "exact cache full, flushing");
            self.singles.clear();
            self.multiples.clear();
            self.cached_outcomes = 0;
        }
        self.cached_outcomes += outcomes;
    }

    /// Stop counting `outcomes` taken out of the caches.
    pub(super) fn release(&mut self, outcomes: usize) {
        self.cached_outcomes = self.cached_outcomes.saturating_sub(outcomes);
    }

    /// `C(a, b)` from this engine's table.
    pub fn binomial(&mut self, a: i64, b: i64) -> BigUint {
        self.binomials.get(a, b)
    }

    /// `P(total = output)` for one roll of `model`.
    ///
    /// `s^-n * sum_{k=0}^{kmax} (-1)^k C(n,k) C(t - s*k - 1, t - s*k - n)` with
    /// `t = output - modifier` and `kmax = floor((t - n) / s)`. Totals below
    /// the support have `kmax < 0` and an empty sum.
    pub fn probability(&mut self, model: &DiceModel, output: i64) -> f64 {
        let (lo, hi) = model.support();
        if output < lo || output > hi {
            return 0.0;
        }
        let n = i64::from(model.n);
        let s = i64::from(model.s);
        let t = output - model.modifier;
        let kmax = (t - n) / s;

        let mut sum = BigInt::zero();
        for k in 0..=kmax.min(n) {
            let base = t - s * k;
            let term = BigInt::from(self.binomials.get(n, k))
                * BigInt::from(self.binomials.get(base - 1, base - n));
            if k % 2 == 0 {
                sum += term;
            } else {
                sum -= term;
            }
        }

        let outcomes = BigInt::from(BigUint::from(model.s).pow(model.n));
        BigRational::new(sum, outcomes).to_f64().unwrap_or(0.0)
    }

    /// Full distribution of one roll.
    pub fn distribution(&mut self, model: &DiceModel) -> Distribution {
        self.unmodified_distribution(model).shifted(model.modifier)
    }

    /// Distribution of `model` without its modifier, cached per shape.
    pub(super) fn unmodified_distribution(&mut self, model: &DiceModel) -> Distribution {
        let shape = model.shape();
        if let Some(cached) = self.singles.get(&shape) {
            return cached.clone();
        }
        let base = model.unmodified();
        let (lo, hi) = base.support();
        let distribution: Distribution =
            (lo..=hi).map(|output| (output, self.probability(&base, output))).collect();
        tracing::debug!(model = %base, outcomes = distribution.len(), "computed exact dice distribution");
        self.admit(distribution.len());
        self.singles.insert(shape, distribution.clone());
        distribution
    }
}
