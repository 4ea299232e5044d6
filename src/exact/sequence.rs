//! Total damage over a sequence of attacks, each hitting independently.

use num_traits::ToPrimitive;

use super::dice_sum::{DiceModel, ExactEngine};
use super::distribution::Distribution;
use super::ExactError;

pub const MAX_EXACT_ATTACKS: i64 = 100;
/// Largest `numAttacks * n * s` accepted, bounding the convolution work.
pub const MAX_EXACT_TOTAL_SPAN: u64 = 20_000;

impl ExactEngine {
    /// `C(N, m) p^m (1 - p)^(N - m)`: chance that exactly `hits` of
    /// `num_attacks` attacks land.
    pub fn hit_count_probability(&mut self, num_attacks: u32, hits: u32, p_hit: f64) -> f64 {
        if hits > num_attacks {
            return 0.0;
        }
        let ways = self
            .binomials
            .get(i64::from(num_attacks), i64::from(hits))
            .to_f64()
            .unwrap_or(f64::INFINITY);
        ways * p_hit.powi(hits as i32) * (1.0 - p_hit).powi((num_attacks - hits) as i32)
    }

    /// Distribution of the sum of `hits` independent rolls of `model`.
    pub fn sum_of_rolls(&mut self, model: &DiceModel, hits: u32) -> Result<Distribution, ExactError> {
        check_totals(model, i64::from(hits))?;
        let offset = i64::from(hits) * model.modifier();
        Ok(self.unmodified_sum(model, hits).shifted(offset))
    }

    /// Sum of `hits` unmodified rolls, built bottom-up from the point mass
    /// at 0 and memoized per shape.
    fn unmodified_sum(&mut self, model: &DiceModel, hits: u32) -> Distribution {
        let single = self.unmodified_distribution(model);
        let shape = model.shape();
        let mut sums = match self.multiples.remove(&shape) {
            Some(sums) => {
                self.release(outcomes(&sums));
                sums
            }
            None => vec![Distribution::point(0)],
        };
        while sums.len() <= hits as usize {
            let next = match sums.last() {
                Some(last) => last.convolve(&single),
                None => Distribution::point(0),
            };
            sums.push(next);
        }
        let result = sums[hits as usize].clone();
        self.admit(outcomes(&sums));
        self.multiples.insert(shape, sums);
        result
    }

    /// `P(total = X) = sum_m C(N,m) p^m (1-p)^(N-m) P_m(X)` over `m = 0..=N`.
    pub fn total_damage(
        &mut self,
        model: &DiceModel,
        num_attacks: i64,
        p_hit: f64,
    ) -> Result<Distribution, ExactError> {
        if !(0.0..=1.0).contains(&p_hit) {
            return Err(ExactError::InvalidProbability(p_hit));
        }
        if !(0..=MAX_EXACT_ATTACKS).contains(&num_attacks) {
            return Err(ExactError::InvalidAttackCount(num_attacks));
        }
        let span = u64::from(model.n()) * u64::from(model.s());
        if num_attacks as u64 * span > MAX_EXACT_TOTAL_SPAN {
            return Err(ExactError::SequenceTooLarge {
                num_attacks,
                model: model.to_string(),
            });
        }
        check_totals(model, num_attacks)?;

        let num_attacks = num_attacks as u32;
        let mut total = Distribution::new();
        for hits in 0..=num_attacks {
            let weight = self.hit_count_probability(num_attacks, hits, p_hit);
            if weight == 0.0 {
                continue;
            }
            let sum = self.sum_of_rolls(model, hits)?;
            total.accumulate_scaled(&sum, weight);
        }
        tracing::debug!(
            %model,
            num_attacks,
            cached_outcomes = self.cached_outcomes(),
            "exact sequence computed"
        );
        Ok(total)
    }
}

/// Every total of up to `count` rolls, and the modifier offset itself, must
/// fit in `i64`.
fn check_totals(model: &DiceModel, count: i64) -> Result<(), ExactError> {
    let (lo, hi) = model.support();
    let fits = count.checked_mul(lo).is_some()
        && count.checked_mul(hi).is_some()
        && count.checked_mul(model.modifier()).is_some();
    if fits {
        Ok(())
    } else {
        Err(ExactError::TotalOutOfRange {
            num_attacks: count,
            model: model.to_string(),
        })
    }
}

fn outcomes(sums: &[Distribution]) -> usize {
    sums.iter().map(Distribution::len).sum()
}
