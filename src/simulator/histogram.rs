//! Damage histogram accumulated over Monte Carlo trials.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::combat::TrialResult;

/// Aggregates for every trial that ended on one total-damage value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    #[serde(rename = "damageObservations")]
    pub count: u64,
    #[serde(rename = "costTotal")]
    pub cost_total: f64,
    #[serde(rename = "atks")]
    pub attack_count_total: u64,
}

impl Bucket {
    fn absorb(&mut self, other: &Bucket) {
        self.count += other.count;
        self.cost_total += other.cost_total;
        self.attack_count_total += other.attack_count_total;
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Histogram {
    buckets: HashMap<u64, Bucket>,
    num_trials: u64,
    num_hit: u64,
    num_attacks: u64,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trial: &TrialResult) {
        let bucket = self.buckets.entry(trial.total_damage).or_default();
        bucket.count += 1;
        bucket.cost_total += trial.total_cost;
        bucket.attack_count_total += trial.attacks_resolved;
        self.num_trials += 1;
        self.num_hit += trial.hits;
        self.num_attacks += trial.attacks_resolved;
    }

    /// Fold another histogram (e.g. a parallel shard) into this one.
    pub fn merge(&mut self, other: &Histogram) {
        for (damage, bucket) in &other.buckets {
            self.buckets.entry(*damage).or_default().absorb(bucket);
        }
        self.num_trials += other.num_trials;
        self.num_hit += other.num_hit;
        self.num_attacks += other.num_attacks;
    }

    pub fn bucket(&self, damage: u64) -> Option<&Bucket> {
        self.buckets.get(&damage)
    }

    /// Buckets in ascending damage order.
    pub fn sorted_buckets(&self) -> Vec<(u64, Bucket)> {
        let mut buckets: Vec<(u64, Bucket)> =
            self.buckets.iter().map(|(damage, bucket)| (*damage, *bucket)).collect();
        buckets.sort_unstable_by_key(|(damage, _)| *damage);
        buckets
    }

    pub fn num_trials(&self) -> u64 {
        self.num_trials
    }

    pub fn num_hit(&self) -> u64 {
        self.num_hit
    }

    pub fn num_attacks(&self) -> u64 {
        self.num_attacks
    }

    pub fn mean_damage(&self) -> f64 {
        if self.num_trials == 0 {
            return 0.0;
        }
        let total: f64 = self
            .buckets
            .iter()
            .map(|(damage, bucket)| *damage as f64 * bucket.count as f64)
            .sum();
        total / self.num_trials as f64
    }

    pub fn hit_rate(&self) -> f64 {
        if self.num_attacks == 0 {
            0.0
        } else {
            self.num_hit as f64 / self.num_attacks as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(total_damage: u64, attacks_resolved: u64, hits: u64, total_cost: f64) -> TrialResult {
        TrialResult {
            total_damage,
            attacks_resolved,
            hits,
            total_cost,
        }
    }

    #[test]
    fn records_into_damage_buckets() {
        let mut histogram = Histogram::new();
        histogram.record(&trial(7, 2, 1, 1.5));
        histogram.record(&trial(7, 3, 2, 0.5));
        histogram.record(&trial(0, 1, 0, 0.0));

        assert_eq!(histogram.num_trials(), 3);
        assert_eq!(histogram.num_hit(), 3);
        assert_eq!(histogram.num_attacks(), 6);
        assert_eq!(
            histogram.bucket(7),
            Some(&Bucket {
                count: 2,
                cost_total: 2.0,
                attack_count_total: 5,
            })
        );
        let keys: Vec<u64> = histogram.sorted_buckets().iter().map(|(d, _)| *d).collect();
        assert_eq!(keys, vec![0, 7]);
    }

    #[test]
    fn merge_matches_sequential_recording() {
        let trials = [trial(3, 1, 1, 0.0), trial(5, 2, 2, 1.0), trial(3, 1, 1, 2.0)];
        let mut whole = Histogram::new();
        trials.iter().for_each(|t| whole.record(t));

        let mut left = Histogram::new();
        let mut right = Histogram::new();
        left.record(&trials[0]);
        right.record(&trials[1]);
        right.record(&trials[2]);
        left.merge(&right);

        assert_eq!(left, whole);
        assert!((left.mean_damage() - 11.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn bucket_serializes_with_wire_names() {
        let json = serde_json::to_value(Bucket {
            count: 4,
            cost_total: 1.5,
            attack_count_total: 8,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({"damageObservations": 4, "costTotal": 1.5, "atks": 8})
        );
    }

    #[test]
    fn empty_histogram_has_zero_mean() {
        let histogram = Histogram::new();
        assert_eq!(histogram.mean_damage(), 0.0);
        assert_eq!(histogram.hit_rate(), 0.0);
        assert!(histogram.sorted_buckets().is_empty());
    }
}
