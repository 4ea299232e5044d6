//! Messages exchanged with a computation worker. Every response echoes the
//! nonce of the request that produced it.

use serde::{Deserialize, Serialize};

use crate::combat::{AdvantageMode, AttackSetup, CritRules};
use crate::exact::{DiceModel, Distribution, HitChance};
use crate::simulator::{Bucket, Histogram};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    pub nonce: u64,
    pub iters_requested: u64,
    pub setup: AttackSetup,
    /// Fixed seed for a reproducible run; the worker's own stream otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    pub nonce: u64,
    pub num_trials: u64,
    pub num_hit: u64,
    pub num_attacks: u64,
    /// `[damage, bucket]` pairs in ascending damage order.
    pub buckets: Vec<(u64, Bucket)>,
}

impl SimulationResponse {
    pub fn from_histogram(nonce: u64, histogram: &Histogram) -> Self {
        Self {
            nonce,
            num_trials: histogram.num_trials(),
            num_hit: histogram.num_hit(),
            num_attacks: histogram.num_attacks(),
            buckets: histogram.sorted_buckets(),
        }
    }
}

/// Derive the hit chance from a `1d20 + bonus` attack instead of giving `pHit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRequest {
    pub bonus: i64,
    pub armor_class: i64,
    #[serde(default)]
    pub advantage: AdvantageMode,
    #[serde(default)]
    pub crits: CritRules,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactRequest {
    pub nonce: u64,
    pub dice: DiceModel,
    #[serde(default = "one_attack")]
    pub num_attacks: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p_hit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check: Option<CheckRequest>,
}

fn one_attack() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExactResponse {
    pub nonce: u64,
    pub p_hit: f64,
    pub mean: f64,
    /// `[damage, probability]` pairs in ascending damage order.
    pub probabilities: Vec<(i64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hit_chance: Option<HitChance>,
}

impl ExactResponse {
    pub fn from_distribution(
        nonce: u64,
        p_hit: f64,
        distribution: &Distribution,
        hit_chance: Option<HitChance>,
    ) -> Self {
        Self {
            nonce,
            p_hit,
            mean: distribution.mean(),
            probabilities: distribution.to_pairs(),
            hit_chance,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Request {
    Simulate(SimulationRequest),
    Exact(ExactRequest),
}

impl Request {
    pub fn nonce(&self) -> u64 {
        match self {
            Request::Simulate(request) => request.nonce,
            Request::Exact(request) => request.nonce,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    Simulation(SimulationResponse),
    Exact(ExactResponse),
    /// The request failed as a whole; no partial result is reported.
    Failed { nonce: u64, error: String },
}

impl Response {
    pub fn nonce(&self) -> u64 {
        match self {
            Response::Simulation(response) => response.nonce,
            Response::Exact(response) => response.nonce,
            Response::Failed { nonce, .. } => *nonce,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Response::Failed { .. })
    }
}
