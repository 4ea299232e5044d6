//! Per-thread engine state: one simulator and one exact engine, never shared.

use std::time::Instant;

use crate::exact::{hit_probability, ExactEngine};
use crate::simulator::Simulator;
use crate::worker::protocol::{
    ExactRequest, ExactResponse, Request, Response, SimulationRequest, SimulationResponse,
};

#[derive(Debug)]
pub struct Engine {
    simulator: Simulator,
    exact: ExactEngine,
}

impl Engine {
    pub fn new(seed: u64) -> Self {
        Self {
            simulator: Simulator::new(seed),
            exact: ExactEngine::new(),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            simulator: Simulator::from_entropy(),
            exact: ExactEngine::new(),
        }
    }

    /// Run one request to completion.
    pub fn handle(&mut self, request: Request) -> Response {
        match request {
            Request::Simulate(request) => self.simulate(request),
            Request::Exact(request) => self.exact(request),
        }
    }

    pub fn simulate(&mut self, request: SimulationRequest) -> Response {
        let started = Instant::now();
        if let Some(seed) = request.seed {
            self.simulator.reseed(seed);
        }
        match self.simulator.run(&request.setup, request.iters_requested) {
            Ok(histogram) => {
                let (cache_hits, cache_misses) = self.simulator.compiler().stats();
                tracing::info!(
                    nonce = request.nonce,
                    trials = histogram.num_trials(),
                    buckets = histogram.sorted_buckets().len(),
                    cache_hits,
                    cache_misses,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "simulation complete"
                );
                Response::Simulation(SimulationResponse::from_histogram(request.nonce, &histogram))
            }
            Err(err) => {
                tracing::warn!(nonce = request.nonce, error = %err, "simulation failed");
                Response::Failed {
                    nonce: request.nonce,
                    error: err.to_string(),
                }
            }
        }
    }

    pub fn exact(&mut self, request: ExactRequest) -> Response {
        let hit_chance = request.check.map(|check| {
            hit_probability(check.bonus, check.armor_class, check.advantage, check.crits)
        });
        let Some(p_hit) = request.p_hit.or(hit_chance.map(|chance| chance.hit)) else {
            return Response::Failed {
                nonce: request.nonce,
                error: "exact request needs either pHit or check".to_string(),
            };
        };
        match self.exact.total_damage(&request.dice, request.num_attacks, p_hit) {
            Ok(distribution) => {
                tracing::info!(
                    nonce = request.nonce,
                    dice = %request.dice,
                    num_attacks = request.num_attacks,
                    p_hit,
                    outcomes = distribution.len(),
                    "exact distribution complete"
                );
                Response::Exact(ExactResponse::from_distribution(
                    request.nonce,
                    p_hit,
                    &distribution,
                    hit_chance,
                ))
            }
            Err(err) => {
                tracing::warn!(nonce = request.nonce, error = %err, "exact request failed");
                Response::Failed {
                    nonce: request.nonce,
                    error: err.to_string(),
                }
            }
        }
    }
}
