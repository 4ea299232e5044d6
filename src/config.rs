//! Runtime settings read from `ATTACK_ODDS_*` environment variables.

use std::env;

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
pub const DEFAULT_ITERATIONS: u64 = 10_000;
pub const DEFAULT_MAX_ITERATIONS: u64 = 1_000_000;
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    /// Trials run when a request does not say.
    pub default_iterations: u64,
    /// Upper bound on trials per request.
    pub max_iterations: u64,
    /// Shard threads for CLI runs; 0 means all cores.
    pub workers: usize,
    pub queue_capacity: usize,
    /// Fixed engine seed, mainly for reproducible tests.
    pub seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            default_iterations: DEFAULT_ITERATIONS,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            workers: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            seed: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup. Unparseable values fall back to the default
    /// with a warning.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            bind_addr: lookup("ATTACK_ODDS_BIND")
                .filter(|value| !value.trim().is_empty())
                .unwrap_or(defaults.bind_addr),
            default_iterations: parsed(&lookup, "ATTACK_ODDS_DEFAULT_ITERS", defaults.default_iterations),
            max_iterations: parsed(&lookup, "ATTACK_ODDS_MAX_ITERS", defaults.max_iterations),
            workers: parsed(&lookup, "ATTACK_ODDS_WORKERS", defaults.workers),
            queue_capacity: parsed(&lookup, "ATTACK_ODDS_QUEUE", defaults.queue_capacity).max(1),
            seed: lookup("ATTACK_ODDS_SEED").and_then(|value| value.trim().parse().ok()),
        };
        config.normalized()
    }

    fn normalized(mut self) -> Self {
        self.max_iterations = self.max_iterations.max(1);
        if self.default_iterations > self.max_iterations {
            tracing::warn!(
                default = self.default_iterations,
                max = self.max_iterations,
                "default iterations exceed the maximum, clamping"
            );
            self.default_iterations = self.max_iterations;
        }
        self
    }
}

fn parsed<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + std::fmt::Display + Copy,
{
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!(key, value = %raw, %default, "invalid setting, using default");
            default
        }),
    }
}
