use thiserror::Error;

use crate::combat::{run_trial, AttackSetup, CompiledSetup, Rng, SetupError};
use crate::dice::{DiceError, Environment, ExpressionCompiler};
use crate::simulator::histogram::Histogram;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error("trial {trial} failed: {source}")]
    Trial {
        trial: u64,
        #[source]
        source: DiceError,
    },
}

/// Monte Carlo runner owning its RNG and compile cache.
#[derive(Debug)]
pub struct Simulator {
    rng: Rng,
    compiler: ExpressionCompiler,
}

impl Simulator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Rng::new(seed),
            compiler: ExpressionCompiler::new(),
        }
    }

    pub fn from_entropy() -> Self {
        Self {
            rng: Rng::from_entropy(),
            compiler: ExpressionCompiler::new(),
        }
    }

    pub fn reseed(&mut self, seed: u64) {
        self.rng = Rng::new(seed);
    }

    pub fn compile(&mut self, setup: &AttackSetup) -> Result<CompiledSetup, SetupError> {
        CompiledSetup::compile(setup, &mut self.compiler)
    }

    pub fn compiler(&self) -> &ExpressionCompiler {
        &self.compiler
    }

    /// Compile `setup` and run `iterations` trials. A failure anywhere fails
    /// the whole run; no partial histogram is returned.
    pub fn run(&mut self, setup: &AttackSetup, iterations: u64) -> Result<Histogram, SimulationError> {
        let compiled = self.compile(setup)?;
        tracing::debug!(
            iterations,
            variable_free = compiled.is_variable_free(),
            "setup compiled"
        );
        self.run_compiled(&compiled, iterations)
    }

    pub fn run_compiled(
        &mut self,
        setup: &CompiledSetup,
        iterations: u64,
    ) -> Result<Histogram, SimulationError> {
        run_trials(setup, iterations, &mut self.rng)
    }
}

/// Run `iterations` trials against a caller-owned RNG.
pub fn run_trials(
    setup: &CompiledSetup,
    iterations: u64,
    rng: &mut Rng,
) -> Result<Histogram, SimulationError> {
    let mut histogram = Histogram::new();
    let mut env = Environment::new();
    for trial in 0..iterations {
        let result =
            run_trial(setup, &mut env, rng).map_err(|source| SimulationError::Trial { trial, source })?;
        histogram.record(&result);
    }
    Ok(histogram)
}
