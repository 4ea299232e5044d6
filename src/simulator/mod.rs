pub mod histogram;
pub mod monte_carlo;

pub use histogram::{Bucket, Histogram};
pub use monte_carlo::{run_trials, SimulationError, Simulator};
