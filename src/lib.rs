//! Damage distributions for tabletop attack sequences, computed exactly for
//! flat dice sums and by Monte Carlo simulation for everything else.

pub mod cli;
pub mod combat;
pub mod config;
pub mod dice;
pub mod exact;
pub mod parallel;
pub mod server;
pub mod simulator;
pub mod worker;
