pub mod attack;
pub mod rng;
pub mod setup;
pub mod trial;
pub mod variables;

pub use attack::{resolve_attack, roll_check, AttackOutcome, AttackState, CheckValue};
pub use rng::Rng;
pub use setup::{AdvantageMode, AttackSetup, CompiledSetup, CritRules, SetupError};
pub use trial::{run_trial, TrialResult};
pub use variables::{split_variables, Variable, VariableResolver, VARIABLE_DELIMITER};
