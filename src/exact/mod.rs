//! Exact probability engine for flat-modifier dice sums and hit sequences.

pub mod binomial;
pub mod check;
pub mod dice_sum;
pub mod distribution;
pub mod sequence;

use thiserror::Error;

pub use binomial::BinomialTable;
pub use check::{hit_probability, HitChance};
pub use dice_sum::{
    DiceModel, ExactEngine, DEFAULT_CACHED_OUTCOMES, MAX_EXACT_DICE, MAX_EXACT_SIDES, MAX_EXACT_SPAN,
};
pub use distribution::Distribution;
pub use sequence::{MAX_EXACT_ATTACKS, MAX_EXACT_TOTAL_SPAN};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExactError {
    #[error("dice need at least one side")]
    ZeroSides,
    #[error("dice count {0} must be between 1 and {max}", max = MAX_EXACT_DICE)]
    InvalidDiceCount(i64),
    #[error("{n}d{s} exceeds the exact engine's limits")]
    TooLarge { n: i64, s: i64 },
    #[error("modifier {0} is out of range")]
    ModifierOutOfRange(i64),
    #[error("hit probability {0} must be within [0, 1]")]
    InvalidProbability(f64),
    #[error("number of attacks {0} must be between 0 and {max}", max = MAX_EXACT_ATTACKS)]
    InvalidAttackCount(i64),
    #[error("{num_attacks} attacks of {model} exceed the exact engine's limits")]
    SequenceTooLarge { num_attacks: i64, model: String },
    #[error("totals of {num_attacks} attacks of {model} overflow")]
    TotalOutOfRange { num_attacks: i64, model: String },
}
