//! Dice notation: parsing, evaluation and a per-engine compile cache.
//!
//! Supports `XdY` terms with keep-highest/lowest and critical compare points,
//! integer arithmetic, parenthesised groups and named variable references:
//! `1d20+5`, `2d6kh1`, `(1d8+X)*2`, `1d20cs>=19`, `d%`.

pub mod compiler;
pub mod eval;
pub mod parser;

use thiserror::Error;

pub use compiler::{CompiledExpression, ExpressionCompiler};
pub use eval::{evaluate, evaluate_total, CriticalClass, DieFace, Environment, Roll, RollNode};
pub use parser::{parse, BinaryOp, CompareOp, ComparePoint, CriticalRange, DiceTerm, Expr, Keep};

/// Largest number of dice a single term may roll.
pub const MAX_DICE_PER_TERM: u32 = 10_000;

/// Error type for dice parsing and rolling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceError {
    #[error("empty dice expression")]
    Empty,
    #[error("unexpected '{found}' at offset {offset} in '{expression}'")]
    UnexpectedChar {
        found: char,
        offset: usize,
        expression: String,
    },
    #[error("unexpected end of '{0}'")]
    UnexpectedEnd(String),
    #[error("number out of range at offset {offset} in '{expression}'")]
    NumberOutOfRange { offset: usize, expression: String },
    #[error("dice count must be between 1 and {max} (in '{expression}')", max = MAX_DICE_PER_TERM)]
    InvalidDiceCount { expression: String },
    #[error("a die needs at least one side (in '{0}')")]
    ZeroSides(String),
    #[error("cannot keep {keep} dice when only rolling {count} (in '{expression}')")]
    InvalidKeepCount {
        keep: u32,
        count: u32,
        expression: String,
    },
    #[error("unbound variable '{0}'")]
    UnboundVariable(String),
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow")]
    Overflow,
}
