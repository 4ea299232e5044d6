//! Evaluates an [Expr] against a variable environment and an RNG.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::parser::{BinaryOp, DiceTerm, Expr, Keep};
use super::DiceError;
use crate::combat::rng::Rng;

/// Resolved variable bindings visible to an evaluation.
pub type Environment = HashMap<String, i64>;

/// Critical classification of an evaluated roll.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriticalClass {
    Success,
    Failure,
    #[default]
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DieFace {
    pub value: u32,
    pub kept: bool,
    pub critical: CriticalClass,
}

/// Shape of an evaluated roll. Arithmetic and parentheses become `Group`
/// nodes, literals and variable lookups become `Base`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RollNode {
    Dice {
        sides: u32,
        faces: Vec<DieFace>,
        value: i64,
    },
    Group {
        children: Vec<RollNode>,
        value: i64,
    },
    Base {
        value: i64,
    },
}

impl RollNode {
    pub fn value(&self) -> i64 {
        match self {
            RollNode::Dice { value, .. }
            | RollNode::Group { value, .. }
            | RollNode::Base { value } => *value,
        }
    }

    /// First flagged kept die, left to right, decides the class.
    pub fn critical(&self) -> CriticalClass {
        match self {
            RollNode::Dice { faces, .. } => faces
                .iter()
                .filter(|face| face.kept)
                .map(|face| face.critical)
                .find(|class| *class != CriticalClass::None)
                .unwrap_or_default(),
            RollNode::Group { children, .. } => children
                .iter()
                .map(RollNode::critical)
                .find(|class| *class != CriticalClass::None)
                .unwrap_or_default(),
            RollNode::Base { .. } => CriticalClass::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roll {
    pub value: i64,
    pub tree: RollNode,
}

impl Roll {
    pub fn critical(&self) -> CriticalClass {
        self.tree.critical()
    }
}

/// Evaluate and keep the full roll tree, for callers that need the critical class.
pub fn evaluate(expr: &Expr, env: &Environment, rng: &mut Rng) -> Result<Roll, DiceError> {
    let tree = roll_node(expr, env, rng)?;
    Ok(Roll {
        value: tree.value(),
        tree,
    })
}

/// Evaluate to a number without building a roll tree.
pub fn evaluate_total(expr: &Expr, env: &Environment, rng: &mut Rng) -> Result<i64, DiceError> {
    match expr {
        Expr::Number(value) => Ok(*value),
        Expr::Var(name) => lookup(env, name),
        Expr::Dice(term) => roll_total(term, rng),
        Expr::Group(inner) => evaluate_total(inner, env, rng),
        Expr::Neg(inner) => evaluate_total(inner, env, rng)?
            .checked_neg()
            .ok_or(DiceError::Overflow),
        Expr::Binary { op, lhs, rhs } => {
            let lhs = evaluate_total(lhs, env, rng)?;
            let rhs = evaluate_total(rhs, env, rng)?;
            apply(*op, lhs, rhs)
        }
    }
}

fn roll_node(expr: &Expr, env: &Environment, rng: &mut Rng) -> Result<RollNode, DiceError> {
    match expr {
        Expr::Number(value) => Ok(RollNode::Base { value: *value }),
        Expr::Var(name) => Ok(RollNode::Base {
            value: lookup(env, name)?,
        }),
        Expr::Dice(term) => roll_faces(term, rng),
        Expr::Group(inner) => {
            let child = roll_node(inner, env, rng)?;
            Ok(RollNode::Group {
                value: child.value(),
                children: vec![child],
            })
        }
        Expr::Neg(inner) => {
            let child = roll_node(inner, env, rng)?;
            let value = child.value().checked_neg().ok_or(DiceError::Overflow)?;
            Ok(RollNode::Group {
                children: vec![child],
                value,
            })
        }
        Expr::Binary { op, lhs, rhs } => {
            let lhs = roll_node(lhs, env, rng)?;
            let rhs = roll_node(rhs, env, rng)?;
            let value = apply(*op, lhs.value(), rhs.value())?;
            Ok(RollNode::Group {
                children: vec![lhs, rhs],
                value,
            })
        }
    }
}

fn lookup(env: &Environment, name: &str) -> Result<i64, DiceError> {
    env.get(name)
        .copied()
        .ok_or_else(|| DiceError::UnboundVariable(name.to_string()))
}

fn apply(op: BinaryOp, lhs: i64, rhs: i64) -> Result<i64, DiceError> {
    match op {
        BinaryOp::Add => lhs.checked_add(rhs).ok_or(DiceError::Overflow),
        BinaryOp::Sub => lhs.checked_sub(rhs).ok_or(DiceError::Overflow),
        BinaryOp::Mul => lhs.checked_mul(rhs).ok_or(DiceError::Overflow),
        BinaryOp::Div if rhs == 0 => Err(DiceError::DivisionByZero),
        BinaryOp::Div => lhs.checked_div(rhs).ok_or(DiceError::Overflow),
    }
}

fn roll_total(term: &DiceTerm, rng: &mut Rng) -> Result<i64, DiceError> {
    if term.keep.is_none() {
        let mut sum = 0_i64;
        for _ in 0..term.count {
            sum += i64::from(rng.roll_die(term.sides));
        }
        return Ok(sum);
    }
    roll_faces(term, rng).map(|node| node.value())
}

fn roll_faces(term: &DiceTerm, rng: &mut Rng) -> Result<RollNode, DiceError> {
    let mut faces: Vec<DieFace> = (0..term.count)
        .map(|_| DieFace {
            value: rng.roll_die(term.sides),
            kept: true,
            critical: CriticalClass::None,
        })
        .collect();

    if let Some(keep) = term.keep {
        let mut order: Vec<usize> = (0..faces.len()).collect();
        let kept = match keep {
            Keep::Highest(kept) => {
                order.sort_by(|a, b| faces[*b].value.cmp(&faces[*a].value));
                kept
            }
            Keep::Lowest(kept) => {
                order.sort_by(|a, b| faces[*a].value.cmp(&faces[*b].value));
                kept
            }
        };
        for index in order.into_iter().skip(kept as usize) {
            faces[index].kept = false;
        }
    }

    let mut value = 0_i64;
    for face in &mut faces {
        let raw = i64::from(face.value);
        face.critical = if term.critical.success.is_some_and(|point| point.matches(raw)) {
            CriticalClass::Success
        } else if term.critical.failure.is_some_and(|point| point.matches(raw)) {
            CriticalClass::Failure
        } else {
            CriticalClass::None
        };
        if face.kept {
            value += raw;
        }
    }

    Ok(RollNode::Dice {
        sides: term.sides,
        faces,
        value,
    })
}
