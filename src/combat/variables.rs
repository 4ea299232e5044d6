//! Named sub-expressions rolled once per trial.
//!
//! Definitions trail the attack field, separated by `%%`:
//! `1d20+PROF %% PROF=1d4+2 %% BONUS=PROF*2`. A definition may refer only to
//! definitions before it; every trial re-rolls them in declared order and the
//! other fields read the bindings from the same [Environment].

use std::sync::Arc;

use crate::combat::rng::Rng;
use crate::combat::setup::SetupError;
use crate::dice::parser::is_valid_identifier;
use crate::dice::{CompiledExpression, DiceError, Environment, ExpressionCompiler};

pub const VARIABLE_DELIMITER: &str = "%%";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub expression: String,
}

/// Split the attack field into the attack expression and its variable definitions.
pub fn split_variables(attack_field: &str) -> Result<(String, Vec<Variable>), SetupError> {
    let mut segments = attack_field.split(VARIABLE_DELIMITER);
    let attack = segments.next().unwrap_or_default().trim().to_string();

    let variables = segments
        .map(|segment| {
            let segment = segment.trim();
            let (name, expression) = segment
                .split_once('=')
                .ok_or_else(|| SetupError::MalformedVariable(segment.to_string()))?;
            let name = name.trim();
            if !is_valid_identifier(name) {
                return Err(SetupError::InvalidVariableName(name.to_string()));
            }
            Ok(Variable {
                name: name.to_string(),
                expression: expression.trim().to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((attack, variables))
}

#[derive(Debug, Clone)]
struct CompiledVariable {
    name: String,
    expression: Arc<CompiledExpression>,
}

/// Compiled variable definitions in declaration order.
#[derive(Debug, Clone, Default)]
pub struct VariableResolver {
    variables: Vec<CompiledVariable>,
}

impl VariableResolver {
    /// Compile definitions, rejecting duplicates and any reference that is not
    /// to an earlier definition.
    pub fn compile(
        variables: Vec<Variable>,
        compiler: &mut ExpressionCompiler,
    ) -> Result<Self, SetupError> {
        let mut compiled: Vec<CompiledVariable> = Vec::with_capacity(variables.len());
        for (index, variable) in variables.iter().enumerate() {
            if compiled.iter().any(|earlier| earlier.name == variable.name) {
                return Err(SetupError::DuplicateVariable(variable.name.clone()));
            }
            let expression =
                compiler
                    .compile(&variable.expression)
                    .map_err(|source| SetupError::Expression {
                        field: format!("variable {}", variable.name),
                        source,
                    })?;
            for reference in expression.variables() {
                if compiled.iter().any(|earlier| &earlier.name == reference) {
                    continue;
                }
                let declared_later = variables[index..].iter().any(|v| &v.name == reference);
                return Err(if declared_later {
                    SetupError::ForwardReference {
                        variable: variable.name.clone(),
                        reference: reference.clone(),
                    }
                } else {
                    SetupError::UnknownVariable {
                        field: format!("variable {}", variable.name),
                        name: reference.clone(),
                    }
                });
            }
            compiled.push(CompiledVariable {
                name: variable.name.clone(),
                expression,
            });
        }
        Ok(Self {
            variables: compiled,
        })
    }

    pub fn defines(&self, name: &str) -> bool {
        self.variables.iter().any(|variable| variable.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Roll every definition in order, rebinding `env` for a new trial.
    pub fn resolve(&self, env: &mut Environment, rng: &mut Rng) -> Result<(), DiceError> {
        env.clear();
        for variable in &self.variables {
            let value = variable.expression.total(env, rng)?;
            env.insert(variable.name.clone(), value);
        }
        Ok(())
    }
}
