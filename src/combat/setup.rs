//! Attack sequence configuration and its compiled form.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::combat::variables::{split_variables, VariableResolver};
use crate::dice::{CompiledExpression, DiceError, ExpressionCompiler};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvantageMode {
    #[default]
    Normal,
    Advantage,
    Disadvantage,
}

/// Which critical outcomes of the attack roll override the numeric comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CritRules {
    /// A critical failure always misses.
    pub fails_miss: bool,
    /// A critical success always hits.
    pub successes_hit: bool,
    /// A critical success that hits doubles the damage.
    pub successes_crit: bool,
}

impl Default for CritRules {
    fn default() -> Self {
        Self {
            fails_miss: true,
            successes_hit: true,
            successes_crit: true,
        }
    }
}

impl CritRules {
    pub const fn none() -> Self {
        Self {
            fails_miss: false,
            successes_hit: false,
            successes_crit: false,
        }
    }
}

/// One attack sequence as entered by the caller. Expression fields accept
/// dice notation or plain numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackSetup {
    /// Attack roll, optionally followed by `%%name=expression` variable definitions.
    #[serde(deserialize_with = "expression_text")]
    pub attack: String,
    #[serde(deserialize_with = "expression_text")]
    pub damage: String,
    /// Value the attack roll must exceed.
    #[serde(deserialize_with = "expression_text")]
    pub versus: String,
    #[serde(default)]
    pub advantage: AdvantageMode,
    #[serde(default = "default_num_attacks", deserialize_with = "expression_text")]
    pub num_attacks: String,
    #[serde(default)]
    pub crits: CritRules,
    #[serde(
        default,
        deserialize_with = "optional_expression_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub cost: Option<String>,
    #[serde(
        default,
        deserialize_with = "optional_expression_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub reduction: Option<String>,
}

impl AttackSetup {
    pub fn new(attack: impl Into<String>, damage: impl Into<String>, versus: impl Into<String>) -> Self {
        Self {
            attack: attack.into(),
            damage: damage.into(),
            versus: versus.into(),
            advantage: AdvantageMode::Normal,
            num_attacks: default_num_attacks(),
            crits: CritRules::default(),
            cost: None,
            reduction: None,
        }
    }

    pub fn with_advantage(mut self, advantage: AdvantageMode) -> Self {
        self.advantage = advantage;
        self
    }

    pub fn with_num_attacks(mut self, num_attacks: impl Into<String>) -> Self {
        self.num_attacks = num_attacks.into();
        self
    }

    pub fn with_crits(mut self, crits: CritRules) -> Self {
        self.crits = crits;
        self
    }

    pub fn with_cost(mut self, cost: impl Into<String>) -> Self {
        self.cost = Some(cost.into());
        self
    }

    pub fn with_reduction(mut self, reduction: impl Into<String>) -> Self {
        self.reduction = Some(reduction.into());
        self
    }
}

fn default_num_attacks() -> String {
    "1".to_string()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawExpression {
    Text(String),
    Integer(i64),
}

impl From<RawExpression> for String {
    fn from(raw: RawExpression) -> Self {
        match raw {
            RawExpression::Text(text) => text,
            RawExpression::Integer(value) => value.to_string(),
        }
    }
}

fn expression_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    RawExpression::deserialize(deserializer).map(String::from)
}

fn optional_expression_text<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let raw: Option<RawExpression> = Option::deserialize(deserializer)?;
    Ok(raw
        .map(String::from)
        .filter(|text| !text.trim().is_empty()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SetupError {
    #[error("invalid {field} expression: {source}")]
    Expression {
        field: String,
        #[source]
        source: DiceError,
    },
    #[error("variable definition '{0}' must look like name=expression")]
    MalformedVariable(String),
    #[error("'{0}' is not a valid variable name")]
    InvalidVariableName(String),
    #[error("variable '{0}' is defined more than once")]
    DuplicateVariable(String),
    #[error("variable '{variable}' refers to '{reference}', which is not defined before it")]
    ForwardReference { variable: String, reference: String },
    #[error("{field} refers to unknown variable '{name}'")]
    UnknownVariable { field: String, name: String },
}

/// An [AttackSetup] with every field compiled, ready to run many trials.
#[derive(Debug, Clone)]
pub struct CompiledSetup {
    pub attack: Arc<CompiledExpression>,
    pub damage: Arc<CompiledExpression>,
    pub versus: Arc<CompiledExpression>,
    pub num_attacks: Arc<CompiledExpression>,
    pub cost: Option<Arc<CompiledExpression>>,
    pub reduction: Option<Arc<CompiledExpression>>,
    pub advantage: AdvantageMode,
    pub crits: CritRules,
    pub variables: VariableResolver,
}

impl CompiledSetup {
    pub fn compile(setup: &AttackSetup, compiler: &mut ExpressionCompiler) -> Result<Self, SetupError> {
        let (attack_text, variables) = split_variables(&setup.attack)?;
        let variables = VariableResolver::compile(variables, compiler)?;

        let mut field = |name: &str, text: &str| -> Result<Arc<CompiledExpression>, SetupError> {
            let compiled = compiler.compile(text).map_err(|source| SetupError::Expression {
                field: name.to_string(),
                source,
            })?;
            if let Some(unknown) = compiled
                .variables()
                .iter()
                .find(|reference| !variables.defines(reference))
            {
                return Err(SetupError::UnknownVariable {
                    field: name.to_string(),
                    name: unknown.clone(),
                });
            }
            Ok(compiled)
        };

        let attack = field("attack", &attack_text)?;
        let damage = field("damage", &setup.damage)?;
        let versus = field("versus", &setup.versus)?;
        let num_attacks = field("numAttacks", &setup.num_attacks)?;
        let cost = setup
            .cost
            .as_deref()
            .map(|text| field("cost", text))
            .transpose()?;
        let reduction = setup
            .reduction
            .as_deref()
            .map(|text| field("reduction", text))
            .transpose()?;

        Ok(Self {
            attack,
            damage,
            versus,
            num_attacks,
            cost,
            reduction,
            advantage: setup.advantage,
            crits: setup.crits,
            variables,
        })
    }

    /// True when no field depends on per-trial variable bindings.
    pub fn is_variable_free(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let setup: AttackSetup = serde_json::from_str(
            r#"{"attack":"1d20+5","damage":"1d8+3","versus":15,"advantage":"advantage"}"#,
        )
        .unwrap();
        assert_eq!(setup.versus, "15");
        assert_eq!(setup.num_attacks, "1");
        assert_eq!(setup.advantage, AdvantageMode::Advantage);
        assert_eq!(setup.crits, CritRules::default());
        assert_eq!(setup.cost, None);
    }

    #[test]
    fn blank_optional_fields_are_absent() {
        let setup: AttackSetup = serde_json::from_str(
            r#"{"attack":"1d20","damage":"1d6","versus":"10","cost":"  ","reduction":3,"numAttacks":"1d4","crits":{"failsMiss":false}}"#,
        )
        .unwrap();
        assert_eq!(setup.cost, None);
        assert_eq!(setup.reduction.as_deref(), Some("3"));
        assert_eq!(setup.num_attacks, "1d4");
        assert!(!setup.crits.fails_miss);
        assert!(setup.crits.successes_hit);
    }

    #[test]
    fn compile_reports_the_failing_field() {
        let mut compiler = ExpressionCompiler::new();
        let setup = AttackSetup::new("1d20", "1d8+", "12");
        let err = CompiledSetup::compile(&setup, &mut compiler).unwrap_err();
        assert!(matches!(err, SetupError::Expression { ref field, .. } if field == "damage"));
    }

    #[test]
    fn compile_rejects_unknown_variable_in_primary_field() {
        let mut compiler = ExpressionCompiler::new();
        let setup = AttackSetup::new("1d20%%X=1d6", "1d8+Y", "12");
        assert_eq!(
            CompiledSetup::compile(&setup, &mut compiler).unwrap_err(),
            SetupError::UnknownVariable {
                field: "damage".to_string(),
                name: "Y".to_string()
            }
        );
    }

    #[test]
    fn compile_accepts_declared_variables() {
        let mut compiler = ExpressionCompiler::new();
        let setup = AttackSetup::new("1d20+B %% B = 2 + 3", "1d8+B", "12").with_cost("B");
        let compiled = CompiledSetup::compile(&setup, &mut compiler).unwrap();
        assert!(!compiled.is_variable_free());
        assert_eq!(compiled.attack.source(), "1d20+B");
        assert!(compiled.cost.is_some());
    }
}
