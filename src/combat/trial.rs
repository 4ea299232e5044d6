use serde::Serialize;

use crate::combat::attack::resolve_attack;
use crate::combat::rng::Rng;
use crate::combat::setup::CompiledSetup;
use crate::dice::{DiceError, Environment};

/// Totals for one full attack sequence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    pub total_damage: u64,
    pub attacks_resolved: u64,
    pub hits: u64,
    pub total_cost: f64,
}

/// Run one trial: bind variables, resolve the attack count once, then resolve
/// that many attacks. `env` is scratch space reused across trials.
pub fn run_trial(
    setup: &CompiledSetup,
    env: &mut Environment,
    rng: &mut Rng,
) -> Result<TrialResult, DiceError> {
    setup.variables.resolve(env, rng)?;

    let attacks = setup.num_attacks.total(env, rng)?.max(0) as u64;
    let mut result = TrialResult {
        attacks_resolved: attacks,
        ..TrialResult::default()
    };
    for _ in 0..attacks {
        let outcome = resolve_attack(setup, env, rng)?;
        result.total_damage = result
            .total_damage
            .checked_add(outcome.damage)
            .ok_or(DiceError::Overflow)?;
        result.total_cost += outcome.cost;
        if outcome.hit {
            result.hits += 1;
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::setup::{AttackSetup, CritRules};
    use crate::dice::ExpressionCompiler;

    fn compile(setup: AttackSetup) -> CompiledSetup {
        CompiledSetup::compile(&setup, &mut ExpressionCompiler::new()).unwrap()
    }

    #[test]
    fn zero_attacks_is_a_valid_trial() {
        let setup = compile(AttackSetup::new("20", "1d6", "10").with_num_attacks("0"));
        let result = run_trial(&setup, &mut Environment::new(), &mut Rng::new(1)).unwrap();
        assert_eq!(result, TrialResult::default());
    }

    #[test]
    fn negative_attack_counts_clamp_to_zero() {
        let setup = compile(AttackSetup::new("20", "1d6", "10").with_num_attacks("1-5"));
        let result = run_trial(&setup, &mut Environment::new(), &mut Rng::new(1)).unwrap();
        assert_eq!(result.attacks_resolved, 0);
        assert_eq!(result.total_damage, 0);
    }

    #[test]
    fn sums_every_attack() {
        let setup = compile(
            AttackSetup::new("20", "4", "10")
                .with_num_attacks("3")
                .with_cost("2")
                .with_crits(CritRules::none()),
        );
        let result = run_trial(&setup, &mut Environment::new(), &mut Rng::new(1)).unwrap();
        assert_eq!(
            result,
            TrialResult {
                total_damage: 12,
                attacks_resolved: 3,
                hits: 3,
                total_cost: 6.0,
            }
        );
    }

    #[test]
    fn attack_count_is_rolled_once_per_trial() {
        let setup = compile(AttackSetup::new("20", "1", "10").with_num_attacks("1d4"));
        let mut rng = Rng::new(77);
        let mut env = Environment::new();
        for _ in 0..200 {
            let result = run_trial(&setup, &mut env, &mut rng).unwrap();
            assert!((1..=4).contains(&result.attacks_resolved));
            assert_eq!(result.hits, result.attacks_resolved);
            assert_eq!(result.total_damage, result.attacks_resolved);
        }
    }

    #[test]
    fn variables_are_shared_across_fields_within_a_trial() {
        let setup = compile(
            AttackSetup::new("20 %% N=1d3 %% D=1d10", "D", "10")
                .with_num_attacks("N")
                .with_crits(CritRules::none()),
        );
        let mut rng = Rng::new(5);
        let mut env = Environment::new();
        for _ in 0..200 {
            let result = run_trial(&setup, &mut env, &mut rng).unwrap();
            let n = env["N"] as u64;
            let d = env["D"] as u64;
            assert_eq!(result.attacks_resolved, n);
            assert_eq!(result.total_damage, n * d);
        }
    }
}
