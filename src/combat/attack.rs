//! Resolution of a single attack instance.
//!
//! `Pending -> AttackRolled -> {Miss | HitNormal | HitCrit}`. The attack roll
//! is lifted into a [CheckValue] so that critical failures and successes sort
//! below and above every finite roll; advantage and disadvantage are then a
//! plain `max` / `min`.

use serde::Serialize;

use crate::combat::rng::Rng;
use crate::combat::setup::{AdvantageMode, CompiledSetup, CritRules};
use crate::dice::{CriticalClass, DiceError, Environment, Roll};

/// Attack roll after applying the critical rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CheckValue {
    /// Critical failure under `failsMiss`.
    Fumble,
    Value(i64),
    /// Critical success under `successesHit`.
    Critical,
}

impl CheckValue {
    pub fn from_roll(roll: &Roll, crits: CritRules) -> Self {
        match roll.critical() {
            CriticalClass::Failure if crits.fails_miss => Self::Fumble,
            CriticalClass::Success if crits.successes_hit => Self::Critical,
            _ => Self::Value(roll.value),
        }
    }

    /// Whether this check beats `threshold`.
    pub fn beats(self, threshold: i64) -> bool {
        match self {
            Self::Fumble => false,
            Self::Critical => true,
            Self::Value(value) => value > threshold,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttackState {
    Pending,
    AttackRolled(CheckValue),
    Miss,
    HitNormal,
    HitCrit,
}

impl AttackState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Miss | Self::HitNormal | Self::HitCrit)
    }

    pub fn is_hit(self) -> bool {
        matches!(self, Self::HitNormal | Self::HitCrit)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AttackOutcome {
    pub damage: u64,
    pub hit: bool,
    pub cost: f64,
}

/// Roll the attack check, once or twice depending on the advantage mode.
pub fn roll_check(
    setup: &CompiledSetup,
    env: &Environment,
    rng: &mut Rng,
) -> Result<CheckValue, DiceError> {
    let mut once = || -> Result<CheckValue, DiceError> {
        let roll = setup.attack.roll(env, rng)?;
        Ok(CheckValue::from_roll(&roll, setup.crits))
    };
    Ok(match setup.advantage {
        AdvantageMode::Normal => once()?,
        AdvantageMode::Advantage => once()?.max(once()?),
        AdvantageMode::Disadvantage => once()?.min(once()?),
    })
}

fn advance(
    state: AttackState,
    setup: &CompiledSetup,
    env: &Environment,
    rng: &mut Rng,
) -> Result<AttackState, DiceError> {
    Ok(match state {
        AttackState::Pending => AttackState::AttackRolled(roll_check(setup, env, rng)?),
        AttackState::AttackRolled(check) => {
            let threshold = setup.versus.total(env, rng)?;
            if !check.beats(threshold) {
                AttackState::Miss
            } else if check == CheckValue::Critical && setup.crits.successes_crit {
                AttackState::HitCrit
            } else {
                AttackState::HitNormal
            }
        }
        terminal => terminal,
    })
}

/// Resolve one attack. Consumes the RNG and nothing else.
pub fn resolve_attack(
    setup: &CompiledSetup,
    env: &Environment,
    rng: &mut Rng,
) -> Result<AttackOutcome, DiceError> {
    let mut state = AttackState::Pending;
    while !state.is_terminal() {
        state = advance(state, setup, env, rng)?;
    }

    let mut damage = match state {
        AttackState::HitNormal => setup.damage.total(env, rng)?,
        AttackState::HitCrit => setup
            .damage
            .total(env, rng)?
            .checked_mul(2)
            .ok_or(DiceError::Overflow)?,
        _ => 0,
    };
    if state.is_hit() {
        if let Some(reduction) = &setup.reduction {
            damage = damage.saturating_sub(reduction.total(env, rng)?);
        }
    }

    let cost = match &setup.cost {
        Some(cost) => cost.total(env, rng)? as f64,
        None => 0.0,
    };

    Ok(AttackOutcome {
        damage: damage.max(0) as u64,
        hit: state.is_hit(),
        cost,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::combat::setup::AttackSetup;
    use crate::dice::ExpressionCompiler;

    fn compile(setup: AttackSetup) -> CompiledSetup {
        CompiledSetup::compile(&setup, &mut ExpressionCompiler::new()).unwrap()
    }

    fn run(setup: &CompiledSetup, seed: u64, n: usize) -> Vec<AttackOutcome> {
        let mut rng = Rng::new(seed);
        let env = Environment::new();
        (0..n)
            .map(|_| resolve_attack(setup, &env, &mut rng).unwrap())
            .collect()
    }

    #[test]
    fn sentinel_ordering_composes_with_min_and_max() {
        assert!(CheckValue::Fumble < CheckValue::Value(i64::MIN));
        assert!(CheckValue::Value(i64::MAX) < CheckValue::Critical);
        assert_eq!(CheckValue::Critical.max(CheckValue::Value(40)), CheckValue::Critical);
        assert_eq!(CheckValue::Fumble.min(CheckValue::Value(-40)), CheckValue::Fumble);
    }

    #[test]
    fn check_beats_threshold_strictly() {
        assert!(!CheckValue::Value(15).beats(15));
        assert!(CheckValue::Value(16).beats(15));
        assert!(CheckValue::Critical.beats(i64::MAX));
        assert!(!CheckValue::Fumble.beats(i64::MIN));
    }

    #[test]
    fn forced_critical_hits_an_unbeatable_threshold() {
        let setup = compile(
            AttackSetup::new("1d20cs>=1", "1d6", "1000000").with_crits(CritRules {
                fails_miss: true,
                successes_hit: true,
                successes_crit: false,
            }),
        );
        for outcome in run(&setup, 4, 200) {
            assert!(outcome.hit);
            assert!((1..=6).contains(&outcome.damage));
        }
    }

    #[test]
    fn critical_without_successes_hit_uses_the_number() {
        let setup = compile(
            AttackSetup::new("1d20cs>=1", "1d6", "1000000").with_crits(CritRules::none()),
        );
        assert!(run(&setup, 4, 200).iter().all(|outcome| !outcome.hit));
    }

    #[test]
    fn successes_crit_doubles_damage() {
        let setup = compile(AttackSetup::new("1d20cs>=1", "5", "0"));
        for outcome in run(&setup, 9, 50) {
            assert_eq!(outcome.damage, 10);
        }
    }

    #[test]
    fn forced_fumble_always_misses() {
        let setup = compile(AttackSetup::new("1d20cs>100cf<=20+100", "1d6", "-5"));
        assert!(run(&setup, 2, 200).iter().all(|outcome| !outcome.hit && outcome.damage == 0));
    }

    #[test]
    fn advantage_prefers_the_critical_roll() {
        // Only a natural 20 is critical and the threshold is unreachable
        // otherwise, so advantage hits with chance 1 - (19/20)^2.
        let setup = compile(
            AttackSetup::new("1d20", "1", "1000").with_advantage(AdvantageMode::Advantage),
        );
        let outcomes = run(&setup, 21, 40_000);
        let rate = outcomes.iter().filter(|o| o.hit).count() as f64 / outcomes.len() as f64;
        assert!((rate - 0.0975).abs() < 0.01, "rate {rate}");
    }

    #[test]
    fn disadvantage_prefers_the_fumble() {
        // Every non-fumble hits, so disadvantage misses with chance 1 - (19/20)^2.
        let setup = compile(
            AttackSetup::new("1d20", "1", "-1000").with_advantage(AdvantageMode::Disadvantage),
        );
        let outcomes = run(&setup, 22, 40_000);
        let miss_rate = outcomes.iter().filter(|o| !o.hit).count() as f64 / outcomes.len() as f64;
        assert!((miss_rate - 0.0975).abs() < 0.01, "miss rate {miss_rate}");
    }

    #[test]
    fn reduction_clamps_damage_at_zero() {
        let setup = compile(AttackSetup::new("100", "1d6", "0").with_reduction("10"));
        for outcome in run(&setup, 5, 100) {
            assert!(outcome.hit);
            assert_eq!(outcome.damage, 0);
        }
    }

    #[test]
    fn cost_accrues_on_hits_and_misses() {
        let miss = compile(AttackSetup::new("0", "1d6", "10").with_cost("3"));
        let hit = compile(AttackSetup::new("20", "1d6", "10").with_cost("3"));
        assert!(run(&miss, 1, 10).iter().all(|o| !o.hit && o.cost == 3.0));
        assert!(run(&hit, 1, 10).iter().all(|o| o.hit && o.cost == 3.0));
    }

    #[test]
    fn negative_damage_rolls_clamp_to_zero() {
        let setup = compile(AttackSetup::new("20", "1d4-10", "10"));
        assert!(run(&setup, 8, 50).iter().all(|o| o.hit && o.damage == 0));
    }
}
