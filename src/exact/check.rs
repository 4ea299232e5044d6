//! Exact hit chance for a `1d20 + bonus` attack against a fixed armor class.

use serde::{Deserialize, Serialize};

use crate::combat::{AdvantageMode, CheckValue, CritRules};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HitChance {
    /// Probability that the attack hits, critical or not.
    pub hit: f64,
    /// Probability that the attack hits critically and doubles damage.
    pub critical: f64,
}

/// Check value of one natural d20 face under `crits`.
fn face_check(face: i64, bonus: i64, crits: CritRules) -> CheckValue {
    match face {
        20 if crits.successes_hit => CheckValue::Critical,
        1 if crits.fails_miss => CheckValue::Fumble,
        _ => CheckValue::Value(face.saturating_add(bonus)),
    }
}

/// Enumerate every d20 outcome (both dice under advantage or disadvantage)
/// with the same ordering the simulator uses.
pub fn hit_probability(
    bonus: i64,
    armor_class: i64,
    advantage: AdvantageMode,
    crits: CritRules,
) -> HitChance {
    let checks: Vec<CheckValue> = (1..=20).map(|face| face_check(face, bonus, crits)).collect();
    let outcomes: Vec<CheckValue> = match advantage {
        AdvantageMode::Normal => checks.clone(),
        AdvantageMode::Advantage => checks
            .iter()
            .flat_map(|a| checks.iter().map(move |b| (*a).max(*b)))
            .collect(),
        AdvantageMode::Disadvantage => checks
            .iter()
            .flat_map(|a| checks.iter().map(move |b| (*a).min(*b)))
            .collect(),
    };

    let total = outcomes.len() as f64;
    let hits = outcomes.iter().filter(|check| check.beats(armor_class)).count();
    let critical = if crits.successes_crit {
        outcomes
            .iter()
            .filter(|check| **check == CheckValue::Critical)
            .count()
    } else {
        0
    };
    HitChance {
        hit: hits as f64 / total,
        critical: critical as f64 / total,
    }
}
