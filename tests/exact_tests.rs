use num_bigint::BigUint;

use attack_odds::exact::{BinomialTable, DiceModel, Distribution, ExactEngine, ExactError};

fn dice(n: i64, s: i64, modifier: i64) -> DiceModel {
    DiceModel::new(n, s, modifier).expect("valid dice")
}

#[test]
fn binomial_reference_values() {
    let mut table = BinomialTable::new();
    assert_eq!(table.get(5, 2), BigUint::from(10u32));
    assert_eq!(table.get(8, 4), BigUint::from(70u32));
    assert_eq!(table.get(8, 9), BigUint::from(0u32));
}

#[test]
fn two_d6_mass_sums_to_one() {
    let mut engine = ExactEngine::new();
    let total: f64 = (2..=12).map(|x| engine.probability(&dice(2, 6, 0), x)).sum();
    assert!((total - 1.0).abs() < 1e-9);
}

#[test]
fn impossible_totals_have_no_mass() {
    let mut engine = ExactEngine::new();
    let model = dice(3, 6, 0);
    assert_eq!(engine.probability(&model, 2), 0.0);
    assert_eq!(engine.probability(&model, -10), 0.0);
    assert_eq!(engine.probability(&model, 19), 0.0);
}

#[test]
fn certain_hits_are_the_n_fold_convolution() {
    let mut engine = ExactEngine::new();
    let model = dice(1, 6, 0);
    let single = engine.distribution(&model);
    let expected = single.convolve(&single).convolve(&single);
    let actual = engine.total_damage(&model, 3, 1.0).expect("exact distribution");
    assert_eq!(actual, expected);
    assert_eq!(actual.min(), Some(3));
    assert_eq!(actual.max(), Some(18));
}

#[test]
fn certain_misses_are_all_zero_damage() {
    let mut engine = ExactEngine::new();
    let total = engine
        .total_damage(&dice(2, 10, 4), 5, 0.0)
        .expect("exact distribution");
    assert_eq!(total.get(0), 1.0);
    assert_eq!(total, Distribution::point(0));
}

#[test]
fn sequence_distribution_is_normalised() {
    let mut engine = ExactEngine::new();
    for (model, attacks, p) in [
        (dice(1, 8, 3), 2, 0.55),
        (dice(2, 6, 0), 4, 0.3),
        (dice(1, 12, -2), 3, 0.9),
    ] {
        let total = engine.total_damage(&model, attacks, p).expect("exact distribution");
        assert!((total.total() - 1.0).abs() < 1e-9, "{model} x{attacks}");
        let expected_mean = attacks as f64 * p * model.mean();
        assert!((total.mean() - expected_mean).abs() < 1e-9, "{model} x{attacks}");
    }
}

#[test]
fn zero_sided_dice_are_rejected() {
    assert_eq!(DiceModel::new(2, 0, 0), Err(ExactError::ZeroSides));
}

#[test]
fn large_dice_pools_keep_exact_mass_and_mean() {
    let mut engine = ExactEngine::new();
    for (model, outcomes) in [(dice(60, 20, 0), 1141), (dice(100, 10, 3), 901)] {
        let distribution = engine.distribution(&model);
        assert_eq!(distribution.len(), outcomes, "{model}: every total has positive mass");
        assert!((distribution.total() - 1.0).abs() < 1e-9, "{model}");
        assert!((distribution.mean() - model.mean()).abs() < 1e-6, "{model}");
    }
}

#[test]
fn large_pool_tails_match_closed_form() {
    let mut engine = ExactEngine::new();
    let model = dice(60, 20, 0);
    let lowest = 20f64.powi(-60);
    assert!((engine.probability(&model, 60) / lowest - 1.0).abs() < 1e-9);
    assert!((engine.probability(&model, 61) / (60.0 * lowest) - 1.0).abs() < 1e-9);
    assert!((engine.probability(&model, 1200) / lowest - 1.0).abs() < 1e-9);
}

#[test]
fn overflowing_sequences_fail_cleanly() {
    let mut engine = ExactEngine::new();
    let model = dice(1, 6, i64::MAX / 2);
    assert!(matches!(
        engine.total_damage(&model, 3, 1.0),
        Err(ExactError::TotalOutOfRange { .. })
    ));
    let total = engine
        .total_damage(&dice(1, 6, 0), 3, 1.0)
        .expect("engine stays usable");
    assert!((total.total() - 1.0).abs() < 1e-9);
}
