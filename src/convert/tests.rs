use super::{find_inconsistencies, resolve, resolve_detailed, ConversionError, Stage};
use crate::domain::ingredient::ConversionFact;
use crate::domain::unit::Unit;

fn fact(from_amount: f64, from_unit: Unit, to_amount: f64, to_unit: Unit) -> ConversionFact {
    ConversionFact::new(from_amount, from_unit, to_amount, to_unit).expect("fact should be valid")
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= 1e-9 * expected.abs().max(1.0),
        "expected {expected}, got {actual}"
    );
}

fn all_test_units() -> Vec<Unit> {
    let mut units = Unit::FIXED.to_vec();
    units.push(Unit::count("egg", "eggs"));
    units.push(Unit::Other("pinch".to_string()));
    units
}

#[test]
fn identity_returns_amount_for_every_unit() {
    let facts = vec![fact(1.0, Unit::Cup, 120.0, Unit::Gram)];
    for unit in all_test_units() {
        let converted = resolve_detailed(3.75, &unit, &unit, &facts).expect("identity resolves");
        assert_eq!(converted.value, 3.75);
        assert_eq!(converted.stage, Stage::Identity);
    }
}

#[test]
fn same_family_conversion_ignores_ingredient_facts() {
    let facts = vec![
        fact(1.0, Unit::Cup, 120.0, Unit::Gram),
        fact(1.0, Unit::Tablespoon, 8.0, Unit::Gram),
    ];
    for from in Unit::FIXED {
        for to in Unit::FIXED {
            if from == to || from.family() != to.family() {
                continue;
            }
            let bare = resolve(1.0, &from, &to, &[]).expect("generic conversion resolves");
            let with_facts = resolve(1.0, &from, &to, &facts).expect("generic conversion resolves");
            assert_eq!(bare, with_facts, "{from} -> {to}");
        }
    }

    let tsp = resolve(1.0, &Unit::Tablespoon, &Unit::Teaspoon, &[]).expect("tbsp to tsp");
    assert_close(tsp, 3.0);
    let oz = resolve(2.0, &Unit::Pound, &Unit::Ounce, &[]).expect("lb to oz");
    assert_close(oz, 32.0);
    let ml = resolve(1.0, &Unit::Cup, &Unit::Milliliter, &[]).expect("cup to ml");
    assert_close(ml, 236.5882365);
}

#[test]
fn same_family_stage_preempts_a_conflicting_direct_fact() {
    let facts = vec![fact(1.0, Unit::Cup, 15.0, Unit::Tablespoon)];
    let converted = resolve_detailed(1.0, &Unit::Cup, &Unit::Tablespoon, &facts)
        .expect("cup to tbsp resolves");
    assert_eq!(converted.stage, Stage::SameFamily);
    assert_close(converted.value, 16.0);
}

#[test]
fn direct_fact_multiplies_forward() {
    let facts = vec![fact(1.0, Unit::Cup, 120.0, Unit::Gram)];
    let converted =
        resolve_detailed(2.5, &Unit::Cup, &Unit::Gram, &facts).expect("cup to gram resolves");
    assert_eq!(converted.stage, Stage::DirectFact);
    assert_eq!(converted.value, 300.0);
}

#[test]
fn reverse_fact_uses_reciprocal() {
    let facts = vec![fact(1.0, Unit::Cup, 120.0, Unit::Gram)];
    let converted =
        resolve_detailed(240.0, &Unit::Gram, &Unit::Cup, &facts).expect("gram to cup resolves");
    assert_eq!(converted.stage, Stage::ReverseFact);
    assert_eq!(converted.value, 2.0);
}

#[test]
fn chained_search_multiplies_along_the_path() {
    let facts = vec![
        fact(1.0, Unit::Cup, 200.0, Unit::Gram),
        fact(16.0, Unit::Tablespoon, 1.0, Unit::Cup),
    ];
    assert_eq!(
        resolve(8.0, &Unit::Tablespoon, &Unit::Gram, &facts).expect("chain resolves"),
        100.0
    );

    let detailed =
        resolve_detailed(8.0, &Unit::Tablespoon, &Unit::Gram, &facts).expect("chain resolves");
    assert_eq!(detailed.stage, Stage::Chained);
    assert_eq!(detailed.path, vec![Unit::Tablespoon, Unit::Cup, Unit::Gram]);
}

#[test]
fn count_units_chain_through_weight() {
    let egg = Unit::count("egg", "eggs");
    let facts = vec![
        fact(1.0, egg.clone(), 50.0, Unit::Gram),
        fact(1.0, Unit::Cup, 243.0, Unit::Gram),
    ];
    let eggs_per_cup = resolve(1.0, &Unit::Cup, &egg, &facts).expect("cup to eggs resolves");
    assert_close(eggs_per_cup, 4.86);

    let cracker = Unit::count("cracker", "crackers");
    let err = resolve(1.0, &egg, &cracker, &facts).expect_err("crackers are unrelated");
    assert_eq!(
        err,
        ConversionError::NoPath {
            from: egg,
            to: cracker
        }
    );
}

#[test]
fn shortest_chain_wins_over_longer_one() {
    let stick = Unit::count("stick", "sticks");
    let facts = vec![
        fact(1.0, stick.clone(), 8.0, Unit::Tablespoon),
        fact(16.0, Unit::Tablespoon, 1.0, Unit::Cup),
        fact(1.0, Unit::Cup, 224.0, Unit::Gram),
        fact(1.0, stick.clone(), 0.25, Unit::Pound),
        fact(1.0, Unit::Pound, 454.0, Unit::Gram),
    ];
    let grams = resolve_detailed(1.0, &stick, &Unit::Gram, &facts).expect("stick resolves");
    assert_eq!(grams.path, vec![stick, Unit::Pound, Unit::Gram]);
    assert_eq!(grams.value, 113.5);
}

#[test]
fn equal_length_chains_prefer_fact_order() {
    let scoop = Unit::Other("scoop".to_string());
    let facts = vec![
        fact(1.0, scoop.clone(), 2.0, Unit::Cup),
        fact(1.0, scoop.clone(), 3.0, Unit::Ounce),
        fact(1.0, Unit::Cup, 100.0, Unit::Gram),
        fact(1.0, Unit::Ounce, 50.0, Unit::Gram),
    ];
    let grams = resolve_detailed(1.0, &scoop, &Unit::Gram, &facts).expect("scoop resolves");
    assert_eq!(grams.path, vec![scoop, Unit::Cup, Unit::Gram]);
    assert_eq!(grams.value, 200.0);
}

#[test]
fn cycles_terminate_and_missing_paths_fail() {
    let facts = vec![
        fact(1.0, Unit::Cup, 120.0, Unit::Gram),
        fact(120.0, Unit::Gram, 1.0, Unit::Cup),
        fact(1.0, Unit::Other("scoop".into()), 2.0, Unit::Other("dash".into())),
    ];
    let err = resolve(1.0, &Unit::Cup, &Unit::Other("scoop".into()), &facts)
        .expect_err("disconnected units fail");
    assert!(matches!(err, ConversionError::NoPath { .. }));
}

#[test]
fn no_facts_means_no_cross_family_conversion() {
    let err = resolve(5.0, &Unit::Cup, &Unit::Gram, &[]).expect_err("no facts");
    assert_eq!(err.to_string(), "no conversion from 'cup' to 'gram'");
    assert!(resolve(1.0, &Unit::Gram, &Unit::count("egg", "eggs"), &[]).is_err());
}

#[test]
fn inconsistencies_are_reported_without_changing_resolution() {
    let facts = vec![
        fact(1.0, Unit::Cup, 120.0, Unit::Gram),
        fact(1.0, Unit::Tablespoon, 8.0, Unit::Gram),
    ];
    let findings = find_inconsistencies(&facts, 0.02);
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].from, Unit::Cup);
    assert_eq!(findings[0].to, Unit::Tablespoon);
    assert_eq!(findings[0].ratios.len(), 2);

    let consistent = vec![
        fact(1.0, Unit::Cup, 128.0, Unit::Gram),
        fact(1.0, Unit::Tablespoon, 8.0, Unit::Gram),
    ];
    assert!(find_inconsistencies(&consistent, 0.02).is_empty());
    assert!(find_inconsistencies(&[], 0.02).is_empty());
}
