//! Outcome estimator and coefficient book integration tests

use battle_intel::autoresolve::*;
use battle_intel::core::types::CultureId;

fn army(atk: f32, def: f32, hp: f32) -> ArmyStats {
    ArmyStats {
        atk,
        def,
        hp,
        range: 1.0,
    }
}

#[test]
fn test_calibration_pulls_estimate_toward_observed_pace() {
    let imperial = CultureId::new("imperial");
    let highland = CultureId::new("highland");
    let a = army(100.0, 10.0, 500.0);
    let b = army(100.0, 10.0, 500.0);
    let mut book = CoefficientBook::new();

    let initial = book.estimate((&imperial, &a), (&highland, &b), 1).rounds as i64;
    let observed = BattleSummary {
        rounds: 30,
        dealt_by_a: 400.0,
        dealt_by_b: 400.0,
    };
    for _ in 0..10 {
        book.record_outcome((&imperial, &a), (&highland, &b), &observed, 1);
    }
    let calibrated = book.estimate((&imperial, &a), (&highland, &b), 1).rounds as i64;

    assert!((calibrated - 30).abs() < (initial - 30).abs());
    assert_eq!(book.coefficients(&imperial, &highland).samples, 10);
}

#[test]
fn test_book_survives_persistence() {
    let imperial = CultureId::new("imperial");
    let highland = CultureId::new("highland");
    let a = army(60.0, 20.0, 800.0);
    let b = army(45.0, 25.0, 700.0);
    let mut book = CoefficientBook::new();
    book.record_outcome(
        (&imperial, &a),
        (&highland, &b),
        &BattleSummary {
            rounds: 18,
            dealt_by_a: 500.0,
            dealt_by_b: 250.0,
        },
        4,
    );

    let restored = CoefficientBook::from_json(&book.to_json().unwrap()).unwrap();
    assert_eq!(
        restored.estimate((&imperial, &a), (&highland, &b), 8),
        book.estimate((&imperial, &a), (&highland, &b), 8)
    );
}

#[test]
fn test_side_order_is_respected() {
    let imperial = CultureId::new("imperial");
    let highland = CultureId::new("highland");
    let strong = army(50.0, 20.0, 600.0);
    let weak = army(15.0, 5.0, 300.0);
    let book = CoefficientBook::new();

    let forward = book.estimate((&imperial, &strong), (&highland, &weak), 3);
    let reverse = book.estimate((&highland, &weak), (&imperial, &strong), 3);
    assert_eq!(forward.outcome, Outcome::SideA);
    assert_eq!(reverse.outcome, Outcome::SideB);
}

#[test]
fn test_separate_pairs_do_not_share_coefficients() {
    let imperial = CultureId::new("imperial");
    let highland = CultureId::new("highland");
    let nomad = CultureId::new("nomad");
    let a = army(40.0, 10.0, 500.0);
    let mut book = CoefficientBook::new();
    book.record_outcome(
        (&imperial, &a),
        (&highland, &a),
        &BattleSummary {
            rounds: 5,
            dealt_by_a: 300.0,
            dealt_by_b: 100.0,
        },
        2,
    );

    assert_eq!(book.len(), 1);
    assert_eq!(book.coefficients(&imperial, &nomad), Coefficients::default());
    assert_ne!(book.coefficients(&highland, &imperial), Coefficients::default());
}
