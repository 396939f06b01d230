//! Cross-battle coefficient store keyed by unordered culture pair
//!
//! The book is owned by the caller and consulted or updated only between
//! battles. Buckets are stored in canonical orientation (lexically smaller
//! culture as side A) and flipped on the way in and out.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::autoresolve::estimator::{
    damage_ratio, estimate, ArmyStats, Coefficients, Estimate, PACE_MAX, PACE_MIN, TILT_MAX,
    TILT_MIN,
};
use crate::core::error::Result;
use crate::core::types::CultureId;

/// EMA smoothing factor for observed pace and ratio
pub const EMA_ALPHA: f32 = 0.2;

/// Unordered pair of cultures
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CulturePair {
    first: CultureId,
    second: CultureId,
}

impl CulturePair {
    pub fn new(a: &CultureId, b: &CultureId) -> Self {
        if a <= b {
            Self {
                first: a.clone(),
                second: b.clone(),
            }
        } else {
            Self {
                first: b.clone(),
                second: a.clone(),
            }
        }
    }

    /// True when `side_a` is not the canonical first culture
    pub fn is_flipped(&self, side_a: &CultureId) -> bool {
        *side_a != self.first
    }

    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CulturePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.first, self.second)
    }
}

/// What actually happened in a fought battle, from side A's point of view
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattleSummary {
    pub rounds: u32,
    pub dealt_by_a: f32,
    pub dealt_by_b: f32,
}

impl BattleSummary {
    pub fn damage_ratio(&self) -> f32 {
        damage_ratio(self.dealt_by_a, self.dealt_by_b)
    }
}

fn ema(previous: Option<f32>, sample: f32) -> f32 {
    match previous {
        Some(prev) => EMA_ALPHA * sample + (1.0 - EMA_ALPHA) * prev,
        None => sample,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoefficientBook {
    buckets: BTreeMap<String, Coefficients>,
}

impl CoefficientBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Coefficients oriented so that `side_a` is side A
    pub fn coefficients(&self, side_a: &CultureId, side_b: &CultureId) -> Coefficients {
        let pair = CulturePair::new(side_a, side_b);
        let stored = self.buckets.get(&pair.key()).copied().unwrap_or_default();
        if pair.is_flipped(side_a) {
            stored.flipped()
        } else {
            stored
        }
    }

    pub fn estimate(
        &self,
        side_a: (&CultureId, &ArmyStats),
        side_b: (&CultureId, &ArmyStats),
        seed: u64,
    ) -> Estimate {
        let coeffs = self.coefficients(side_a.0, side_b.0);
        estimate(side_a.1, side_b.1, &coeffs, seed)
    }

    /// Nudge the pair's coefficients toward an observed battle
    ///
    /// The observed pace and damage ratio feed EMAs; pace moves by the
    /// square root of predicted/observed rounds and the tilt by the square
    /// root of observed/predicted ratio, both clamped. Returns the updated
    /// coefficients oriented to the caller.
    pub fn record_outcome(
        &mut self,
        side_a: (&CultureId, &ArmyStats),
        side_b: (&CultureId, &ArmyStats),
        observed: &BattleSummary,
        seed: u64,
    ) -> Coefficients {
        let mut coeffs = self.coefficients(side_a.0, side_b.0);
        let predicted = estimate(side_a.1, side_b.1, &coeffs, seed);

        let ema_rounds = ema(coeffs.ema_rounds, observed.rounds.max(1) as f32);
        let ema_ratio = ema(coeffs.ema_ratio, observed.damage_ratio());
        coeffs.ema_rounds = Some(ema_rounds);
        coeffs.ema_ratio = Some(ema_ratio);

        let pace_nudge = (predicted.rounds.max(1) as f32 / ema_rounds).sqrt();
        coeffs.pace = (coeffs.pace * pace_nudge).clamp(PACE_MIN, PACE_MAX);
        let tilt_nudge = (ema_ratio / predicted.damage_ratio()).sqrt();
        coeffs.ratio_tilt = (coeffs.ratio_tilt * tilt_nudge).clamp(TILT_MIN, TILT_MAX);
        coeffs.samples += 1;

        let pair = CulturePair::new(side_a.0, side_b.0);
        tracing::info!(
            pair = %pair,
            pace = coeffs.pace,
            tilt = coeffs.ratio_tilt,
            samples = coeffs.samples,
            "outcome coefficients calibrated"
        );
        let stored = if pair.is_flipped(side_a.0) {
            coeffs.flipped()
        } else {
            coeffs
        };
        self.buckets.insert(pair.key(), stored);
        coeffs
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cultures() -> (CultureId, CultureId) {
        (CultureId::new("highland"), CultureId::new("imperial"))
    }

    fn army(atk: f32) -> ArmyStats {
        ArmyStats {
            atk,
            def: 10.0,
            hp: 500.0,
            range: 1.0,
        }
    }

    #[test]
    fn test_pair_is_unordered() {
        let (a, b) = cultures();
        assert_eq!(CulturePair::new(&a, &b), CulturePair::new(&b, &a));
        assert_eq!(CulturePair::new(&b, &a).key(), "highland|imperial");
    }

    #[test]
    fn test_ema_first_sample_then_blend() {
        let (a, b) = cultures();
        let mut book = CoefficientBook::new();
        let first = BattleSummary {
            rounds: 10,
            dealt_by_a: 100.0,
            dealt_by_b: 100.0,
        };
        let second = BattleSummary {
            rounds: 20,
            ..first
        };
        book.record_outcome((&a, &army(20.0)), (&b, &army(20.0)), &first, 1);
        let coeffs = book.record_outcome((&a, &army(20.0)), (&b, &army(20.0)), &second, 1);
        assert_eq!(coeffs.samples, 2);
        assert!((coeffs.ema_rounds.unwrap() - 12.0).abs() < 1e-4);
    }

    #[test]
    fn test_short_battles_raise_pace() {
        let (a, b) = cultures();
        let mut book = CoefficientBook::new();
        let predicted = book.estimate((&a, &army(20.0)), (&b, &army(20.0)), 5);
        let observed = BattleSummary {
            rounds: (predicted.rounds / 4).max(1),
            dealt_by_a: 100.0,
            dealt_by_b: 100.0,
        };
        let coeffs = book.record_outcome((&a, &army(20.0)), (&b, &army(20.0)), &observed, 5);
        assert!(coeffs.pace > 1.0);
        assert!(coeffs.pace <= PACE_MAX);
    }

    #[test]
    fn test_tilt_stays_clamped() {
        let (a, b) = cultures();
        let mut book = CoefficientBook::new();
        let lopsided = BattleSummary {
            rounds: 8,
            dealt_by_a: 1000.0,
            dealt_by_b: 1.0,
        };
        for seed in 0..20 {
            let coeffs = book.record_outcome((&a, &army(20.0)), (&b, &army(20.0)), &lopsided, seed);
            assert!(coeffs.ratio_tilt <= TILT_MAX && coeffs.ratio_tilt >= TILT_MIN);
        }
        assert!((book.coefficients(&a, &b).ratio_tilt - TILT_MAX).abs() < 1e-4);
    }

    #[test]
    fn test_orientation_follows_caller() {
        let (a, b) = cultures();
        let mut book = CoefficientBook::new();
        let lopsided = BattleSummary {
            rounds: 8,
            dealt_by_a: 400.0,
            dealt_by_b: 100.0,
        };
        // Recorded with the lexically larger culture as side A
        book.record_outcome((&b, &army(20.0)), (&a, &army(20.0)), &lopsided, 2);
        let seen_by_b = book.coefficients(&b, &a);
        let seen_by_a = book.coefficients(&a, &b);
        assert!(seen_by_b.ratio_tilt > 1.0);
        assert!((seen_by_a.ratio_tilt * seen_by_b.ratio_tilt - 1.0).abs() < 1e-4);
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_book_json() {
        let (a, b) = cultures();
        let mut book = CoefficientBook::new();
        let summary = BattleSummary {
            rounds: 12,
            dealt_by_a: 300.0,
            dealt_by_b: 200.0,
        };
        book.record_outcome((&a, &army(25.0)), (&b, &army(20.0)), &summary, 3);
        let json = book.to_json().unwrap();
        assert!(json.contains("highland|imperial"));
        assert_eq!(CoefficientBook::from_json(&json).unwrap(), book);
        assert!(CoefficientBook::from_json("{ not json").is_err());
    }
}
