//! Coarse round-based outcome estimate from aggregate army stats
//!
//! Each round both sides deal damage proportional to their attack power,
//! reduced by the other side's defense, scaled by pace and jittered by a
//! seeded variance roll. The fight ends when a side's hp is gone or the
//! round cap is reached.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::core::rng::{BattleRng, RngStream};

/// Hard cap on simulated rounds
pub const MAX_ROUNDS: u32 = 60;

/// Fraction of attack power converted into hp damage per round
pub const BASE_DAMAGE_RATE: f32 = 0.1;

/// Power bonus per hex of range
pub const RANGE_BONUS: f32 = 0.05;

/// Bounds on the pace and tilt coefficients
pub const PACE_MIN: f32 = 0.5;
pub const PACE_MAX: f32 = 2.0;
pub const TILT_MIN: f32 = 0.8;
pub const TILT_MAX: f32 = 1.25;

/// Damage ratios beyond this are treated as this
pub const RATIO_LIMIT: f32 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArmyStats {
    pub atk: f32,
    pub def: f32,
    pub hp: f32,
    pub range: f32,
}

/// Tunable estimator coefficients, oriented to a (side A, side B) pairing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coefficients {
    pub attack_scale: f32,
    pub defense_scale: f32,
    pub variance: f32,
    /// Scales damage per round; higher means shorter battles
    pub pace: f32,
    /// Favors side A above 1.0; applied with a square-root damped exponent
    pub ratio_tilt: f32,
    pub ema_rounds: Option<f32>,
    pub ema_ratio: Option<f32>,
    pub samples: u32,
}

impl Default for Coefficients {
    fn default() -> Self {
        Self {
            attack_scale: 1.0,
            defense_scale: 1.0,
            variance: 0.15,
            pace: 1.0,
            ratio_tilt: 1.0,
            ema_rounds: None,
            ema_ratio: None,
            samples: 0,
        }
    }
}

impl Coefficients {
    /// Same coefficients seen from side B
    pub fn flipped(&self) -> Self {
        Self {
            ratio_tilt: 1.0 / self.ratio_tilt,
            ema_ratio: self.ema_ratio.map(|r| 1.0 / r),
            ..*self
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    SideA,
    SideB,
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub outcome: Outcome,
    pub rounds: u32,
    pub hp_a: f32,
    pub hp_b: f32,
    /// Total damage side A dealt
    pub dealt_by_a: f32,
    /// Total damage side B dealt
    pub dealt_by_b: f32,
}

impl Estimate {
    /// Damage dealt by A over damage dealt by B, bounded
    pub fn damage_ratio(&self) -> f32 {
        damage_ratio(self.dealt_by_a, self.dealt_by_b)
    }
}

pub fn damage_ratio(by_a: f32, by_b: f32) -> f32 {
    (by_a.max(1e-3) / by_b.max(1e-3)).clamp(1.0 / RATIO_LIMIT, RATIO_LIMIT)
}

fn power(side: &ArmyStats, coeffs: &Coefficients) -> f32 {
    side.atk.max(0.0) * coeffs.attack_scale * (1.0 + RANGE_BONUS * side.range.max(0.0))
}

fn round_damage(attacker: &ArmyStats, defender: &ArmyStats, coeffs: &Coefficients, tilt: f32) -> f32 {
    let power = power(attacker, coeffs);
    let guard = defender.def.max(0.0) * coeffs.defense_scale;
    if power <= 0.0 {
        return 0.0;
    }
    BASE_DAMAGE_RATE * coeffs.pace * tilt * power * power / (power + guard)
}

/// Run the seeded estimate
pub fn estimate(a: &ArmyStats, b: &ArmyStats, coeffs: &Coefficients, seed: u64) -> Estimate {
    let mut rng = BattleRng::for_stream(seed, 0, RngStream::Autoresolve);
    let tilt_a = coeffs.ratio_tilt.clamp(TILT_MIN, TILT_MAX).sqrt();
    let tilt_b = 1.0 / tilt_a;
    let base_a = round_damage(a, b, coeffs, tilt_a);
    let base_b = round_damage(b, a, coeffs, tilt_b);

    let mut hp_a = a.hp.max(0.0);
    let mut hp_b = b.hp.max(0.0);
    let mut dealt_by_a = 0.0;
    let mut dealt_by_b = 0.0;
    let mut rounds = 0;

    while rounds < MAX_ROUNDS && hp_a > 0.0 && hp_b > 0.0 {
        rounds += 1;
        let roll_a = 1.0 + coeffs.variance * (rng.gen::<f32>() * 2.0 - 1.0);
        let roll_b = 1.0 + coeffs.variance * (rng.gen::<f32>() * 2.0 - 1.0);
        let to_b = (base_a * roll_a).min(hp_b);
        let to_a = (base_b * roll_b).min(hp_a);
        hp_b -= to_b;
        hp_a -= to_a;
        dealt_by_a += to_b;
        dealt_by_b += to_a;
    }

    let frac_a = if a.hp > 0.0 { hp_a / a.hp } else { 0.0 };
    let frac_b = if b.hp > 0.0 { hp_b / b.hp } else { 0.0 };
    let outcome = if (frac_a - frac_b).abs() < f32::EPSILON {
        Outcome::Draw
    } else if frac_a > frac_b {
        Outcome::SideA
    } else {
        Outcome::SideB
    };

    Estimate {
        outcome,
        rounds,
        hp_a,
        hp_b,
        dealt_by_a,
        dealt_by_b,
    }
}
