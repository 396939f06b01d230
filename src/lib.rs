//! Battle Intel - tactical decision engine for AI-controlled battle factions
//!
//! The host battle loop owns a `BattleSnapshot` and one `AiRuntime` per AI
//! faction, calling `tick` once per simulation step. `autoresolve` estimates
//! outcomes for battles that are not fought tactically.

pub mod autoresolve;
pub mod battle;
pub mod core;
