//! Battle system - hex grid, event log, and the AI that plays on it
//!
//! The host simulation owns the battle and hands the engine a typed
//! `BattleSnapshot` each tick. The engine writes back intents, morale and
//! events; it never resolves combat itself.

pub mod ai;
pub mod constants;
pub mod events;
pub mod hex;
pub mod pathfinding;
pub mod snapshot;

// Re-exports for convenient access
pub use events::{BattleEvent, BattleEventLog, BattleEventType, EventSink, HotSpot, LaneSwitchReason};
pub use hex::{HexCoord, HexDirection, HexEdge};
pub use pathfinding::{find_path, has_line_of_sight, reaches, OpenField, Passability};
pub use snapshot::{
    BattleSnapshot, CommanderPersonality, CommanderView, FactionView, Intent, TerrainCell,
    UnitRole, UnitStats, UnitTrait, UnitView, Weather,
};
