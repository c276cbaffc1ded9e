//! Match configuration.
//!
//! A match is described by one JSON object. Every field is validated up
//! front so that a running match never has to deal with bad settings:
//! - scoring weights and the turn/cycle limits
//! - per-opcode cycle costs
//! - per-player settings (name, speed multiplier, thread cap)
//! - the base64-encoded warrior programs

use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use strum::EnumCount;
use thiserror::Error;

use crate::cpu::{Opcode, MEMORY_SIZE};

/// Configuration errors. All of them are fatal to match creation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} is not set")]
    Missing { field: String },

    #[error("{field} is out of bounds: {reason}")]
    OutOfRange { field: String, reason: String },

    #[error("{field} is invalid: {reason}")]
    Malformed { field: String, reason: String },

    #[error("{name} is larger than the max size ({size} > {max} bytes)")]
    ProgramTooLarge { name: String, size: usize, max: usize },

    #[error("total size of warriors exceeds the arena ({total} > 65536 bytes)")]
    ArenaOverflow { total: usize },

    #[error("config is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    fn missing(field: &str) -> Self {
        ConfigError::Missing { field: field.to_string() }
    }

    fn out_of_range(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::OutOfRange { field: field.to_string(), reason: reason.into() }
    }

    fn malformed(field: &str, reason: impl Into<String>) -> Self {
        ConfigError::Malformed { field: field.to_string(), reason: reason.into() }
    }
}

/// Cycle cost of every opcode, indexed by its encoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleTable([u32; Opcode::COUNT]);

impl CycleTable {
    /// Cost of an opcode nobody configured.
    pub const DEFAULT_COST: u32 = 1;

    /// Cycles charged for executing `op`.
    #[inline]
    pub fn cost(&self, op: Opcode) -> u32 {
        self.0[op.bits() as usize]
    }

    /// Override the cost of `op`.
    pub fn set(&mut self, op: Opcode, cost: u32) {
        self.0[op.bits() as usize] = cost;
    }
}

impl Default for CycleTable {
    fn default() -> Self {
        Self([Self::DEFAULT_COST; Opcode::COUNT])
    }
}

/// Settings for one player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerSettings {
    pub name: String,
    /// Multiplier applied to `cycles_per_turn` for this player.
    #[serde(rename = "cycle_modifer", alias = "cycle_modifier")]
    pub cycle_modifier: f64,
    /// Most threads the player may own at once.
    pub max_threads: u8,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            cycle_modifier: 1.0,
            max_threads: 32,
        }
    }
}

impl PlayerSettings {
    /// Largest accepted `cycle_modifer`. Keeps a turn within `u32` cycles
    /// even at the maximum `cycles_per_turn`.
    pub const MAX_CYCLE_MODIFIER: f64 = 65535.0;

    /// Default settings for player `pid`.
    pub fn for_pid(pid: u8) -> Self {
        Self {
            name: format!("Player {}", pid),
            ..Self::default()
        }
    }
}

/// A validated match configuration.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub num_players: u8,
    pub cycles_per_turn: u16,
    pub max_cycles: u64,
    pub score_for_killing_thread: u32,
    pub score_for_killing_process: u32,
    pub score_for_owning_ram: f64,
    /// Largest program a single player may submit.
    pub max_player_size: usize,
    pub cycles: CycleTable,
    /// One entry per player, in pid order.
    pub players: Vec<PlayerSettings>,
    /// Decoded programs, one per player, in pid order.
    pub warriors: Vec<Vec<u8>>,
    /// Placement seed. `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl GameConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(&value)
    }

    /// Validate an already-parsed JSON configuration.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ConfigError::malformed("config", "expected a JSON object"))?;

        let num_players = read_int(obj, "num_players", 1, u8::MAX as i64)? as u8;
        let cycles_per_turn = read_int(obj, "cycles_per_turn", 1, u16::MAX as i64)? as u16;
        let max_cycles = read_int(obj, "max_cycles", 1, i64::MAX)? as u64;
        let score_for_killing_thread =
            read_int(obj, "score_for_killing_thread", 0, u32::MAX as i64)? as u32;
        let score_for_killing_process =
            read_int(obj, "score_for_killing_process", 0, u32::MAX as i64)? as u32;
        let score_for_owning_ram = read_real(obj, "score_for_owning_ram", 0.0, u32::MAX as f64)?;

        let cycles = read_cycles(obj)?;
        let players = read_players(obj, num_players)?;
        let warriors = read_warriors(obj, &players)?;

        let max_player_size = match obj.get("max_player_size") {
            None => 0,
            Some(_) => read_int(obj, "max_player_size", 0, MEMORY_SIZE as i64)? as usize,
        };
        let max_player_size = if max_player_size == 0 {
            MEMORY_SIZE / num_players as usize
        } else {
            max_player_size
        };

        let mut total = 0;
        for (settings, program) in players.iter().zip(&warriors) {
            if program.len() > max_player_size {
                return Err(ConfigError::ProgramTooLarge {
                    name: settings.name.clone(),
                    size: program.len(),
                    max: max_player_size,
                });
            }
            total += program.len();
            if total > MEMORY_SIZE {
                return Err(ConfigError::ArenaOverflow { total });
            }
        }

        let seed = match obj.get("seed") {
            None | Some(Value::Null) => None,
            Some(v) => Some(
                v.as_u64()
                    .ok_or_else(|| ConfigError::malformed("seed", "expected an unsigned integer"))?,
            ),
        };

        Ok(Self {
            num_players,
            cycles_per_turn,
            max_cycles,
            score_for_killing_thread,
            score_for_killing_process,
            score_for_owning_ram,
            max_player_size,
            cycles,
            players,
            warriors,
            seed,
        })
    }

    /// Combined size of every warrior program.
    pub fn total_size(&self) -> usize {
        self.warriors.iter().map(Vec::len).sum()
    }
}

/// Read a required integer field within `min..=max`.
fn read_int(obj: &Map<String, Value>, field: &str, min: i64, max: i64) -> Result<i64, ConfigError> {
    let value = obj.get(field).ok_or_else(|| ConfigError::missing(field))?;
    let n = match value.as_i64() {
        Some(n) => n,
        None if value.is_u64() => {
            return Err(ConfigError::out_of_range(field, format!("must be at most {}", max)))
        }
        None => return Err(ConfigError::malformed(field, "expected an integer")),
    };
    if n < min || n > max {
        return Err(ConfigError::out_of_range(
            field,
            format!("{} is not within {}..={}", n, min, max),
        ));
    }
    Ok(n)
}

/// Read a required real field within `min..=max`.
fn read_real(obj: &Map<String, Value>, field: &str, min: f64, max: f64) -> Result<f64, ConfigError> {
    let value = obj.get(field).ok_or_else(|| ConfigError::missing(field))?;
    let x = value
        .as_f64()
        .ok_or_else(|| ConfigError::malformed(field, "expected a number"))?;
    if !(min..=max).contains(&x) {
        return Err(ConfigError::out_of_range(
            field,
            format!("{} is not within {}..={}", x, min, max),
        ));
    }
    Ok(x)
}

fn read_cycles(obj: &Map<String, Value>) -> Result<CycleTable, ConfigError> {
    let mut table = CycleTable::default();
    let costs = match obj.get("cycles") {
        None | Some(Value::Null) => return Ok(table),
        Some(Value::Object(costs)) => costs,
        Some(_) => return Err(ConfigError::malformed("cycles", "expected an object")),
    };

    for name in costs.keys() {
        let field = format!("cycles.{}", name);
        let op = Opcode::from_str(&name.to_uppercase())
            .map_err(|_| ConfigError::malformed(&field, "unknown opcode"))?;
        let cost = read_int(costs, name, 1, u32::MAX as i64).map_err(|e| rename(e, &field))?;
        table.set(op, cost as u32);
    }
    Ok(table)
}

fn read_players(obj: &Map<String, Value>, num_players: u8) -> Result<Vec<PlayerSettings>, ConfigError> {
    let entries: &[Value] = match obj.get("player_settings") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(entries)) => entries,
        Some(_) => return Err(ConfigError::malformed("player_settings", "expected an array")),
    };

    let mut players = Vec::with_capacity(num_players as usize);
    for i in 0..num_players {
        let pid = i + 1;
        let field = format!("player_settings[{}]", i);
        let mut settings = match entries.get(i as usize) {
            None | Some(Value::Null) => PlayerSettings::for_pid(pid),
            Some(entry) => PlayerSettings::deserialize(entry)
                .map_err(|e| ConfigError::malformed(&field, e.to_string()))?,
        };

        if settings.name.is_empty() {
            settings.name = format!("Player {}", pid);
        }
        if !(0.0..=PlayerSettings::MAX_CYCLE_MODIFIER).contains(&settings.cycle_modifier) {
            return Err(ConfigError::out_of_range(
                &format!("{}.cycle_modifer", field),
                format!("must be within 0..={}", PlayerSettings::MAX_CYCLE_MODIFIER),
            ));
        }
        if settings.max_threads == 0 {
            return Err(ConfigError::out_of_range(
                &format!("{}.max_threads", field),
                "must be at least 1",
            ));
        }
        players.push(settings);
    }
    Ok(players)
}

fn read_warriors(obj: &Map<String, Value>, players: &[PlayerSettings]) -> Result<Vec<Vec<u8>>, ConfigError> {
    let encoded = match obj.get("warriors") {
        None => return Err(ConfigError::missing("warriors")),
        Some(Value::Array(encoded)) => encoded,
        Some(_) => return Err(ConfigError::malformed("warriors", "expected an array")),
    };
    if encoded.len() < players.len() {
        return Err(ConfigError::malformed(
            "warriors",
            format!("expected {} programs, found {}", players.len(), encoded.len()),
        ));
    }

    players
        .iter()
        .zip(encoded)
        .enumerate()
        .map(|(i, (settings, value))| {
            let field = format!("warriors[{}]", i);
            let text = value
                .as_str()
                .ok_or_else(|| ConfigError::malformed(&field, "expected a base64 string"))?;
            let program = STANDARD
                .decode(text)
                .map_err(|e| ConfigError::malformed(&field, e.to_string()))?;
            if program.is_empty() {
                return Err(ConfigError::malformed(
                    &field,
                    format!("{} did not decode properly", settings.name),
                ));
            }
            Ok(program)
        })
        .collect()
}

/// Report a nested field under its full dotted name.
fn rename(err: ConfigError, field: &str) -> ConfigError {
    match err {
        ConfigError::Missing { .. } => ConfigError::missing(field),
        ConfigError::OutOfRange { reason, .. } => ConfigError::out_of_range(field, reason),
        ConfigError::Malformed { reason, .. } => ConfigError::malformed(field, reason),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base() -> Value {
        json!({
            "num_players": 2,
            "cycles_per_turn": 4,
            "max_cycles": 1000,
            "score_for_killing_thread": 10,
            "score_for_killing_process": 100,
            "score_for_owning_ram": 0.5,
            "warriors": ["AA==", "fAA="],
        })
    }

    fn with(field: &str, value: Value) -> Value {
        let mut config = base();
        config[field] = value;
        config
    }

    fn field_of(err: ConfigError) -> String {
        match err {
            ConfigError::Missing { field }
            | ConfigError::OutOfRange { field, .. }
            | ConfigError::Malformed { field, .. } => field,
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_minimal_config() {
        let config = GameConfig::from_value(&base()).unwrap();
        assert_eq!(config.num_players, 2);
        assert_eq!(config.cycles_per_turn, 4);
        assert_eq!(config.max_cycles, 1000);
        assert_eq!(config.score_for_owning_ram, 0.5);
        assert_eq!(config.max_player_size, 0x8000);
        assert_eq!(config.warriors, vec![vec![0x00], vec![0x7C, 0x00]]);
        assert_eq!(config.players[1], PlayerSettings::for_pid(2));
        assert_eq!(config.cycles, CycleTable::default());
        assert_eq!(config.seed, None);
        assert_eq!(config.total_size(), 3);
    }

    #[test]
    fn test_from_json_text() {
        let config = GameConfig::from_json(&base().to_string()).unwrap();
        assert_eq!(config.num_players, 2);

        assert!(matches!(GameConfig::from_json("{"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_field() {
        let mut config = base();
        config.as_object_mut().unwrap().remove("max_cycles");
        let err = GameConfig::from_value(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { ref field } if field == "max_cycles"));
        assert_eq!(err.to_string(), "max_cycles is not set");
    }

    #[test]
    fn test_out_of_range() {
        let err = GameConfig::from_value(&with("num_players", json!(0))).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
        assert_eq!(field_of(err), "num_players");

        let err = GameConfig::from_value(&with("cycles_per_turn", json!(65536))).unwrap_err();
        assert_eq!(field_of(err), "cycles_per_turn");

        let err = GameConfig::from_value(&with("score_for_owning_ram", json!(-1.0))).unwrap_err();
        assert_eq!(field_of(err), "score_for_owning_ram");

        let err = GameConfig::from_value(&with("max_cycles", json!(u64::MAX))).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
    }

    #[test]
    fn test_malformed() {
        let err = GameConfig::from_value(&with("num_players", json!("two"))).unwrap_err();
        assert!(matches!(err, ConfigError::Malformed { .. }));
        assert_eq!(field_of(err), "num_players");

        let err = GameConfig::from_value(&json!([1, 2])).unwrap_err();
        assert_eq!(field_of(err), "config");
    }

    #[test]
    fn test_cycle_table() {
        let config = GameConfig::from_value(&with("cycles", json!({"ADD": 3, "div": 7}))).unwrap();
        assert_eq!(config.cycles.cost(Opcode::Add), 3);
        assert_eq!(config.cycles.cost(Opcode::Div), 7);
        assert_eq!(config.cycles.cost(Opcode::Nop), 1);

        let err = GameConfig::from_value(&with("cycles", json!({"FOO": 3}))).unwrap_err();
        assert_eq!(field_of(err), "cycles.FOO");

        let err = GameConfig::from_value(&with("cycles", json!({"ADD": 0}))).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
        assert_eq!(field_of(err), "cycles.ADD");
    }

    #[test]
    fn test_player_settings() {
        let config = GameConfig::from_value(&with(
            "player_settings",
            json!([{"name": "Imp", "cycle_modifer": 1.5, "max_threads": 4}]),
        ))
        .unwrap();
        assert_eq!(config.players[0].name, "Imp");
        assert_eq!(config.players[0].cycle_modifier, 1.5);
        assert_eq!(config.players[0].max_threads, 4);
        assert_eq!(config.players[1].name, "Player 2");
        assert_eq!(config.players[1].max_threads, 32);
    }

    #[test]
    fn test_bad_player_settings() {
        let err = GameConfig::from_value(&with("player_settings", json!([{}, {"max_threads": 0}])))
            .unwrap_err();
        assert_eq!(field_of(err), "player_settings[1].max_threads");

        let err = GameConfig::from_value(&with("player_settings", json!([{"max_threads": 300}])))
            .unwrap_err();
        assert_eq!(field_of(err), "player_settings[0]");

        let err = GameConfig::from_value(&with("player_settings", json!([{"cycle_modifer": -2}])))
            .unwrap_err();
        assert_eq!(field_of(err), "player_settings[0].cycle_modifer");

        let err = GameConfig::from_value(&with("player_settings", json!([{"cycle_modifer": 1e9}])))
            .unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));
        assert_eq!(field_of(err), "player_settings[0].cycle_modifer");
    }

    #[test]
    fn test_warriors() {
        let err = GameConfig::from_value(&with("warriors", json!(["AA=="]))).unwrap_err();
        assert_eq!(field_of(err), "warriors");

        let err = GameConfig::from_value(&with("warriors", json!(["AA==", "!!"]))).unwrap_err();
        assert_eq!(field_of(err), "warriors[1]");

        let err = GameConfig::from_value(&with("warriors", json!(["", "AA=="]))).unwrap_err();
        assert_eq!(field_of(err), "warriors[0]");

        // Extra programs are ignored.
        let config = GameConfig::from_value(&with("warriors", json!(["AA==", "AA==", "AA=="]))).unwrap();
        assert_eq!(config.warriors.len(), 2);
    }

    #[test]
    fn test_program_size_limits() {
        let mut config = with("max_player_size", json!(1));
        let err = GameConfig::from_value(&config).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ProgramTooLarge { ref name, size: 2, max: 1 } if name == "Player 2"
        ));

        config["max_player_size"] = json!(0);
        assert_eq!(GameConfig::from_value(&config).unwrap().max_player_size, 0x8000);

        let big = STANDARD.encode(vec![0u8; 0x8001]);
        let err = GameConfig::from_value(&with("warriors", json!([big, "AA=="]))).unwrap_err();
        assert!(matches!(err, ConfigError::ProgramTooLarge { size: 0x8001, .. }));
    }

    #[test]
    fn test_arena_overflow() {
        let half = STANDARD.encode(vec![0u8; 0x8000]);
        let mut config = with("warriors", json!([half, half, "AA=="]));
        config["num_players"] = json!(3);
        config["max_player_size"] = json!(0x8000);
        let err = GameConfig::from_value(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ArenaOverflow { total: 0x10001 }));
    }

    #[test]
    fn test_seed() {
        let config = GameConfig::from_value(&with("seed", json!(42))).unwrap();
        assert_eq!(config.seed, Some(42));

        let err = GameConfig::from_value(&with("seed", json!(-1))).unwrap_err();
        assert_eq!(field_of(err), "seed");
    }
}
