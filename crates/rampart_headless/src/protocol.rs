//! JSON protocol for headless battle control.
//!
//! The headless runner communicates via JSON lines (one JSON object per line):
//!
//! **Input (stdin):** Commands from the controller
//! **Output (stdout):** Responses and battle state
//!
//! # Protocol Flow
//!
//! 1. Runner starts, outputs `{"type":"ready","version":"1.0","tick":0}`
//! 2. Controller loads a level and sends commands as JSON lines
//! 3. Runner answers every command with exactly one line, plus a
//!    `game_over` line on the tick the battle ends
//!
//! # Example Session
//!
//! ```text
//! <- {"type":"ready","version":"1.0","tick":0}
//! -> {"cmd":"load","path":"levels/meadow.ron"}
//! <- {"type":"loaded","level":"meadow","status":"ready"}
//! -> {"cmd":"place","tower":"archer","x":6,"y":4}
//! <- {"type":"placed","id":3}
//! -> {"cmd":"call_wave"}
//! <- {"type":"wave_called","wave":0}
//! -> {"cmd":"tick","count":60}
//! <- {"type":"ticked","tick":60,"summary":{"spawned":2,...}}
//! -> {"cmd":"query"}
//! <- {"type":"state","snapshot":{...},"hash":1234}
//! ```

use rampart_core::data::{Branch, SpellKind, TowerKind, TowerTier};
use rampart_core::events::{TickEvents, WaveEvent};
use rampart_core::outcome::BattleResult;
use rampart_core::session::StartOutcome;
use rampart_core::snapshot::SessionSnapshot;
use serde::{Deserialize, Serialize};

/// Protocol revision reported in the `ready` line.
pub const PROTOCOL_VERSION: &str = "1.0";

// ============================================================================
// Input Commands (Controller -> Runner)
// ============================================================================

/// Commands that can be sent to the headless runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Command {
    /// Load a level RON file and reset the battle.
    Load { path: String },

    /// Advance the battle by N ticks (default: 1).
    Tick {
        #[serde(default = "default_tick_count")]
        count: u32,
    },

    /// Report the current state without advancing time.
    Query,

    /// Build a tower on a grid tile.
    Place { tower: TowerKind, x: i32, y: i32 },

    /// Upgrade a tower; `branch` is required at tier 3.
    Upgrade {
        id: u64,
        #[serde(default)]
        branch: Option<Branch>,
    },

    /// Sell a tower.
    Sell { id: u64 },

    /// Cast a spell at a world position.
    Cast { spell: SpellKind, x: f64, y: f64 },

    /// Start the first wave or call the next one early.
    CallWave,

    /// Move the hero's rally point to a world position.
    MoveHero { x: f64, y: f64 },

    /// Trigger the hero's ability.
    Ability,

    /// Freeze the battle clock.
    Pause,

    /// Unfreeze the battle clock.
    Resume,

    /// Set game speed multiplier.
    Speed { multiplier: f64 },

    /// Return the level to its starting condition.
    Reset {
        #[serde(default)]
        camera: bool,
        #[serde(default)]
        history: bool,
    },

    /// Report the state hash (for determinism verification).
    Hash,

    /// Quit the runner.
    Quit,
}

fn default_tick_count() -> u32 {
    1
}

// ============================================================================
// Output Responses (Runner -> Controller)
// ============================================================================

/// What happened over one `tick` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TickSummary {
    /// Enemies spawned.
    pub spawned: u32,
    /// Enemies killed.
    pub kills: u32,
    /// Enemies that escaped.
    pub escaped: u32,
    /// Lives lost.
    pub lives_lost: u32,
    /// Gold earned.
    pub gold_earned: u32,
    /// Troops that fell.
    pub troops_lost: u32,
    /// Waves activated.
    pub waves_started: u32,
    /// Waves whose population reached zero.
    pub waves_cleared: u32,
}

impl TickSummary {
    /// Fold one tick's events into the summary.
    pub fn absorb(&mut self, events: &TickEvents) {
        let count = |n: usize| u32::try_from(n).unwrap_or(u32::MAX);
        self.spawned += count(events.spawned.len());
        self.kills += count(events.kills.len());
        self.escaped += count(events.escaped.len());
        self.lives_lost += events.lives_lost;
        self.gold_earned += events.gold_earned;
        self.troops_lost += count(events.troops_lost.len());
        for wave in &events.waves {
            match wave {
                WaveEvent::Started(_) => self.waves_started += 1,
                WaveEvent::Cleared(_) => self.waves_cleared += 1,
                WaveEvent::SpawnsFinished(_) | WaveEvent::AllComplete => {}
            }
        }
    }
}

/// Responses sent from the headless runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Runner is ready to receive commands.
    Ready { version: String, tick: u64 },

    /// Command acknowledged.
    Ack { cmd: String },

    /// Level loaded.
    Loaded { level: String, status: StartOutcome },

    /// Tower built.
    Placed { id: u64 },

    /// Tower upgraded.
    Upgraded { id: u64, tier: TowerTier },

    /// Tower sold.
    Sold { id: u64, refund: u32 },

    /// Wave started.
    WaveCalled { wave: usize },

    /// Hero ability used.
    Taunted { enemies: usize },

    /// Speed applied after clamping.
    SpeedSet { multiplier: f64 },

    /// Ticks ran.
    Ticked { tick: u64, summary: TickSummary },

    /// Error occurred.
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
    },

    /// Full battle state.
    State {
        snapshot: Box<SessionSnapshot>,
        hash: u64,
    },

    /// Battle ended.
    GameOver { result: BattleResult },

    /// State hash for determinism check.
    StateHash { tick: u64, hash: u64 },

    /// Runner is shutting down.
    Bye,
}

impl Response {
    /// Create a ready response.
    pub fn ready(tick: u64) -> Self {
        Self::Ready {
            version: PROTOCOL_VERSION.to_string(),
            tick,
        }
    }

    /// Create an acknowledgment.
    pub fn ack(cmd: &str) -> Self {
        Self::Ack {
            cmd: cmd.to_string(),
        }
    }

    /// Create an error response.
    pub fn error(message: impl Into<String>, cmd: Option<&str>) -> Self {
        Self::Error {
            message: message.into(),
            cmd: cmd.map(String::from),
        }
    }

    /// Serialize to JSON line (with newline).
    pub fn to_json_line(&self) -> String {
        let mut json = serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"type":"error","message":"Serialization failed: {e}"}}"#)
        });
        json.push('\n');
        json
    }
}

impl Command {
    /// Parse from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Get command name for acknowledgment.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Tick { .. } => "tick",
            Self::Query => "query",
            Self::Place { .. } => "place",
            Self::Upgrade { .. } => "upgrade",
            Self::Sell { .. } => "sell",
            Self::Cast { .. } => "cast",
            Self::CallWave => "call_wave",
            Self::MoveHero { .. } => "move_hero",
            Self::Ability => "ability",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Speed { .. } => "speed",
            Self::Reset { .. } => "reset",
            Self::Hash => "hash",
            Self::Quit => "quit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tick_command() {
        let json = r#"{"cmd":"tick","count":60}"#;
        let cmd = Command::from_json(json).unwrap();
        assert_eq!(cmd, Command::Tick { count: 60 });
    }

    #[test]
    fn test_tick_count_defaults_to_one() {
        let cmd = Command::from_json(r#"{"cmd":"tick"}"#).unwrap();
        assert_eq!(cmd, Command::Tick { count: 1 });
    }

    #[test]
    fn test_parse_place_command() {
        let json = r#"{"cmd":"place","tower":"cannon","x":6,"y":4}"#;
        let cmd = Command::from_json(json).unwrap();
        assert_eq!(
            cmd,
            Command::Place {
                tower: TowerKind::Cannon,
                x: 6,
                y: 4
            }
        );
        assert_eq!(cmd.name(), "place");
    }

    #[test]
    fn test_parse_upgrade_with_branch() {
        let json = r#"{"cmd":"upgrade","id":7,"branch":"b"}"#;
        let cmd = Command::from_json(json).unwrap();
        assert_eq!(
            cmd,
            Command::Upgrade {
                id: 7,
                branch: Some(Branch::B)
            }
        );
    }

    #[test]
    fn test_reset_flags_default_to_retry() {
        let cmd = Command::from_json(r#"{"cmd":"reset"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::Reset {
                camera: false,
                history: false
            }
        );
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        assert!(Command::from_json(r#"{"cmd":"teleport"}"#).is_err());
        assert!(Command::from_json(r#"{"cmd":"place","tower":"catapult","x":1,"y":1}"#).is_err());
    }

    #[test]
    fn test_serialize_error_response() {
        let resp = Response::error("Insufficient gold", Some("place"));
        let json = resp.to_json_line();
        assert!(json.ends_with('\n'));
        assert!(json.contains(r#""type":"error""#));
        assert!(json.contains(r#""cmd":"place""#));

        let bare = Response::error("Parse error", None).to_json_line();
        assert!(!bare.contains("cmd"));
    }

    #[test]
    fn test_serialize_loaded_response() {
        let resp = Response::Loaded {
            level: "meadow".to_string(),
            status: StartOutcome::NoWaveContent,
        };
        let json = resp.to_json_line();
        assert!(json.contains(r#""type":"loaded""#));
        assert!(json.contains(r#""status":"no_wave_content""#));
    }

    #[test]
    fn test_summary_counts_wave_transitions() {
        let events = TickEvents {
            waves: vec![
                WaveEvent::Cleared(0),
                WaveEvent::Started(1),
                WaveEvent::SpawnsFinished(1),
            ],
            lives_lost: 2,
            gold_earned: 12,
            ..TickEvents::default()
        };
        let mut summary = TickSummary::default();
        summary.absorb(&events);
        summary.absorb(&events);
        assert_eq!(summary.waves_started, 2);
        assert_eq!(summary.waves_cleared, 2);
        assert_eq!(summary.lives_lost, 4);
        assert_eq!(summary.gold_earned, 24);
    }
}
