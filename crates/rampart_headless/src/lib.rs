//! Headless battle runner for AI agents and CI verification.
//!
//! This crate drives a [`rampart_core::session::Session`] without any
//! presentation layer. It can be controlled via JSON commands on stdin,
//! with battle state output on stdout. This enables:
//!
//! - **AI testing**: An agent can play a level without graphics
//! - **CI verification**: Scripted build orders checked for outcome and
//!   determinism
//! - **Balance runs**: The same level replayed with different builds
//!
//! # Protocol
//!
//! Communication uses JSON lines (one JSON object per line):
//!
//! - **stdin**: Commands from controller (load, place, tick, etc.)
//! - **stdout**: Responses and state (JSON)
//! - **stderr**: Debug logs (human-readable)
//!
//! See the [`protocol`] module for every command and response.
//!
//! # Example
//!
//! ```bash
//! # Run interactively
//! echo '{"cmd":"tick","count":60}' | cargo run -p rampart_headless
//!
//! # Start with a level loaded
//! cargo run -p rampart_headless -- run --level levels/meadow.ron
//!
//! # Play a build order to the end
//! cargo run -p rampart_headless -- play --level levels/meadow.ron --build archer@6,4
//! ```

pub mod level_loader;
pub mod play;
pub mod protocol;
pub mod runner;

pub use level_loader::{load_game_data, load_level, LevelLoadError};
pub use play::{play_level, BuildStep, PlayConfig, PlayReport};
pub use protocol::{Command, Response};
pub use runner::{HeadlessConfig, HeadlessRunner};
