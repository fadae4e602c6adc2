//! Headless runner implementation.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use rampart_core::data::GameData;
use rampart_core::geometry::GridPoint;
use rampart_core::math::{Fixed, Vec2Fixed};
use rampart_core::session::{ResetOptions, Session};

use crate::level_loader::{load_game_data, load_level, LevelLoadError};
use crate::protocol::{Command, Response, TickSummary};

/// Headless runner configuration.
#[derive(Debug, Clone, Default)]
pub struct HeadlessConfig {
    /// Output full state after every tick command (vs only on query).
    pub auto_state_output: bool,
    /// Level file to load on startup.
    pub level_path: Option<PathBuf>,
    /// Stat table file; built-in tables when absent.
    pub data_path: Option<PathBuf>,
}

/// Headless runner driving one session from JSON lines.
pub struct HeadlessRunner {
    config: HeadlessConfig,
    session: Session,
}

fn world_point(x: f64, y: f64) -> Result<Vec2Fixed, String> {
    match (Fixed::checked_from_num(x), Fixed::checked_from_num(y)) {
        (Some(x), Some(y)) => Ok(Vec2Fixed::new(x, y)),
        _ => Err(format!("Position ({x}, {y}) is out of range")),
    }
}

impl HeadlessRunner {
    /// Create a runner with the built-in tables and no level loaded.
    pub fn new() -> Self {
        Self {
            config: HeadlessConfig::default(),
            session: Session::default(),
        }
    }

    /// Create a runner with custom configuration, loading the configured
    /// tables and level.
    pub fn with_config(config: HeadlessConfig) -> Result<Self, LevelLoadError> {
        let data = load_game_data(config.data_path.as_deref())?;
        let mut runner = Self {
            session: Session::new(data),
            config,
        };
        if let Some(path) = runner.config.level_path.clone() {
            runner.load(&path)?;
        }
        Ok(runner)
    }

    /// The session being driven.
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn load(&mut self, path: &Path) -> Result<Response, LevelLoadError> {
        let level = load_level(path, self.session.data())?;
        let id = level.id.clone();
        let status = self
            .session
            .start(level)
            .map_err(|source| LevelLoadError::Invalid {
                path: path.display().to_string(),
                source,
            })?;
        tracing::info!(level = %id, ?status, "Level ready");
        Ok(Response::Loaded { level: id, status })
    }

    fn state(&self) -> Response {
        Response::State {
            snapshot: Box::new(self.session.snapshot()),
            hash: self.session.state_hash(),
        }
    }

    /// Execute one command and return the lines to send back.
    pub fn handle(&mut self, command: Command) -> Vec<Response> {
        let name = command.name();
        match self.execute(command) {
            Ok(responses) => responses,
            Err(message) => vec![Response::error(message, Some(name))],
        }
    }

    fn execute(&mut self, command: Command) -> Result<Vec<Response>, String> {
        let response = match command {
            Command::Load { path } => self.load(Path::new(&path)).map_err(|e| e.to_string())?,
            Command::Tick { count } => {
                let mut summary = TickSummary::default();
                let mut result = None;
                for events in self.session.advance(count) {
                    summary.absorb(&events);
                    if events.outcome.is_some() {
                        result = events.outcome;
                    }
                }
                let mut responses = vec![if self.config.auto_state_output {
                    self.state()
                } else {
                    Response::Ticked {
                        tick: self.session.tick_count(),
                        summary,
                    }
                }];
                if let Some(result) = result {
                    responses.push(Response::GameOver { result });
                }
                return Ok(responses);
            }
            Command::Query => self.state(),
            Command::Place { tower, x, y } => {
                let id = self
                    .session
                    .place_tower(tower, GridPoint::new(x, y))
                    .map_err(|e| e.to_string())?;
                Response::Placed { id }
            }
            Command::Upgrade { id, branch } => {
                let tier = self
                    .session
                    .upgrade_tower(id, branch)
                    .map_err(|e| e.to_string())?;
                Response::Upgraded { id, tier }
            }
            Command::Sell { id } => {
                let refund = self.session.sell_tower(id).map_err(|e| e.to_string())?;
                Response::Sold { id, refund }
            }
            Command::Cast { spell, x, y } => {
                self.session
                    .cast_spell(spell, world_point(x, y)?)
                    .map_err(|e| e.to_string())?;
                Response::ack("cast")
            }
            Command::CallWave => {
                let wave = self.session.call_wave().map_err(|e| e.to_string())?;
                Response::WaveCalled { wave }
            }
            Command::MoveHero { x, y } => {
                self.session
                    .move_hero(world_point(x, y)?)
                    .map_err(|e| e.to_string())?;
                Response::ack("move_hero")
            }
            Command::Ability => {
                let enemies = self.session.hero_ability().map_err(|e| e.to_string())?;
                Response::Taunted { enemies }
            }
            Command::Pause => {
                self.session.pause().map_err(|e| e.to_string())?;
                Response::ack("pause")
            }
            Command::Resume => {
                self.session.resume().map_err(|e| e.to_string())?;
                Response::ack("resume")
            }
            Command::Speed { multiplier } => {
                let requested = Fixed::checked_from_num(multiplier)
                    .ok_or_else(|| format!("Speed {multiplier} is out of range"))?;
                let applied = self.session.set_speed(requested);
                Response::SpeedSet {
                    multiplier: applied.to_num(),
                }
            }
            Command::Reset { camera, history } => {
                self.session
                    .reset(ResetOptions {
                        reset_camera: camera,
                        reset_history: history,
                    })
                    .map_err(|e| e.to_string())?;
                Response::ack("reset")
            }
            Command::Hash => Response::StateHash {
                tick: self.session.tick_count(),
                hash: self.session.state_hash(),
            },
            Command::Quit => Response::Bye,
        };
        Ok(vec![response])
    }

    /// Run the command loop until `quit` or end of input.
    ///
    /// Reads JSON commands from `input`, writes responses to `output`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, mut output: W) -> io::Result<()> {
        let ready = Response::ready(self.session.tick_count());
        output.write_all(ready.to_json_line().as_bytes())?;
        output.flush()?;

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let mut quit = false;
            let responses = match Command::from_json(line) {
                Ok(cmd) => {
                    quit = matches!(cmd, Command::Quit);
                    tracing::debug!(cmd = cmd.name(), "Command received");
                    self.handle(cmd)
                }
                Err(e) => vec![Response::error(format!("Parse error: {e}"), None)],
            };
            for response in &responses {
                output.write_all(response.to_json_line().as_bytes())?;
            }
            output.flush()?;

            if quit {
                tracing::info!("Quit requested");
                break;
            }
        }
        Ok(())
    }

    /// Run the command loop on stdin/stdout.
    pub fn run_stdio(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let stdout = io::stdout();
        self.run(stdin.lock(), stdout.lock())
    }
}

impl Default for HeadlessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl From<GameData> for HeadlessRunner {
    fn from(data: GameData) -> Self {
        Self {
            config: HeadlessConfig::default(),
            session: Session::new(data),
        }
    }
}
