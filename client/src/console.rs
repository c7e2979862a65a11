//! Operator console: one text line per maneuver.

use shared::{Command, Orientation, TilePos};
use thiserror::Error;

pub const HELP: &str = "commands: rotate <dir> | left | right | speed <n> | stop | rcs <dir> | \
rcs-mode on|off | engines on|off | autopilot <x> <y> | autopilot off | status | quit";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConsoleError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("'{0}' needs an argument")]
    MissingArgument(&'static str),
    #[error("invalid argument '{0}'")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConsoleAction {
    Rotate(Orientation),
    /// Quarter turns relative to the current facing; positive is clockwise.
    Turn(i32),
    Speed(f32),
    Stop,
    Rcs(Orientation),
    RcsMode(bool),
    Engines(bool),
    Autopilot(Option<TilePos>),
    Status,
    Quit,
}

fn parse_switch(name: &'static str, arg: Option<&str>) -> Result<bool, ConsoleError> {
    match arg {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        Some(other) => Err(ConsoleError::InvalidArgument(other.to_string())),
        None => Err(ConsoleError::MissingArgument(name)),
    }
}

fn parse_direction(name: &'static str, arg: Option<&str>) -> Result<Orientation, ConsoleError> {
    arg.ok_or(ConsoleError::MissingArgument(name))?
        .parse()
        .map_err(|e: shared::orientation::ParseOrientationError| {
            ConsoleError::InvalidArgument(e.0)
        })
}

fn parse_number<T: std::str::FromStr>(arg: &str) -> Result<T, ConsoleError> {
    arg.parse()
        .map_err(|_| ConsoleError::InvalidArgument(arg.to_string()))
}

impl ConsoleAction {
    /// Parses one console line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Result<Option<Self>, ConsoleError> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Ok(None);
        };
        let arg = words.next();

        let action = match name.to_ascii_lowercase().as_str() {
            "rotate" => ConsoleAction::Rotate(parse_direction("rotate", arg)?),
            "left" => ConsoleAction::Turn(-1),
            "right" => ConsoleAction::Turn(1),
            "speed" => {
                let arg = arg.ok_or(ConsoleError::MissingArgument("speed"))?;
                ConsoleAction::Speed(parse_number(arg)?)
            }
            "stop" => ConsoleAction::Stop,
            "rcs" => ConsoleAction::Rcs(parse_direction("rcs", arg)?),
            "rcs-mode" => ConsoleAction::RcsMode(parse_switch("rcs-mode", arg)?),
            "engines" => ConsoleAction::Engines(parse_switch("engines", arg)?),
            "autopilot" => match arg {
                Some("off") => ConsoleAction::Autopilot(None),
                Some(x) => {
                    let y = words
                        .next()
                        .ok_or(ConsoleError::MissingArgument("autopilot"))?;
                    ConsoleAction::Autopilot(Some(TilePos::new(parse_number(x)?, parse_number(y)?)))
                }
                None => return Err(ConsoleError::MissingArgument("autopilot")),
            },
            "status" => ConsoleAction::Status,
            "quit" | "exit" => ConsoleAction::Quit,
            other => return Err(ConsoleError::UnknownCommand(other.to_string())),
        };
        Ok(Some(action))
    }

    /// Requests to send for this action, stamped with network time `now`.
    pub fn into_commands(self, facing: Orientation, resting: TilePos, now: f64) -> Vec<Command> {
        match self {
            ConsoleAction::Rotate(direction) => vec![Command::Rotate {
                facing_direction: direction,
                timestamp: now,
            }],
            ConsoleAction::Turn(steps) => vec![Command::Rotate {
                facing_direction: facing.rotate(steps),
                timestamp: now,
            }],
            ConsoleAction::Speed(speed) => vec![Command::Speed {
                speed,
                timestamp: now,
            }],
            // the stop request is only advisory, zero speed does the stopping
            ConsoleAction::Stop => vec![
                Command::Speed {
                    speed: 0.0,
                    timestamp: now,
                },
                Command::Stop {
                    proposed_stop_tile: resting,
                },
            ],
            ConsoleAction::Rcs(direction) => vec![Command::RcsMove {
                direction,
                timestamp: now,
            }],
            ConsoleAction::RcsMode(on) => vec![Command::RcsMode { on }],
            ConsoleAction::Engines(on) => vec![Command::Engines { on }],
            ConsoleAction::Autopilot(target) => vec![Command::Autopilot { target }],
            ConsoleAction::Status | ConsoleAction::Quit => Vec::new(),
        }
    }
}
