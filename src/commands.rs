//! Console controls
//! This module maps the user's typed commands (the open/close/clear buttons and
//! friends) onto the Bluetooth manager.

use std::io::Write;
use std::str::FromStr;

use thiserror::Error;

use crate::core::bluetooth::Command;
use crate::state::AppState;

pub const HELP: &str = "\
Commands:
  o, open         open the door
  f, close        close the door
  send <char>     send any single ASCII command
  r, read         read the characteristic
  c, clear        clear the message log
  connect         connect to the door
  d, disconnect   disconnect from the door
  s, status       show the connection state
  h, help         show this help
  q, quit         exit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiCommand {
    Open,
    Close,
    Send(char),
    Read,
    Clear,
    Connect,
    Disconnect,
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseCommandError {
    #[error("empty command")]
    Empty,
    #[error("`send` takes exactly one character")]
    BadSendArgument,
    #[error("unknown command {0:?}, type `help`")]
    Unknown(String),
}

impl FromStr for UiCommand {
    type Err = ParseCommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(word) = words.next() else {
            return Err(ParseCommandError::Empty);
        };

        let command = match word.to_lowercase().as_str() {
            "o" | "open" => UiCommand::Open,
            "f" | "close" => UiCommand::Close,
            "send" => {
                let argument = words.next().ok_or(ParseCommandError::BadSendArgument)?;
                let mut chars = argument.chars();
                match (chars.next(), chars.next()) {
                    (Some(intent), None) => UiCommand::Send(intent),
                    _ => return Err(ParseCommandError::BadSendArgument),
                }
            }
            "r" | "read" => UiCommand::Read,
            "c" | "clear" => UiCommand::Clear,
            "connect" => UiCommand::Connect,
            "d" | "disconnect" => UiCommand::Disconnect,
            "s" | "status" => UiCommand::Status,
            "h" | "help" | "?" => UiCommand::Help,
            "q" | "quit" | "exit" => UiCommand::Quit,
            other => return Err(ParseCommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// What the input loop should do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Runs `command` against the application state.
pub async fn run_command(command: &UiCommand, app_state: &AppState) -> Result<Flow, String> {
    let bluetooth_manager = app_state.get_bluetooth_manager();

    match command {
        UiCommand::Open => bluetooth_manager.open().await.map_err(|e| e.to_string())?,
        UiCommand::Close => bluetooth_manager.close().await.map_err(|e| e.to_string())?,
        UiCommand::Send(intent) => {
            let command = Command::new(*intent).map_err(|e| e.to_string())?;
            bluetooth_manager.send(command).await.map_err(|e| e.to_string())?;
        }
        UiCommand::Read => bluetooth_manager.read().await.map_err(|e| e.to_string())?,
        UiCommand::Clear => {
            app_state.message_log.clear();
            print!("\x1B[2J\x1B[1;1H");
            let _ = std::io::stdout().flush();
        }
        UiCommand::Connect => bluetooth_manager.connect().await.map_err(|e| e.to_string())?,
        UiCommand::Disconnect => bluetooth_manager
            .disconnect()
            .await
            .map_err(|e| e.to_string())?,
        UiCommand::Status => println!("State: {}", bluetooth_manager.state()),
        UiCommand::Help => println!("{}", HELP),
        UiCommand::Quit => return Ok(Flow::Quit),
    }
    Ok(Flow::Continue)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_shortcuts_parse() {
        assert_eq!("o".parse(), Ok(UiCommand::Open));
        assert_eq!("CLOSE".parse(), Ok(UiCommand::Close));
        assert_eq!("  clear ".parse(), Ok(UiCommand::Clear));
        assert_eq!("q".parse(), Ok(UiCommand::Quit));
    }

    #[test]
    fn send_takes_one_character() {
        assert_eq!("send X".parse(), Ok(UiCommand::Send('X')));
        assert_eq!(
            "send".parse::<UiCommand>(),
            Err(ParseCommandError::BadSendArgument)
        );
        assert_eq!(
            "send XY".parse::<UiCommand>(),
            Err(ParseCommandError::BadSendArgument)
        );
    }

    #[test]
    fn unknown_and_empty_lines_are_errors() {
        assert_eq!("".parse::<UiCommand>(), Err(ParseCommandError::Empty));
        assert_eq!(
            "unlock".parse::<UiCommand>(),
            Err(ParseCommandError::Unknown("unlock".to_string()))
        );
    }
}
