pub mod config;
pub mod echo;
pub mod executable;
pub mod get;
pub mod keys;
pub mod ping;
pub mod set;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

use config::ConfigGet;
use echo::Echo;
use get::Get;
use keys::Keys;
use ping::Ping;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Get(Get),
    Keys(Keys),
    Set(Set),

    Config(ConfigGet),
    Echo(Echo),
    Ping(Ping),
}

impl Executable for Command {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        match self {
            Command::Config(cmd) => cmd.exec(ctx),
            Command::Echo(cmd) => cmd.exec(ctx),
            Command::Get(cmd) => cmd.exec(ctx),
            Command::Keys(cmd) => cmd.exec(ctx),
            Command::Ping(cmd) => cmd.exec(ctx),
            Command::Set(cmd) => cmd.exec(ctx),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = Error;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the Redis server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                }
                .into())
            }
        };

        let parser = &mut CommandParser {
            parts: frames.into_iter(),
        };

        let command_name = parser.parse_command_name()?;

        match &command_name[..] {
            "config" => ConfigGet::try_from(parser).map(Command::Config),
            "echo" => Echo::try_from(parser).map(Command::Echo),
            "get" => Get::try_from(parser).map(Command::Get),
            "keys" => Keys::try_from(parser).map(Command::Keys),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            "set" => Set::try_from(parser).map(Command::Set),
            _ => Err(CommandParserError::UnknownCommand {
                command: command_name,
            }
            .into()),
        }
    }
}

pub(crate) struct CommandParser {
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn parse_command_name(&mut self) -> Result<String, CommandParserError> {
        let command_name = self.next_string()?;
        Ok(command_name.to_lowercase())
    }

    fn next_frame(&mut self) -> Result<Frame, CommandParserError> {
        self.parts.next().ok_or(CommandParserError::EndOfStream)
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        match self.next_frame()? {
            // Both `Simple` and `Bulk` representation may be strings. Strings are parsed to UTF-8.
            // While errors are stored as strings, they are considered separate types.
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map(|s| s.to_string())
                .map_err(CommandParserError::InvalidUTF8String),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_integer(&mut self) -> Result<i64, CommandParserError> {
        match self.next_frame()? {
            Frame::Integer(i) => Ok(i),
            Frame::Simple(string) => {
                string
                    .parse::<i64>()
                    .map_err(|_| CommandParserError::InvalidFrame {
                        expected: "parseable i64 frame".to_string(),
                        actual: Frame::Simple(string),
                    })
            }
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map_err(CommandParserError::InvalidUTF8String)?
                .parse::<i64>()
                .map_err(|_| CommandParserError::InvalidFrame {
                    expected: "parseable i64 frame".to_string(),
                    actual: Frame::Bulk(bytes),
                }),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "integer".to_string(),
                actual: frame,
            }),
        }
    }

    /// Keys and values are binary safe, they are kept as raw bytes.
    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        match self.next_frame()? {
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    /// Like `next_bytes`, but a missing argument is `None` instead of an error.
    fn next_optional_bytes(&mut self) -> Result<Option<Bytes>, CommandParserError> {
        match self.next_bytes() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(CommandParserError::EndOfStream) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub(crate) enum CommandParserError {
    #[error("protocol error; invalid frame, expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("protocol error; unknown command {command}")]
    UnknownCommand { command: String },
    #[error("protocol error; invalid command argument {command} {argument}")]
    InvalidCommandArgument { command: String, argument: String },
    #[error("protocol error; invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("protocol error; attempting to extract a value failed due to the frame being fully consumed")]
    EndOfStream,
}
