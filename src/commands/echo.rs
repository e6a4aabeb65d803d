use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Returns `message` as a bulk string.
///
/// Ref: <https://redis.io/docs/latest/commands/echo>
#[derive(Debug, PartialEq)]
pub struct Echo {
    pub message: Bytes,
}

impl Executable for Echo {
    fn exec(self, _ctx: &Context) -> Result<Frame, Error> {
        Ok(Frame::Bulk(self.message))
    }
}

impl TryFrom<&mut CommandParser> for Echo {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let message = parser.next_bytes()?;
        Ok(Self { message })
    }
}

#[cfg(test)]
mod tests {
    use crate::commands::{Command, CommandParserError};
    use crate::config::Config;

    use super::*;

    #[test]
    fn echoes_message() {
        let frame = Frame::Array(vec![
            Frame::Bulk(Bytes::from("ECHO")),
            Frame::Bulk(Bytes::from("hey\r\nthere")),
        ]);
        let cmd = Command::try_from(frame).unwrap();

        assert_eq!(
            cmd,
            Command::Echo(Echo {
                message: Bytes::from("hey\r\nthere")
            })
        );

        let ctx = Context::new(Config::default());
        let res = cmd.exec(&ctx).unwrap();

        assert_eq!(res, Frame::Bulk(Bytes::from("hey\r\nthere")));
    }

    #[test]
    fn missing_message() {
        let frame = Frame::Array(vec![Frame::Bulk(Bytes::from("ECHO"))]);
        let err = Command::try_from(frame).err().unwrap();
        let err = err.downcast_ref::<CommandParserError>().unwrap();

        assert_eq!(*err, CommandParserError::EndOfStream);
    }
}
