use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// `CONFIG GET parameter`. Replies with the parameter name and its value, or an empty array for
/// parameters the server does not know. Only `dir` and `dbfilename` are exposed.
///
/// Ref: <https://redis.io/docs/latest/commands/config-get>
#[derive(Debug, PartialEq)]
pub struct ConfigGet {
    pub param: String,
}

impl Executable for ConfigGet {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let res = match ctx.config.get(&self.param) {
            Some(value) => Frame::bulk_array([
                Bytes::from(self.param),
                Bytes::copy_from_slice(value.as_bytes()),
            ]),
            None => Frame::Array(vec![]),
        };

        Ok(res)
    }
}

impl TryFrom<&mut CommandParser> for ConfigGet {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let subcommand = parser.next_string()?;
        if !subcommand.eq_ignore_ascii_case("get") {
            return Err(CommandParserError::InvalidCommandArgument {
                command: "config".to_string(),
                argument: subcommand,
            }
            .into());
        }

        let param = parser.next_string()?.to_lowercase();
        Ok(Self { param })
    }
}
