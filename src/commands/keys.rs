use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Lists the key of the first record stored in the snapshot file. A pattern argument is accepted
/// and discarded, it is never matched against.
///
/// Ref: <https://redis.io/commands/keys>
#[derive(Debug, PartialEq)]
pub struct Keys;

impl Executable for Keys {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        Ok(Frame::bulk_array(ctx.snapshot.first_key()))
    }
}

impl TryFrom<&mut CommandParser> for Keys {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        parser.next_optional_bytes()?;
        Ok(Self)
    }
}
