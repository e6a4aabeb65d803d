use bytes::Bytes;
use tokio::time::Duration;

use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Set `key` to hold `value`, discarding any previous value and time to live. With `PX
/// milliseconds` the key expires that many milliseconds after the command runs.
///
/// Ref: <https://redis.io/docs/latest/commands/set/>
#[derive(Debug, PartialEq)]
pub struct Set {
    pub key: Bytes,
    pub value: Bytes,
    pub ttl: Option<Duration>,
}

impl Executable for Set {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        let mut store = ctx.store.lock();

        match self.ttl {
            Some(ttl) => store.set_with_ttl(self.key, self.value, ttl),
            None => store.set(self.key, self.value),
        }

        Ok(Frame::simple("OK"))
    }
}

impl TryFrom<&mut CommandParser> for Set {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        let value = parser.next_bytes()?;

        // Only `PX` is recognized, any other option and whatever follows it is ignored.
        let ttl = match parser.next_optional_bytes()? {
            Some(option) if option.eq_ignore_ascii_case(b"px") => {
                let millis = parser.next_integer()?;
                let millis = u64::try_from(millis).map_err(|_| {
                    CommandParserError::InvalidCommandArgument {
                        command: "set".to_string(),
                        argument: millis.to_string(),
                    }
                })?;
                Some(Duration::from_millis(millis))
            }
            _ => None,
        };

        Ok(Self { key, value, ttl })
    }
}
