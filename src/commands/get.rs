use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::context::Context;
use crate::frame::Frame;
use crate::Error;

/// Get the value of `key`. Keys not held in memory are looked up in the snapshot file. If neither
/// has the key the special value `nil` is returned.
///
/// Ref: <https://redis.io/docs/latest/commands/get/>
#[derive(Debug, PartialEq)]
pub struct Get {
    pub key: Bytes,
}

impl Executable for Get {
    fn exec(self, ctx: &Context) -> Result<Frame, Error> {
        // The store lock is released before touching the disk.
        let value = ctx.store.lock().get(&self.key);
        let value = value.or_else(|| ctx.snapshot.lookup(&self.key));

        Ok(Frame::bulk(value))
    }
}

impl TryFrom<&mut CommandParser> for Get {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_bytes()?;
        Ok(Self { key })
    }
}
