use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::frame::{self, Frame};
use crate::Error;

/// Default upper bound for a single buffered frame, 512MB, the same limit Redis applies to bulk
/// strings.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 512 * 1024 * 1024;

/// Splits the byte stream of a connection into RESP frames. Partial frames stay in the read
/// buffer until the rest of their bytes arrive; the parser remembers how far it got.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
    parser: frame::Parser,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> FrameCodec {
        FrameCodec {
            max_frame_size,
            parser: frame::Parser::default(),
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        FrameCodec::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Check if the frame size exceeds a certain limit to prevent DoS attacks
        if src.len() > self.max_frame_size {
            return Err(format!(
                "protocol error; frame size exceeds limit of {} bytes",
                self.max_frame_size
            )
            .into());
        }

        let (frame, length) = match self.parser.parse(&src[..]) {
            Ok(parsed) => parsed,
            // Not enough data to parse a frame, keep buffering.
            Err(frame::Error::Incomplete) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        // Remove the parsed frame from the buffer.
        src.advance(length);

        Ok(Some(frame))
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = Error;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame.write_to(dst);
        Ok(())
    }
}
