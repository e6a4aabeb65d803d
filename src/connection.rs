use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::FrameCodec;
use crate::frame::Frame;
use crate::Error;

/// A client connection. Data is read from the socket into the framed read buffer; when a frame is
/// parsed, the corresponding bytes are removed from the buffer and anything left over waits for
/// the next read.
pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    framed: Framed<TcpStream, FrameCodec>,
}

impl Connection {
    pub fn with_codec(
        stream: TcpStream,
        client_address: SocketAddr,
        codec: FrameCodec,
    ) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            client_address,
            framed: Framed::new(stream, codec),
        }
    }

    /// Reads the next complete frame. Returns `None` when the peer closed the connection cleanly.
    /// A connection closed in the middle of a frame is reported as an error.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, Error> {
        self.framed.next().await.transpose()
    }

    /// Writes the whole frame and flushes it to the socket.
    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), Error> {
        self.framed.send(frame).await
    }
}
