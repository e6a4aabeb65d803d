use std::net::SocketAddr;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};

use crate::codec::FrameCodec;
use crate::commands::executable::Executable;
use crate::commands::Command;
use crate::config::Config;
use crate::connection::Connection;
use crate::context::Context;
use crate::Error;

pub async fn run(port: u16, config: Config) -> Result<(), Error> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await?;
    serve(listener, config).await
}

/// Accepts connections on `listener` until the task is dropped. Each connection gets its own task;
/// all of them share one store.
pub async fn serve(listener: TcpListener, config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let ctx = Context::new(config);

    info!("Redis server listening on {}", listener.local_addr()?);
    match ctx.snapshot.path() {
        Some(path) => info!("Reading missing keys from snapshot {}", path.display()),
        None => info!("No snapshot configured"),
    }

    loop {
        let (socket, client_address) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                continue;
            }
        };
        let ctx = ctx.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, ctx).await {
                warn!("Closing connection: {}", e);
            }
        });
    }
}

/// Serves one client: one command is read, executed and answered before the next one is read.
/// Commands that cannot be parsed get no reply. Malformed frames end the connection.
#[instrument(
    name = "connection",
    skip(stream, ctx),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    ctx: Context,
) -> Result<(), Error> {
    let codec = FrameCodec::new(ctx.config.max_frame_size);
    let mut conn = Connection::with_codec(stream, client_address, codec);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    while let Some(frame) = conn.read_frame().await? {
        debug!("Received frame from client: {}", frame);

        let cmd = match Command::try_from(frame) {
            Ok(cmd) => cmd,
            Err(e) => {
                debug!("Dropping command: {}", e);
                continue;
            }
        };

        let res = cmd.exec(&ctx)?;
        debug!("Sending response to client: {}", res);

        conn.write_frame(res).await?;
    }

    info!("Connection closed");
    Ok(())
}
