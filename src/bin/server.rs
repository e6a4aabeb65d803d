use clap::Parser;
use rdbkv::codec::DEFAULT_MAX_FRAME_SIZE;
use rdbkv::config::{Config, DEFAULT_DBFILENAME, DEFAULT_DIR};
use rdbkv::{server, Error};

const PORT: u16 = 6379;

#[derive(Parser, Debug)]
struct Args {
    /// Directory holding the RDB snapshot file
    #[arg(long, env = "RDBKV_DIR", default_value = DEFAULT_DIR)]
    dir: String,

    /// Name of the RDB snapshot file
    #[arg(long, env = "RDBKV_DBFILENAME", default_value = DEFAULT_DBFILENAME)]
    dbfilename: String,

    /// Largest request frame accepted, in bytes
    #[arg(long, env = "MAX_FRAME_SIZE", default_value_t = DEFAULT_MAX_FRAME_SIZE)]
    max_frame_size: usize,
}

// A single thread drives every connection, so commands never run in parallel.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let config = Config {
        dir: args.dir,
        dbfilename: args.dbfilename,
        max_frame_size: args.max_frame_size,
    };

    server::run(PORT, config).await
}
