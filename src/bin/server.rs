use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use meterlink::server::Server;
use meterlink::store::LineFileStore;

/// UDP measurement server: answers lookup requests from the measurement file.
#[derive(Debug, Parser)]
struct Args {
    /// address to listen on
    #[arg(long, default_value = "127.0.0.1:12000")]
    listen: SocketAddr,

    /// measurement file, one `ID VALUE` pair per line
    #[arg(long)]
    data: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let server = Server::bind(args.listen, Arc::new(LineFileStore::new(args.data))).await?;
    server.run().await
}
