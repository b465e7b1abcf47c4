use clap::Parser;
use log::info;
use server::network::{BoxError, Server, ServerConfig};
use shared::{DEFAULT_PORT, DEFAULT_TICK_MS};
use std::time::Duration;

/// Authoritative arena server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Milliseconds between simulation ticks
    #[arg(short, long, default_value_t = DEFAULT_TICK_MS)]
    tick_ms: u64,

    /// Maximum number of concurrent clients
    #[arg(short, long, default_value_t = 32)]
    max_clients: usize,

    /// Evict clients silent for this many seconds (never by default)
    #[arg(long)]
    client_timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();
    let args = Args::parse();

    let config = ServerConfig {
        tick_duration: Duration::from_millis(args.tick_ms.max(1)),
        max_clients: args.max_clients,
        client_timeout: args.client_timeout_secs.map(Duration::from_secs),
    };

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, config).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    Ok(())
}
