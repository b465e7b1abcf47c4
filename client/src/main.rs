use clap::Parser;
use client::input::Autopilot;
use client::network::{BoxError, Client, ClientConfig};
use log::info;
use shared::{DEFAULT_PORT, DEFAULT_SEND_RATE, TRUST_CAPACITY};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Updates sent to the server per second
    #[arg(long, default_value_t = DEFAULT_SEND_RATE)]
    send_rate: u32,

    /// Local simulation frames per second
    #[arg(short = 'f', long, default_value_t = 60)]
    frame_rate: u32,

    /// Number of recent predicted positions trusted during reconciliation
    #[arg(long, default_value_t = TRUST_CAPACITY)]
    trust_capacity: usize,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Stop after this many seconds (runs until interrupted by default)
    #[arg(short = 'd', long)]
    duration_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let config = ClientConfig {
        server_addr: args.server,
        send_rate: args.send_rate,
        frame_rate: args.frame_rate,
        trust_capacity: args.trust_capacity,
        fake_ping_ms: args.fake_ping,
        duration: args.duration_secs.map(Duration::from_secs),
    };

    let mut client = Client::new(config, Box::new(Autopilot::new())).await?;

    tokio::select! {
        result = client.run() => {
            let stats = result?;
            info!(
                "Finished: {} frames, {} updates sent, {} broadcasts, {} snaps",
                stats.frames, stats.updates_sent, stats.broadcasts, stats.snaps
            );
        },
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
    }

    Ok(())
}
