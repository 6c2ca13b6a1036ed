//! Terminal chat client for a RoomSync room.
//!
//! Connects to a room, prints chat messages as they arrive and sends every
//! line typed at the prompt as a `chat-text` message. Lost connections are
//! retried with a doubling backoff.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin roomsync-client -- --room lobby
//! cargo run --bin roomsync-client -- -u http://127.0.0.1:8080 -r lobby
//! ```

use std::time::Duration;

use clap::Parser;

use roomsync_client::{DeliveryMode, DriverConfig, cli::run_client_session};
use roomsync_shared::logger::setup_logger;

#[derive(Parser, Debug)]
#[command(name = "roomsync-client")]
#[command(about = "Chat client for RoomSync rooms", long_about = None)]
struct Args {
    /// Room token to join
    #[arg(short = 'r', long)]
    room: String,

    /// Base URL of the record tree
    #[arg(short = 'u', long, default_value = "http://127.0.0.1:8080")]
    base_url: String,

    /// Upper bound for the reconnect delay in milliseconds (uncapped if omitted)
    #[arg(long)]
    max_retry_ms: Option<u64>,

    /// Show each chat record at most once across reconnects
    #[arg(long)]
    dedupe: bool,
}

#[tokio::main]
async fn main() {
    setup_logger(
        env!("CARGO_BIN_NAME"),
        &["roomsync_client", "roomsync_shared"],
        "info",
    );

    let args = Args::parse();

    let mut config = DriverConfig::new(args.base_url);
    config.max_retry_timeout = args.max_retry_ms.map(Duration::from_millis);
    if args.dedupe {
        config.delivery = DeliveryMode::AtMostOnce;
    }

    if let Err(e) = run_client_session(config, &args.room).await {
        tracing::error!("Client error: {}", e);
        std::process::exit(1);
    }
}
