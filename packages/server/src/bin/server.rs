//! RoomSync room server.
//!
//! Serves room records over HTTP and streams changes as server-sent events.
//! Records live in memory and are lost on shutdown.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin roomsync-server
//! cargo run --bin roomsync-server -- --host 0.0.0.0 --port 3000
//! ```

use std::sync::Arc;

use clap::Parser;

use roomsync_server::{RoomStore, Server};
use roomsync_shared::{logger::setup_logger, time::SystemClock};

#[derive(Parser, Debug)]
#[command(name = "roomsync-server")]
#[command(about = "In-memory room backend with server-sent event streams", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,
}

#[tokio::main]
async fn main() {
    setup_logger(
        env!("CARGO_BIN_NAME"),
        &["roomsync_server", "tower_http"],
        "debug",
    );

    let args = Args::parse();

    let store = Arc::new(RoomStore::new(Arc::new(SystemClock)));
    let server = Server::new(store);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
