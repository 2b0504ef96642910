use clap::Parser;
use log::{info, warn};
use server::config::ServerConfig;
use server::network::Server;
use server::relay::{bootstrap_host, ConnectionMode, LocalRelay};
use shared::Request;
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "30")]
    tick_rate: u32,

    /// Maximum number of remote clients
    #[arg(short = 'm', long, default_value = "8")]
    max_clients: usize,

    /// Lives per kart
    #[arg(long, default_value = "3")]
    lives: u32,

    /// Number of item boxes on the track
    #[arg(long, default_value = "4")]
    item_boxes: u32,

    /// Fixed RNG seed for reproducible sessions
    #[arg(long)]
    seed: Option<u64>,

    /// Skip the relay and host in direct mode
    #[arg(long)]
    no_relay: bool,

    /// Ready the host immediately and start once everyone else is ready
    #[arg(long)]
    auto_start: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let bind_addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let config = ServerConfig {
        tick_rate_hz: args.tick_rate,
        max_clients: args.max_clients,
        max_lives: args.lives,
        item_box_count: args.item_boxes,
        seed: args.seed,
        ..ServerConfig::default()
    };

    let local_relay = LocalRelay::new(bind_addr);
    let relay = if args.no_relay { None } else { Some(&local_relay) };
    let bootstrap = bootstrap_host(
        relay,
        config.max_clients + 1,
        bind_addr,
        &mut rand::thread_rng(),
    )
    .await;

    if let ConnectionMode::Direct {
        fallback_reason: Some(reason),
        ..
    } = &bootstrap.mode
    {
        warn!("Relay unavailable ({}), hosting in direct mode", reason);
    }

    info!("Starting server on {}:{}", args.host, args.port);
    info!("Tick rate: {} Hz", args.tick_rate);
    info!("Join code: {}", bootstrap.join_code);

    let mut server = Server::new(&bind_addr.to_string(), config, Some(bootstrap.join_code)).await?;

    if args.auto_start {
        let handle = server.handle();
        handle.host_request(Request::ToggleReady);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(2));
            // Rejected until every player is ready, and after the game started
            while handle.host_request(Request::StartGame) {
                interval.tick().await;
            }
        });
    }

    let handle = server.handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown();
        }
    });

    server.run().await?;

    Ok(())
}
