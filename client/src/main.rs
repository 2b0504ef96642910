use clap::Parser;
use client::bot::ScriptedPlayer;
use client::join_code::normalize;
use client::network::Client;
use log::info;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Join code shown by the host
    #[arg(short = 'c', long)]
    code: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Milliseconds between scripted player decisions
    #[arg(short = 'd', long, default_value = "500")]
    decision_ms: u64,

    /// Chance per decision of reporting a crash
    #[arg(long, default_value = "0.05")]
    crash_chance: f64,

    /// Seed for the scripted player
    #[arg(long, default_value = "1")]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let code = normalize(&args.code)?;

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }

    let player = ScriptedPlayer::new(args.seed, args.crash_chance);
    let mut client = Client::new(
        args.server.parse()?,
        code,
        player,
        Duration::from_millis(args.decision_ms.max(1)),
        args.fake_ping,
    )
    .await?;

    client.run().await?;

    Ok(())
}
