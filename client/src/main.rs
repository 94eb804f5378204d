use clap::Parser;
use client::builder::BuildPlan;
use client::network::Client;
use log::info;
use shared::SpatialSignature;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Player name announced to the server
    #[arg(short = 'n', long, default_value = "builder")]
    name: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Milliseconds between construction steps
    #[arg(short = 't', long, default_value = "250")]
    tick_ms: u64,

    /// Piece position
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    x: f32,
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    y: f32,
    #[arg(long, default_value = "0.0", allow_negative_numbers = true)]
    z: f32,

    /// Tear the piece down instead of building it
    #[arg(short = 'd', long)]
    deconstruct: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let plan = BuildPlan {
        signature: SpatialSignature::at(args.x, args.y, args.z),
        deconstruct: args.deconstruct,
        min_step: 0.05,
        max_step: 0.15,
    };

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    if args.fake_ping > 0 {
        info!("Simulating {}ms latency", args.fake_ping);
    }
    info!(
        "{} piece at {}",
        if plan.deconstruct { "Deconstructing" } else { "Building" },
        plan.signature
    );

    let mut client = Client::new(&args.server, &args.name, args.fake_ping).await?;

    client.run(plan, Duration::from_millis(args.tick_ms)).await?;

    Ok(())
}
