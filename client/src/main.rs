use clap::Parser;
use client::network::{Client, Impairment};
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Simulate network latency in milliseconds
    #[arg(short = 'l', long, default_value = "0")]
    fake_ping: u64,

    /// Fraction of datagrams to drop in each direction (0.0 - 1.0)
    #[arg(long, default_value = "0")]
    loss: f64,

    /// Fraction of datagrams to deliver twice (0.0 - 1.0)
    #[arg(long, default_value = "0")]
    duplicate: f64,

    /// Local simulation rate (updates per second)
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
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

    let impairment = Impairment::new(args.loss, args.duplicate);
    if impairment.is_active() {
        info!(
            "Simulating {:.0}% loss and {:.0}% duplication",
            args.loss * 100.0,
            args.duplicate * 100.0
        );
    }

    let mut client = Client::new(&args.server, args.fake_ping, impairment, args.tick_rate).await?;

    client.run().await?;

    Ok(())
}
