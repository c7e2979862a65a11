use clap::Parser;
use log::info;
use server::game::GameState;
use server::network::Server;
use shared::{MoverConfig, Orientation, TileGrid, TilePos, DEFAULT_MAX_SPEED};
use std::time::Duration;

fn parse_tile(s: &str) -> Result<TilePos, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected x,y but got '{}'", s))?;
    let x = x.trim().parse::<i32>().map_err(|e| e.to_string())?;
    let y = y.trim().parse::<i32>().map_err(|e| e.to_string())?;
    Ok(TilePos::new(x, y))
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Tick rate (updates per second)
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum number of connected clients
    #[arg(short, long, default_value = "16")]
    max_clients: usize,

    /// Top speed of the mover in tiles per second
    #[arg(long, default_value_t = DEFAULT_MAX_SPEED)]
    max_speed: f32,

    /// Direction the mover faces when spawned
    #[arg(long, default_value = "up")]
    initial_facing: Orientation,

    /// Let the mover fly into obstacles
    #[arg(long)]
    no_safety: bool,

    /// Refuse to start engines without fuel
    #[arg(long)]
    requires_fuel: bool,

    /// Hull width and length in tiles
    #[arg(long, value_parser = parse_tile, default_value = "1,1")]
    hull: TilePos,

    /// Impassable tile, may be repeated (e.g. --obstacle 0,10)
    #[arg(long = "obstacle", value_parser = parse_tile)]
    obstacles: Vec<TilePos>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let tick_rate = args.tick_rate.max(1);

    let config = MoverConfig {
        max_speed: args.max_speed,
        initial_facing: args.initial_facing,
        safety_protocols_on: !args.no_safety,
        requires_fuel: args.requires_fuel,
        ..MoverConfig::default()
    }
    .with_hull(args.hull.x, args.hull.y);

    let mut game_state = GameState::new(TileGrid::with_walls(args.obstacles.iter().copied()));
    game_state.spawn_mover(config, TilePos::ZERO);

    info!("Starting server...");
    info!("Tick rate: {}Hz", tick_rate);
    if !args.obstacles.is_empty() {
        info!("{} obstacle tile(s) loaded", args.obstacles.len());
    }

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(
        &address,
        Duration::from_secs_f64(1.0 / tick_rate as f64),
        args.max_clients,
        game_state,
    )
    .await?;

    server.run().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tile() {
        assert_eq!(parse_tile("3,-4"), Ok(TilePos::new(3, -4)));
        assert_eq!(parse_tile(" 1 , 2 "), Ok(TilePos::new(1, 2)));
        assert!(parse_tile("3").is_err());
        assert!(parse_tile("a,b").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "server",
            "--initial-facing",
            "left",
            "--obstacle",
            "0,5",
            "--obstacle",
            "1,5",
            "--no-safety",
        ])
        .unwrap();
        assert_eq!(args.initial_facing, Orientation::Left);
        assert_eq!(args.obstacles.len(), 2);
        assert!(args.no_safety);
        assert_eq!(args.hull, TilePos::new(1, 1));
    }
}
