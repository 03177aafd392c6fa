use clap::Parser;
use client::game::{play_match, random_move, MatchSettings};
use client::network::RpsClient;
use log::info;
use shared::{Move, DEFAULT_PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value_t = format!("127.0.0.1:{}", DEFAULT_PORT))]
    server: String,

    /// Display name shown to the server
    #[arg(short = 'n', long, default_value = "player")]
    name: String,

    /// Move to play (rock, paper or scissors); random when omitted
    #[arg(short = 'c', long)]
    choice: Option<Move>,

    /// Existing player id, to play as a returning player
    #[arg(long)]
    player_id: Option<String>,

    /// Number of matches to play in a row
    #[arg(short = 'r', long, default_value = "1")]
    rounds: u32,

    /// Delay between polls in milliseconds
    #[arg(long, default_value = "500")]
    poll_interval_ms: u64,
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

    let mut client = RpsClient::new(&args.server);
    if let Some(player_id) = args.player_id {
        client = client.with_player_id(player_id);
    }

    let settings = MatchSettings {
        poll_interval: Duration::from_millis(args.poll_interval_ms),
        ..MatchSettings::default()
    };
    let mut rng = rand::thread_rng();

    for round in 1..=args.rounds {
        let choice = args.choice.unwrap_or_else(|| random_move(&mut rng));
        let report = play_match(&mut client, &args.name, choice, &settings).await?;

        println!(
            "Round {}: {} vs {} -> {:?}",
            round, report.choice, report.opponent_choice, report.outcome
        );
    }

    if let Some(player_id) = client.player_id() {
        println!("Player id: {}", player_id);
    }

    Ok(())
}
