use clap::Parser;
use log::{error, info};

use host::session::HostSession;
use shared::state::GameSettings;
use shared::udp::UdpTransport;
use shared::validation;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind the room's transport to
    #[arg(short = 'b', long, default_value = "127.0.0.1:0")]
    bind: String,

    /// Host player display name
    #[arg(short = 'n', long, default_value = "Host")]
    name: String,

    /// Number of rounds to play
    #[arg(short = 'r', long, default_value = "3")]
    rounds: u32,

    /// Drawing time per turn in seconds
    #[arg(short = 'd', long, default_value = "60")]
    draw_time: u32,

    /// Word category (Animals, Food, Objects, Actions, Nature, or Mix)
    #[arg(short = 'c', long, default_value = "Mix")]
    category: String,

    /// Start automatically once this many players have joined
    #[arg(short = 'p', long, default_value = "2")]
    players: usize,

    /// Allow the drawer to end the turn early by sending the word
    #[arg(long)]
    drawer_may_guess: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    if let Err(reason) = validation::valid_settings(args.rounds, args.draw_time) {
        error!("invalid settings: {}", reason);
        return Err(reason.into());
    }

    let settings = GameSettings {
        rounds: args.rounds,
        draw_seconds: args.draw_time,
        drawer_may_guess: args.drawer_may_guess,
    };

    let transport = UdpTransport::bind(&args.bind).await?;
    let mut session = HostSession::new(transport, &args.name, 0, settings, &args.category);
    session.auto_start_at(args.players);

    info!("room code: {}", session.room_code());
    info!(
        "waiting for {} players, then playing {} rounds of {}s",
        args.players, args.rounds, args.draw_time
    );
    println!("Room code: {}", session.room_code());

    session.run().await;

    Ok(())
}
