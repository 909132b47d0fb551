use clap::Parser;
use log::{info, warn};

use client::canvas::{CanvasRelay, Raster};
use client::session::{ClientEvent, ClientSession};
use shared::protocol::ChatKind;
use shared::state::Phase;
use shared::udp::UdpTransport;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Room code (the host's transport address)
    #[arg(short = 'r', long)]
    room: String,

    /// Display name
    #[arg(short = 'n', long, default_value = "Player")]
    name: String,

    /// Avatar id
    #[arg(short = 'a', long, default_value = "0")]
    avatar: u32,

    /// Address to bind the local transport to
    #[arg(short = 'b', long, default_value = "127.0.0.1:0")]
    bind: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let transport = UdpTransport::bind(&args.bind).await?;
    let mut session = ClientSession::new(transport, args.room.clone(), &args.name, args.avatar);
    session.connect().await?;

    // Headless rendering: replay relayed drawing events against the
    // reference raster and narrate state changes to the log.
    let mut canvas = CanvasRelay::new(Raster::new(800, 500));
    let mut last_chat_id = 0;

    loop {
        match session.next_event().await {
            ClientEvent::StateUpdated => {
                let state = session.state();
                info!(
                    "phase {:?} | round {}/{} | {}s | hint '{}'",
                    state.phase,
                    state.round,
                    state.settings.rounds,
                    state.timer,
                    state.hint
                );
                let seen_chat_id = last_chat_id;
                for message in state.chat.iter().filter(|m| m.id > seen_chat_id) {
                    last_chat_id = message.id;
                    match message.kind {
                        ChatKind::System => info!("* {}", message.text),
                        _ => info!("{}: {}", message.sender_name, message.text),
                    }
                }
                if state.phase == Phase::Results {
                    let mut standings: Vec<_> = state
                        .players
                        .iter()
                        .map(|p| (p.score, p.name.clone()))
                        .collect();
                    standings.sort_by(|a, b| b.cmp(a));
                    for (rank, (score, name)) in standings.iter().enumerate() {
                        info!("{}. {} — {} pts", rank + 1, name, score);
                    }
                    break;
                }
            }
            ClientEvent::Drawing(event) => canvas.apply(&event),
            ClientEvent::ConnectionLost => {
                warn!("connection lost, attempting to rejoin");
                if let Err(e) = session.reconnect().await {
                    warn!("could not rejoin room: {}", e);
                    return Err(e.into());
                }
            }
            ClientEvent::Closed => {
                info!("transport closed");
                break;
            }
        }
    }

    Ok(())
}
