use clap::{Parser, Subcommand};
use pairplay_cli::{session_outcome, CliError, ConsoleCommand, LogConfig, Result};
use pairplay_core::{PeerIdentity, PlayerInfo, SessionMode};
use pairplay_p2p::{
    MatchboxTransport, MessageInbox, SessionConfig, SessionManager, SessionSnapshot,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "pairplay-cli")]
#[command(version, about = "Pairplay CLI - host or join a two-player P2P session")]
struct Cli {
    /// Matchbox signalling server URL
    #[arg(short = 's', long, global = true, default_value = "ws://localhost:3536")]
    server: String,

    /// Display name shown to the opponent
    #[arg(short = 'n', long, global = true, default_value = "Player")]
    name: String,

    /// Avatar reference shown to the opponent
    #[arg(long, global = true, default_value = "")]
    avatar: String,

    /// TURN server URL (optional, format: turn:host:port)
    #[arg(long, global = true)]
    turn_server: Option<String>,

    /// TURN username (required if turn-server is set)
    #[arg(long, global = true)]
    turn_username: Option<String>,

    /// TURN credential (required if turn-server is set)
    #[arg(long, global = true)]
    turn_credential: Option<String>,

    /// Verbose logging
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a lobby and wait for an opponent
    Host {
        /// Start the match only on /start instead of when the guest is ready
        #[arg(long)]
        manual_start: bool,
    },

    /// Join the lobby of a host
    Join {
        /// Session code printed by the host
        #[arg(short = 'i', long)]
        host_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::dev()
    } else {
        LogConfig::default()
    };
    log_config.init()?;

    let mut config = build_config(
        &cli.server,
        cli.turn_server,
        cli.turn_username,
        cli.turn_credential,
    )?;

    let target = match &cli.command {
        Commands::Host { manual_start } => {
            config = config.with_auto_start(!manual_start);
            None
        }
        Commands::Join { host_id } => Some(PeerIdentity::parse(host_id.trim())?),
    };

    let mut session = SessionManager::new(MatchboxTransport::new(&config), config);
    session.update_self_info(PlayerInfo::new(cli.name, cli.avatar));
    let (_, inbox) = session.subscribe_inbox();

    match target {
        None => {
            info!("Hosting as {}", session.peer_id());
            info!("Share this command with your opponent:");
            info!(
                "  pairplay-cli --server {} join --host-id {}",
                cli.server,
                session.peer_id()
            );
            session.host();
        }
        Some(host) => {
            info!("Joining {} as {}", host, session.peer_id());
            session.join(host);
        }
    }

    info!("Type to chat, /ready to get ready, /quit to exit");
    run_event_loop(&mut session, &inbox).await
}

fn build_config(
    server: &str,
    turn_server: Option<String>,
    turn_username: Option<String>,
    turn_credential: Option<String>,
) -> Result<SessionConfig> {
    let mut config = SessionConfig::new(server);

    if let Some(turn_url) = turn_server {
        match (turn_username, turn_credential) {
            (Some(username), Some(credential)) => {
                info!("Using TURN server: {}", turn_url);
                config = config.with_turn_server(turn_url, username, credential);
            }
            _ => {
                return Err(CliError::InvalidConfig(
                    "TURN server requires both username and credential".to_string(),
                ));
            }
        }
    }

    Ok(config)
}

async fn run_event_loop(
    session: &mut SessionManager<MatchboxTransport>,
    inbox: &MessageInbox,
) -> Result<()> {
    let mut interval =
        tokio::time::interval(Duration::from_millis(session.config().poll_interval_ms));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last = session.snapshot();
    let mut was_active = false;
    let mut outcome = Ok(());

    loop {
        tokio::select! {
            _ = interval.tick() => {
                session.poll();
                print_messages(inbox);

                let snapshot = session.snapshot();
                if snapshot != last {
                    print_changes(&last, &snapshot);
                    last = snapshot;
                }

                was_active |= session.mode() != SessionMode::Idle;
                if was_active && session.mode() == SessionMode::Idle {
                    if let Some(e) = session.last_error() {
                        warn!("Session ended: {}", e);
                    } else {
                        info!("Session ended");
                    }
                    outcome = session_outcome(session.last_error());
                    break;
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_line(session, &line) {
                            break;
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    session.disconnect();
    outcome
}

/// Returns false when the user asked to quit
fn handle_line(session: &mut SessionManager<MatchboxTransport>, line: &str) -> bool {
    let command = match ConsoleCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            warn!("{}", e);
            return true;
        }
    };

    match command {
        ConsoleCommand::Chat(text) => session.send_chat(text),
        ConsoleCommand::Ready => session.mark_ready(),
        ConsoleCommand::Start => session.start_game(),
        ConsoleCommand::Leave => session.leave_match(),
        ConsoleCommand::Rematch => session.request_rematch(),
        ConsoleCommand::React(id) => session.send_reaction(id),
        ConsoleCommand::Rename(name) => {
            let avatar = session.roster().local().avatar_ref().to_string();
            session.update_self_info(PlayerInfo::new(name, avatar));
        }
        ConsoleCommand::Send(message) => session.send_data(message),
        ConsoleCommand::Status => match serde_json::to_string_pretty(&session.snapshot()) {
            Ok(json) => println!("{}", json),
            Err(e) => warn!("Cannot render status: {}", e),
        },
        ConsoleCommand::Quit => return false,
    }
    true
}

fn print_messages(inbox: &MessageInbox) {
    for message in inbox.drain() {
        match message.kind() {
            pairplay_core::reserved::CHAT => println!(
                "<{}> {}",
                message.get_str("senderName").unwrap_or("?"),
                message.get_str("text").unwrap_or_default()
            ),
            pairplay_core::reserved::REACTION => {
                println!("* reaction {}", message.get("id").cloned().unwrap_or_default())
            }
            _ => println!(
                "[{}] {}",
                message.kind(),
                serde_json::Value::Object(message.payload().clone())
            ),
        }
    }
}

fn print_changes(before: &SessionSnapshot, after: &SessionSnapshot) {
    if before.mode != after.mode {
        println!("-- {} --", after.mode);
    }
    if before.players != after.players {
        for player in &after.players {
            println!(
                "   {} ({}) {}",
                player.display_name(),
                player.id(),
                player.status()
            );
        }
    }
}
