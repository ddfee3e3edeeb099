use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use clap::{Parser, Subcommand};
use orgchat_chat::{
    ChatMessage, ChatSession, MemoryTokenStore, OrganizationId, RoomId, SenderRole, SessionParams,
    SessionUpdate,
};
use orgchat_config::load as load_config;
use orgchat_runtime::{shutdown_signal, telemetry, ChatServices};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser)]
#[command(name = "orgchat")]
#[command(about = "Organization chat rooms from the terminal")]
struct Cli {
    /// Access token, overriding the configured one
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a room interactively
    Chat {
        #[arg(long)]
        org: OrganizationId,
        #[arg(long)]
        room: RoomId,
        /// Send as staff
        #[arg(long)]
        admin: bool,
    },
    /// List the chat rooms of an organization
    Rooms {
        #[arg(long)]
        org: OrganizationId,
    },
    /// Print the history of a room
    History {
        #[arg(long)]
        org: OrganizationId,
        #[arg(long)]
        room: RoomId,
    },
    /// Find or open your own room in an organization
    MyRoom {
        #[arg(long)]
        org: OrganizationId,
        /// First message if the room has to be created
        #[arg(long)]
        content: String,
    },
    /// Print the messages of your own room
    MyMessages {
        #[arg(long)]
        room: RoomId,
    },
    /// Take over a room as staff
    Assign {
        #[arg(long)]
        org: OrganizationId,
        #[arg(long)]
        room: RoomId,
    },
    /// Release a room
    Unassign {
        #[arg(long)]
        org: OrganizationId,
        #[arg(long)]
        room: RoomId,
    },
    /// Upload an image and print its URL
    Upload { path: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    telemetry::init_tracing().context("failed to initialise tracing")?;
    let config = load_config().context("failed to load configuration")?;

    let services = match cli.token {
        Some(token) => ChatServices::with_tokens(&config, Arc::new(MemoryTokenStore::with_token(token))),
        None => ChatServices::initialise(&config),
    }
    .context("failed to initialise chat services")?;

    match cli.command {
        Commands::Chat { org, room, admin } => {
            let role = SenderRole::from(admin);
            run_chat(services.session(SessionParams::new(org, room, role))).await
        }
        Commands::Rooms { org } => {
            let rooms = services.api.list_chat_rooms(org).await?;
            if rooms.is_empty() {
                println!("No chat rooms found");
            }
            for room in rooms {
                let details = room
                    .extra
                    .iter()
                    .map(|(key, value)| format!("{key}={value}"))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{:<8} {}", room.id, details);
            }
            Ok(())
        }
        Commands::History { org, room } => {
            use orgchat_chat::HistoryFetcher;
            let messages = services.api.fetch_history(org, room).await?;
            print_messages(&messages);
            Ok(())
        }
        Commands::MyRoom { org, content } => {
            let room = services.api.get_or_create_my_chat_room(org, &content).await?;
            println!("Room {}", room.id);
            Ok(())
        }
        Commands::MyMessages { room } => {
            let messages = services.api.my_chat_messages(room).await?;
            print_messages(&messages);
            Ok(())
        }
        Commands::Assign { org, room } => {
            services.api.assign_chat_room(org, room).await?;
            println!("Assigned room {room}");
            Ok(())
        }
        Commands::Unassign { org, room } => {
            services.api.unassign_chat_room(org, room).await?;
            println!("Released room {room}");
            Ok(())
        }
        Commands::Upload { path } => {
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let file_name = path
                .file_name()
                .and_then(|name| name.to_str())
                .context("upload path has no file name")?;
            let upload = services.api.upload_chat_image(file_name, bytes).await?;
            println!("{}", upload.image_url);
            Ok(())
        }
    }
}

async fn run_chat(mut session: ChatSession) -> anyhow::Result<()> {
    info!(params = ?session.params(), "joining chat room");

    session.connect().await;
    print_messages(session.messages());
    if let Some(status) = session.error_message() {
        println!("! {status}");
    }

    println!("Type a message and press enter. '/image <url> [text]' attaches an image, '/quit' leaves.");
    println!("---");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut listening = true;

    loop {
        tokio::select! {
            update = session.next_update(), if listening => match update {
                Some(update) => render(&session, update),
                None => listening = false,
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !handle_input(&session, line.trim()) {
                    break;
                }
            }
            _ = &mut shutdown => break,
        }
    }

    session.disconnect();
    println!("Goodbye!");
    Ok(())
}

/// `false` ends the console.
fn handle_input(session: &ChatSession, input: &str) -> bool {
    match input {
        "" => {}
        "/quit" | "/exit" | "/q" => return false,
        "/help" | "/h" => {
            println!("  /image <url> [text]  send an image");
            println!("  /status              show connection state");
            println!("  /quit                leave the room");
        }
        "/status" => {
            println!(
                "state: {:?}, messages: {}",
                session.state(),
                session.messages().len()
            );
            if let Some(status) = session.error_message() {
                println!("! {status}");
            }
        }
        _ => {
            let result = match input.strip_prefix("/image") {
                Some(rest) => {
                    let rest = rest.trim();
                    let (url, caption) = rest.split_once(' ').unwrap_or((rest, ""));
                    session.try_send_message(caption, Some(url))
                }
                None => session.try_send_message(input, None),
            };
            if let Err(err) = result {
                println!("! {}", err.user_message());
            }
        }
    }
    true
}

fn render(session: &ChatSession, update: SessionUpdate) {
    match update {
        SessionUpdate::Connected => println!("* connected"),
        SessionUpdate::MessageAppended { index } => {
            if let Some(message) = session.messages().get(index) {
                print_message(message);
            }
        }
        SessionUpdate::Reconnecting => println!("* connection lost, reconnecting"),
        SessionUpdate::Failed { status } => println!("! {status}"),
        SessionUpdate::Closed => {
            println!("! {}", session.error_message().unwrap_or("disconnected"));
        }
        SessionUpdate::Ignored => {}
    }
}

fn print_messages(messages: &[ChatMessage]) {
    for message in messages {
        print_message(message);
    }
}

fn print_message(message: &ChatMessage) {
    let author = match (&message.sender_name, message.role()) {
        (Some(name), _) => name.as_str(),
        (None, SenderRole::Admin) => "staff",
        (None, SenderRole::Member) => "member",
    };

    let mut line = format!("[{}] {}: {}", timestamp(message), author, message.content);
    if let Some(url) = message.image_url.as_deref().filter(|_| message.has_image()) {
        if !message.content.is_empty() {
            line.push(' ');
        }
        line.push_str(&format!("<image {url}>"));
    }
    println!("{line}");
}

fn timestamp(message: &ChatMessage) -> String {
    message
        .created_at
        .as_deref()
        .and_then(|raw| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok())
        .map(|at| at.format("%H:%M").to_string())
        .unwrap_or_else(|| Local::now().format("%H:%M").to_string())
}
