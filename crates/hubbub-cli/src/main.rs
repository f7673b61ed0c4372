//! hubbub: terminal chat client.
//!
//! Connects to a hubbub server, walks through the login/register menu, then
//! relays stdin lines as room chat. `dm@<username>:<message>` sends a DM,
//! `exit` leaves the room.

use anyhow::{Context, Result};
use clap::Parser;
use dialoguer::{Input, Password, Select};
use hubbub_client::{ChatClient, ChatReceiver};
use hubbub_core::{ChatMessage, MessageKind};
use tokio::io::{AsyncBufReadExt, BufReader};

/// hubbub: terminal chat client
#[derive(Parser, Debug)]
#[command(name = "hubbub", version, about = "Terminal chat client")]
struct Cli {
    /// Server network address
    #[arg(short, long, default_value = "localhost:8080")]
    server: String,

    /// WebSocket endpoint path
    #[arg(long, default_value = "/ws")]
    path: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "hubbub=debug,hubbub_client=debug,hubbub_core=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    println!("[>] Connecting to the server @{}.", cli.server);
    let client = ChatClient::connect(&cli.server, &cli.path)
        .await
        .context("could not reach the server")?;
    println!("[>] Connected to the server.");

    let (mut sender, receiver) = client.split();

    // Menu and credentials are gathered before any traffic flows.
    let choice = Select::new()
        .with_prompt("Choose menu")
        .items(&["Login", "Register"])
        .default(0)
        .interact()?;
    let username: String = Input::new().with_prompt("Username").interact_text()?;
    let password = Password::new().with_prompt("Password").interact()?;

    match choice {
        0 => sender.login(&username, &password).await?,
        _ => sender.register(&username, &password).await?,
    }

    println!("[>] Welcome to hubbub, @{username}!");
    println!("[>] 1. Type 'dm@<username>:<your-message>' to send a DM");
    println!("[>] 2. Type 'exit' to close the program");

    tokio::spawn(print_incoming(receiver));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        if line == "exit" {
            println!("[CH] You're leaving the chat room.");
            sender.exit(&username).await?;
            break;
        }

        if let Some((receiver_name, text)) = parse_dm(&line) {
            println!("[DM][to:@{receiver_name}] {text}");
            sender.dm(&username, receiver_name, text).await?;
        } else {
            println!("[CH][@{username}] {line}");
            sender.room_chat(&username, &line).await?;
        }
    }

    Ok(())
}

/// Print server traffic with the same tags the server logs use.
async fn print_incoming(mut receiver: ChatReceiver) {
    loop {
        match receiver.next().await {
            Ok(Some(msg)) => print_message(&msg),
            Ok(None) => {
                println!("[SERVER] Server closed, exiting.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("[ERROR] {e}");
                std::process::exit(1);
            }
        }
    }
}

fn print_message(msg: &ChatMessage) {
    match msg.kind {
        MessageKind::Login | MessageKind::Register | MessageKind::Broadcast => {
            println!("[SERVER] {}", msg.text);
        }
        MessageKind::RoomChat => println!("[CH][@{}] {}", msg.username, msg.text),
        MessageKind::Dm => println!("[DM][from:@{}] {}", msg.username, msg.text),
        MessageKind::Exit => {}
    }
}

/// Parse the `dm@<username>:<message>` input grammar.
fn parse_dm(line: &str) -> Option<(&str, &str)> {
    let rest = line.strip_prefix("dm@")?;
    let (receiver, text) = rest.split_once(':')?;
    if receiver.is_empty() || text.is_empty() {
        return None;
    }
    Some((receiver, text))
}

#[cfg(test)]
mod tests {
    use super::parse_dm;

    #[test]
    fn dm_grammar() {
        assert_eq!(parse_dm("dm@bob:hi there"), Some(("bob", "hi there")));
        assert_eq!(parse_dm("plain message"), None);
        assert_eq!(parse_dm("dm@:missing name"), None);
        assert_eq!(parse_dm("dm@bob"), None);
    }
}
