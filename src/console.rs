//! Interactive chat console.
//!
//! Wires one `ChatSession` (socket + legacy polling), a dictation bridge,
//! and read-back into a line-oriented terminal UI. Typed lines append to the
//! compose buffer and send; dictation writes into the same buffer between
//! keystrokes, exactly like the dashboard compose field it stands in for.

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use rallypoint_audio::{dictation_provider, DictationBridge, MessageReadback};
use rallypoint_channels::{
    ChatSession, Connection, HttpGroupChatApi, PollingChannel, RealtimeChannel, SendOutcome,
    TransportEvent, TransportKind,
};
use rallypoint_core::{ComposeBuffer, FrameSink, GroupRegistry, MessageRouter};

use crate::cli::Cli;

/// Run the console until EOF or `/quit`.
pub async fn run(cli: Cli) -> Result<()> {
    // One connection per session; router and registry share it as their sink.
    let connection = Arc::new(Connection::new(cli.realtime_config()));
    let sink: Arc<dyn FrameSink> = Arc::clone(&connection) as Arc<dyn FrameSink>;
    let router = Arc::new(MessageRouter::new(Arc::clone(&sink)));
    let registry = Arc::new(GroupRegistry::with_seeds(
        sink,
        GroupRegistry::default_seeds(),
    ));
    let realtime = Arc::new(RealtimeChannel::new(
        connection,
        router,
        Arc::clone(&registry),
    ));

    let polling_config = cli.polling_config();
    let api = Arc::new(HttpGroupChatApi::new(&polling_config)?);
    let polling = Arc::new(PollingChannel::new(api, &polling_config));

    let session = ChatSession::new(cli.user.clone(), registry, realtime, polling);
    for group in &cli.legacy_groups {
        session.route_group(group, TransportKind::Polling);
    }
    session.connect()?;

    let compose = ComposeBuffer::new();
    let dictation = dictation_provider(&cli.dictation_config())
        .map(|provider| DictationBridge::new(provider, compose.clone()));
    if dictation.is_none() {
        info!("dictation unavailable on this install");
    }
    let readback = MessageReadback::new(&cli.readback_config(), cli.user.clone())?;

    let mut selected = session
        .registry()
        .groups()
        .first()
        .map(|g| g.id.clone())
        .unwrap_or_default();
    session.select_group(&selected);

    let mut realtime_events = session.subscribe(TransportKind::Realtime);
    let mut polling_events = session.subscribe(TransportKind::Polling);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("connected as {} — /help for commands", cli.user);
    loop {
        tokio::select! {
            event = realtime_events.recv() => {
                if let Ok(event) = event {
                    show_event(&event, &selected, &readback).await;
                }
            }
            event = polling_events.recv() => {
                if let Ok(event) = event {
                    show_event(&event, &selected, &readback).await;
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if let Some(command) = line.strip_prefix('/') {
                    if !handle_command(command, &session, &mut selected, dictation.as_ref(), &readback).await? {
                        break;
                    }
                } else {
                    compose.push_str(&line);
                    let text = compose.take();
                    match session.send(&selected, &text).await? {
                        SendOutcome::Sent => {}
                        SendOutcome::Dropped => println!("(not delivered — transport offline)"),
                    }
                }
            }
        }
    }

    session.close();
    if let Some(bridge) = &dictation {
        bridge.shutdown();
    }
    Ok(())
}

async fn show_event(event: &TransportEvent, selected: &str, readback: &MessageReadback) {
    match event {
        TransportEvent::Message(message) => {
            if message.group_id == selected {
                println!(
                    "[{}] {}: {}",
                    message.timestamp.format("%H:%M:%S"),
                    message.sender,
                    message.text
                );
            }
            readback.announce(message).await;
        }
        TransportEvent::Refreshed { group_id } => {
            if group_id == selected {
                println!("(thread refreshed)");
            }
        }
        TransportEvent::Error { detail } => println!("! {detail}"),
    }
}

/// Returns `false` when the console should exit.
async fn handle_command(
    command: &str,
    session: &ChatSession,
    selected: &mut String,
    dictation: Option<&DictationBridge>,
    readback: &MessageReadback,
) -> Result<bool> {
    let mut parts = command.split_whitespace();
    match parts.next().unwrap_or("") {
        "help" => {
            println!("/groups                  list groups");
            println!("/select <id>             switch the displayed group");
            println!("/create <name> [member…] create a group and announce it");
            println!("/dictate                 toggle dictation into the compose buffer");
            println!("/read on|off             speak incoming messages");
            println!("/quit                    exit");
        }
        "groups" => {
            for group in session.registry().groups() {
                let marker = if group.id == *selected { "*" } else { " " };
                println!(
                    "{marker} {} — {} ({} members, {})",
                    group.id,
                    group.name,
                    group.members.len(),
                    session.kind_for(&group.id)
                );
            }
        }
        "select" => {
            if let Some(id) = parts.next() {
                *selected = id.to_string();
                session.select_group(id);
                for message in session.messages(id).await {
                    println!(
                        "[{}] {}: {}",
                        message.timestamp.format("%H:%M:%S"),
                        message.sender,
                        message.text
                    );
                }
            } else {
                println!("usage: /select <group-id>");
            }
        }
        "create" => {
            if let Some(name) = parts.next() {
                let members: Vec<String> = parts.map(str::to_string).collect();
                let id = session.create_group(name, members).await?;
                println!("created {id}");
            } else {
                println!("usage: /create <name> [member…]");
            }
        }
        "dictate" => match dictation {
            Some(bridge) => {
                bridge.toggle().await?;
                println!(
                    "dictation {}",
                    if bridge.is_listening() { "on" } else { "off" }
                );
            }
            None => println!("Speech recognition is not supported on this install."),
        },
        "read" => {
            let on = matches!(parts.next(), Some("on"));
            readback.set_enabled(on);
            println!("read-back {}", if on { "on" } else { "off" });
        }
        "quit" | "exit" => return Ok(false),
        other => println!("unknown command: /{other}"),
    }
    Ok(true)
}
