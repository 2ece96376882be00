// SPDX-FileCopyrightText: 2026 Chatline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatline shell` command implementation.
//!
//! Opens the visitor's session against an in-memory store and lets the
//! developer play both sides of the conversation: plain lines are sent as the
//! visitor, `/operator` lines are appended directly to the store as if an
//! operator had replied.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chatline_config::model::ChatlineConfig;
use chatline_core::{
    ChatlineError, ClientRequestId, DeliveryStatus, MediaBlob, Message, MessagePayload,
    MessageStore, Sender,
};
use chatline_storage::{FileIdentityStorage, MemoryStore};
use chatline_sync::{ChatClient, ChatStores, GreetingContext, GreetingOutcome};
use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{debug, info};

const HELP: &str = "\
  <text>              send a message as the visitor
  /media <path>       send an image or video file
  /retry [id]         retry a failed message (latest failed when omitted)
  /operator <text>    simulate an operator reply
  /greet [key=value]  run the greeting engine with entry parameters
  /read               mark operator messages as read
  /drop               drop the live subscription
  /reconnect          re-activate the session
  /history            print the full merged conversation
  /status             show session and client state
  /quit               leave the shell";

/// Tracks what has already been printed so each render only shows changes.
#[derive(Default)]
struct Printed(HashMap<String, Option<DeliveryStatus>>);

impl Printed {
    fn print_new(&mut self, messages: &[Message]) {
        for message in messages {
            let status = message.delivery_status;
            if self.0.get(message.id.as_str()) == Some(&status) {
                continue;
            }
            self.0.insert(message.id.as_str().to_string(), status);
            print_message(message);
        }
    }
}

fn print_message(message: &Message) {
    let time = message.timestamp.format("%H:%M:%S").to_string().dimmed();
    let who = match message.sender {
        Sender::Visitor => "you".cyan().bold(),
        Sender::Operator => "operator".magenta().bold(),
    };
    let status = match message.delivery_status {
        Some(DeliveryStatus::Pending) => " (sending)".dimmed().to_string(),
        Some(DeliveryStatus::Failed) => {
            let crid = message
                .client_request_id
                .as_ref()
                .map(|c| c.to_string())
                .unwrap_or_default();
            format!(" {} {}", "(failed)".red(), crid.dimmed())
        }
        _ => String::new(),
    };

    let body = match message.text.as_deref() {
        Some(text) if !text.trim().is_empty() => text.to_string(),
        _ => message.summary(),
    };
    let mut lines = body.lines();
    println!("[{time}] {who}: {}{status}", lines.next().unwrap_or_default());
    for line in lines {
        println!("           {line}");
    }
    if let Some(url) = &message.media_url {
        println!("           {}", url.underline());
    }
    for link in &message.action_links {
        println!("           -> {} {}", link.label.yellow(), link.target.dimmed());
    }
}

/// Guesses a MIME type from the file extension.
fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
}

fn read_media(path: &str) -> Result<MediaBlob, ChatlineError> {
    let path = Path::new(path);
    let bytes = std::fs::read(path)
        .map_err(|e| ChatlineError::Internal(format!("cannot read {}: {e}", path.display())))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(MediaBlob::new(file_name, content_type_for(path), bytes))
}

fn parse_params(args: &str) -> Vec<(String, String)> {
    args.split_whitespace()
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Runs the `chatline shell` interactive REPL.
pub async fn run_shell(
    config: ChatlineConfig,
    entry: Vec<(String, String)>,
) -> Result<(), ChatlineError> {
    let store = Arc::new(MemoryStore::new(&config.store));
    let identity = Arc::new(FileIdentityStorage::new(&config.visitor.identity_path));
    let client = ChatClient::new(
        &config,
        ChatStores {
            sessions: store.clone(),
            messages: store.clone(),
            identity,
        },
    );

    let context = GreetingContext::from_entry_params(entry);
    debug!(context = ?context, "entry context");
    let session = client.activate(context).await?;
    info!(session_id = %session.session_id, "shell session ready");

    let mut rl = DefaultEditor::new()
        .map_err(|e| ChatlineError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "chatline shell".bold().green());
    println!(
        "Chatting as {} ({}). Type {} for commands, {} to exit.\n",
        session.display_name.bold(),
        session.session_id.to_string().dimmed(),
        "/help".yellow(),
        "/quit".yellow()
    );

    let mut printed = Printed::default();
    printed.print_new(&client.merged_messages());

    let prompt = format!("{}> ", "chatline".green());
    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed == "/quit" || trimmed == "/exit" {
                    break;
                }
                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                if let Err(e) = handle_line(&client, &store, &mut printed, trimmed).await {
                    eprintln!("{}: {e}", "error".red());
                }
                printed.print_new(&client.merged_messages());
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        }
    }

    client.shutdown();
    println!("{}", "goodbye".dimmed());
    Ok(())
}

async fn handle_line(
    client: &ChatClient,
    store: &MemoryStore,
    printed: &mut Printed,
    line: &str,
) -> Result<(), ChatlineError> {
    let (command, args) = match line.strip_prefix('/') {
        Some(rest) => rest.split_once(' ').unwrap_or((rest, "")),
        None => {
            report_receipt(client.send(line, None).await?.status);
            return Ok(());
        }
    };
    let args = args.trim();

    match command {
        "help" => println!("{HELP}"),
        "media" => {
            let blob = read_media(args)?;
            report_receipt(client.send("", Some(blob)).await?.status);
        }
        "retry" => {
            let crid = if args.is_empty() {
                client
                    .merged_messages()
                    .into_iter()
                    .rev()
                    .find(Message::is_failed)
                    .and_then(|m| m.client_request_id)
                    .ok_or_else(|| ChatlineError::Internal("no failed message".into()))?
            } else {
                ClientRequestId::from(args)
            };
            report_receipt(client.retry(&crid).await?.status);
        }
        "operator" => {
            let session = client
                .current_session()
                .ok_or(ChatlineError::NoActiveSession)?;
            store
                .append(
                    &session.session_id,
                    MessagePayload::text(Sender::Operator, args),
                )
                .await?;
        }
        "greet" => {
            let context = GreetingContext::from_entry_params(parse_params(args));
            match client.trigger_greeting(context).await? {
                GreetingOutcome::Sent { category, .. } => {
                    println!("{}", format!("greeting sent ({category})").dimmed())
                }
                other => println!("{}", format!("no greeting: {other:?}").dimmed()),
            }
        }
        "read" => client.mark_read().await?,
        "drop" => {
            let session = client
                .current_session()
                .ok_or(ChatlineError::NoActiveSession)?;
            let dropped = store.drop_subscriptions(&session.session_id, "dropped from shell");
            println!("{}", format!("dropped {dropped} subscription(s)").dimmed());
        }
        "reconnect" => {
            client.activate(None).await?;
        }
        "history" => {
            *printed = Printed::default();
        }
        "status" => {
            let session = client.current_session();
            let stored = session
                .as_ref()
                .and_then(|s| store.session(&s.session_id));
            match stored {
                Some(s) => {
                    println!("session:    {} ({})", s.display_name, s.session_id);
                    println!("unread:     {}", s.unread_count);
                    println!(
                        "last:       {}",
                        s.last_message_summary.as_deref().unwrap_or("-")
                    );
                    println!(
                        "live:       {}",
                        client.listeners().is_subscribed(&s.session_id)
                    );
                }
                None => println!("no active session"),
            }
            println!("sending:    {}", client.is_sending());
        }
        other => {
            println!("unknown command /{other}, try {}", "/help".yellow());
        }
    }
    Ok(())
}

fn report_receipt(status: DeliveryStatus) {
    if status == DeliveryStatus::Failed {
        println!("{}", "message not delivered, use /retry to send it again".yellow());
    }
}
