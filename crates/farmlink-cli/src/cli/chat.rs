//! Conversation CLI commands: show, send, watch, forget.
//!
//! `show` prints the cached conversation merged with a fresh fetch, `send`
//! posts a text or image message, `watch` follows the conversation live
//! over the realtime channel until Ctrl+C, and `forget` drops the local
//! copy.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tokio::sync::broadcast::error::RecvError;

use farmlink_core::chat::ConversationScreen;
use farmlink_core::realtime::RealtimeChannel;
use farmlink_types::error::SyncError;
use farmlink_types::message::{ConversationKey, Message, MessageContent, MessageDraft};
use farmlink_types::{ProductId, UserId};

use crate::state::{AppState, ConcreteStore};

#[derive(Subcommand)]
pub enum ChatCommand {
    /// Show a conversation about a product with another user.
    Show {
        /// Product the conversation is about.
        #[arg(long)]
        product: ProductId,

        /// The other participant.
        #[arg(long)]
        peer: UserId,

        /// Only show what is cached locally; skip the network.
        #[arg(long)]
        offline: bool,
    },

    /// Send a text or image message.
    Send {
        #[arg(long)]
        product: ProductId,

        #[arg(long)]
        peer: UserId,

        /// Text to send.
        #[arg(long, conflicts_with = "image", required_unless_present = "image")]
        text: Option<String>,

        /// Image file to upload (jpg, png, gif or webp).
        #[arg(long)]
        image: Option<PathBuf>,

        /// Send as the product's seller; the peer is then the buyer.
        #[arg(long)]
        as_seller: bool,
    },

    /// Follow a conversation live until Ctrl+C.
    Watch {
        #[arg(long)]
        product: ProductId,

        #[arg(long)]
        peer: UserId,
    },

    /// Remove the locally cached copy of a conversation.
    Forget {
        #[arg(long)]
        product: ProductId,

        #[arg(long)]
        peer: UserId,
    },
}

pub async fn run(state: &AppState, user_id: UserId, action: &ChatCommand, json: bool) -> Result<()> {
    match action {
        ChatCommand::Show {
            product,
            peer,
            offline,
        } => show(state, ConversationKey::new(*product, user_id, *peer), *offline, json).await,
        ChatCommand::Send {
            product,
            peer,
            text,
            image,
            as_seller,
        } => {
            let draft = match (text, image) {
                (Some(text), None) => MessageDraft::Text(text.clone()),
                (None, Some(path)) => image_draft(path).await?,
                _ => bail!("pass exactly one of --text or --image"),
            };
            let key = ConversationKey::new(*product, user_id, *peer);
            send(state, key, draft, *as_seller, json).await
        }
        ChatCommand::Watch { product, peer } => {
            watch(state, ConversationKey::new(*product, user_id, *peer), json).await
        }
        ChatCommand::Forget { product, peer } => {
            forget(state, ConversationKey::new(*product, user_id, *peer), json).await
        }
    }
}

/// Print the conversation.
///
/// Without `--offline` the cache is refreshed from the server first; when
/// the network is down the cached copy is shown with a warning.
async fn show(state: &AppState, key: ConversationKey, offline: bool, json: bool) -> Result<()> {
    let store = state.store(key);
    let mut messages = store.hydrate().await?;

    if !offline {
        match store.load().await {
            Ok(fresh) => messages = fresh,
            Err(err) if err.is_network() => {
                tracing::warn!(error = %err, "showing cached conversation");
                if !json {
                    println!();
                    println!(
                        "  {} Offline, showing cached messages.",
                        style("!").yellow().bold()
                    );
                }
            }
            Err(err) => return Err(err.into()),
        }
    }
    print_notices(&store, json);

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }

    if messages.is_empty() {
        println!();
        println!(
            "  {} No messages yet. Start with: {}",
            style("i").blue().bold(),
            style(format!(
                "farmlink chat send --product {} --peer {} --text \"...\"",
                key.product_id, key.peer_id
            ))
            .yellow()
        );
        println!();
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Sent").fg(Color::White),
        Cell::new("From").fg(Color::White),
        Cell::new("Message").fg(Color::White),
        Cell::new("Read").fg(Color::White),
    ]);

    for message in &messages {
        let from = if message.sender_id == key.self_id {
            Cell::new("you").fg(Color::Green)
        } else {
            Cell::new(format!("user {}", message.sender_id)).fg(Color::Cyan)
        };
        let content = match &message.content {
            MessageContent::Text { .. } => Cell::new(message.content.preview()),
            _ => Cell::new(message.content.preview()).fg(Color::Yellow),
        };
        table.add_row(vec![
            Cell::new(message.created_at.format("%Y-%m-%d %H:%M").to_string()).fg(Color::DarkGrey),
            from,
            content,
            Cell::new(if message.read { "✓" } else { "" }).fg(Color::DarkGrey),
        ]);
    }

    println!();
    println!(
        "  Product #{} with user {}",
        style(key.product_id).cyan().bold(),
        style(key.peer_id).cyan()
    );
    println!();
    println!("{table}");
    println!();
    println!(
        "  {} message{}",
        style(messages.len()).bold(),
        if messages.len() == 1 { "" } else { "s" }
    );
    println!();

    Ok(())
}

/// `(buyer, seller)` for a conversation seen from the local user.
fn roles(key: &ConversationKey, as_seller: bool) -> (UserId, UserId) {
    if as_seller {
        (key.peer_id, key.self_id)
    } else {
        (key.self_id, key.peer_id)
    }
}

/// Send a message in the `(product, buyer, seller)` session, creating the
/// session when the pair has never talked about this product.
async fn send(
    state: &AppState,
    key: ConversationKey,
    draft: MessageDraft,
    as_seller: bool,
    json: bool,
) -> Result<()> {
    let store = state.store(key);
    store.hydrate().await?;
    store.load().await?;

    let (buyer, seller) = roles(&key, as_seller);
    let session = state
        .resolver()
        .resolve(key.product_id, buyer, seller)
        .await?;

    let sent = store.send(draft, session).await?;
    print_notices(&store, json);

    if json {
        println!("{}", serde_json::to_string_pretty(&sent)?);
    } else {
        println!();
        println!(
            "  {} Sent: {}",
            style("✓").green().bold(),
            sent.content.preview()
        );
        println!("  {} session {}", style("·").dim(), style(sent.session).dim());
        println!();
    }
    Ok(())
}

/// Follow the conversation until Ctrl+C or until the realtime connection
/// drops. New messages are printed as they arrive.
async fn watch(state: &AppState, key: ConversationKey, json: bool) -> Result<()> {
    let channel = RealtimeChannel::subscribe(&state.transport, key.self_id);
    let screen =
        ConversationScreen::mount(key, state.api.clone(), state.cache.clone(), &channel).await?;
    let mut inbound = channel.bind()?;

    let mut printed = HashSet::new();
    let initial = match screen.refresh().await {
        Ok(messages) => messages,
        Err(err) if err.is_network() => {
            tracing::warn!(error = %err, "initial fetch failed, showing cached messages");
            screen.messages().await
        }
        Err(err) => return Err(err.into()),
    };
    for message in &initial {
        printed.insert(message.id);
        print_line(message, &key, json)?;
    }

    if !json {
        println!(
            "  {}",
            style("Watching for new messages. Press Ctrl+C to stop.").dim()
        );
    }

    let mut liveness = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = liveness.tick() => {
                if !channel.is_active() {
                    if !json {
                        println!(
                            "  {} Realtime connection closed. Run the command again to reconnect.",
                            style("!").yellow().bold()
                        );
                    }
                    break;
                }
            }
            event = inbound.recv() => match event {
                Ok(event) => {
                    if key.contains(&event.message) && printed.insert(event.message.id) {
                        print_line(&event.message, &key, json)?;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "fell behind realtime events");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    drop(inbound);
    screen.unmount().await;
    channel.unsubscribe().await;
    print_notices(screen.store(), json);
    Ok(())
}

async fn forget(state: &AppState, key: ConversationKey, json: bool) -> Result<()> {
    state.store(key).forget().await?;

    if json {
        println!("{}", serde_json::json!({ "forgotten": key.to_string() }));
    } else {
        println!();
        println!(
            "  {} Removed cached conversation for product #{} with user {}",
            style("✓").green().bold(),
            key.product_id,
            key.peer_id
        );
        println!();
    }
    Ok(())
}

fn print_line(message: &Message, key: &ConversationKey, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(message)?);
        return Ok(());
    }

    let who = if message.sender_id == key.self_id {
        style("you".to_string()).green()
    } else {
        style(format!("user {}", message.sender_id)).cyan()
    };
    println!(
        "  {} {} {}",
        style(message.created_at.format("%H:%M")).dim(),
        who.bold(),
        message.content.preview()
    );
    Ok(())
}

/// Non-fatal problems collected by the store (undecodable content, cache
/// write failures) as dismissible notices.
fn print_notices(store: &ConcreteStore, json: bool) {
    for notice in store.take_notices() {
        tracing::warn!(error = %notice, "conversation notice");
        if !json && notice != SyncError::Cancelled {
            eprintln!("  {} {}", style("i").blue().bold(), notice.user_message());
        }
    }
}

/// Build an image draft from a local file. The upload name is prefixed
/// with the current Unix time so repeated uploads of one file do not share
/// a server name.
async fn image_draft(path: &Path) -> Result<MessageDraft> {
    let mime_type = mime_type(path)
        .with_context(|| format!("unsupported image type: {}", path.display()))?;
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let original = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("invalid file name: {}", path.display()))?;

    Ok(MessageDraft::Image {
        file_name: format!("{}_{original}", chrono::Utc::now().timestamp()),
        mime_type: mime_type.to_string(),
        bytes,
    })
}

fn mime_type(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        _ => None,
    }
}
