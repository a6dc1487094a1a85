//! `lith`: a line-mode terminal front-end for one relay session.
//!
//! Commands typed on stdin:
//! - `/list` shows the conversations
//! - `/buffer <number|name>` switches the current conversation
//! - `/more` fetches older lines of the current conversation
//! - `/reset` discards local state and resynchronises
//! - `/set <name> <value>` changes a saved setting
//! - `/quit` closes the session
//!
//! Anything else is sent as input to the current conversation.

use anyhow::{bail, Context};
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use lith_client::{
    init_tracing, spawn_connection, ClientConfig, ConnectionCommand, ConnectionNotification,
    SettingsStore,
};
use lith_proto::Pointer;
use lith_store::{Conversation, Message, StoreEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    info!("Starting lith v{}", env!("CARGO_PKG_VERSION"));

    let settings = SettingsStore::open_default().context("Failed to load settings")?;
    let config = ClientConfig::from_env(settings.settings());

    if config.host.is_empty() {
        bail!(
            "No relay host configured; set LITH_HOST or edit {}",
            settings.path().display()
        );
    }
    if config.encrypted {
        bail!("lith speaks plain TCP only; put a TLS tunnel in front of the relay and set LITH_ENCRYPTED=false");
    }

    let stream = TcpStream::connect((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to connect to {}:{}", config.host, config.port))?;
    stream.set_nodelay(true)?;

    let (cmd_tx, mut notif_rx) = spawn_connection(stream, &config).await?;
    let mut ui = Ui {
        cmd_tx,
        settings,
        current: None,
        threshold: config.url_threshold,
    };
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                if !ui.handle_line(line.trim_end()).await? {
                    break;
                }
            }
            notification = notif_rx.recv() => {
                match notification {
                    Some(ConnectionNotification::Disconnected { reason }) => {
                        if let Some(reason) = reason {
                            warn!(%reason, "Disconnected");
                        }
                        return Ok(());
                    }
                    Some(notification) => ui.handle_notification(notification).await?,
                    None => return Ok(()),
                }
            }
        }
    }

    let _ = ui.cmd_tx.send(ConnectionCommand::Shutdown).await;
    while let Some(notification) = notif_rx.recv().await {
        if matches!(notification, ConnectionNotification::Disconnected { .. }) {
            break;
        }
    }
    Ok(())
}

struct Ui {
    cmd_tx: mpsc::Sender<ConnectionCommand>,
    settings: SettingsStore,
    current: Option<Pointer>,
    threshold: usize,
}

impl Ui {
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> ConnectionCommand,
    ) -> anyhow::Result<T> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(make(tx))
            .await
            .context("Connection task is gone")?;
        rx.await.context("Connection task dropped the request")
    }

    async fn send(&self, command: ConnectionCommand) -> anyhow::Result<()> {
        self.cmd_tx
            .send(command)
            .await
            .context("Connection task is gone")
    }

    /// Returns `false` when the user asked to quit.
    async fn handle_line(&mut self, line: &str) -> anyhow::Result<bool> {
        let (word, rest) = line.split_once(' ').unwrap_or((line, ""));
        match word {
            "/quit" => return Ok(false),
            "/list" => {
                for conv in self.request(ConnectionCommand::Conversations).await? {
                    println!("{}", conversation_line(&conv));
                }
            }
            "/buffer" => {
                let conversations = self.request(ConnectionCommand::Conversations).await?;
                match find_conversation(&conversations, rest.trim()) {
                    Some(conv) => {
                        self.current = Some(conv.pointer);
                        println!("-- {} --", conversation_line(conv));
                        let messages = self
                            .request(|reply| ConnectionCommand::Messages {
                                conversation: conv.pointer,
                                reply,
                            })
                            .await?;
                        for message in &messages {
                            println!("{}", message_line(message, self.threshold));
                        }
                    }
                    None => println!("No conversation matches {rest:?}"),
                }
            }
            "/more" => match self.current {
                Some(conversation) => {
                    self.send(ConnectionCommand::FetchMoreLines(conversation))
                        .await?
                }
                None => println!("No current conversation; use /buffer first"),
            },
            "/reset" => self.send(ConnectionCommand::Reset).await?,
            "/set" => {
                let (key, value) = rest.split_once(' ').unwrap_or((rest, ""));
                match self.settings.set(key, value.trim()) {
                    Ok(true) if key == "shortenLongUrlsThreshold" => {
                        self.threshold = self.settings.settings().shorten_long_urls_threshold;
                        println!("-- {key} saved --");
                    }
                    Ok(true) => println!("-- {key} saved, used from the next connection --"),
                    Ok(false) => println!("-- {key} unchanged --"),
                    Err(e) => println!("{e}"),
                }
            }
            _ if line.is_empty() => {}
            _ => match self.current {
                Some(conversation) => {
                    self.send(ConnectionCommand::Input {
                        conversation,
                        text: line.to_string(),
                    })
                    .await?
                }
                None => println!("No current conversation; use /buffer first"),
            },
        }
        Ok(true)
    }

    async fn handle_notification(
        &mut self,
        notification: ConnectionNotification,
    ) -> anyhow::Result<()> {
        match notification {
            ConnectionNotification::Connected => println!("-- connected --"),
            ConnectionNotification::Changed(StoreEvent::MessageAdded {
                conversation,
                message,
                ..
            }) if Some(conversation) == self.current => {
                let found = self
                    .request(|reply| ConnectionCommand::Message { message, reply })
                    .await?;
                if let Some(found) = found {
                    println!("{}", message_line(&found, self.threshold));
                }
            }
            ConnectionNotification::Changed(StoreEvent::Reset) => {
                self.current = None;
                println!("-- reset --");
            }
            ConnectionNotification::FrameSkipped(frame) => {
                warn!(error = %frame.error, len = frame.len, "Relay frame skipped");
            }
            _ => {}
        }
        Ok(())
    }
}

fn find_conversation<'a>(conversations: &'a [Conversation], query: &str) -> Option<&'a Conversation> {
    if let Ok(number) = query.parse::<i64>() {
        return conversations.iter().find(|c| c.number == number);
    }
    conversations
        .iter()
        .find(|c| c.short_name == query || c.name == query)
        .or_else(|| conversations.iter().find(|c| c.name.contains(query)))
}

fn conversation_line(conv: &Conversation) -> String {
    let mut line = format!("{:>3} {}", conv.number, conv.name);
    if conv.highlights > 0 {
        line.push_str(&format!(" [{}!]", conv.highlights));
    } else if conv.unread > 0 {
        line.push_str(&format!(" [{}]", conv.unread));
    }
    line
}

fn message_line(message: &Message, threshold: usize) -> String {
    let time = message
        .date
        .map(|d| d.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string());
    let body = message
        .segments()
        .iter()
        .map(|segment| {
            if segment.is_link() {
                segment.summary(threshold)
            } else {
                segment.text.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    format!("{time} {:>12} | {body}", message.prefix)
}
