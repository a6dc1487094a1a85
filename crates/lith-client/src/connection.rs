//! The connection task: one transport, one [`Session`].
//!
//! Mirrors a command/notification split: the application talks to the task
//! through [`ConnectionCommand`]s and hears back through
//! [`ConnectionNotification`]s. The transport is anything that reads and
//! writes bytes; TLS, if any, is set up by the caller.
//!
//! Notifications go out on an unbounded channel: the task never waits on a
//! consumer that may itself be waiting for a snapshot reply.

use anyhow::Context;
use lith_proto::Command;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace};

use crate::config::ClientConfig;
use crate::events::{ConnectionCommand, ConnectionNotification};
use crate::session::Session;

const CHANNEL_CAPACITY: usize = 256;
const READ_CHUNK: usize = 16 * 1024;

/// Send the handshake over `transport` and spawn the task driving it.
pub async fn spawn_connection<T>(
    transport: T,
    config: &ClientConfig,
) -> anyhow::Result<(
    mpsc::Sender<ConnectionCommand>,
    mpsc::UnboundedReceiver<ConnectionNotification>,
)>
where
    T: AsyncRead + AsyncWrite + Send + 'static,
{
    let (reader, mut writer) = tokio::io::split(transport);
    let mut session = Session::new(config);

    for command in session.handshake() {
        write_command(&mut writer, &command)
            .await
            .context("Failed to send handshake")?;
    }
    info!(host = %config.host, port = config.port, "Handshake sent");

    let (cmd_tx, cmd_rx) = mpsc::channel::<ConnectionCommand>(CHANNEL_CAPACITY);
    let (notif_tx, notif_rx) = mpsc::unbounded_channel::<ConnectionNotification>();

    let _ = notif_tx.send(ConnectionNotification::Connected);

    tokio::spawn(async move {
        let reason = match run(&mut session, reader, writer, cmd_rx, &notif_tx).await {
            Ok(()) => None,
            Err(e) => {
                error!(error = %format!("{e:#}"), "Connection failed");
                Some(format!("{e:#}"))
            }
        };
        let _ = notif_tx.send(ConnectionNotification::Disconnected { reason });
    });

    Ok((cmd_tx, notif_rx))
}

async fn run<R, W>(
    session: &mut Session,
    mut reader: R,
    mut writer: W,
    mut cmd_rx: mpsc::Receiver<ConnectionCommand>,
    notif_tx: &mpsc::UnboundedSender<ConnectionNotification>,
) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; READ_CHUNK];

    loop {
        tokio::select! {
            // --- Application commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(ConnectionCommand::Input { conversation, text }) => {
                        let command = session.input(conversation, &text);
                        write_command(&mut writer, &command).await?;
                    }
                    Some(ConnectionCommand::FetchMoreLines(conversation)) => {
                        match session.fetch_more_lines(conversation) {
                            Some(command) => write_command(&mut writer, &command).await?,
                            None => debug!(conversation = %conversation, "No history request due"),
                        }
                    }
                    Some(ConnectionCommand::Conversations(reply)) => {
                        let _ = reply.send(session.store().conversations().to_vec());
                    }
                    Some(ConnectionCommand::Messages { conversation, reply }) => {
                        let store = session.store();
                        let messages = store
                            .conversation_id(conversation)
                            .map(|id| store.messages_of(id).cloned().collect())
                            .unwrap_or_default();
                        let _ = reply.send(messages);
                    }
                    Some(ConnectionCommand::Message { message, reply }) => {
                        let _ = reply.send(session.store().message_by_pointer(message).cloned());
                    }
                    Some(ConnectionCommand::Reset) => {
                        info!("Resetting session");
                        for command in session.reset() {
                            write_command(&mut writer, &command).await?;
                        }
                    }
                    Some(ConnectionCommand::Shutdown) => {
                        info!("Connection shutdown requested");
                        close(&mut writer).await;
                        return Ok(());
                    }
                    None => {
                        info!("Command channel closed, shutting down connection");
                        close(&mut writer).await;
                        return Ok(());
                    }
                }
            }

            // --- Relay stream ---
            read = reader.read(&mut buf) => {
                let n = read.context("Transport read failed")?;
                if n == 0 {
                    anyhow::bail!("Relay closed the connection");
                }
                trace!(bytes = n, "Read from relay");
                let skipped = session
                    .receive(&buf[..n])
                    .context("Protocol violation")?;
                for frame in skipped {
                    let _ = notif_tx.send(ConnectionNotification::FrameSkipped(frame));
                }
            }
        }

        for event in session.drain_events() {
            let _ = notif_tx.send(ConnectionNotification::Changed(event));
        }
    }
}

async fn write_command<W>(writer: &mut W, command: &Command) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    if !matches!(command, Command::Init { .. }) {
        trace!(line = %command.to_line().trim_end(), "Sending command");
    }
    writer.write_all(&command.to_bytes()).await?;
    writer.flush().await
}

/// Best-effort `quit`; the relay may already be gone.
async fn close<W>(writer: &mut W)
where
    W: AsyncWrite + Unpin,
{
    if let Err(e) = write_command(writer, &Command::Quit).await {
        debug!(error = %e, "Could not send quit");
    }
    let _ = writer.shutdown().await;
}
