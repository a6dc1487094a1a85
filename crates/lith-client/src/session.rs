//! One relay session: stream bytes in, entity graph and commands out.
//!
//! The session performs no I/O. It is driven by [`crate::connection`] or
//! directly by tests.

use lith_proto::{Command, FrameReader, Pointer, ProtocolError};
use lith_store::{EntityStore, StoreEvent};
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// Bytes of an undecodable frame body kept in the log line.
const HEX_PREVIEW_LEN: usize = 64;

/// A complete frame that could not be decoded and was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFrame {
    pub error: ProtocolError,
    pub len: usize,
}

#[derive(Debug)]
pub struct Session {
    reader: FrameReader,
    store: EntityStore,
    passphrase: String,
    history_page: usize,
}

impl Session {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            reader: FrameReader::new(config.max_frame_len),
            store: EntityStore::new(),
            passphrase: config.passphrase.clone(),
            history_page: config.history_page,
        }
    }

    /// Commands to send once the transport is up.
    pub fn handshake(&self) -> Vec<Command> {
        Command::handshake(&self.passphrase, self.history_page)
    }

    /// Feed one transport read.
    ///
    /// Frames that fail to decode are logged and skipped; only errors that
    /// leave the stream unusable are returned.
    pub fn receive(&mut self, data: &[u8]) -> Result<Vec<SkippedFrame>, ProtocolError> {
        let mut skipped = Vec::new();

        for frame in self.reader.push(data)? {
            match frame.decode() {
                Ok(message) => {
                    debug!(id = message.id(), objects = message.objects.len(), "Relay message");
                    self.store.apply(&message);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(
                        error = %e,
                        len = frame.body.len(),
                        body = %frame.hex_preview(HEX_PREVIEW_LEN),
                        "Skipping undecodable frame"
                    );
                    skipped.push(SkippedFrame {
                        error: e,
                        len: frame.body.len(),
                    });
                }
            }
        }

        Ok(skipped)
    }

    /// Submit text to a conversation, verbatim.
    pub fn input(&self, conversation: Pointer, text: &str) -> Command {
        Command::Input {
            buffer: conversation,
            text: text.to_string(),
        }
    }

    /// Next history request for a conversation, if one is due.
    pub fn fetch_more_lines(&mut self, conversation: Pointer) -> Option<Command> {
        let page = self.history_page;
        let id = self.store.conversation_id(conversation)?;
        self.store.conversation_mut(id)?.fetch_more_lines(page)
    }

    /// Drop the entity graph and return the requests that repopulate it.
    ///
    /// The transport stays up, so a frame already in flight is kept and
    /// completes normally.
    pub fn reset(&mut self) -> Vec<Command> {
        self.store.reset();
        self.handshake()
            .into_iter()
            .filter(|cmd| !matches!(cmd, Command::Init { .. } | Command::Sync))
            .collect()
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        self.store.drain_events()
    }

    /// `(received, expected)` body bytes of a frame still in flight.
    pub fn progress(&self) -> Option<(usize, usize)> {
        self.reader.progress()
    }
}
