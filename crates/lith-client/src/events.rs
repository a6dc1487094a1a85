use lith_proto::Pointer;
use lith_store::{Conversation, Message, StoreEvent};
use tokio::sync::oneshot;

use crate::session::SkippedFrame;

/// Commands sent *to* the connection task.
#[derive(Debug)]
pub enum ConnectionCommand {
    /// Submit a line of input to a conversation.
    Input { conversation: Pointer, text: String },
    /// Ask the relay for older lines of a conversation.
    FetchMoreLines(Pointer),
    /// Snapshot of all conversations, in arrival order.
    Conversations(oneshot::Sender<Vec<Conversation>>),
    /// Snapshot of a conversation's lines, oldest first.
    Messages {
        conversation: Pointer,
        reply: oneshot::Sender<Vec<Message>>,
    },
    Message {
        message: Pointer,
        reply: oneshot::Sender<Option<Message>>,
    },
    /// Discard the local graph and request everything again.
    Reset,
    /// Send `quit` and close the transport.
    Shutdown,
}

/// Notifications sent *from* the connection task.
#[derive(Debug, Clone)]
pub enum ConnectionNotification {
    /// The handshake was written.
    Connected,
    Changed(StoreEvent),
    FrameSkipped(SkippedFrame),
    /// The task ended; `reason` is set unless the shutdown was requested.
    Disconnected { reason: Option<String> },
}
