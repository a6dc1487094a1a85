use lith_proto::Pointer;
use serde::Serialize;

/// Change notifications emitted by [`EntityStore`](crate::EntityStore).
///
/// Entities are named by their remote pointers so a consumer can hold on to
/// an event across a reset without dangling arena handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreEvent {
    ConversationAdded {
        conversation: Pointer,
    },
    ConversationChanged {
        conversation: Pointer,
    },
    /// A line was attached to its conversation at `position`.
    MessageAdded {
        conversation: Pointer,
        message: Pointer,
        position: usize,
    },
    MessageChanged {
        message: Pointer,
    },
    ParticipantAdded {
        conversation: Pointer,
        participant: Pointer,
    },
    ParticipantChanged {
        conversation: Pointer,
        participant: Pointer,
    },
    ParticipantRemoved {
        conversation: Pointer,
        participant: Pointer,
    },
    ParticipantsCleared {
        conversation: Pointer,
    },
    /// Everything was discarded.
    Reset,
}
