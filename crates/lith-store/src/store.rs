//! Pointer-keyed arena of conversations and messages.
//!
//! Conversations and messages live in flat tables indexed by remote
//! pointer; participants are owned by their conversation and only looked up
//! through it. Cross references are arena handles, never shared ownership.

use std::collections::HashMap;

use lith_proto::{Pointer, StructuralRole};
use tracing::{debug, warn};

use crate::error::{ResolveError, Result};
use crate::events::StoreEvent;
use crate::models::{Conversation, Message, Participant};

/// Handle of a conversation inside one [`EntityStore`] generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub(crate) usize);

/// Handle of a message inside one [`EntityStore`] generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Conversation,
    Message,
    Participant,
}

/// A resolved entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Conversation(ConversationId),
    Message(MessageId),
    Participant {
        conversation: ConversationId,
        pointer: Pointer,
    },
}

impl EntityRef {
    pub fn kind(&self) -> EntityKind {
        match self {
            EntityRef::Conversation(_) => EntityKind::Conversation,
            EntityRef::Message(_) => EntityKind::Message,
            EntityRef::Participant { .. } => EntityKind::Participant,
        }
    }

    pub fn conversation(self) -> Result<ConversationId> {
        match self {
            EntityRef::Conversation(id) => Ok(id),
            other => Err(ResolveError::TypeMismatch {
                expected: EntityKind::Conversation,
                found: other.kind(),
            }),
        }
    }

    pub fn message(self) -> Result<MessageId> {
        match self {
            EntityRef::Message(id) => Ok(id),
            other => Err(ResolveError::TypeMismatch {
                expected: EntityKind::Message,
                found: other.kind(),
            }),
        }
    }

    pub fn participant(self) -> Result<(ConversationId, Pointer)> {
        match self {
            EntityRef::Participant {
                conversation,
                pointer,
            } => Ok((conversation, pointer)),
            other => Err(ResolveError::TypeMismatch {
                expected: EntityKind::Participant,
                found: other.kind(),
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct EntityStore {
    conversations: Vec<Conversation>,
    conversation_index: HashMap<Pointer, ConversationId>,
    messages: Vec<Message>,
    message_index: HashMap<Pointer, MessageId>,
    events: Vec<StoreEvent>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    /// Resolve `pointer` in its structural role, creating the entity on first
    /// reference.
    ///
    /// Participants are scoped to `parent`, which must name a known
    /// conversation. Without a role the pointer is looked up among
    /// conversations and messages and nothing is created.
    pub fn try_resolve(
        &mut self,
        pointer: Pointer,
        role: Option<StructuralRole>,
        parent: Pointer,
    ) -> Result<EntityRef> {
        if pointer.is_null() {
            return Err(ResolveError::NullPointer);
        }

        match role {
            Some(StructuralRole::Conversation) => {
                Ok(EntityRef::Conversation(self.conversation_or_insert(pointer)))
            }
            Some(StructuralRole::Message) => Ok(EntityRef::Message(self.message_or_insert(pointer))),
            Some(StructuralRole::Participant) => {
                let conversation = self
                    .conversation_id(parent)
                    .ok_or(ResolveError::UnresolvedParent { pointer, parent })?;
                self.participant_or_insert(conversation, pointer);
                Ok(EntityRef::Participant {
                    conversation,
                    pointer,
                })
            }
            Some(StructuralRole::Hotlist) | None => self.lookup(pointer),
        }
    }

    /// [`try_resolve`](Self::try_resolve), logging failures instead of returning them.
    pub fn resolve(
        &mut self,
        pointer: Pointer,
        role: Option<StructuralRole>,
        parent: Pointer,
    ) -> Option<EntityRef> {
        match self.try_resolve(pointer, role, parent) {
            Ok(entity) => Some(entity),
            Err(e @ ResolveError::UnresolvedParent { .. }) => {
                warn!(pointer = %pointer, parent = %parent, "Dropping update: {e}");
                None
            }
            Err(e) => {
                debug!(pointer = %pointer, ?role, "Unresolved pointer: {e}");
                None
            }
        }
    }

    /// Type-agnostic lookup among conversations and messages.
    pub fn lookup(&self, pointer: Pointer) -> Result<EntityRef> {
        if pointer.is_null() {
            return Err(ResolveError::NullPointer);
        }
        if let Some(id) = self.conversation_index.get(&pointer) {
            return Ok(EntityRef::Conversation(*id));
        }
        if let Some(id) = self.message_index.get(&pointer) {
            return Ok(EntityRef::Message(*id));
        }
        Err(ResolveError::NotFound(pointer))
    }

    fn conversation_or_insert(&mut self, pointer: Pointer) -> ConversationId {
        if let Some(id) = self.conversation_index.get(&pointer) {
            return *id;
        }
        let id = ConversationId(self.conversations.len());
        self.conversations.push(Conversation::new(pointer));
        self.conversation_index.insert(pointer, id);
        debug!(pointer = %pointer, "New conversation");
        self.emit(StoreEvent::ConversationAdded {
            conversation: pointer,
        });
        id
    }

    fn message_or_insert(&mut self, pointer: Pointer) -> MessageId {
        if let Some(id) = self.message_index.get(&pointer) {
            return *id;
        }
        let id = MessageId(self.messages.len());
        self.messages.push(Message::new(pointer));
        self.message_index.insert(pointer, id);
        id
    }

    fn participant_or_insert(&mut self, conversation: ConversationId, pointer: Pointer) {
        let conv = &mut self.conversations[conversation.0];
        if conv.participant(pointer).is_some() {
            return;
        }
        let parent = conv.pointer;
        conv.participants.push(Participant::new(pointer, parent));
        self.emit(StoreEvent::ParticipantAdded {
            conversation: parent,
            participant: pointer,
        });
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// All conversations in arrival order.
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn conversation(&self, id: ConversationId) -> Option<&Conversation> {
        self.conversations.get(id.0)
    }

    pub fn conversation_mut(&mut self, id: ConversationId) -> Option<&mut Conversation> {
        self.conversations.get_mut(id.0)
    }

    pub fn conversation_id(&self, pointer: Pointer) -> Option<ConversationId> {
        self.conversation_index.get(&pointer).copied()
    }

    pub fn conversation_by_pointer(&self, pointer: Pointer) -> Option<&Conversation> {
        self.conversation_id(pointer)
            .and_then(|id| self.conversation(id))
    }

    pub fn message(&self, id: MessageId) -> Option<&Message> {
        self.messages.get(id.0)
    }

    pub(crate) fn message_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.get_mut(id.0)
    }

    pub fn message_by_pointer(&self, pointer: Pointer) -> Option<&Message> {
        self.message_index
            .get(&pointer)
            .and_then(|id| self.message(*id))
    }

    /// Lines of a conversation, in stored order.
    pub fn messages_of(&self, conversation: ConversationId) -> impl Iterator<Item = &Message> + '_ {
        self.conversation(conversation)
            .map(|c| c.messages.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|id| self.message(*id))
    }

    /// The conversation a message is attached to, if any.
    pub fn owner_of(&self, message: MessageId) -> Option<&Conversation> {
        self.message(message)
            .and_then(|m| m.conversation)
            .and_then(|id| self.conversation(id))
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Attach a message to its conversation, keeping dated lines in date order.
    ///
    /// Undated lines go to the tail. A dated line goes before the first held
    /// line with a later date. Returns the insert position, or `None` if the
    /// message was already attached.
    pub(crate) fn attach_message(
        &mut self,
        message: MessageId,
        conversation: ConversationId,
    ) -> Option<usize> {
        let msg = self.messages.get(message.0)?;
        if msg.conversation.is_some() {
            return None;
        }
        let date = msg.date;
        let conv = self.conversations.get(conversation.0)?;

        let position = match date {
            None => conv.messages.len(),
            Some(date) => conv
                .messages
                .iter()
                .position(|id| self.messages[id.0].date.is_some_and(|d| d > date))
                .unwrap_or(conv.messages.len()),
        };

        let conversation_pointer = conv.pointer;
        self.conversations[conversation.0]
            .messages
            .insert(position, message);

        let msg = &mut self.messages[message.0];
        msg.conversation = Some(conversation);
        msg.conversation_pointer = Some(conversation_pointer);
        let message_pointer = msg.pointer;

        self.emit(StoreEvent::MessageAdded {
            conversation: conversation_pointer,
            message: message_pointer,
            position,
        });
        Some(position)
    }

    /// Remove a participant from a conversation by pointer.
    pub fn remove_participant(&mut self, conversation: Pointer, participant: Pointer) -> bool {
        let Some(id) = self.conversation_id(conversation) else {
            warn!(conversation = %conversation, participant = %participant, "Participant removal for unknown conversation");
            return false;
        };
        if !self.conversations[id.0].remove_participant(participant) {
            debug!(conversation = %conversation, participant = %participant, "No such participant to remove");
            return false;
        }
        self.emit(StoreEvent::ParticipantRemoved {
            conversation,
            participant,
        });
        true
    }

    pub(crate) fn clear_participants(&mut self, conversation: ConversationId) {
        let Some(conv) = self.conversations.get_mut(conversation.0) else {
            return;
        };
        if conv.participants.is_empty() {
            return;
        }
        conv.participants.clear();
        let pointer = conv.pointer;
        self.emit(StoreEvent::ParticipantsCleared {
            conversation: pointer,
        });
    }

    /// Discard every conversation, message and participant.
    pub fn reset(&mut self) {
        self.conversations.clear();
        self.conversation_index.clear();
        self.messages.clear();
        self.message_index.clear();
        self.events.clear();
        self.emit(StoreEvent::Reset);
    }

    pub(crate) fn emit(&mut self, event: StoreEvent) {
        self.events.push(event);
    }

    /// Take the notifications accumulated since the last call.
    pub fn drain_events(&mut self) -> Vec<StoreEvent> {
        std::mem::take(&mut self.events)
    }
}
