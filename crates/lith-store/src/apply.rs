//! Routing decoded hdata rows onto entities.

use lith_proto::constants::EVENT_NICKLIST;
use lith_proto::{HData, HDataRow, Pointer, RelayMessage, RowPointers, StructuralRole, Value};
use tracing::{debug, trace, warn};

use crate::events::StoreEvent;
use crate::store::{ConversationId, EntityRef, EntityStore, MessageId};

/// `_diff` marker of a participant leaving the nicklist.
const DIFF_REMOVED: i64 = b'-' as i64;

impl EntityStore {
    /// Fold every hdata object of one relay message into the graph.
    pub fn apply(&mut self, message: &RelayMessage) {
        for hdata in message.hdata() {
            self.apply_hdata(message.id(), hdata);
        }
    }

    pub fn apply_hdata(&mut self, id: &str, hdata: &HData) {
        let Some(role) = hdata.role() else {
            trace!(id, path = %hdata.path_spec(), "Ignoring hdata without a known role");
            return;
        };
        trace!(id, path = %hdata.path_spec(), rows = hdata.rows.len(), "Applying hdata");

        if id == EVENT_NICKLIST {
            self.replace_nicklists(hdata);
        }

        for row in &hdata.rows {
            if role == StructuralRole::Hotlist {
                self.apply_hotlist_row(row);
            } else {
                self.apply_row(hdata.row_pointers(row), row);
            }
        }
    }

    /// A full nicklist replaces the participant sets of the buffers it names.
    fn replace_nicklists(&mut self, hdata: &HData) {
        let mut cleared: Vec<ConversationId> = Vec::new();
        for row in &hdata.rows {
            let parent = hdata.row_pointers(row).conversation;
            if let Some(id) = self.conversation_id(parent) {
                if !cleared.contains(&id) {
                    self.clear_participants(id);
                    cleared.push(id);
                }
            }
        }
    }

    fn apply_row(&mut self, pointers: RowPointers, row: &HDataRow) {
        let role = pointers.primary_role();

        if role == StructuralRole::Participant
            && row.field("_diff").and_then(Value::as_int) == Some(DIFF_REMOVED)
        {
            self.remove_participant(pointers.conversation, pointers.participant);
            return;
        }

        let Some(entity) = self.resolve(pointers.primary(), Some(role), pointers.parent()) else {
            return;
        };

        match entity {
            EntityRef::Conversation(id) => self.apply_conversation_fields(id, row),
            EntityRef::Message(id) => self.apply_message_fields(id, pointers.conversation, row),
            EntityRef::Participant {
                conversation,
                pointer,
            } => self.apply_participant_fields(conversation, pointer, row),
        }
    }

    fn apply_conversation_fields(&mut self, id: ConversationId, row: &HDataRow) {
        let Some(conv) = self.conversation_mut(id) else {
            return;
        };
        let mut changed = false;
        for (name, value) in &row.fields {
            changed |= conv.set_field(name, value);
        }
        if changed {
            let conversation = conv.pointer;
            self.emit(StoreEvent::ConversationChanged { conversation });
        }
    }

    /// Assign line fields, then attach the line to its conversation.
    ///
    /// Attaching waits for the end of the row so the line's date is known
    /// when its position is chosen. The parent comes from a `buffer` pointer
    /// field, or else from the row's own conversation segment.
    fn apply_message_fields(&mut self, id: MessageId, path_parent: Pointer, row: &HDataRow) {
        let mut parent = None;
        let mut changed = false;

        for (name, value) in &row.fields {
            if let Value::Pointer(target) = value {
                if name == "buffer" {
                    parent = self.pointer_field_conversation(*target);
                }
                continue;
            }
            if let Some(msg) = self.message_mut(id) {
                changed |= msg.set_field(name, value);
            }
        }

        if parent.is_none() && !path_parent.is_null() {
            parent = self
                .resolve(path_parent, Some(StructuralRole::Conversation), Pointer::NULL)
                .and_then(|entity| entity.conversation().ok());
        }

        let attached = match (self.message(id).and_then(|m| m.conversation), parent) {
            (None, Some(conversation)) => self.attach_message(id, conversation).is_some(),
            (None, None) => {
                debug!(message = ?self.message(id).map(|m| m.pointer), "Line without a conversation yet");
                false
            }
            _ => false,
        };

        if changed && !attached {
            if let Some(message) = self.message(id).map(|m| m.pointer) {
                self.emit(StoreEvent::MessageChanged { message });
            }
        }
    }

    /// Resolve a `ptr` field value expected to name a conversation.
    fn pointer_field_conversation(&mut self, target: Pointer) -> Option<ConversationId> {
        let entity = self.resolve(target, None, Pointer::NULL)?;
        match entity.conversation() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(pointer = %target, "Ignoring buffer field: {e}");
                None
            }
        }
    }

    fn apply_participant_fields(
        &mut self,
        conversation: ConversationId,
        pointer: Pointer,
        row: &HDataRow,
    ) {
        let Some(conv) = self.conversation_mut(conversation) else {
            return;
        };
        let parent = conv.pointer;
        let Some(participant) = conv.participant_mut(pointer) else {
            return;
        };
        let mut changed = false;
        for (name, value) in &row.fields {
            changed |= participant.set_field(name, value);
        }
        if changed {
            self.emit(StoreEvent::ParticipantChanged {
                conversation: parent,
                participant: pointer,
            });
        }
    }

    /// Hotlist rows carry the conversation in a `buffer` field and the
    /// per-priority counters in `count`.
    fn apply_hotlist_row(&mut self, row: &HDataRow) {
        let Some(target) = row.field("buffer").and_then(Value::as_pointer) else {
            debug!("Hotlist row without a buffer");
            return;
        };
        let Some(id) = self.pointer_field_conversation(target) else {
            return;
        };
        let Some(counts) = row.field("count").and_then(Value::as_array) else {
            return;
        };
        let Some(conv) = self.conversation_mut(id) else {
            return;
        };
        if conv.set_hotlist_counts(counts) {
            let conversation = conv.pointer;
            self.emit(StoreEvent::ConversationChanged { conversation });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lith_proto::constants::{EVENT_NICKLIST_DIFF, LINE_DATA_PATH};
    use lith_proto::testing::HDataBuilder;

    use crate::segments::Segment;

    fn apply(store: &mut EntityStore, body: Vec<u8>) {
        let message = RelayMessage::decode(&body).unwrap();
        store.apply(&message);
    }

    fn buffers(store: &mut EntityStore) {
        let body = HDataBuilder::new("buffer", "number:int,name:str,title:str")
            .row(&[0x10], |w| {
                w.int(1).str("core.weechat").str("WeeChat");
            })
            .row(&[0x20], |w| {
                w.int(2).str("irc.libera.#rust").str("Rust");
            })
            .message("");
        apply(store, body);
    }

    fn bodies(store: &EntityStore, conversation: Pointer) -> Vec<String> {
        let id = store.conversation_id(conversation).unwrap();
        store
            .messages_of(id)
            .map(|m| m.body().to_string())
            .collect()
    }

    #[test]
    fn test_buffer_list() {
        let mut store = EntityStore::new();
        buffers(&mut store);

        let convs = store.conversations();
        assert_eq!(convs.len(), 2);
        assert_eq!(convs[1].name, "irc.libera.#rust");
        assert_eq!(convs[1].title, "Rust");
        assert_eq!(convs[1].number, 2);

        let events = store.drain_events();
        assert_eq!(
            events[..2],
            [
                StoreEvent::ConversationAdded {
                    conversation: Pointer(0x10)
                },
                StoreEvent::ConversationChanged {
                    conversation: Pointer(0x10)
                },
            ]
        );
    }

    #[test]
    fn test_line_data_attaches_to_first_pointer() {
        let mut store = EntityStore::new();
        buffers(&mut store);

        let body = HDataBuilder::new(LINE_DATA_PATH, "message:str")
            .row(&[0x20, 0x21, 0x22, 0x23], |w| {
                w.raw_string(b"\x19F5hello \x1a\x01world");
            })
            .message("");
        apply(&mut store, body);

        assert_eq!(bodies(&store, Pointer(0x20)), vec!["hello world"]);
        let msg = store.message_by_pointer(Pointer(0x23)).unwrap();
        assert_eq!(msg.conversation_pointer, Some(Pointer(0x20)));
    }

    #[test]
    fn test_prefix_and_body_arrive_plain() {
        let mut store = EntityStore::new();
        buffers(&mut store);

        let body = HDataBuilder::new(LINE_DATA_PATH, "prefix:str,message:str")
            .row(&[0x20, 0x21, 0x22, 0x24], |w| {
                w.raw_string(b"\x19F5\x1a\x01@alice")
                    .raw_string(b"\x1c\x19123hi \x1b\x01there");
            })
            .message("");
        apply(&mut store, body);

        let msg = store.message_by_pointer(Pointer(0x24)).unwrap();
        assert_eq!(msg.prefix, "@alice");
        assert_eq!(msg.body(), "hi there");
        assert_eq!(msg.segments(), [Segment::plain("hi there")]);
    }

    #[test]
    fn test_line_added_event_uses_buffer_field() {
        let mut store = EntityStore::new();
        buffers(&mut store);
        store.drain_events();

        let body = HDataBuilder::new(
            "line_data",
            "buffer:ptr,date:tim,prefix:str,message:str,tags_array:arr",
        )
        .row(&[0x77], |w| {
            w.pointer(0x20)
                .time(1_700_000_000)
                .str("alice")
                .str("hi there")
                .tag("str")
                .len(1)
                .str("irc_privmsg");
        })
        .message("_buffer_line_added");
        apply(&mut store, body);

        let msg = store.message_by_pointer(Pointer(0x77)).unwrap();
        assert_eq!(msg.prefix, "alice");
        assert!(msg.is_private_message());
        assert_eq!(msg.timestamp_millis(), Some(1_700_000_000_000));
        assert_eq!(
            store.drain_events(),
            vec![StoreEvent::MessageAdded {
                conversation: Pointer(0x20),
                message: Pointer(0x77),
                position: 0
            }]
        );
    }

    #[test]
    fn test_backfill_lands_in_date_order() {
        let mut store = EntityStore::new();
        buffers(&mut store);

        // Newest first, as the relay answers history requests.
        let mut builder = HDataBuilder::new(LINE_DATA_PATH, "date:tim,message:str");
        for (ptr, secs, text) in [(0x3, 300, "third"), (0x2, 200, "second"), (0x1, 100, "first")] {
            builder = builder.row(&[0x10, 0xa, 0xb, ptr], |w| {
                w.time(secs).str(text);
            });
        }
        apply(&mut store, builder.message(""));

        let live = HDataBuilder::new("line_data", "buffer:ptr,date:tim,message:str")
            .row(&[0x4], |w| {
                w.pointer(0x10).time(400).str("live");
            })
            .message("_buffer_line_added");
        apply(&mut store, live);

        assert_eq!(
            bodies(&store, Pointer(0x10)),
            vec!["first", "second", "third", "live"]
        );
    }

    #[test]
    fn test_updating_attached_line() {
        let mut store = EntityStore::new();
        buffers(&mut store);
        let line = |text: &'static str| {
            HDataBuilder::new(LINE_DATA_PATH, "message:str")
                .row(&[0x10, 0xa, 0xb, 0x5], move |w| {
                    w.str(text);
                })
                .message("")
        };
        apply(&mut store, line("before"));
        store.drain_events();
        apply(&mut store, line("after"));

        assert_eq!(bodies(&store, Pointer(0x10)), vec!["after"]);
        assert_eq!(
            store.drain_events(),
            vec![StoreEvent::MessageChanged {
                message: Pointer(0x5)
            }]
        );
    }

    #[test]
    fn test_buffer_field_naming_a_message_is_ignored() {
        let mut store = EntityStore::new();
        buffers(&mut store);
        let body = HDataBuilder::new(LINE_DATA_PATH, "message:str")
            .row(&[0x10, 0xa, 0xb, 0x5], |w| {
                w.str("first");
            })
            .message("");
        apply(&mut store, body);

        let body = HDataBuilder::new("line_data", "buffer:ptr,message:str")
            .row(&[0x6], |w| {
                w.pointer(0x5).str("orphan");
            })
            .message("_buffer_line_added");
        apply(&mut store, body);

        let orphan = store.message_by_pointer(Pointer(0x6)).unwrap();
        assert_eq!(orphan.conversation_pointer, None);
        assert_eq!(bodies(&store, Pointer(0x10)), vec!["first"]);
    }

    #[test]
    fn test_nicklist_and_diff() {
        let mut store = EntityStore::new();
        buffers(&mut store);

        let body = HDataBuilder::new("buffer/nicklist_item", "group:chr,visible:chr,level:int,name:str")
            .row(&[0x20, 0x100], |w| {
                w.char(1).char(0).int(0).str("root");
            })
            .row(&[0x20, 0x101], |w| {
                w.char(0).char(1).int(0).str("alice");
            })
            .row(&[0x20, 0x102], |w| {
                w.char(0).char(1).int(0).str("bob");
            })
            // Unknown conversation: dropped.
            .row(&[0x30, 0x103], |w| {
                w.char(0).char(1).int(0).str("carol");
            })
            .message("");
        apply(&mut store, body);

        let conv = store.conversation_by_pointer(Pointer(0x20)).unwrap();
        assert_eq!(conv.visible_participants(), vec!["alice", "bob"]);
        assert!(store.conversation_by_pointer(Pointer(0x30)).is_none());

        let diff = HDataBuilder::new("buffer/nicklist_item", "_diff:chr,name:str,visible:chr")
            .row(&[0x20, 0x101], |w| {
                w.char(b'-').str("alice").char(1);
            })
            .row(&[0x20, 0x104], |w| {
                w.char(b'+').str("dave").char(1);
            })
            .message(EVENT_NICKLIST_DIFF);
        apply(&mut store, diff);

        let conv = store.conversation_by_pointer(Pointer(0x20)).unwrap();
        assert_eq!(conv.visible_participants(), vec!["bob", "dave"]);
    }

    #[test]
    fn test_full_nicklist_replaces() {
        let mut store = EntityStore::new();
        buffers(&mut store);
        let nicks = |names: &[(u64, &'static str)], id: &str| {
            let mut builder = HDataBuilder::new("buffer/nicklist_item", "visible:chr,name:str");
            for (ptr, name) in names {
                builder = builder.row(&[0x20, *ptr], |w| {
                    w.char(1).str(name);
                });
            }
            builder.message(id)
        };

        apply(&mut store, nicks(&[(0x1, "alice"), (0x2, "bob")], ""));
        apply(&mut store, nicks(&[(0x3, "carol")], EVENT_NICKLIST));

        let conv = store.conversation_by_pointer(Pointer(0x20)).unwrap();
        assert_eq!(conv.visible_participants(), vec!["carol"]);
        assert!(store
            .drain_events()
            .contains(&StoreEvent::ParticipantsCleared {
                conversation: Pointer(0x20)
            }));
    }

    #[test]
    fn test_hotlist() {
        let mut store = EntityStore::new();
        buffers(&mut store);

        let body = HDataBuilder::new("hotlist", "priority:int,buffer:ptr,count:arr")
            .row(&[0x900], |w| {
                w.int(2).pointer(0x20).tag("int").len(4).int(0).int(7).int(1).int(0);
            })
            .row(&[0x901], |w| {
                w.int(0).pointer(0x55).tag("int").len(4).int(1).int(0).int(0).int(0);
            })
            .message("");
        apply(&mut store, body);

        let conv = store.conversation_by_pointer(Pointer(0x20)).unwrap();
        assert_eq!((conv.unread, conv.highlights), (7, 1));
        assert_eq!(store.conversations().len(), 2);
    }

    #[test]
    fn test_unknown_fields_and_paths_ignored() {
        let mut store = EntityStore::new();
        buffers(&mut store);
        store.drain_events();

        let body = HDataBuilder::new("buffer", "some_future_field:str")
            .row(&[0x10], |w| {
                w.str("whatever");
            })
            .message("");
        apply(&mut store, body);

        let body = HDataBuilder::new("window", "number:int")
            .row(&[0x1], |w| {
                w.int(1);
            })
            .message("");
        apply(&mut store, body);

        assert!(store.drain_events().is_empty());
        assert_eq!(store.conversations().len(), 2);
    }
}
