//! The entities reconstructed from relay updates.
//!
//! Every struct derives `Serialize` so the presentation layer can take a
//! snapshot of it. Arena handles are skipped; relationships are exposed as
//! remote pointers instead.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use lith_proto::{Command, Pointer, Value};
use serde::Serialize;

use crate::segments::{self, Segment};
use crate::store::{ConversationId, MessageId};

/// Tag the relay puts on private (query) messages.
const PRIVMSG_TAG: &str = "irc_privmsg";

fn set_if_changed<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn text(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

fn timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_time()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// One relay buffer: a channel, a query, or a server/core buffer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    pub pointer: Pointer,
    pub number: i64,
    pub name: String,
    pub full_name: String,
    pub short_name: String,
    pub title: String,
    pub hidden: bool,
    pub local_variables: BTreeMap<String, String>,
    pub unread: i64,
    pub highlights: i64,
    #[serde(skip)]
    pub(crate) messages: Vec<MessageId>,
    pub(crate) participants: Vec<Participant>,
    after_initial_fetch: bool,
    last_requested: usize,
}

impl Conversation {
    pub fn new(pointer: Pointer) -> Self {
        Self {
            pointer,
            ..Self::default()
        }
    }

    /// Assign one hdata field. Returns whether a known field changed.
    pub fn set_field(&mut self, name: &str, value: &Value) -> bool {
        match name {
            "number" => value
                .as_int()
                .is_some_and(|n| set_if_changed(&mut self.number, n)),
            "name" => text(value).is_some_and(|s| set_if_changed(&mut self.name, s)),
            "full_name" => text(value).is_some_and(|s| set_if_changed(&mut self.full_name, s)),
            "short_name" => text(value).is_some_and(|s| set_if_changed(&mut self.short_name, s)),
            "title" => text(value).is_some_and(|s| set_if_changed(&mut self.title, s)),
            "hidden" => value
                .as_bool()
                .is_some_and(|b| set_if_changed(&mut self.hidden, b)),
            "local_variables" => match value {
                Value::HashTable(pairs) => {
                    let vars = pairs
                        .iter()
                        .filter_map(|(k, v)| Some((k.as_str()?.to_string(), v.as_str()?.to_string())))
                        .collect();
                    set_if_changed(&mut self.local_variables, vars)
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Apply a hotlist `count` array: index 1 is unread, index 2 highlights.
    pub fn set_hotlist_counts(&mut self, counts: &[Value]) -> bool {
        if counts.len() < 3 {
            return false;
        }
        let unread = counts[1].as_int().unwrap_or(0);
        let highlights = counts[2].as_int().unwrap_or(0);
        let changed = set_if_changed(&mut self.unread, unread);
        set_if_changed(&mut self.highlights, highlights) || changed
    }

    /// Arena handles of the lines, oldest first.
    pub fn messages(&self) -> &[MessageId] {
        &self.messages
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn participant(&self, pointer: Pointer) -> Option<&Participant> {
        self.participants.iter().find(|p| p.pointer == pointer)
    }

    pub(crate) fn participant_mut(&mut self, pointer: Pointer) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.pointer == pointer)
    }

    /// Remove the first participant with `pointer`. Returns whether one was found.
    pub(crate) fn remove_participant(&mut self, pointer: Pointer) -> bool {
        match self.participants.iter().position(|p| p.pointer == pointer) {
            Some(index) => {
                self.participants.remove(index);
                true
            }
            None => false,
        }
    }

    /// Names of the visible members, leaving out group headers.
    pub fn visible_participants(&self) -> Vec<&str> {
        self.participants
            .iter()
            .filter(|p| p.visible && p.level == 0)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Request `page` more lines of history than are currently held.
    ///
    /// Returns `None` while an earlier request is still outstanding, i.e. the
    /// held line count has not yet reached what was asked for.
    pub fn fetch_more_lines(&mut self, page: usize) -> Option<Command> {
        self.after_initial_fetch = true;
        let held = self.messages.len();
        if held < self.last_requested {
            return None;
        }
        self.last_requested = held + page;
        Some(Command::FetchLines {
            buffer: self.pointer,
            count: self.last_requested,
        })
    }

    /// Whether history beyond the handshake's initial lines was ever requested.
    pub fn is_after_initial_fetch(&self) -> bool {
        self.after_initial_fetch
    }

    pub fn last_requested(&self) -> usize {
        self.last_requested
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// One line of a conversation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Message {
    pub pointer: Pointer,
    /// Remote pointer of the owning conversation, once attached.
    pub conversation_pointer: Option<Pointer>,
    #[serde(skip)]
    pub(crate) conversation: Option<ConversationId>,
    pub date: Option<DateTime<Utc>>,
    pub date_printed: Option<DateTime<Utc>>,
    /// Sender label.
    pub prefix: String,
    body: String,
    pub tags: Vec<String>,
    pub highlight: bool,
    pub displayed: bool,
    segments: Vec<Segment>,
}

impl Message {
    pub fn new(pointer: Pointer) -> Self {
        Self {
            pointer,
            displayed: true,
            ..Self::default()
        }
    }

    pub fn set_field(&mut self, name: &str, value: &Value) -> bool {
        match name {
            "date" => set_if_changed(&mut self.date, timestamp(value)),
            "date_printed" => set_if_changed(&mut self.date_printed, timestamp(value)),
            "prefix" => text(value).is_some_and(|s| set_if_changed(&mut self.prefix, s)),
            "message" => text(value).is_some_and(|s| self.set_body(s)),
            "tags_array" => match value.as_array() {
                Some(items) => {
                    let tags = items
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect();
                    set_if_changed(&mut self.tags, tags)
                }
                None => false,
            },
            "highlight" => value
                .as_bool()
                .is_some_and(|b| set_if_changed(&mut self.highlight, b)),
            "displayed" => value
                .as_bool()
                .is_some_and(|b| set_if_changed(&mut self.displayed, b)),
            _ => false,
        }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replace the body text and rebuild its segments.
    pub fn set_body(&mut self, body: String) -> bool {
        if self.body == body {
            return false;
        }
        self.segments = segments::segment(&body);
        self.body = body;
        true
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_private_message(&self) -> bool {
        self.tags.iter().any(|tag| tag == PRIVMSG_TAG)
    }

    /// Timestamp in milliseconds, the unit presentation layers expect.
    pub fn timestamp_millis(&self) -> Option<i64> {
        self.date.map(|d| d.timestamp_millis())
    }
}

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// An entry of a conversation's nicklist: a member or a group header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Participant {
    pub pointer: Pointer,
    pub conversation: Pointer,
    pub name: String,
    pub visible: bool,
    /// Nesting level; 0 for members, above 0 for groups.
    pub level: i64,
    pub group: bool,
    pub prefix: String,
    pub color: String,
    pub prefix_color: String,
}

impl Participant {
    pub fn new(pointer: Pointer, conversation: Pointer) -> Self {
        Self {
            pointer,
            conversation,
            ..Self::default()
        }
    }

    pub fn set_field(&mut self, name: &str, value: &Value) -> bool {
        match name {
            "name" => text(value).is_some_and(|s| set_if_changed(&mut self.name, s)),
            "visible" => value
                .as_bool()
                .is_some_and(|b| set_if_changed(&mut self.visible, b)),
            "level" => value
                .as_int()
                .is_some_and(|n| set_if_changed(&mut self.level, n)),
            "group" => value
                .as_bool()
                .is_some_and(|b| set_if_changed(&mut self.group, b)),
            "prefix" => text(value).is_some_and(|s| set_if_changed(&mut self.prefix, s)),
            "color" => text(value).is_some_and(|s| set_if_changed(&mut self.color, s)),
            "prefix_color" => {
                text(value).is_some_and(|s| set_if_changed(&mut self.prefix_color, s))
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segments::SegmentKind;

    #[test]
    fn test_conversation_fields() {
        let mut conv = Conversation::new(Pointer(1));
        assert!(conv.set_field("name", &Value::Str(Some("irc.libera.#rust".into()))));
        assert!(!conv.set_field("name", &Value::Str(Some("irc.libera.#rust".into()))));
        assert!(conv.set_field("hidden", &Value::Char(1)));
        assert!(conv.set_field("number", &Value::Int(4)));
        assert!(!conv.set_field("no_such_field", &Value::Int(4)));
        // A known name with the wrong type is ignored.
        assert!(!conv.set_field("title", &Value::Int(4)));

        let vars = Value::HashTable(vec![(
            Value::Str(Some("type".into())),
            Value::Str(Some("channel".into())),
        )]);
        assert!(conv.set_field("local_variables", &vars));
        assert_eq!(conv.local_variables.get("type").map(String::as_str), Some("channel"));
        assert_eq!(conv.number, 4);
        assert!(conv.hidden);
    }

    #[test]
    fn test_hotlist_counts() {
        let mut conv = Conversation::new(Pointer(1));
        assert!(!conv.set_hotlist_counts(&[Value::Int(0), Value::Int(5)]));
        let counts = [Value::Int(0), Value::Int(5), Value::Int(2), Value::Int(0)];
        assert!(conv.set_hotlist_counts(&counts));
        assert_eq!((conv.unread, conv.highlights), (5, 2));
        assert!(!conv.set_hotlist_counts(&counts));
    }

    #[test]
    fn test_fetch_more_lines_waits_for_reply() {
        let mut conv = Conversation::new(Pointer(0xab));
        conv.messages = (0..10).map(MessageId).collect();

        assert_eq!(
            conv.fetch_more_lines(25),
            Some(Command::FetchLines {
                buffer: Pointer(0xab),
                count: 35
            })
        );
        assert!(conv.is_after_initial_fetch());
        assert_eq!(conv.fetch_more_lines(25), None);

        conv.messages = (0..35).map(MessageId).collect();
        assert_eq!(
            conv.fetch_more_lines(25),
            Some(Command::FetchLines {
                buffer: Pointer(0xab),
                count: 60
            })
        );
        assert_eq!(conv.last_requested(), 60);
    }

    #[test]
    fn test_visible_participants() {
        let mut conv = Conversation::new(Pointer(1));
        let mut group = Participant::new(Pointer(2), Pointer(1));
        group.name = "000|o".into();
        group.visible = true;
        group.level = 1;
        let mut alice = Participant::new(Pointer(3), Pointer(1));
        alice.name = "alice".into();
        alice.visible = true;
        let mut hidden = Participant::new(Pointer(4), Pointer(1));
        hidden.name = "ghost".into();
        conv.participants = vec![group, alice, hidden];

        assert_eq!(conv.visible_participants(), vec!["alice"]);
        assert!(conv.remove_participant(Pointer(3)));
        assert!(!conv.remove_participant(Pointer(3)));
        assert!(conv.visible_participants().is_empty());
    }

    #[test]
    fn test_message_body_rebuilds_segments() {
        let mut msg = Message::new(Pointer(9));
        assert!(msg.set_field("message", &Value::Str(Some("hi https://x.org/a.gif".into()))));
        assert_eq!(msg.segments().len(), 2);
        assert_eq!(msg.segments()[1].kind, SegmentKind::Image);

        assert!(msg.set_body("plain now".into()));
        assert_eq!(msg.segments().len(), 1);
        assert!(!msg.segments()[0].is_link());
    }

    #[test]
    fn test_message_tags_and_date() {
        let mut msg = Message::new(Pointer(9));
        let tags = Value::Array(vec![
            Value::Str(Some("irc_privmsg".into())),
            Value::Str(Some("nick_bob".into())),
        ]);
        assert!(msg.set_field("tags_array", &tags));
        assert!(msg.is_private_message());

        assert!(msg.set_field("date", &Value::Time(1_700_000_000)));
        assert_eq!(msg.timestamp_millis(), Some(1_700_000_000_000));
    }

    #[test]
    fn test_participant_fields() {
        let mut nick = Participant::new(Pointer(5), Pointer(1));
        assert!(nick.set_field("name", &Value::Str(Some("bob".into()))));
        assert!(nick.set_field("visible", &Value::Char(1)));
        assert!(!nick.set_field("level", &Value::Int(0)));
        assert!(nick.set_field("prefix", &Value::Str(Some("@".into()))));
        assert!(!nick.set_field("_diff", &Value::Char(b'+')));
        assert_eq!(nick.name, "bob");
        assert!(nick.visible);
    }
}
