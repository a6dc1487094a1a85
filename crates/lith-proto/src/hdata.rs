//! Structured update records ("hdata").
//!
//! Layout after the `hda` type tag:
//!
//! ```text
//! [path: str]   slash-separated object names, e.g. buffer/lines/line/line_data
//! [keys: str]   comma-separated name:type pairs
//! [count: int]
//! count x ( one ptr per path segment, then one value per key )
//! ```

use tracing::trace;

use crate::constants::{
    LINE_DATA_PATH, SEGMENT_BUFFER, SEGMENT_HOTLIST, SEGMENT_LINE_DATA, SEGMENT_NICKLIST_ITEM,
};
use crate::error::ProtocolError;
use crate::types::{ObjectType, Pointer};
use crate::wire::{Value, WireReader};

/// Which kind of entity a path segment denotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructuralRole {
    Conversation,
    Message,
    Participant,
    Hotlist,
}

impl StructuralRole {
    pub fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            SEGMENT_BUFFER => Some(Self::Conversation),
            SEGMENT_LINE_DATA => Some(Self::Message),
            SEGMENT_NICKLIST_ITEM => Some(Self::Participant),
            SEGMENT_HOTLIST => Some(Self::Hotlist),
            _ => None,
        }
    }
}

/// One `name:type` entry of the keys spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    pub name: String,
    pub ty: ObjectType,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HDataRow {
    /// One pointer per path segment, in path order.
    pub pointers: Vec<Pointer>,
    /// One value per key, in key order.
    pub fields: Vec<(String, Value)>,
}

impl HDataRow {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }
}

/// The pointers of a row, sorted by the structural meaning of their segment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowPointers {
    pub conversation: Pointer,
    pub message: Pointer,
    pub participant: Pointer,
}

impl RowPointers {
    /// The entity the row's fields are assigned to.
    pub fn primary(&self) -> Pointer {
        if !self.participant.is_null() {
            self.participant
        } else if !self.message.is_null() {
            self.message
        } else {
            self.conversation
        }
    }

    /// Structural role of [`primary`](Self::primary).
    pub fn primary_role(&self) -> StructuralRole {
        if !self.participant.is_null() {
            StructuralRole::Participant
        } else if !self.message.is_null() {
            StructuralRole::Message
        } else {
            StructuralRole::Conversation
        }
    }

    /// Parent context for participant rows; null otherwise.
    pub fn parent(&self) -> Pointer {
        if self.participant.is_null() {
            Pointer::NULL
        } else {
            self.conversation
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HData {
    pub path: Vec<String>,
    pub keys: Vec<Key>,
    pub rows: Vec<HDataRow>,
}

impl HData {
    /// Decode the body of an `hda` object.
    pub fn decode(reader: &mut WireReader<'_>) -> Result<Self, ProtocolError> {
        let path_spec = reader.read_string()?.unwrap_or_default();
        let keys_spec = reader.read_string()?.unwrap_or_default();
        let count = reader.read_int()?.max(0) as usize;

        let path: Vec<String> = path_spec
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(str::to_string)
            .collect();
        let keys = parse_keys(&keys_spec)?;

        if count > 0 {
            check_path(&path_spec, &path)?;
        }

        trace!(path = %path_spec, keys = %keys_spec, count, "Decoding hdata");

        let mut rows = Vec::with_capacity(count.min(reader.remaining()));
        for _ in 0..count {
            let pointers = path
                .iter()
                .map(|_| reader.read_pointer())
                .collect::<Result<Vec<_>, _>>()?;

            let mut fields = Vec::with_capacity(keys.len());
            for key in &keys {
                fields.push((key.name.clone(), reader.read_value(key.ty)?));
            }

            rows.push(HDataRow { pointers, fields });
        }

        Ok(Self { path, keys, rows })
    }

    /// Role of the entities the rows describe, from the last path segment.
    pub fn role(&self) -> Option<StructuralRole> {
        self.path
            .last()
            .and_then(|segment| StructuralRole::from_segment(segment))
    }

    pub fn path_spec(&self) -> String {
        self.path.join("/")
    }

    pub fn row_pointers(&self, row: &HDataRow) -> RowPointers {
        let mut pointers = RowPointers::default();
        for (segment, pointer) in self.path.iter().zip(&row.pointers) {
            match StructuralRole::from_segment(segment) {
                Some(StructuralRole::Conversation) => pointers.conversation = *pointer,
                Some(StructuralRole::Message) => pointers.message = *pointer,
                Some(StructuralRole::Participant) => pointers.participant = *pointer,
                _ => {}
            }
        }
        pointers
    }
}

fn parse_keys(spec: &str) -> Result<Vec<Key>, ProtocolError> {
    spec.split(',')
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (name, tag) = entry
                .split_once(':')
                .ok_or_else(|| ProtocolError::MalformedKeys(spec.to_string()))?;
            let ty = ObjectType::from_tag(tag.as_bytes())
                .ok_or_else(|| ProtocolError::UnknownType(tag.to_string()))?;
            Ok(Key {
                name: name.to_string(),
                ty,
            })
        })
        .collect()
}

/// Paths longer than two segments are only understood in the line-data shape.
fn check_path(spec: &str, segments: &[String]) -> Result<(), ProtocolError> {
    if segments.len() > 2 && spec != LINE_DATA_PATH {
        return Err(ProtocolError::MalformedPath(spec.to_string()));
    }
    Ok(())
}
