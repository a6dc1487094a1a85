use crate::error::ProtocolError;
use crate::hdata::HData;
use crate::wire::{Value, WireReader};

/// One decoded frame body: an id followed by typed objects.
///
/// Replies to client commands carry the id the command was tagged with (none
/// for this client); unsolicited sync events carry ids such as
/// `_buffer_line_added`.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayMessage {
    pub id: Option<String>,
    pub objects: Vec<Value>,
}

impl RelayMessage {
    pub fn decode(body: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = WireReader::new(body);
        let id = reader.read_string()?.filter(|id| !id.is_empty());

        let mut objects = Vec::new();
        while !reader.is_empty() {
            objects.push(reader.read_object()?);
        }

        Ok(Self { id, objects })
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn hdata(&self) -> impl Iterator<Item = &HData> {
        self.objects.iter().filter_map(|object| match object {
            Value::HData(hdata) => Some(hdata),
            _ => None,
        })
    }
}
