//! Primitive decoders for the relay's typed binary encoding.
//!
//! Every read consumes exactly its type's encoding from the front of the
//! cursor. A declared length larger than what is left fails with
//! [`ProtocolError::TruncatedInput`]; values that are length-consistent but
//! nonsensical (non-digit longs, non-hex pointers) are accepted as zero.

use bytes::{Buf, Bytes};

use crate::constants::{ABSENT_LEN, MAX_NESTING_DEPTH};
use crate::error::ProtocolError;
use crate::hdata::HData;
use crate::types::{ObjectType, Pointer};

/// A decoded relay object.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Char(u8),
    Int(i32),
    Long(i64),
    /// `None` when the relay sent the absent-string sentinel.
    Str(Option<String>),
    Buffer(Option<Bytes>),
    Pointer(Pointer),
    /// Unix timestamp in seconds.
    Time(i64),
    Array(Vec<Value>),
    HashTable(Vec<(Value, Value)>),
    HData(HData),
    Info {
        name: Option<String>,
        value: Option<String>,
    },
    Infolist {
        name: Option<String>,
        items: Vec<Vec<(String, Value)>>,
    },
}

impl Value {
    /// Integer view of `chr`, `int` and `lon` values.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Char(c) => Some(i64::from(*c)),
            Value::Int(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        self.as_int().map(|i| i != 0)
    }

    /// Text of a string value; absent strings read as empty.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_deref().unwrap_or("")),
            _ => None,
        }
    }

    pub fn as_pointer(&self) -> Option<Pointer> {
        match self {
            Value::Pointer(p) => Some(*p),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<i64> {
        match self {
            Value::Time(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// Remove the relay's embedded colour and attribute escapes.
///
/// `0x1a`/`0x1b` drop themselves and one following byte and `0x1c` drops
/// itself. `0x19` drops itself and three following bytes, or two when the
/// next byte is `'F'`. A single left-to-right pass, so the output never
/// contains an escape byte.
pub fn strip_color_codes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let width = match raw[i] {
            0x1a | 0x1b => 2,
            0x1c => 1,
            0x19 if raw.get(i + 1) == Some(&b'F') => 3,
            0x19 => 4,
            byte => {
                out.push(byte);
                1
            }
        };
        i += width;
    }
    out
}

/// Cursor over one frame body.
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    depth: usize,
}

impl<'a> WireReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, depth: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    fn ensure(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.remaining() < needed {
            return Err(ProtocolError::TruncatedInput {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ProtocolError> {
        self.ensure(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Length byte followed by that many ASCII characters.
    fn read_short_text(&mut self) -> Result<&'a str, ProtocolError> {
        let len = usize::from(self.read_char()?);
        let raw = self.take(len)?;
        Ok(std::str::from_utf8(raw).unwrap_or(""))
    }

    pub fn read_object_type(&mut self) -> Result<ObjectType, ProtocolError> {
        let tag = self.take(3)?;
        ObjectType::from_tag(tag)
            .ok_or_else(|| ProtocolError::UnknownType(String::from_utf8_lossy(tag).into_owned()))
    }

    pub fn read_char(&mut self) -> Result<u8, ProtocolError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    pub fn read_int(&mut self) -> Result<i32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_i32())
    }

    fn read_len(&mut self) -> Result<u32, ProtocolError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn read_long(&mut self) -> Result<i64, ProtocolError> {
        Ok(self.read_short_text()?.parse().unwrap_or(0))
    }

    pub fn read_string(&mut self) -> Result<Option<String>, ProtocolError> {
        let len = self.read_len()?;
        if len == ABSENT_LEN {
            return Ok(None);
        }
        let raw = self.take(len as usize)?;
        let stripped = strip_color_codes(raw);
        Ok(Some(String::from_utf8_lossy(&stripped).into_owned()))
    }

    pub fn read_buffer(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        let len = self.read_len()?;
        if len == ABSENT_LEN {
            return Ok(None);
        }
        let raw = self.take(len as usize)?;
        Ok(Some(Bytes::copy_from_slice(raw)))
    }

    pub fn read_pointer(&mut self) -> Result<Pointer, ProtocolError> {
        Ok(Pointer::from_hex(self.read_short_text()?))
    }

    pub fn read_time(&mut self) -> Result<i64, ProtocolError> {
        Ok(self.read_short_text()?.parse().unwrap_or(0))
    }

    /// Element type tag, element count, elements.
    pub fn read_array(&mut self) -> Result<Vec<Value>, ProtocolError> {
        let ty = self.read_object_type()?;
        let count = self.read_len()? as usize;
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            items.push(self.read_value(ty)?);
        }
        Ok(items)
    }

    /// Key type tag, value type tag, pair count, pairs.
    pub fn read_hashtable(&mut self) -> Result<Vec<(Value, Value)>, ProtocolError> {
        let key_ty = self.read_object_type()?;
        let value_ty = self.read_object_type()?;
        let count = self.read_len()? as usize;
        let mut pairs = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            let key = self.read_value(key_ty)?;
            let value = self.read_value(value_ty)?;
            pairs.push((key, value));
        }
        Ok(pairs)
    }

    fn read_infolist(&mut self) -> Result<Value, ProtocolError> {
        let name = self.read_string()?;
        let count = self.read_len()? as usize;
        let mut items = Vec::with_capacity(count.min(self.remaining()));
        for _ in 0..count {
            let vars = self.read_len()? as usize;
            let mut item = Vec::with_capacity(vars.min(self.remaining()));
            for _ in 0..vars {
                let var_name = self.read_string()?.unwrap_or_default();
                let ty = self.read_object_type()?;
                item.push((var_name, self.read_value(ty)?));
            }
            items.push(item);
        }
        Ok(Value::Infolist { name, items })
    }

    pub fn read_value(&mut self, ty: ObjectType) -> Result<Value, ProtocolError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ProtocolError::NestingTooDeep(MAX_NESTING_DEPTH));
        }
        self.depth += 1;
        let value = self.read_value_inner(ty);
        self.depth -= 1;
        value
    }

    fn read_value_inner(&mut self, ty: ObjectType) -> Result<Value, ProtocolError> {
        let value = match ty {
            ObjectType::Char => Value::Char(self.read_char()?),
            ObjectType::Int => Value::Int(self.read_int()?),
            ObjectType::Long => Value::Long(self.read_long()?),
            ObjectType::Str => Value::Str(self.read_string()?),
            ObjectType::Buffer => Value::Buffer(self.read_buffer()?),
            ObjectType::Pointer => Value::Pointer(self.read_pointer()?),
            ObjectType::Time => Value::Time(self.read_time()?),
            ObjectType::Array => Value::Array(self.read_array()?),
            ObjectType::HashTable => Value::HashTable(self.read_hashtable()?),
            ObjectType::HData => Value::HData(HData::decode(self)?),
            ObjectType::Info => Value::Info {
                name: self.read_string()?,
                value: self.read_string()?,
            },
            ObjectType::Infolist => self.read_infolist()?,
        };
        Ok(value)
    }

    /// Type tag followed by the object itself.
    pub fn read_object(&mut self) -> Result<Value, ProtocolError> {
        let ty = self.read_object_type()?;
        self.read_value(ty)
    }
}
