//! Encoders for building relay payloads in tests.

use bytes::{BufMut, BytesMut};

use crate::constants::{ABSENT_LEN, FRAME_PREAMBLE_LEN};

/// Writes values in the relay's binary encoding.
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn char(&mut self, value: u8) -> &mut Self {
        self.buf.put_u8(value);
        self
    }

    pub fn int(&mut self, value: i32) -> &mut Self {
        self.buf.put_i32(value);
        self
    }

    /// Raw u32, used for element counts.
    pub fn len(&mut self, value: u32) -> &mut Self {
        self.buf.put_u32(value);
        self
    }

    fn short_text(&mut self, text: &str) -> &mut Self {
        self.buf.put_u8(text.len() as u8);
        self.buf.put_slice(text.as_bytes());
        self
    }

    pub fn long(&mut self, value: i64) -> &mut Self {
        self.short_text(&value.to_string())
    }

    pub fn pointer(&mut self, value: u64) -> &mut Self {
        self.short_text(&format!("{value:x}"))
    }

    pub fn time(&mut self, value: i64) -> &mut Self {
        self.short_text(&value.to_string())
    }

    pub fn raw_string(&mut self, raw: &[u8]) -> &mut Self {
        self.buf.put_u32(raw.len() as u32);
        self.buf.put_slice(raw);
        self
    }

    pub fn string(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            Some(text) => self.raw_string(text.as_bytes()),
            None => self.len(ABSENT_LEN),
        }
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.string(Some(value))
    }

    pub fn buffer(&mut self, value: Option<&[u8]>) -> &mut Self {
        match value {
            Some(raw) => self.raw_string(raw),
            None => self.len(ABSENT_LEN),
        }
    }

    /// Three-letter type tag.
    pub fn tag(&mut self, tag: &str) -> &mut Self {
        self.buf.put_slice(tag.as_bytes());
        self
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Wrap a body in an uncompressed frame preamble.
pub fn frame(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + FRAME_PREAMBLE_LEN);
    out.extend_from_slice(&((body.len() + FRAME_PREAMBLE_LEN) as u32).to_be_bytes());
    out.push(0);
    out.extend_from_slice(body);
    out
}

/// Builds an `hda` object row by row.
#[derive(Debug)]
pub struct HDataBuilder {
    path: String,
    keys: String,
    count: i32,
    rows: WireWriter,
}

impl HDataBuilder {
    pub fn new(path: &str, keys: &str) -> Self {
        Self {
            path: path.to_string(),
            keys: keys.to_string(),
            count: 0,
            rows: WireWriter::new(),
        }
    }

    /// Append a row: one pointer per path segment, then whatever `fields` writes.
    pub fn row(mut self, pointers: &[u64], fields: impl FnOnce(&mut WireWriter)) -> Self {
        for pointer in pointers {
            self.rows.pointer(*pointer);
        }
        fields(&mut self.rows);
        self.count += 1;
        self
    }

    /// The object with its `hda` tag.
    pub fn object(self) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.tag("hda")
            .str(&self.path)
            .str(&self.keys)
            .int(self.count);
        let mut out = w.into_bytes();
        out.extend(self.rows.into_bytes());
        out
    }

    /// A full message body: the id string followed by the object.
    pub fn message(self, id: &str) -> Vec<u8> {
        let mut w = WireWriter::new();
        w.str(id);
        let mut out = w.into_bytes();
        out.extend(self.object());
        out
    }
}
