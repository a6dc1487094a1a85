use serde::{Deserialize, Serialize};

/// Opaque identifier the relay assigns to a remote object.
///
/// Travels as hex text on the wire; `0` means "no object".
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Pointer(pub u64);

impl Pointer {
    pub const NULL: Pointer = Pointer(0);

    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    pub fn to_hex(&self) -> String {
        format!("{:x}", self.0)
    }

    /// Parse hex digits, with or without a `0x` prefix.
    ///
    /// Anything unparsable (including the empty string) is the null pointer.
    pub fn from_hex(s: &str) -> Self {
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        Self(u64::from_str_radix(digits, 16).unwrap_or(0))
    }
}

impl std::fmt::Display for Pointer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", self.to_hex())
    }
}

impl From<u64> for Pointer {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Three-letter type tags of the relay's object encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Char,
    Int,
    Long,
    Str,
    Buffer,
    Pointer,
    Time,
    HashTable,
    HData,
    Info,
    Infolist,
    Array,
}

impl ObjectType {
    pub fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"chr" => Some(Self::Char),
            b"int" => Some(Self::Int),
            b"lon" => Some(Self::Long),
            b"str" => Some(Self::Str),
            b"buf" => Some(Self::Buffer),
            b"ptr" => Some(Self::Pointer),
            b"tim" => Some(Self::Time),
            b"htb" => Some(Self::HashTable),
            b"hda" => Some(Self::HData),
            b"inf" => Some(Self::Info),
            b"inl" => Some(Self::Infolist),
            b"arr" => Some(Self::Array),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Char => "chr",
            Self::Int => "int",
            Self::Long => "lon",
            Self::Str => "str",
            Self::Buffer => "buf",
            Self::Pointer => "ptr",
            Self::Time => "tim",
            Self::HashTable => "htb",
            Self::HData => "hda",
            Self::Info => "inf",
            Self::Infolist => "inl",
            Self::Array => "arr",
        }
    }
}

impl std::fmt::Display for ObjectType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
