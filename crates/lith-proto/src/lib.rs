//! # lith-proto
//!
//! Wire-level half of the lith relay client: the typed binary decoder,
//! hdata records, stream framing, and the line-oriented commands sent back
//! to the relay. Nothing here performs I/O.

pub mod constants;
pub mod frame;
pub mod hdata;
pub mod message;
pub mod protocol;
pub mod types;
pub mod wire;

mod error;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::ProtocolError;
pub use frame::{Frame, FrameReader};
pub use hdata::{HData, HDataRow, Key, RowPointers, StructuralRole};
pub use message::RelayMessage;
pub use protocol::Command;
pub use types::{ObjectType, Pointer};
pub use wire::{Value, WireReader};
