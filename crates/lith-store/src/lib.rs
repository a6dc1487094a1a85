//! # lith-store
//!
//! The client-side object graph: conversations, their lines and their
//! participants, reconstructed from a stream of pointer-identified hdata
//! updates. The store owns every entity; callers get arena handles or
//! borrowed views and a queue of [`StoreEvent`]s describing what changed.

pub mod events;
pub mod models;
pub mod segments;
pub mod store;

mod apply;
mod error;

pub use error::{ResolveError, Result};
pub use events::StoreEvent;
pub use models::{Conversation, Message, Participant};
pub use segments::{Segment, SegmentKind};
pub use store::{ConversationId, EntityKind, EntityRef, EntityStore, MessageId};
