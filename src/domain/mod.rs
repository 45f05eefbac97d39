pub mod conversation;
pub mod event;

pub use conversation::{Conversation, GroupQuery};
pub use event::{EventFilter, InboundEvent, MediaKind, MediaPayload};
