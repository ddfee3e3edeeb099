//! Wire models exchanged with the chat backend.

pub mod message;
pub mod room;

pub use message::{ChatMessage, OutboundMessage};
pub use room::{ChatRoom, ImageUpload};
pub(crate) use room::UploadResponse;
