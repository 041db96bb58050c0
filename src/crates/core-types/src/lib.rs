//! Shared low-level DTOs for the TARX inference client.
//!
//! Kept dependency-light (serde only) so every other crate can use them.

pub mod message;
pub mod model;

pub use message::{ContentPart, ConversationTurn, ImageSource, Message, MessageContent, MessageRole};
pub use model::{ModelDescriptor, ModelInfo};
