//! Conversation session management
//!
//! This module owns everything that outlives a single turn:
//! - `ConversationManager`: dials the service and opens conversations
//! - `StreamSession`: the one live bidirectional stream of a conversation
//! - `DialogState`: continuation data carried from turn to turn
//! - `TurnContext`: settings and dialog state shared with the transports

mod context;
mod dialog;
mod manager;
mod stream;

pub use context::TurnContext;
pub use dialog::{DeviceIdentity, DialogState};
pub use manager::{Conversation, ConversationManager, DEFAULT_AUDIO_SESSION_TIMEOUT};
pub use stream::StreamSession;
