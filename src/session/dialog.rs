use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::backend::{DialogStateOut, MicrophoneMode};

/// Device identity attached to every config frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Unique device instance ID (e.g., "254636TEST0001")
    pub device_id: String,

    /// Registered device model ID
    pub device_model_id: String,
}

impl DeviceIdentity {
    pub fn new(device_id: impl Into<String>, device_model_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            device_model_id: device_model_id.into(),
        }
    }
}

/// Cross-turn dialog continuation state
///
/// The continuation token returned at the end of turn N is sent back in the
/// config frame of turn N+1. `is_new_conversation` starts out true and flips
/// to false after the first successful response; it never flips back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialogState {
    /// Opaque token returned by the service
    pub continuation_token: Bytes,

    /// True until the first successful response of the conversation
    pub is_new_conversation: bool,

    /// Language of the conversation (e.g., "en-US")
    pub language_code: String,

    /// Whether the last response asked for a follow-up utterance
    pub follow_on: bool,
}

impl DialogState {
    /// A fresh conversation with an empty continuation token
    pub fn new(language_code: impl Into<String>) -> Self {
        Self {
            continuation_token: Bytes::new(),
            is_new_conversation: true,
            language_code: language_code.into(),
            follow_on: false,
        }
    }

    /// Resume a conversation from a previously returned continuation token
    pub fn resume(language_code: impl Into<String>, continuation_token: impl Into<Bytes>) -> Self {
        Self {
            continuation_token: continuation_token.into(),
            is_new_conversation: false,
            language_code: language_code.into(),
            follow_on: false,
        }
    }

    /// Fold a dialog-state-out message into the state for the next turn
    pub fn apply(&mut self, out: &DialogStateOut) {
        self.continuation_token = out.continuation_token.clone();
        self.is_new_conversation = false;
        self.follow_on = out.microphone_mode == MicrophoneMode::DialogFollowOn;
    }
}

impl Default for DialogState {
    fn default() -> Self {
        Self::new("en-US")
    }
}
