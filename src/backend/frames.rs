//! Revision-independent frames exchanged over a conversation stream.
//!
//! Each protocol revision translates these to and from its own wire messages,
//! so transports never see revision-specific types.

use bytes::Bytes;

use crate::audio::{AudioInEncoding, AudioOutEncoding};
use crate::session::{DeviceIdentity, DialogState};

/// What the config frame asks the assistant to process
#[derive(Debug, Clone, PartialEq)]
pub enum TurnInput {
    /// Audio chunks follow the config frame
    Audio {
        encoding: AudioInEncoding,
        sample_rate_hz: i32,
    },
    /// A single text query, no audio follows
    Text(String),
}

/// Audio-out parameters carried on every config frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioOutConfig {
    pub encoding: AudioOutEncoding,
    pub sample_rate_hz: i32,
    pub volume_pct: i32,
}

/// The single configuration frame that opens every stream
#[derive(Debug, Clone, PartialEq)]
pub struct TurnConfig {
    pub input: TurnInput,
    pub audio_out: AudioOutConfig,
    pub device: DeviceIdentity,
    pub dialog_state: DialogState,
}

impl TurnConfig {
    pub fn text_query(&self) -> Option<&str> {
        match &self.input {
            TurnInput::Text(text) => Some(text),
            TurnInput::Audio { .. } => None,
        }
    }
}

/// Client → service
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundFrame {
    Config(TurnConfig),
    AudioIn(Bytes),
}

impl OutboundFrame {
    pub fn as_config(&self) -> Option<&TurnConfig> {
        match self {
            Self::Config(config) => Some(config),
            Self::AudioIn(_) => None,
        }
    }
}

/// Server-side events that are not data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerEvent {
    /// The service detected the end of the user's utterance
    EndOfUtterance,
}

/// Whether the device should keep listening after the response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MicrophoneMode {
    #[default]
    Unspecified,
    /// The conversation turn is over
    CloseMicrophone,
    /// The assistant expects a follow-up
    DialogFollowOn,
}

/// One recognition hypothesis segment
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechResult {
    pub transcript: String,
    pub stability: f32,
}

impl SpeechResult {
    pub fn new(transcript: impl Into<String>, stability: f32) -> Self {
        Self {
            transcript: transcript.into(),
            stability,
        }
    }
}

/// Dialog continuation data returned at the end of a response
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DialogStateOut {
    pub continuation_token: Bytes,
    pub volume_pct: i32,
    pub display_text: String,
    pub microphone_mode: MicrophoneMode,
}

impl DialogStateOut {
    /// True once the service has closed the microphone for this conversation turn
    pub fn is_final(&self) -> bool {
        self.microphone_mode == MicrophoneMode::CloseMicrophone
    }
}

/// Error reported inside the response stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStatus {
    pub code: i32,
    pub message: String,
}

/// Service → client. A single wire response may populate several fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InboundFrame {
    pub event: Option<ServerEvent>,
    pub speech_results: Vec<SpeechResult>,
    pub audio_out: Option<Bytes>,
    pub dialog_state_out: Option<DialogStateOut>,
    pub error: Option<RemoteStatus>,
}

impl InboundFrame {
    pub fn audio(data: impl Into<Bytes>) -> Self {
        Self {
            audio_out: Some(data.into()),
            ..Default::default()
        }
    }

    pub fn speech(results: Vec<SpeechResult>) -> Self {
        Self {
            speech_results: results,
            ..Default::default()
        }
    }

    pub fn dialog_state(out: DialogStateOut) -> Self {
        Self {
            dialog_state_out: Some(out),
            ..Default::default()
        }
    }

    pub fn end_of_utterance() -> Self {
        Self {
            event: Some(ServerEvent::EndOfUtterance),
            ..Default::default()
        }
    }

    pub fn remote_error(code: i32, message: impl Into<String>) -> Self {
        Self {
            error: Some(RemoteStatus {
                code,
                message: message.into(),
            }),
            ..Default::default()
        }
    }

    /// A frame carrying nothing at all
    pub fn is_empty(&self) -> bool {
        self.event.is_none()
            && self.speech_results.is_empty()
            && self.audio_out.is_none()
            && self.dialog_state_out.is_none()
            && self.error.is_none()
    }
}
