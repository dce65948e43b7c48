//! `google.assistant.embedded.v1alpha2` wire messages and their mapping.
//!
//! Only the fields this crate reads or writes are declared; prost skips
//! unknown fields when decoding, so screen-out, device actions and debug info
//! pass through unnoticed.

use super::frames::{
    DialogStateOut, InboundFrame, MicrophoneMode, OutboundFrame, ServerEvent, SpeechResult,
    TurnConfig, TurnInput,
};
use super::grpc::WireRevision;
use super::ProtocolRevision;
use crate::audio::{AudioInEncoding, AudioOutEncoding};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AssistRequest {
    #[prost(oneof = "assist_request::Type", tags = "1, 2")]
    pub r#type: ::core::option::Option<assist_request::Type>,
}

pub mod assist_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        Config(super::AssistConfig),
        #[prost(bytes = "bytes", tag = "2")]
        AudioIn(::prost::bytes::Bytes),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AssistConfig {
    #[prost(message, optional, tag = "2")]
    pub audio_out_config: ::core::option::Option<AudioOutConfig>,
    #[prost(message, optional, tag = "3")]
    pub dialog_state_in: ::core::option::Option<DialogStateIn>,
    #[prost(message, optional, tag = "4")]
    pub device_config: ::core::option::Option<DeviceConfig>,
    #[prost(oneof = "assist_config::Type", tags = "1, 6")]
    pub r#type: ::core::option::Option<assist_config::Type>,
}

pub mod assist_config {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Type {
        #[prost(message, tag = "1")]
        AudioInConfig(super::AudioInConfig),
        #[prost(string, tag = "6")]
        TextQuery(::prost::alloc::string::String),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AudioInConfig {
    #[prost(enumeration = "audio_in_config::Encoding", tag = "1")]
    pub encoding: i32,
    #[prost(int32, tag = "2")]
    pub sample_rate_hertz: i32,
}

pub mod audio_in_config {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Encoding {
        Unspecified = 0,
        Linear16 = 1,
        Flac = 2,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AudioOutConfig {
    #[prost(enumeration = "audio_out_config::Encoding", tag = "1")]
    pub encoding: i32,
    #[prost(int32, tag = "2")]
    pub sample_rate_hertz: i32,
    #[prost(int32, tag = "3")]
    pub volume_percentage: i32,
}

pub mod audio_out_config {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum Encoding {
        Unspecified = 0,
        Linear16 = 1,
        Mp3 = 2,
        OpusInOgg = 3,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DialogStateIn {
    #[prost(bytes = "bytes", tag = "1")]
    pub conversation_state: ::prost::bytes::Bytes,
    #[prost(string, tag = "2")]
    pub language_code: ::prost::alloc::string::String,
    #[prost(bool, tag = "7")]
    pub is_new_conversation: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DeviceConfig {
    #[prost(string, tag = "1")]
    pub device_id: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub device_model_id: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AssistResponse {
    #[prost(enumeration = "assist_response::EventType", tag = "1")]
    pub event_type: i32,
    #[prost(message, repeated, tag = "2")]
    pub speech_results: ::prost::alloc::vec::Vec<SpeechRecognitionResult>,
    #[prost(message, optional, tag = "3")]
    pub audio_out: ::core::option::Option<AudioOut>,
    #[prost(message, optional, tag = "5")]
    pub dialog_state_out: ::core::option::Option<DialogStateOutMessage>,
}

pub mod assist_response {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum EventType {
        Unspecified = 0,
        EndOfUtterance = 1,
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AudioOut {
    #[prost(bytes = "bytes", tag = "1")]
    pub audio_data: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SpeechRecognitionResult {
    #[prost(string, tag = "1")]
    pub transcript: ::prost::alloc::string::String,
    #[prost(float, tag = "2")]
    pub stability: f32,
}

/// `DialogStateOut` on the wire
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DialogStateOutMessage {
    #[prost(string, tag = "1")]
    pub supplemental_display_text: ::prost::alloc::string::String,
    #[prost(bytes = "bytes", tag = "2")]
    pub conversation_state: ::prost::bytes::Bytes,
    #[prost(enumeration = "dialog_state_out::MicrophoneMode", tag = "3")]
    pub microphone_mode: i32,
    #[prost(int32, tag = "4")]
    pub volume_percentage: i32,
}

pub mod dialog_state_out {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum MicrophoneMode {
        Unspecified = 0,
        CloseMicrophone = 1,
        DialogFollowOn = 2,
    }
}

/// The `Assist` revision
#[derive(Debug, Clone, Copy, Default)]
pub struct AssistV1Alpha2;

impl WireRevision for AssistV1Alpha2 {
    type Request = AssistRequest;
    type Response = AssistResponse;

    const REVISION: ProtocolRevision = ProtocolRevision::V1Alpha2;
    const PATH: &'static str = "/google.assistant.embedded.v1alpha2.EmbeddedAssistant/Assist";

    fn supports_text_query() -> bool {
        true
    }

    fn encode(frame: OutboundFrame) -> Option<AssistRequest> {
        let r#type = match frame {
            OutboundFrame::Config(config) => assist_request::Type::Config(assist_config(config)),
            OutboundFrame::AudioIn(chunk) => assist_request::Type::AudioIn(chunk),
        };
        Some(AssistRequest {
            r#type: Some(r#type),
        })
    }

    fn decode(response: AssistResponse) -> InboundFrame {
        let event = match assist_response::EventType::try_from(response.event_type) {
            Ok(assist_response::EventType::EndOfUtterance) => Some(ServerEvent::EndOfUtterance),
            _ => None,
        };

        InboundFrame {
            event,
            speech_results: response
                .speech_results
                .into_iter()
                .map(|result| SpeechResult::new(result.transcript, result.stability))
                .collect(),
            audio_out: response.audio_out.map(|audio| audio.audio_data),
            dialog_state_out: response.dialog_state_out.map(|out| DialogStateOut {
                continuation_token: out.conversation_state,
                volume_pct: out.volume_percentage,
                display_text: out.supplemental_display_text,
                microphone_mode: microphone_mode(out.microphone_mode),
            }),
            error: None,
        }
    }
}

fn assist_config(config: TurnConfig) -> AssistConfig {
    let r#type = match config.input {
        TurnInput::Audio {
            encoding,
            sample_rate_hz,
        } => assist_config::Type::AudioInConfig(AudioInConfig {
            encoding: in_encoding(encoding) as i32,
            sample_rate_hertz: sample_rate_hz,
        }),
        TurnInput::Text(text) => assist_config::Type::TextQuery(text),
    };

    AssistConfig {
        audio_out_config: Some(AudioOutConfig {
            encoding: out_encoding(config.audio_out.encoding) as i32,
            sample_rate_hertz: config.audio_out.sample_rate_hz,
            volume_percentage: config.audio_out.volume_pct,
        }),
        dialog_state_in: Some(DialogStateIn {
            conversation_state: config.dialog_state.continuation_token.clone(),
            language_code: config.dialog_state.language_code.clone(),
            is_new_conversation: config.dialog_state.is_new_conversation,
        }),
        device_config: Some(DeviceConfig {
            device_id: config.device.device_id,
            device_model_id: config.device.device_model_id,
        }),
        r#type: Some(r#type),
    }
}

fn in_encoding(encoding: AudioInEncoding) -> audio_in_config::Encoding {
    match encoding {
        AudioInEncoding::Unspecified => audio_in_config::Encoding::Unspecified,
        AudioInEncoding::Linear16 => audio_in_config::Encoding::Linear16,
        AudioInEncoding::Flac => audio_in_config::Encoding::Flac,
    }
}

fn out_encoding(encoding: AudioOutEncoding) -> audio_out_config::Encoding {
    match encoding {
        AudioOutEncoding::Unspecified => audio_out_config::Encoding::Unspecified,
        AudioOutEncoding::Linear16 => audio_out_config::Encoding::Linear16,
        AudioOutEncoding::Mp3 => audio_out_config::Encoding::Mp3,
        AudioOutEncoding::OpusInOgg => audio_out_config::Encoding::OpusInOgg,
    }
}

fn microphone_mode(value: i32) -> MicrophoneMode {
    match dialog_state_out::MicrophoneMode::try_from(value) {
        Ok(dialog_state_out::MicrophoneMode::CloseMicrophone) => MicrophoneMode::CloseMicrophone,
        Ok(dialog_state_out::MicrophoneMode::DialogFollowOn) => MicrophoneMode::DialogFollowOn,
        _ => MicrophoneMode::Unspecified,
    }
}
