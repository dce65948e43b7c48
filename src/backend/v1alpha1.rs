//! `google.assistant.embedded.v1alpha1` wire messages and their mapping.
//!
//! The Converse revision has no text queries and no device identity. Its
//! result message reports the recognised request text once, which is surfaced
//! as a single final speech result.

use super::frames::{
    DialogStateOut, InboundFrame, MicrophoneMode, OutboundFrame, RemoteStatus, ServerEvent,
    SpeechResult, TurnConfig, TurnInput,
};
use super::grpc::WireRevision;
use super::ProtocolRevision;
use crate::audio::{AudioInEncoding, AudioOutEncoding};

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConverseRequest {
    #[prost(oneof = "converse_request::ConverseRequest", tags = "1, 2")]
    pub converse_request: ::core::option::Option<converse_request::ConverseRequest>,
}

pub mod converse_request {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ConverseRequest {
        #[prost(message, tag = "1")]
        Config(super::ConverseConfig),
        #[prost(bytes = "bytes", tag = "2")]
        AudioIn(::prost::bytes::Bytes),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConverseConfig {
    #[prost(message, optional, tag = "1")]
    pub audio_in_config: ::core::option::Option<AudioInConfig>,
    #[prost(message, optional, tag = "2")]
    pub audio_out_config: ::core::option::Option<AudioOutConfig>,
    #[prost(message, optional, tag = "3")]
    pub converse_state: ::core::option::Option<ConverseState>,
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
pub struct ConverseState {
    #[prost(bytes = "bytes", tag = "1")]
    pub conversation_state: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConverseResponse {
    #[prost(oneof = "converse_response::ConverseResponse", tags = "1, 2, 3, 5")]
    pub converse_response: ::core::option::Option<converse_response::ConverseResponse>,
}

pub mod converse_response {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum ConverseResponse {
        #[prost(message, tag = "1")]
        Error(super::Status),
        #[prost(enumeration = "EventType", tag = "2")]
        EventType(i32),
        #[prost(message, tag = "3")]
        AudioOut(super::AudioOut),
        #[prost(message, tag = "5")]
        Result(super::ConverseResult),
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum EventType {
        Unspecified = 0,
        EndOfUtterance = 1,
    }
}

/// `google.rpc.Status` without details
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AudioOut {
    #[prost(bytes = "bytes", tag = "1")]
    pub audio_data: ::prost::bytes::Bytes,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ConverseResult {
    #[prost(string, tag = "1")]
    pub spoken_request_text: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub spoken_response_text: ::prost::alloc::string::String,
    #[prost(bytes = "bytes", tag = "3")]
    pub conversation_state: ::prost::bytes::Bytes,
    #[prost(enumeration = "converse_result::MicrophoneMode", tag = "4")]
    pub microphone_mode: i32,
    #[prost(int32, tag = "5")]
    pub volume_percentage: i32,
}

pub mod converse_result {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum MicrophoneMode {
        Unspecified = 0,
        CloseMicrophone = 1,
        DialogFollowOn = 2,
    }
}

/// The `Converse` revision
#[derive(Debug, Clone, Copy, Default)]
pub struct ConverseV1Alpha1;

impl WireRevision for ConverseV1Alpha1 {
    type Request = ConverseRequest;
    type Response = ConverseResponse;

    const REVISION: ProtocolRevision = ProtocolRevision::V1Alpha1;
    const PATH: &'static str = "/google.assistant.embedded.v1alpha1.EmbeddedAssistant/Converse";

    fn supports_text_query() -> bool {
        false
    }

    fn encode(frame: OutboundFrame) -> Option<ConverseRequest> {
        let request = match frame {
            OutboundFrame::Config(config) => {
                converse_request::ConverseRequest::Config(converse_config(config)?)
            }
            OutboundFrame::AudioIn(chunk) => converse_request::ConverseRequest::AudioIn(chunk),
        };
        Some(ConverseRequest {
            converse_request: Some(request),
        })
    }

    fn decode(response: ConverseResponse) -> InboundFrame {
        use converse_response::ConverseResponse as Kind;

        match response.converse_response {
            Some(Kind::Error(status)) => InboundFrame {
                error: Some(RemoteStatus {
                    code: status.code,
                    message: status.message,
                }),
                ..Default::default()
            },
            Some(Kind::EventType(event)) => {
                match converse_response::EventType::try_from(event) {
                    Ok(converse_response::EventType::EndOfUtterance) => InboundFrame {
                        event: Some(ServerEvent::EndOfUtterance),
                        ..Default::default()
                    },
                    _ => InboundFrame::default(),
                }
            }
            Some(Kind::AudioOut(audio)) => InboundFrame::audio(audio.audio_data),
            Some(Kind::Result(result)) => {
                let speech_results = if result.spoken_request_text.is_empty() {
                    Vec::new()
                } else {
                    vec![SpeechResult::new(result.spoken_request_text, 1.0)]
                };
                InboundFrame {
                    speech_results,
                    dialog_state_out: Some(DialogStateOut {
                        continuation_token: result.conversation_state,
                        volume_pct: result.volume_percentage,
                        display_text: result.spoken_response_text,
                        microphone_mode: microphone_mode(result.microphone_mode),
                    }),
                    ..Default::default()
                }
            }
            None => InboundFrame::default(),
        }
    }
}

fn converse_config(config: TurnConfig) -> Option<ConverseConfig> {
    let audio_in_config = match config.input {
        TurnInput::Audio {
            encoding,
            sample_rate_hz,
        } => AudioInConfig {
            encoding: in_encoding(encoding) as i32,
            sample_rate_hertz: sample_rate_hz,
        },
        TurnInput::Text(_) => return None,
    };

    let converse_state = if config.dialog_state.continuation_token.is_empty() {
        None
    } else {
        Some(ConverseState {
            conversation_state: config.dialog_state.continuation_token.clone(),
        })
    };

    Some(ConverseConfig {
        audio_in_config: Some(audio_in_config),
        audio_out_config: Some(AudioOutConfig {
            encoding: out_encoding(config.audio_out.encoding) as i32,
            sample_rate_hertz: config.audio_out.sample_rate_hz,
            volume_percentage: config.audio_out.volume_pct,
        }),
        converse_state,
    })
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
    match converse_result::MicrophoneMode::try_from(value) {
        Ok(converse_result::MicrophoneMode::CloseMicrophone) => MicrophoneMode::CloseMicrophone,
        Ok(converse_result::MicrophoneMode::DialogFollowOn) => MicrophoneMode::DialogFollowOn,
        _ => MicrophoneMode::Unspecified,
    }
}
