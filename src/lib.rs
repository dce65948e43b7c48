pub mod audio;
pub mod auth;
pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod session;
pub mod transport;

pub use audio::{AudioInEncoding, AudioOutEncoding, AudioSettings};
pub use auth::{ClientSecret, OAuthToken, OAuthTokenProvider, StaticTokenProvider, TokenProvider};
pub use backend::{
    ChannelFactory, ChannelTarget, ConversationBackend, GrpcChannelFactory, InboundFrame,
    OutboundFrame, ProtocolRevision, StreamHandle,
};
pub use config::Config;
pub use error::{AssistantError, Result};
pub use http::{create_router, CallbackListener, CallbackState};
pub use session::{
    Conversation, ConversationManager, DeviceIdentity, DialogState, StreamSession,
    DEFAULT_AUDIO_SESSION_TIMEOUT,
};
pub use transport::{AudioTransport, TextTransport, TranscriptionResult, TransportState, TurnEnd};
