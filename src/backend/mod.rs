//! Channel and stream abstractions over the assistant service
//!
//! A `ChannelFactory` dials the service once per conversation and returns a
//! `ConversationBackend` bound to one protocol revision. The backend spawns
//! bidirectional streams on demand:
//! - `v1alpha2` (Assist): text and audio turns
//! - `v1alpha1` (Converse): audio turns only

pub mod frames;
pub mod grpc;
pub mod v1alpha1;
pub mod v1alpha2;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::auth::TokenProvider;
use crate::error::Result;

pub use frames::{
    AudioOutConfig, DialogStateOut, InboundFrame, MicrophoneMode, OutboundFrame, RemoteStatus,
    ServerEvent, SpeechResult, TurnConfig, TurnInput,
};
pub use grpc::{status_to_error, GrpcBackend, GrpcChannelFactory, WireRevision};

/// Default service endpoint
pub const DEFAULT_ENDPOINT: &str = "embeddedassistant.googleapis.com:443";

/// OAuth scope required by the assistant service
pub const ASSISTANT_SCOPE: &str = "https://www.googleapis.com/auth/assistant-sdk-prototype";

/// Protocol revision of the assistant service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolRevision {
    /// Converse RPC, audio only
    V1Alpha1,
    /// Assist RPC, audio and text
    #[default]
    V1Alpha2,
}

impl fmt::Display for ProtocolRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V1Alpha1 => write!(f, "v1alpha1"),
            Self::V1Alpha2 => write!(f, "v1alpha2"),
        }
    }
}

/// Where and how to dial the service
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTarget {
    pub endpoint: String,
    pub scopes: Vec<String>,
    pub revision: ProtocolRevision,
    pub connect_timeout: Duration,
}

impl Default for ChannelTarget {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            scopes: vec![ASSISTANT_SCOPE.to_string()],
            revision: ProtocolRevision::default(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Inbound half of a stream; `None` means the remote ended the stream
pub type InboundStream = BoxStream<'static, Result<InboundFrame>>;

/// One live bidirectional stream.
///
/// Dropping the sender half-closes the stream: the remote sees end-of-input
/// while responses keep arriving on the inbound half.
pub struct StreamHandle {
    sender: mpsc::Sender<OutboundFrame>,
    inbound: InboundStream,
}

impl StreamHandle {
    pub fn new(sender: mpsc::Sender<OutboundFrame>, inbound: InboundStream) -> Self {
        Self { sender, inbound }
    }

    pub fn into_parts(self) -> (mpsc::Sender<OutboundFrame>, InboundStream) {
        (self.sender, self.inbound)
    }
}

/// A dialed channel speaking one protocol revision
#[async_trait]
pub trait ConversationBackend: Send + Sync {
    fn revision(&self) -> ProtocolRevision;

    /// Whether config frames may carry a text query
    fn supports_text_query(&self) -> bool {
        true
    }

    /// Open a new bidirectional stream.
    ///
    /// The stream is torn down when `cancel` fires.
    async fn open_stream(&self, cancel: CancellationToken) -> Result<StreamHandle>;

    /// Release the channel; later `open_stream` calls fail
    async fn close(&self) {}
}

/// Dials the service and returns a backend for the requested revision
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn dial(
        &self,
        target: &ChannelTarget,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Arc<dyn ConversationBackend>>;
}
