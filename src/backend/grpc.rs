//! gRPC transport for the assistant service
//!
//! Implements the bidirectional `Assist`/`Converse` streams with tonic's
//! low-level `Grpc` client so one backend type serves every protocol
//! revision.
//!
//! ```text
//! OutboundFrame → mpsc → encode → gRPC → decode → mpsc → InboundFrame
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::codec::{ProstCodec, Streaming};
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tracing::{debug, info, warn};

use super::frames::{InboundFrame, OutboundFrame};
use super::v1alpha1::ConverseV1Alpha1;
use super::v1alpha2::AssistV1Alpha2;
use super::{
    ChannelFactory, ChannelTarget, ConversationBackend, ProtocolRevision, StreamHandle,
};
use crate::auth::TokenProvider;
use crate::error::{AssistantError, Result};

/// Outbound frames buffered per stream before `send` applies backpressure
const OUTBOUND_BUFFER: usize = 32;

/// Inbound frames buffered per stream before the reader task waits
const INBOUND_BUFFER: usize = 64;

/// Wire-level description of one protocol revision
pub trait WireRevision: Send + Sync + 'static {
    type Request: prost::Message + Default + Send + Sync + 'static;
    type Response: prost::Message + Default + Send + Sync + 'static;

    const REVISION: ProtocolRevision;

    /// Fully-qualified RPC path of the streaming method
    const PATH: &'static str;

    fn supports_text_query() -> bool;

    /// Translate an outbound frame; `None` when the revision cannot express it
    fn encode(frame: OutboundFrame) -> Option<Self::Request>;

    fn decode(response: Self::Response) -> InboundFrame;
}

/// Convert gRPC status to a session error
pub fn status_to_error(status: Status) -> AssistantError {
    let code = status.code();
    let message = status.message().to_string();

    match code {
        tonic::Code::Unauthenticated | tonic::Code::PermissionDenied => {
            AssistantError::Auth(format!("{:?}: {}", code, message))
        }
        tonic::Code::Unavailable => {
            AssistantError::Connection(format!("Service unavailable: {}", message))
        }
        tonic::Code::Cancelled | tonic::Code::DeadlineExceeded => AssistantError::Cancelled,
        _ => AssistantError::Protocol(format!("gRPC error {:?}: {}", code, message)),
    }
}

/// Dials the assistant endpoint over TLS
#[derive(Debug, Clone, Default)]
pub struct GrpcChannelFactory;

impl GrpcChannelFactory {
    pub fn new() -> Self {
        Self
    }

    async fn connect(target: &ChannelTarget) -> Result<Channel> {
        let host = target
            .endpoint
            .split(':')
            .next()
            .unwrap_or(target.endpoint.as_str())
            .to_string();

        let tls_config = ClientTlsConfig::new().domain_name(host);

        let channel = Endpoint::from_shared(format!("https://{}", target.endpoint))
            .map_err(|e| AssistantError::Connection(format!("Invalid endpoint: {}", e)))?
            .tls_config(tls_config)
            .map_err(|e| AssistantError::Connection(format!("TLS config error: {}", e)))?
            .connect_timeout(target.connect_timeout)
            .connect()
            .await
            .map_err(|e| AssistantError::Connection(format!("gRPC connection failed: {}", e)))?;

        Ok(channel)
    }
}

#[async_trait]
impl ChannelFactory for GrpcChannelFactory {
    async fn dial(
        &self,
        target: &ChannelTarget,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Arc<dyn ConversationBackend>> {
        info!(
            endpoint = %target.endpoint,
            revision = %target.revision,
            scopes = ?target.scopes,
            "Dialing assistant service"
        );

        let channel = Self::connect(target).await?;

        info!(endpoint = %target.endpoint, "Connected to assistant service");

        let backend: Arc<dyn ConversationBackend> = match target.revision {
            ProtocolRevision::V1Alpha2 => {
                Arc::new(GrpcBackend::<AssistV1Alpha2>::new(channel, tokens))
            }
            ProtocolRevision::V1Alpha1 => {
                Arc::new(GrpcBackend::<ConverseV1Alpha1>::new(channel, tokens))
            }
        };
        Ok(backend)
    }
}

/// Conversation backend over a dialed tonic channel
pub struct GrpcBackend<R: WireRevision> {
    /// Taken on close; open streams are stopped by their cancel tokens
    channel: RwLock<Option<Channel>>,
    tokens: Arc<dyn TokenProvider>,
    _revision: PhantomData<fn() -> R>,
}

impl<R: WireRevision> GrpcBackend<R> {
    pub fn new(channel: Channel, tokens: Arc<dyn TokenProvider>) -> Self {
        Self {
            channel: RwLock::new(Some(channel)),
            tokens,
            _revision: PhantomData,
        }
    }
}

#[async_trait]
impl<R: WireRevision> ConversationBackend for GrpcBackend<R> {
    fn revision(&self) -> ProtocolRevision {
        R::REVISION
    }

    fn supports_text_query(&self) -> bool {
        R::supports_text_query()
    }

    async fn open_stream(&self, cancel: CancellationToken) -> Result<StreamHandle> {
        let channel = self
            .channel
            .read()
            .clone()
            .ok_or_else(|| AssistantError::Connection("channel is closed".to_string()))?;

        let token = self.tokens.current_token().await?;
        let authorization: AsciiMetadataValue = format!("Bearer {}", token.access_token)
            .parse()
            .map_err(|_| AssistantError::Auth("Invalid access token header value".to_string()))?;

        let (outbound_tx, outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_BUFFER);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Result<InboundFrame>>(INBOUND_BUFFER);

        // The request stream ends when every sender is dropped (half-close)
        let requests = ReceiverStream::new(outbound_rx).filter_map(|frame| async move {
            let encoded = R::encode(frame);
            if encoded.is_none() {
                warn!(revision = %R::REVISION, "Dropping frame the revision cannot express");
            }
            encoded
        });

        let mut request = Request::new(requests);
        request.metadata_mut().insert("authorization", authorization);

        let call_cancel = cancel.clone();

        // Spawn the call so opening never waits on response headers
        tokio::spawn(async move {
            tokio::select! {
                _ = call_cancel.cancelled() => {
                    debug!("Stream cancelled before the call completed");
                }
                result = call::<R, _>(channel, request) => match result {
                    Ok(responses) => forward_responses::<R>(responses, inbound_tx, cancel).await,
                    Err(status) => {
                        let _ = inbound_tx.send(Err(status_to_error(status))).await;
                    }
                }
            }
        });

        debug!(revision = %R::REVISION, "Opened assistant stream");

        Ok(StreamHandle::new(
            outbound_tx,
            ReceiverStream::new(inbound_rx).boxed(),
        ))
    }

    async fn close(&self) {
        if self.channel.write().take().is_some() {
            info!(revision = %R::REVISION, "Released assistant channel");
        }
    }
}

/// Perform the bidirectional streaming call
async fn call<R, S>(
    channel: Channel,
    request: Request<S>,
) -> std::result::Result<Streaming<R::Response>, Status>
where
    R: WireRevision,
    S: futures::Stream<Item = R::Request> + Send + 'static,
{
    let mut grpc = tonic::client::Grpc::new(channel);

    grpc.ready()
        .await
        .map_err(|e| Status::unavailable(format!("Service not ready: {}", e)))?;

    let codec: ProstCodec<R::Request, R::Response> = ProstCodec::default();
    let path = PathAndQuery::from_static(R::PATH);

    let response = grpc.streaming(request, path, codec).await?;
    Ok(response.into_inner())
}

/// Decode responses until the remote ends the stream or the reader goes away
async fn forward_responses<R: WireRevision>(
    mut responses: Streaming<R::Response>,
    inbound_tx: mpsc::Sender<Result<InboundFrame>>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = responses.message() => next,
        };

        match next {
            Ok(Some(response)) => {
                if inbound_tx.send(Ok(R::decode(response))).await.is_err() {
                    break; // Receiver dropped
                }
            }
            Ok(None) => break,
            Err(status) => {
                let _ = inbound_tx.send(Err(status_to_error(status))).await;
                break;
            }
        }
    }

    debug!(revision = %R::REVISION, "Response stream ended");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_to_error(Status::unauthenticated("expired")),
            AssistantError::Auth(_)
        ));
        assert!(matches!(
            status_to_error(Status::permission_denied("scope")),
            AssistantError::Auth(_)
        ));
        assert!(matches!(
            status_to_error(Status::unavailable("down")),
            AssistantError::Connection(_)
        ));
        assert_eq!(
            status_to_error(Status::deadline_exceeded("late")),
            AssistantError::Cancelled
        );
        assert!(matches!(
            status_to_error(Status::invalid_argument("bad encoding")),
            AssistantError::Protocol(_)
        ));
    }

    #[tokio::test]
    async fn test_closed_backend_rejects_streams() {
        let channel = Endpoint::from_static("http://127.0.0.1:1").connect_lazy();
        let tokens = Arc::new(crate::auth::StaticTokenProvider::new(
            crate::auth::OAuthToken::bearer("token"),
        ));
        let backend = GrpcBackend::<AssistV1Alpha2>::new(channel, tokens);

        backend.close().await;
        backend.close().await;

        let err = backend
            .open_stream(CancellationToken::new())
            .await
            .err()
            .unwrap();
        assert_eq!(err, AssistantError::Connection("channel is closed".to_string()));
    }

    #[test]
    fn test_revision_paths() {
        assert!(AssistV1Alpha2::PATH.ends_with("/Assist"));
        assert!(ConverseV1Alpha1::PATH.ends_with("/Converse"));
        assert!(AssistV1Alpha2::supports_text_query());
        assert!(!ConverseV1Alpha1::supports_text_query());
    }
}
