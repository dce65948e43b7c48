// Scripted conversation backend shared by the integration tests
//
// Each opened stream follows the next `StreamScript` in the queue and records
// every outbound frame it receives.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use assistant_session::audio::AudioSettings;
use assistant_session::auth::{OAuthToken, StaticTokenProvider, TokenProvider};
use assistant_session::backend::{
    ChannelFactory, ChannelTarget, ConversationBackend, DialogStateOut, InboundFrame,
    MicrophoneMode, OutboundFrame, ProtocolRevision, StreamHandle, TurnConfig,
};
use assistant_session::error::{AssistantError, Result};
use assistant_session::session::{ConversationManager, DeviceIdentity};
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

/// How one stream behaves
#[derive(Debug, Clone)]
pub enum StreamScript {
    /// Answer the config frame with these frames, then end the stream
    Respond(Vec<InboundFrame>),
    /// End the stream right after the config frame
    EndImmediately,
    /// Fail the stream with this error after the config frame
    Fail(AssistantError),
    /// Send these frames once the client half-closes, then end the stream
    AfterInput(Vec<InboundFrame>),
    /// Never answer; the stream stays open until cancelled
    Hold,
}

/// What the backend saw on one stream
#[derive(Clone)]
pub struct RecordedStream {
    frames: Arc<Mutex<Vec<OutboundFrame>>>,
    sender: mpsc::WeakSender<OutboundFrame>,
    pub cancel: CancellationToken,
}

impl RecordedStream {
    /// Open means the client still holds the send side and the stream was
    /// not cancelled
    pub fn is_open(&self) -> bool {
        self.sender.upgrade().is_some() && !self.cancel.is_cancelled()
    }

    pub fn frames(&self) -> Vec<OutboundFrame> {
        self.frames.lock().clone()
    }

    pub fn config(&self) -> Option<TurnConfig> {
        self.frames()
            .into_iter()
            .find_map(|frame| frame.as_config().cloned())
    }

    pub fn audio_chunks(&self) -> Vec<Bytes> {
        self.frames()
            .into_iter()
            .filter_map(|frame| match frame {
                OutboundFrame::AudioIn(chunk) => Some(chunk),
                OutboundFrame::Config(_) => None,
            })
            .collect()
    }
}

pub struct ScriptedBackend {
    revision: ProtocolRevision,
    scripts: Mutex<VecDeque<StreamScript>>,
    streams: Mutex<Vec<RecordedStream>>,
    max_open: AtomicUsize,
    closed: AtomicBool,
}

impl ScriptedBackend {
    pub fn new(revision: ProtocolRevision, scripts: Vec<StreamScript>) -> Arc<Self> {
        Arc::new(Self {
            revision,
            scripts: Mutex::new(scripts.into()),
            streams: Mutex::new(Vec::new()),
            max_open: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        })
    }

    pub fn v1alpha2(scripts: Vec<StreamScript>) -> Arc<Self> {
        Self::new(ProtocolRevision::V1Alpha2, scripts)
    }

    pub fn push_script(&self, script: StreamScript) {
        self.scripts.lock().push_back(script);
    }

    pub fn streams(&self) -> Vec<RecordedStream> {
        self.streams.lock().clone()
    }

    pub fn stream(&self, index: usize) -> RecordedStream {
        self.streams.lock()[index].clone()
    }

    pub fn open_streams(&self) -> usize {
        self.streams.lock().iter().filter(|s| s.is_open()).count()
    }

    /// Highest number of streams open at the moment a new one was requested
    pub fn max_open(&self) -> usize {
        self.max_open.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConversationBackend for ScriptedBackend {
    fn revision(&self) -> ProtocolRevision {
        self.revision
    }

    fn supports_text_query(&self) -> bool {
        self.revision == ProtocolRevision::V1Alpha2
    }

    async fn open_stream(&self, cancel: CancellationToken) -> Result<StreamHandle> {
        let open_now = self.open_streams() + 1;
        self.max_open.fetch_max(open_now, Ordering::SeqCst);

        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or(StreamScript::Hold);

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(32);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Result<InboundFrame>>(64);

        let frames = Arc::new(Mutex::new(Vec::new()));
        self.streams.lock().push(RecordedStream {
            frames: Arc::clone(&frames),
            sender: outbound_tx.downgrade(),
            cancel: cancel.clone(),
        });

        tokio::spawn(async move {
            let mut inbound = Some(inbound_tx);
            let mut configured = false;

            loop {
                let frame = tokio::select! {
                    _ = cancel.cancelled() => return,
                    frame = outbound_rx.recv() => frame,
                };

                let Some(frame) = frame else {
                    break;
                };

                let is_config = matches!(frame, OutboundFrame::Config(_));
                frames.lock().push(frame);

                if is_config && !configured {
                    configured = true;
                    match &script {
                        StreamScript::Respond(responses) => {
                            if let Some(tx) = inbound.take() {
                                for response in responses.clone() {
                                    let _ = tx.send(Ok(response)).await;
                                }
                            }
                        }
                        StreamScript::EndImmediately => {
                            inbound.take();
                        }
                        StreamScript::Fail(error) => {
                            if let Some(tx) = inbound.take() {
                                let _ = tx.send(Err(error.clone())).await;
                            }
                        }
                        StreamScript::AfterInput(_) | StreamScript::Hold => {}
                    }
                }
            }

            // Client half-closed
            match script {
                StreamScript::AfterInput(responses) => {
                    if let Some(tx) = inbound.take() {
                        for response in responses {
                            let _ = tx.send(Ok(response)).await;
                        }
                    }
                }
                StreamScript::Hold => {
                    cancel.cancelled().await;
                }
                _ => {}
            }
        });

        Ok(StreamHandle::new(
            outbound_tx,
            ReceiverStream::new(inbound_rx).boxed(),
        ))
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out the same scripted backend on every dial
pub struct MockChannelFactory {
    backend: Arc<ScriptedBackend>,
    fail: bool,
    dials: AtomicUsize,
}

impl MockChannelFactory {
    pub fn new(backend: Arc<ScriptedBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            fail: false,
            dials: AtomicUsize::new(0),
        })
    }

    pub fn failing(backend: Arc<ScriptedBackend>) -> Arc<Self> {
        Arc::new(Self {
            backend,
            fail: true,
            dials: AtomicUsize::new(0),
        })
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelFactory for MockChannelFactory {
    async fn dial(
        &self,
        _target: &ChannelTarget,
        _tokens: Arc<dyn TokenProvider>,
    ) -> Result<Arc<dyn ConversationBackend>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AssistantError::Connection("dial refused".to_string()));
        }
        Ok(self.backend.clone() as Arc<dyn ConversationBackend>)
    }
}

/// Token provider whose authorization failed
pub struct FailingTokenProvider {
    pub shutdowns: AtomicUsize,
}

impl FailingTokenProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            shutdowns: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TokenProvider for FailingTokenProvider {
    fn auth_url(&self) -> String {
        "https://accounts.google.com/o/oauth2/auth".to_string()
    }

    async fn exchange(&self, _code: &str) -> Result<OAuthToken> {
        Err(AssistantError::Auth("invalid_grant".to_string()))
    }

    async fn current_token(&self) -> Result<OAuthToken> {
        Err(AssistantError::Auth("no token".to_string()))
    }

    fn last_error(&self) -> Option<AssistantError> {
        Some(AssistantError::Auth("invalid_grant".to_string()))
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Token provider that counts shutdowns
pub struct CountingTokenProvider {
    inner: StaticTokenProvider,
    pub shutdowns: AtomicUsize,
}

impl CountingTokenProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: StaticTokenProvider::new(OAuthToken::bearer("test-token")),
            shutdowns: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl TokenProvider for CountingTokenProvider {
    fn auth_url(&self) -> String {
        self.inner.auth_url()
    }

    async fn exchange(&self, code: &str) -> Result<OAuthToken> {
        self.inner.exchange(code).await
    }

    async fn current_token(&self) -> Result<OAuthToken> {
        self.inner.current_token().await
    }

    fn last_error(&self) -> Option<AssistantError> {
        None
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn device() -> DeviceIdentity {
    DeviceIdentity::new("254636TEST0001", "assistant-session-test")
}

/// Manager over a scripted backend with a static token
pub fn manager(backend: &Arc<ScriptedBackend>) -> ConversationManager {
    ConversationManager::new(
        MockChannelFactory::new(Arc::clone(backend)),
        Arc::new(StaticTokenProvider::new(OAuthToken::bearer("test-token"))),
        ChannelTarget {
            revision: backend.revision(),
            ..Default::default()
        },
        AudioSettings::default(),
        device(),
    )
}

/// A response frame ending the turn with display text and a continuation token
pub fn answer(display_text: &str, token: &[u8]) -> InboundFrame {
    InboundFrame::dialog_state(DialogStateOut {
        continuation_token: Bytes::copy_from_slice(token),
        volume_pct: 100,
        display_text: display_text.to_string(),
        microphone_mode: MicrophoneMode::CloseMicrophone,
    })
}
