use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{ConversationBackend, InboundFrame, InboundStream, OutboundFrame};
use crate::error::{AssistantError, Result};

/// The currently open stream
struct ActiveStream {
    id: Uuid,

    /// `None` once half-closed
    sender: Option<mpsc::Sender<OutboundFrame>>,

    /// Locked separately so receives never block sends
    inbound: Arc<Mutex<InboundStream>>,

    /// Child of the conversation token; fires when the stream is discarded
    cancel: CancellationToken,
}

impl ActiveStream {
    fn half_close(&mut self) {
        if self.sender.take().is_some() {
            debug!(stream_id = %self.id, "Half-closed stream");
        }
    }

    fn discard(mut self) {
        self.half_close();
        self.cancel.cancel();
    }
}

/// Owns at most one bidirectional stream at a time
///
/// Text turns refresh the stream before every query because the service ends
/// the stream after one response cycle. Audio turns keep one stream open for
/// the whole turn and half-close it at the end of audio input.
pub struct StreamSession {
    backend: Arc<dyn ConversationBackend>,

    /// Conversation-wide cancellation (deadline or close)
    cancel: CancellationToken,

    active: Mutex<Option<ActiveStream>>,

    running: AtomicBool,
}

impl StreamSession {
    pub fn new(backend: Arc<dyn ConversationBackend>, cancel: CancellationToken) -> Self {
        Self {
            backend,
            cancel,
            active: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ConversationBackend> {
        &self.backend
    }

    /// Conversation-wide token; fires on the deadline or on close
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Close any open stream, then open a fresh one
    ///
    /// The previous stream is half-closed and discarded before the new one is
    /// requested, so two handles are never open at once.
    pub async fn refresh(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AssistantError::Cancelled);
        }

        let mut active = self.active.lock().await;

        if let Some(previous) = active.take() {
            debug!(stream_id = %previous.id, "Discarding previous stream");
            previous.discard();
            self.running.store(false, Ordering::SeqCst);
        }

        let cancel = self.cancel.child_token();
        let handle = self.backend.open_stream(cancel.clone()).await?;
        let (sender, inbound) = handle.into_parts();

        let id = Uuid::new_v4();
        *active = Some(ActiveStream {
            id,
            sender: Some(sender),
            inbound: Arc::new(Mutex::new(inbound)),
            cancel,
        });
        self.running.store(true, Ordering::SeqCst);

        debug!(stream_id = %id, revision = %self.backend.revision(), "Stream opened");

        Ok(())
    }

    /// Send one frame on the current stream
    pub async fn send(&self, frame: OutboundFrame) -> Result<()> {
        if let OutboundFrame::Config(config) = &frame {
            if config.text_query().is_some() && !self.backend.supports_text_query() {
                return Err(AssistantError::Protocol(format!(
                    "text queries are not supported by protocol revision {}",
                    self.backend.revision()
                )));
            }
        }

        let (sender, cancel) = {
            let active = self.active.lock().await;
            match active.as_ref() {
                Some(stream) => match &stream.sender {
                    Some(sender) => (sender.clone(), stream.cancel.clone()),
                    None => {
                        return Err(AssistantError::Protocol(
                            "stream is half-closed".to_string(),
                        ))
                    }
                },
                None => {
                    return Err(AssistantError::Protocol(
                        "stream is not open".to_string(),
                    ))
                }
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AssistantError::Cancelled),
            sent = sender.send(frame) => sent.map_err(|_| {
                AssistantError::Protocol("request stream closed by remote".to_string())
            }),
        }
    }

    /// Next inbound frame; `Ok(None)` when the remote ended the stream
    pub async fn recv(&self) -> Result<Option<InboundFrame>> {
        let (inbound, cancel) = {
            let active = self.active.lock().await;
            match active.as_ref() {
                Some(stream) => (Arc::clone(&stream.inbound), stream.cancel.clone()),
                None => {
                    return Err(AssistantError::Protocol(
                        "stream is not open".to_string(),
                    ))
                }
            }
        };

        let mut inbound = inbound.lock().await;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AssistantError::Cancelled),
            next = inbound.next() => next.transpose(),
        }
    }

    /// Signal end of input; responses can still be received
    pub async fn close_send(&self) {
        let mut active = self.active.lock().await;
        if let Some(stream) = active.as_mut() {
            stream.half_close();
        }
    }

    /// Half-close and discard the current stream
    pub async fn close(&self) {
        let mut active = self.active.lock().await;
        if let Some(stream) = active.take() {
            info!(stream_id = %stream.id, "Closing stream");
            stream.discard();
        }
        self.running.store(false, Ordering::SeqCst);
    }
}
