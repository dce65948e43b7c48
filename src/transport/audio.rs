//! Audio-mode turn over a single stream
//!
//! ```text
//! Idle ──start()──▶ Configured ──write()──▶ Streaming ──remote end/error──▶ Finished
//! ```
//!
//! `write` and `read` may run on different tasks; clones of the transport share
//! the same state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::{Buf, Bytes};
use tokio::sync::{oneshot, watch, Mutex, OwnedMutexGuard, RwLock};
use tracing::{debug, error, info, warn};

use super::transcript::TranscriptionResult;
use crate::backend::{InboundFrame, OutboundFrame, ServerEvent};
use crate::error::{AssistantError, Result};
use crate::session::{StreamSession, TurnContext};

/// How an audio turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEnd {
    /// The remote ended the stream normally
    Completed,
    /// Receiving failed or the remote reported an error
    Failed(AssistantError),
    /// The conversation deadline elapsed or the conversation was closed
    Cancelled,
}

impl TurnEnd {
    /// The error handed to callers that touch the transport after the turn ended
    pub fn to_error(&self) -> AssistantError {
        match self {
            Self::Completed => AssistantError::StreamEnd,
            Self::Failed(error) => error.clone(),
            Self::Cancelled => AssistantError::Cancelled,
        }
    }

    fn from_error(error: AssistantError) -> Self {
        match error {
            AssistantError::Cancelled => Self::Cancelled,
            AssistantError::StreamEnd => Self::Completed,
            other => Self::Failed(other),
        }
    }
}

/// Audio transport state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportState {
    Idle,
    Configured,
    Streaming,
    Finished(TurnEnd),
}

impl TransportState {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

struct AudioInner {
    stream: Arc<StreamSession>,
    context: Arc<TurnContext>,
    state: watch::Sender<TransportState>,
    transcript: RwLock<TranscriptionResult>,

    /// Audio-out bytes that did not fit the caller's buffer
    pending_audio: Mutex<Bytes>,

    end_of_utterance: AtomicBool,

    /// Held for the lifetime of the turn
    _turn: OwnedMutexGuard<()>,
}

/// Drives one audio turn: config frame, PCM chunks out, transcripts and
/// audio-out chunks back
#[derive(Clone)]
pub struct AudioTransport {
    inner: Arc<AudioInner>,
}

impl AudioTransport {
    pub(crate) fn new(
        stream: Arc<StreamSession>,
        context: Arc<TurnContext>,
        turn: OwnedMutexGuard<()>,
    ) -> Self {
        let (state, _) = watch::channel(TransportState::Idle);
        Self {
            inner: Arc::new(AudioInner {
                stream,
                context,
                state,
                transcript: RwLock::new(TranscriptionResult::default()),
                pending_audio: Mutex::new(Bytes::new()),
                end_of_utterance: AtomicBool::new(false),
                _turn: turn,
            }),
        }
    }

    pub fn state(&self) -> TransportState {
        self.inner.state.borrow().clone()
    }

    /// Transcript of what the user has said so far
    pub async fn transcript(&self) -> TranscriptionResult {
        self.inner.transcript.read().await.clone()
    }

    /// Whether the service reported the end of the user's utterance
    pub fn end_of_utterance_seen(&self) -> bool {
        self.inner.end_of_utterance.load(Ordering::SeqCst)
    }

    /// Open the stream, send the config frame and wait for the turn to end
    ///
    /// Resolves once the receive side observes the end of the stream, so
    /// `read` must be driven concurrently. `done` is signalled with the same
    /// outcome that is returned.
    pub async fn start(&self, done: Option<oneshot::Sender<TurnEnd>>) -> Result<TurnEnd> {
        if *self.inner.state.borrow() != TransportState::Idle {
            return Err(AssistantError::Protocol(
                "audio transport already started".to_string(),
            ));
        }

        if let Err(e) = self.inner.stream.refresh().await {
            error!("Failed to open audio stream: {}", e);
            self.finish(TurnEnd::from_error(e.clone()));
            return Err(e);
        }

        let config = self.inner.context.audio_turn_config();
        if let Err(e) = self.inner.stream.send(OutboundFrame::Config(config)).await {
            let error = match e {
                AssistantError::Cancelled => AssistantError::Cancelled,
                other => AssistantError::Protocol(format!("failed to send configuration: {}", other)),
            };
            error!("{}", error);
            self.finish(TurnEnd::from_error(error.clone()));
            return Err(error);
        }

        self.inner.state.send_if_modified(|state| {
            if *state == TransportState::Idle {
                *state = TransportState::Configured;
                true
            } else {
                false
            }
        });
        info!("Audio turn configured");

        let end = self.wait_finished().await;

        if let Some(done) = done {
            let _ = done.send(end.clone());
        }

        Ok(end)
    }

    /// Wait until the turn has ended
    ///
    /// Conversation cancellation ends the turn even when no task is reading.
    pub async fn wait_finished(&self) -> TurnEnd {
        let mut state = self.inner.state.subscribe();
        let cancel = self.inner.stream.cancellation().clone();

        let finished = async {
            state
                .wait_for(|state| state.is_finished())
                .await
                .map(|state| state.clone())
                .ok()
        };

        tokio::select! {
            biased;
            finished = finished => {
                if let Some(TransportState::Finished(end)) = finished {
                    return end;
                }
            }
            _ = cancel.cancelled() => {
                debug!("Conversation cancelled while the audio turn was open");
            }
        }

        self.finish(TurnEnd::Cancelled);
        match self.state() {
            TransportState::Finished(end) => end,
            _ => TurnEnd::Cancelled,
        }
    }

    /// Send one PCM chunk immediately
    ///
    /// Chunks written before the config frame went out wait for it. Pacing is
    /// the caller's job; realtime capture works with roughly one chunk per
    /// 250ms.
    pub async fn write(&self, chunk: &[u8]) -> Result<usize> {
        if let TransportState::Finished(end) = self.wait_started().await? {
            return Err(end.to_error());
        }

        self.inner
            .stream
            .send(OutboundFrame::AudioIn(Bytes::copy_from_slice(chunk)))
            .await?;

        self.inner.state.send_if_modified(|state| {
            if *state == TransportState::Configured {
                *state = TransportState::Streaming;
                true
            } else {
                false
            }
        });

        Ok(chunk.len())
    }

    /// Signal the end of audio input
    ///
    /// The service then flushes its remaining responses and ends the stream.
    pub async fn finish_input(&self) {
        debug!("End of audio input");
        self.inner.stream.close_send().await;
    }

    /// Read audio-out bytes
    ///
    /// Blocks until the turn is started and the service sends audio. Transcripts and dialog state are
    /// applied along the way. Once the turn has ended every call returns the
    /// terminal error (`StreamEnd` for a normal end).
    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        {
            let mut pending = self.inner.pending_audio.lock().await;
            if !pending.is_empty() {
                return Ok(copy_audio(&mut pending, buf));
            }
        }

        if let TransportState::Finished(end) = self.wait_started().await? {
            return Err(end.to_error());
        }

        loop {
            let frame = match self.inner.stream.recv().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("Audio turn completed by remote");
                    self.finish(TurnEnd::Completed);
                    return Err(AssistantError::StreamEnd);
                }
                Err(e) => {
                    warn!("Audio turn ended: {}", e);
                    let end = TurnEnd::from_error(e);
                    self.finish(end.clone());
                    return Err(end.to_error());
                }
            };

            if let Some(audio) = self.process_frame(frame).await? {
                let mut pending = self.inner.pending_audio.lock().await;
                *pending = audio;
                return Ok(copy_audio(&mut pending, buf));
            }
        }
    }

    /// Apply one inbound frame; returns its audio-out bytes if any
    async fn process_frame(&self, frame: InboundFrame) -> Result<Option<Bytes>> {
        if let Some(status) = frame.error {
            let error = AssistantError::Protocol(format!(
                "remote error {}: {}",
                status.code, status.message
            ));
            error!("{}", error);
            self.finish(TurnEnd::Failed(error.clone()));
            return Err(error);
        }

        if frame.event == Some(ServerEvent::EndOfUtterance) {
            debug!("End of utterance");
            self.inner.end_of_utterance.store(true, Ordering::SeqCst);
        }

        if let Some(out) = &frame.dialog_state_out {
            self.inner.context.apply_dialog_state_out(out);
        }

        if !frame.speech_results.is_empty() {
            let mut transcript = self.inner.transcript.write().await;
            if transcript.apply(&frame.speech_results) {
                debug!(
                    transcript = %transcript.text,
                    stability = transcript.stability,
                    "Transcript updated"
                );
            }
        }

        Ok(frame.audio_out.filter(|audio| !audio.is_empty()))
    }

    /// Wait until the config frame went out (or the turn already ended)
    async fn wait_started(&self) -> Result<TransportState> {
        let mut state = self.inner.state.subscribe();
        let ready = state
            .wait_for(|state| *state != TransportState::Idle)
            .await
            .map_err(|_| AssistantError::Cancelled)?;
        Ok(ready.clone())
    }

    fn finish(&self, end: TurnEnd) {
        self.inner.state.send_if_modified(|state| {
            if state.is_finished() {
                false
            } else {
                *state = TransportState::Finished(end);
                true
            }
        });
    }
}

fn copy_audio(pending: &mut Bytes, buf: &mut [u8]) -> usize {
    let n = pending.len().min(buf.len());
    buf[..n].copy_from_slice(&pending[..n]);
    pending.advance(n);
    n
}
