use std::sync::Arc;

use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info, warn};

use crate::backend::{OutboundFrame, TurnInput};
use crate::error::{AssistantError, Result};
use crate::session::{StreamSession, TurnContext};

/// Sends text queries and returns the assistant's display text
///
/// Every query runs on a freshly opened stream. If the service ends the
/// stream without answering, the identical query is sent once more on a new
/// stream before giving up.
pub struct TextTransport {
    stream: Arc<StreamSession>,
    context: Arc<TurnContext>,
    last_query: Option<String>,
    last_response: Option<String>,
    _turn: OwnedMutexGuard<()>,
}

impl TextTransport {
    pub(crate) fn new(
        stream: Arc<StreamSession>,
        context: Arc<TurnContext>,
        turn: OwnedMutexGuard<()>,
    ) -> Self {
        Self {
            stream,
            context,
            last_query: None,
            last_response: None,
            _turn: turn,
        }
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    pub fn last_response(&self) -> Option<&str> {
        self.last_response.as_deref()
    }

    /// Send one query and wait for the response text
    pub async fn query(&mut self, text: &str) -> Result<String> {
        let backend = self.stream.backend();
        if !backend.supports_text_query() {
            return Err(AssistantError::Protocol(format!(
                "text queries are not supported by protocol revision {}",
                backend.revision()
            )));
        }

        info!(query = %text, "Sending text query");
        self.last_query = Some(text.to_string());

        let mut retried = false;
        self.send_query(text).await?;

        loop {
            let frame = match self.stream.recv().await? {
                Some(frame) => frame,
                None if !retried => {
                    warn!("Stream ended before a response, retrying query once");
                    retried = true;
                    self.send_query(text).await?;
                    continue;
                }
                None => {
                    error!("Stream ended again after retry");
                    return Err(AssistantError::Protocol("no response after retry".to_string()));
                }
            };

            if frame.is_empty() {
                return Err(AssistantError::Protocol("empty response".to_string()));
            }

            if let Some(status) = frame.error {
                return Err(AssistantError::Protocol(format!(
                    "remote error {}: {}",
                    status.code, status.message
                )));
            }

            if let Some(out) = frame.dialog_state_out {
                self.context.apply_dialog_state_out(&out);
                self.stream.close_send().await;

                info!(response = %out.display_text, "Text query answered");
                self.last_response = Some(out.display_text.clone());
                return Ok(out.display_text);
            }

            debug!("Ignoring non-dialog frame during text query");
        }
    }

    async fn send_query(&self, text: &str) -> Result<()> {
        self.stream.refresh().await?;

        let config = self.context.turn_config(TurnInput::Text(text.to_string()));
        self.stream.send(OutboundFrame::Config(config)).await
    }
}
