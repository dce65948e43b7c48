use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::context::TurnContext;
use super::dialog::{DeviceIdentity, DialogState};
use super::stream::StreamSession;
use crate::audio::AudioSettings;
use crate::auth::TokenProvider;
use crate::backend::{ChannelFactory, ChannelTarget, ConversationBackend};
use crate::error::{AssistantError, Result};
use crate::transport::{AudioTransport, TextTransport};

/// Recommended deadline for audio conversations
pub const DEFAULT_AUDIO_SESSION_TIMEOUT: Duration = Duration::from_secs(240);

/// The channel dialed for the most recent conversation
struct ActiveChannel {
    backend: Arc<dyn ConversationBackend>,
    cancel: CancellationToken,
}

/// Entry point: binds credentials, channel settings, audio settings, dialog
/// state and device identity, and opens conversations
///
/// Dialog state carries over between conversations opened by the same manager.
pub struct ConversationManager {
    factory: Arc<dyn ChannelFactory>,
    tokens: Arc<dyn TokenProvider>,
    target: ChannelTarget,
    settings: Arc<RwLock<AudioSettings>>,
    dialog: Arc<Mutex<DialogState>>,
    device: DeviceIdentity,
    channel: Mutex<Option<ActiveChannel>>,
    closed: AtomicBool,
}

impl ConversationManager {
    pub fn new(
        factory: Arc<dyn ChannelFactory>,
        tokens: Arc<dyn TokenProvider>,
        target: ChannelTarget,
        settings: AudioSettings,
        device: DeviceIdentity,
    ) -> Self {
        Self {
            factory,
            tokens,
            target,
            settings: Arc::new(RwLock::new(settings)),
            dialog: Arc::new(Mutex::new(DialogState::default())),
            device,
            channel: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Start from a given dialog state, e.g. a continuation token kept by the caller
    pub fn with_dialog_state(self, dialog: DialogState) -> Self {
        *self.dialog.lock() = dialog;
        self
    }

    pub fn target(&self) -> &ChannelTarget {
        &self.target
    }

    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    pub fn audio_settings(&self) -> AudioSettings {
        self.settings.read().clone()
    }

    pub fn dialog_state(&self) -> DialogState {
        self.dialog.lock().clone()
    }

    pub fn token_provider(&self) -> &Arc<dyn TokenProvider> {
        &self.tokens
    }

    /// Dial the service and open a conversation
    ///
    /// With a `timeout` every blocked operation of the conversation returns
    /// `Cancelled` once the deadline elapses.
    pub async fn open_conversation(&self, timeout: Option<Duration>) -> Result<Conversation> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(AssistantError::Protocol("manager is closed".to_string()));
        }

        if let Some(e) = self.tokens.last_error() {
            error!("Token provider reported an error: {}", e);
            return Err(match e {
                AssistantError::Auth(_) => e,
                other => AssistantError::Auth(other.to_string()),
            });
        }

        self.tokens.current_token().await.map_err(|e| match e {
            AssistantError::Auth(_) => e,
            other => AssistantError::Auth(other.to_string()),
        })?;

        let cancel = CancellationToken::new();

        let backend = self
            .factory
            .dial(&self.target, Arc::clone(&self.tokens))
            .await
            .map_err(|e| match e {
                AssistantError::Connection(_) => e,
                other => AssistantError::Connection(other.to_string()),
            })?;

        let previous = self.channel.lock().replace(ActiveChannel {
            backend: Arc::clone(&backend),
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            warn!("Replacing channel of previous conversation");
            previous.cancel.cancel();
            previous.backend.close().await;
        }

        if let Some(timeout) = timeout.filter(|t| !t.is_zero()) {
            spawn_deadline(cancel.clone(), timeout);
        }

        let context = Arc::new(TurnContext::new(
            Arc::clone(&self.settings),
            Arc::clone(&self.dialog),
            self.device.clone(),
        ));

        let conversation = Conversation {
            id: Uuid::new_v4(),
            stream: Arc::new(StreamSession::new(backend, cancel.clone())),
            context,
            turn_lock: Arc::new(tokio::sync::Mutex::new(())),
            cancel,
        };

        info!(conversation_id = %conversation.id, "Conversation opened");

        Ok(conversation)
    }

    /// Release the channel, cancel blocked operations and stop the OAuth
    /// callback listener
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let channel = self.channel.lock().take();
        if let Some(channel) = channel {
            channel.cancel.cancel();
            channel.backend.close().await;
        }

        self.tokens.shutdown().await;

        info!("Conversation manager closed");
    }
}

fn spawn_deadline(cancel: CancellationToken, timeout: Duration) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(timeout) => {
                info!(timeout_ms = timeout.as_millis() as u64, "Conversation deadline elapsed");
                cancel.cancel();
            }
        }
    });
}

/// One conversation over a dialed channel
///
/// Hands out one transport at a time; the transport holds the turn until it
/// is dropped.
pub struct Conversation {
    id: Uuid,
    stream: Arc<StreamSession>,
    context: Arc<TurnContext>,
    turn_lock: Arc<tokio::sync::Mutex<()>>,
    cancel: CancellationToken,
}

impl Conversation {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn dialog_state(&self) -> DialogState {
        self.context.dialog_state()
    }

    pub fn audio_transport(&self) -> Result<AudioTransport> {
        let turn = self.begin_turn()?;
        Ok(AudioTransport::new(
            Arc::clone(&self.stream),
            Arc::clone(&self.context),
            turn,
        ))
    }

    pub fn text_transport(&self) -> Result<TextTransport> {
        let turn = self.begin_turn()?;
        Ok(TextTransport::new(
            Arc::clone(&self.stream),
            Arc::clone(&self.context),
            turn,
        ))
    }

    fn begin_turn(&self) -> Result<tokio::sync::OwnedMutexGuard<()>> {
        if self.cancel.is_cancelled() {
            return Err(AssistantError::Cancelled);
        }

        Arc::clone(&self.turn_lock).try_lock_owned().map_err(|_| {
            AssistantError::Protocol("another transport is still active".to_string())
        })
    }

    /// Close the current stream
    pub async fn close(&self) {
        self.stream.close().await;
    }
}
