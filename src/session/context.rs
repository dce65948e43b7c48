use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::dialog::{DeviceIdentity, DialogState};
use crate::audio::AudioSettings;
use crate::backend::{AudioOutConfig, DialogStateOut, TurnConfig, TurnInput};

/// State shared between a manager and the transports it hands out
///
/// Only the turn currently holding the stream mutates it.
#[derive(Debug)]
pub struct TurnContext {
    settings: Arc<RwLock<AudioSettings>>,
    dialog: Arc<Mutex<DialogState>>,
    device: DeviceIdentity,
}

impl TurnContext {
    pub fn new(
        settings: Arc<RwLock<AudioSettings>>,
        dialog: Arc<Mutex<DialogState>>,
        device: DeviceIdentity,
    ) -> Self {
        Self {
            settings,
            dialog,
            device,
        }
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

    /// Build the config frame for a new turn from the current state
    pub fn turn_config(&self, input: TurnInput) -> TurnConfig {
        let settings = self.settings.read();
        TurnConfig {
            input,
            audio_out: AudioOutConfig {
                encoding: settings.out_encoding,
                sample_rate_hz: settings.out_sample_rate_hz,
                volume_pct: settings.out_volume_pct(),
            },
            device: self.device.clone(),
            dialog_state: self.dialog.lock().clone(),
        }
    }

    /// Config frame for an audio turn
    pub fn audio_turn_config(&self) -> TurnConfig {
        let input = {
            let settings = self.settings.read();
            TurnInput::Audio {
                encoding: settings.in_encoding,
                sample_rate_hz: settings.in_sample_rate_hz,
            }
        };
        self.turn_config(input)
    }

    /// Apply a dialog-state-out message: continuation token, conversation
    /// flag and server-driven volume
    pub fn apply_dialog_state_out(&self, out: &DialogStateOut) {
        self.dialog.lock().apply(out);
        self.settings.write().set_out_volume_pct(out.volume_pct);

        debug!(
            token_len = out.continuation_token.len(),
            volume_pct = out.volume_pct,
            "Dialog state updated"
        );
    }
}
