use serde::{Deserialize, Serialize};

use crate::error::{AssistantError, Result};

/// Encoding of the audio sent to the assistant.
///
/// Values are passed through to the service untouched; nothing in this crate
/// decodes or encodes audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioInEncoding {
    /// Rejected by the service with INVALID_ARGUMENT
    Unspecified,
    /// Signed 16-bit little-endian linear PCM
    #[default]
    Linear16,
    /// FLAC with stream header, 16 or 24 bit samples
    Flac,
}

/// Encoding of the audio returned by the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioOutEncoding {
    /// Rejected by the service with INVALID_ARGUMENT
    Unspecified,
    /// Signed 16-bit little-endian linear PCM
    #[default]
    Linear16,
    /// MP3, sample rate encoded in the payload
    Mp3,
    /// Opus wrapped in an OGG container, sample rate encoded in the payload
    OpusInOgg,
}

/// Audio-in and audio-out configuration for a conversation.
///
/// Everything is fixed at construction except the output volume, which the
/// service may change at the end of any turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioSettings {
    pub in_encoding: AudioInEncoding,
    pub in_sample_rate_hz: i32,
    pub out_encoding: AudioOutEncoding,
    pub out_sample_rate_hz: i32,
    out_volume_pct: i32,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            in_encoding: AudioInEncoding::Linear16,
            in_sample_rate_hz: 16000,
            out_encoding: AudioOutEncoding::Linear16,
            out_sample_rate_hz: 16000,
            out_volume_pct: 100,
        }
    }
}

impl AudioSettings {
    /// Create validated audio settings
    pub fn new(
        in_encoding: AudioInEncoding,
        in_sample_rate_hz: i32,
        out_encoding: AudioOutEncoding,
        out_sample_rate_hz: i32,
        out_volume_pct: i32,
    ) -> Result<Self> {
        let settings = Self {
            in_encoding,
            in_sample_rate_hz,
            out_encoding,
            out_sample_rate_hz,
            out_volume_pct,
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.in_encoding == AudioInEncoding::Unspecified {
            return Err(AssistantError::Config(
                "audio-in encoding must be specified".to_string(),
            ));
        }
        if self.out_encoding == AudioOutEncoding::Unspecified {
            return Err(AssistantError::Config(
                "audio-out encoding must be specified".to_string(),
            ));
        }
        if self.in_sample_rate_hz <= 0 || self.out_sample_rate_hz <= 0 {
            return Err(AssistantError::Config(format!(
                "sample rates must be positive (in={}, out={})",
                self.in_sample_rate_hz, self.out_sample_rate_hz
            )));
        }
        if !(0..=100).contains(&self.out_volume_pct) {
            return Err(AssistantError::Config(format!(
                "output volume must be within 0-100, got {}",
                self.out_volume_pct
            )));
        }
        Ok(())
    }

    pub fn out_volume_pct(&self) -> i32 {
        self.out_volume_pct
    }

    /// Apply a server-driven volume change, clamped to 0-100
    pub fn set_out_volume_pct(&mut self, volume_pct: i32) {
        self.out_volume_pct = volume_pct.clamp(0, 100);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        let settings = AudioSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.in_sample_rate_hz, 16000);
        assert_eq!(settings.out_volume_pct(), 100);
    }

    #[test]
    fn test_rejects_unspecified_encoding() {
        let result = AudioSettings::new(
            AudioInEncoding::Unspecified,
            16000,
            AudioOutEncoding::Linear16,
            16000,
            100,
        );
        assert!(matches!(result, Err(AssistantError::Config(_))));
    }

    #[test]
    fn test_rejects_out_of_range_volume() {
        let result = AudioSettings::new(
            AudioInEncoding::Flac,
            16000,
            AudioOutEncoding::Mp3,
            24000,
            101,
        );
        assert!(matches!(result, Err(AssistantError::Config(_))));
    }

    #[test]
    fn test_server_volume_is_clamped() {
        let mut settings = AudioSettings::default();
        settings.set_out_volume_pct(140);
        assert_eq!(settings.out_volume_pct(), 100);
        settings.set_out_volume_pct(-5);
        assert_eq!(settings.out_volume_pct(), 0);
        settings.set_out_volume_pct(42);
        assert_eq!(settings.out_volume_pct(), 42);
    }
}
