use serde::{Deserialize, Serialize};

use crate::backend::SpeechResult;

/// Stability at which a transcript is final
pub const FINAL_STABILITY: f32 = 1.0;

/// What the user has said so far in the current audio turn
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Recognised text
    pub text: String,

    /// Likelihood the service will not revise this guess
    /// (0.0 = unset, 0.1 = unstable, 1.0 = final)
    pub stability: f32,
}

impl TranscriptionResult {
    pub fn is_final(&self) -> bool {
        self.stability >= FINAL_STABILITY
    }

    /// Merge a speech-results event
    ///
    /// Ignored once the transcript is final. Segments are kept verbatim and
    /// joined with a single space; the event's stability is that of its last
    /// segment. Returns whether the transcript changed.
    pub fn apply(&mut self, results: &[SpeechResult]) -> bool {
        if self.is_final() {
            return false;
        }

        let Some(last) = results.last() else {
            return false;
        };

        let text = results
            .iter()
            .map(|result| result.transcript.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        self.text = text;
        self.stability = last.stability;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increasing_stability_ends_final() {
        let mut transcript = TranscriptionResult::default();

        assert!(transcript.apply(&[SpeechResult::new("turn", 0.3)]));
        assert!(transcript.apply(&[SpeechResult::new("turn on", 0.6)]));
        assert!(transcript.apply(&[SpeechResult::new("turn on the lights", 1.0)]));

        assert_eq!(transcript.text, "turn on the lights");
        assert_eq!(transcript.stability, 1.0);
        assert!(transcript.is_final());
    }

    #[test]
    fn test_final_transcript_is_frozen() {
        let mut transcript = TranscriptionResult::default();
        transcript.apply(&[SpeechResult::new("turn on the lights", 1.0)]);

        assert!(!transcript.apply(&[SpeechResult::new("turn off", 0.4)]));
        assert_eq!(transcript.text, "turn on the lights");
        assert_eq!(transcript.stability, 1.0);
    }

    #[test]
    fn test_multi_segment_joined_with_last_stability() {
        let mut transcript = TranscriptionResult::default();
        transcript.apply(&[
            SpeechResult::new("hello", 0.9),
            SpeechResult::new("world", 0.01),
        ]);

        assert_eq!(transcript.text, "hello world");
        assert_eq!(transcript.stability, 0.01);
    }

    #[test]
    fn test_segments_kept_verbatim() {
        let mut transcript = TranscriptionResult::default();
        transcript.apply(&[SpeechResult::new(" hi", 0.2)]);
        assert_eq!(transcript.text, " hi");

        transcript.apply(&[SpeechResult::new("hello", 0.4), SpeechResult::new("", 0.5)]);
        assert_eq!(transcript.text, "hello ");
        assert_eq!(transcript.stability, 0.5);
    }

    #[test]
    fn test_empty_event_is_ignored() {
        let mut transcript = TranscriptionResult::default();
        transcript.apply(&[SpeechResult::new("hello", 0.5)]);

        assert!(!transcript.apply(&[]));
        assert_eq!(transcript.text, "hello");
    }
}
