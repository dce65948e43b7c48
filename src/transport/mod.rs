//! Per-turn exchanges over a conversation stream
//!
//! - `AudioTransport`: PCM chunks in, transcripts and audio out
//! - `TextTransport`: text query in, display text out

pub mod audio;
pub mod text;
pub mod transcript;

pub use audio::{AudioTransport, TransportState, TurnEnd};
pub use text::TextTransport;
pub use transcript::{TranscriptionResult, FINAL_STABILITY};
