//! Audio parameters exchanged with the assistant
//!
//! Audio itself stays opaque: the crate moves byte buffers and never decodes
//! or encodes samples.

pub mod settings;

pub use settings::{AudioInEncoding, AudioOutEncoding, AudioSettings};
