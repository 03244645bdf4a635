//! Speech synthesis: the engine seam and the per-line audio stage.

pub mod synth;
pub mod tts;

pub use synth::AudioSynthesizer;
pub use tts::{GoogleTts, SpeechEngine};
