//! storyreel turns a dialogue script into visual-novel style vertical videos.
//!
//! # Pipeline overview
//!
//! 1. **Roster**: resolve free-form speaker names to configured characters ([`Roster`])
//! 2. **Audio**: one speech file per line through a [`SpeechEngine`] ([`AudioSynthesizer`])
//! 3. **Frames**: one 1080x1920 still per line ([`FrameRenderer`])
//! 4. **Segments**: still + audio per line, joined losslessly ([`segment::assemble_script`])
//! 5. **Montage**: intro, passes, separator, vocabulary, logo, music and title, exported as
//!    the social and web videos ([`MontageComposer`])
//!
//! Video work is delegated to the system `ffmpeg`/`ffprobe` binaries.
#![forbid(unsafe_code)]

pub mod assets;
pub mod audio;
pub mod config;
pub mod encode_ffmpeg;
pub mod foundation;
pub mod frame;
pub mod montage;
pub mod roster;
pub mod script;
pub mod segment;
pub mod vocab;

pub use foundation::error;

pub use audio::{AudioSynthesizer, GoogleTts, SpeechEngine};
pub use config::{CharacterConfig, Config, NarratorConfig, Settings, SsmlGender, VoiceParams};
pub use encode_ffmpeg::{EncodeConfig, ffmpeg_tools_available, is_ffmpeg_on_path};
pub use error::{Batch, LineIssue, ReelError, ReelResult};
pub use foundation::progress::{
    NoProgress, Progress, ProgressSink, ProgressTracker, format_elapsed,
};
pub use frame::{FrameRenderer, TextRasterizer};
pub use montage::{Lesson, MontageComposer, RunSummary, Variant, VariantOutput, Workspace};
pub use roster::{Roster, resolve_character_key};
pub use script::{NARRATOR, Script, ScriptLine};
pub use vocab::{SummarySlideFactory, VocabAssetFactory, VocabAssets, VocabEntry, load_vocab};
