//! Visual-novel frame rendering: fixed stage layout, sprites, speech balloon and text.

pub mod cards;
pub mod layout;
pub mod render;
pub mod text;

pub use layout::{SpritePlacement, StageLayout, member_opacity, plan_stage};
pub use render::FrameRenderer;
pub use text::{TextRasterizer, TextStyle, wrap_text};
