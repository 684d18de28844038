//! Subtitle estimation for synthesized speech.
//!
//! The synthesis engine reports no word timings, so cue times are a
//! character-proportional estimate over the clip duration.

pub mod segmenter;
pub mod timeline;

pub use timeline::{Cue, SubtitleTrack};
