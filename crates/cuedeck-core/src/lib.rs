//! Shared vocabulary for the cuedeck playback engine.
//!
//! This crate holds the types every other cuedeck crate speaks in: interned
//! sound ids, ABA-safe handles backed by a slot arena, playback categories,
//! and the option structs pushed to voices each tick. It performs no I/O.

pub mod handle;
pub mod types;

pub use handle::{Arena, Handle};
pub use types::{
    CategoryOption, PRIORITY_HIGHEST, Priority, SampleFormat, SoundCategory, SoundId, SoundOption,
};
