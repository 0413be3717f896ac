//! Priority-driven voice scheduling and cue playback for cuedeck.
//!
//! The [`engine::SoundEngine`] is the facade a host composes: load sounds,
//! build cue templates, play them, and call [`engine::SoundEngine::update`]
//! once per tick. Everything here is single-threaded and cooperative; the
//! realtime mixing lives behind the [`backend::AudioBackend`] seam.

pub mod backend;
pub mod category;
pub mod config;
pub mod cue;
pub mod engine;
mod scheduler;
mod sound;

#[cfg(test)]
mod tests;

pub use backend::{AudioBackend, BackendError, BufferId, VoiceId, VoiceState};
pub use cue::{CueElement, CueState, CueTemplate, PlayingCue};
pub use engine::{EngineInfo, LoadedSoundInfo, PlayingCueInfo, PlayingSoundInfo, SoundEngine};
pub use sound::SoundState;
