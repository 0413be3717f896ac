//! The audio backend seam.
//!
//! The engine drives an OpenAL-shaped device: a pool of voices, each
//! rendering a queue of uploaded PCM buffers. No production backend ships
//! in this crate; hosts implement [`AudioBackend`] over their device layer,
//! and the test harness provides a deterministic in-memory model.
//!
//! Backend failures never propagate out of the engine. Every call goes
//! through [`backend_check!`], which logs the failing call with its
//! call-site location and lets playback degrade audibly instead of
//! crashing.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use cuedeck_core::SampleFormat;

/// Backend playback slot that renders a queue of PCM buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceId(pub u32);

/// Backend-owned region of PCM bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VoiceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unknown voice {0:?}")]
    UnknownVoice(VoiceId),
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
    #[error("device error: {0}")]
    Device(String),
}

/// Voice/buffer primitives the engine consumes.
///
/// The engine owns exactly which voice and buffer handles exist at any
/// time, so implementations may treat ids as dense indices.
pub trait AudioBackend {
    fn gen_voices(&mut self, count: usize) -> Result<Vec<VoiceId>, BackendError>;
    fn delete_voices(&mut self, voices: &[VoiceId]) -> Result<(), BackendError>;

    fn set_gain(&mut self, voice: VoiceId, gain: f32) -> Result<(), BackendError>;
    fn set_position(&mut self, voice: VoiceId, position: Vec3) -> Result<(), BackendError>;
    fn set_velocity(&mut self, voice: VoiceId, velocity: Vec3) -> Result<(), BackendError>;
    /// Relative mode: positions are interpreted against the listener.
    fn set_relative(&mut self, voice: VoiceId, relative: bool) -> Result<(), BackendError>;

    fn gen_buffers(&mut self, count: usize) -> Result<Vec<BufferId>, BackendError>;
    fn delete_buffers(&mut self, buffers: &[BufferId]) -> Result<(), BackendError>;

    /// Uploads interleaved PCM. The byte size submitted to the device is
    /// `pcm.len() * size_of::<f32>()` regardless of channel layout; the
    /// format tag conveys interleaving.
    fn upload(
        &mut self,
        buffer: BufferId,
        format: SampleFormat,
        pcm: &[f32],
        sample_rate: u32,
    ) -> Result<(), BackendError>;

    /// Appends buffers to the voice's render queue, in order.
    fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferId]) -> Result<(), BackendError>;
    /// Removes up to `count` processed buffers from the head of the queue.
    fn unqueue_buffers(
        &mut self,
        voice: VoiceId,
        count: usize,
    ) -> Result<Vec<BufferId>, BackendError>;
    /// Buffers the voice has finished rendering but not yet unqueued.
    fn processed_buffer_count(&mut self, voice: VoiceId) -> Result<usize, BackendError>;

    fn voice_state(&mut self, voice: VoiceId) -> Result<VoiceState, BackendError>;
    fn play(&mut self, voice: VoiceId) -> Result<(), BackendError>;
    fn pause(&mut self, voice: VoiceId) -> Result<(), BackendError>;
    fn stop(&mut self, voice: VoiceId) -> Result<(), BackendError>;
    /// Stops rendering and drops every queued buffer, processed or not.
    fn clear_queue(&mut self, voice: VoiceId) -> Result<(), BackendError>;
}

/// Evaluates a backend call, logging a failure with the call site and
/// yielding `Option` of the success value.
macro_rules! backend_check {
    ($call:expr) => {
        match $call {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!(error = %err, call = stringify!($call), "audio backend call failed");
                None
            }
        }
    };
}

pub(crate) use backend_check;
