//! Per-voice-use instantiation of one loaded sound: the buffer ring.
//!
//! Each playing sound owns `BUFFERS_PER_CHANNEL x channels` backend
//! buffers, partitioned into free (ours, empty), staged (filled, not yet
//! queued) and in-flight (queued on the voice). Buffers only ever move
//! between those three sets, so `|free| + |staged| + |in_flight|` equals
//! the ring size at all times.

use std::collections::VecDeque;

use serde::Serialize;

use cuedeck_core::SoundId;
use cuedeck_decode::SampleData;

use crate::backend::{AudioBackend, BufferId, VoiceId, backend_check};
use crate::config::{BUFFERS_PER_CHANNEL, MIN_SAMPLES_EXTRACTED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SoundState {
    /// Not yet reached by the playlist.
    Waiting,
    /// Currently producing buffers.
    Playing,
    /// Nothing left to stage; submitted buffers still rendering.
    Stale,
    /// Every buffer reclaimed; the sound is done.
    Finished,
}

pub(crate) struct PlayingSound {
    pub(crate) sound: SoundId,
    pub(crate) ring: Vec<BufferId>,
    pub(crate) free: VecDeque<BufferId>,
    pub(crate) staged: Vec<BufferId>,
    pub(crate) in_flight: VecDeque<BufferId>,
    /// Additional plays remaining after the current one.
    pub(crate) loops: u32,
    /// Read position in interleaved samples.
    pub(crate) cursor: usize,
    pub(crate) state: SoundState,
}

impl PlayingSound {
    /// Allocates the ring. `None` when the backend refuses; the caller
    /// unwinds the whole instantiation in that case.
    pub(crate) fn new(
        backend: &mut dyn AudioBackend,
        data: &SampleData,
        loops: u32,
    ) -> Option<Self> {
        let count = BUFFERS_PER_CHANNEL * usize::from(data.info().channels);
        let ring = backend_check!(backend.gen_buffers(count))?;
        let free = ring.iter().copied().collect();
        Some(Self {
            sound: data.id(),
            ring,
            free,
            staged: Vec::new(),
            in_flight: VecDeque::new(),
            loops,
            cursor: 0,
            state: SoundState::Waiting,
        })
    }

    pub(crate) fn release(&mut self, backend: &mut dyn AudioBackend) {
        if !self.ring.is_empty() {
            backend_check!(backend.delete_buffers(&self.ring));
        }
        self.ring.clear();
        self.free.clear();
        self.staged.clear();
        self.in_flight.clear();
    }

    /// Returns every staged and in-flight buffer to `free`. Used by the
    /// interrupt splice, right before the voice queue is cleared.
    pub(crate) fn recall_buffers(&mut self) {
        for buffer in self.staged.drain(..) {
            self.free.push_back(buffer);
        }
        for buffer in self.in_flight.drain(..) {
            self.free.push_back(buffer);
        }
    }

    pub(crate) fn all_buffers_home(&self) -> bool {
        self.free.len() == self.ring.len()
    }
}

/// Moves exactly one buffer free -> staged, filled with PCM from the
/// cursor. Returns whether a buffer was staged.
///
/// Streamed sounds take about [`MIN_SAMPLES_EXTRACTED`] frames per buffer,
/// clipped to the decoded frontier; fully-loaded sounds take the whole
/// remaining range in one shot. Reaching the decoded end of a fully
/// decoded sound either consumes a loop (cursor back to zero) or marks the
/// sound stale.
pub(crate) fn buffer_next(
    sound: &mut PlayingSound,
    data: &SampleData,
    backend: &mut dyn AudioBackend,
) -> bool {
    if sound.state != SoundState::Playing {
        return false;
    }
    let frontier = data.decoded_samples();
    if data.fully_decoded() && frontier == 0 {
        // Degenerate empty sound; nothing will ever be stageable.
        sound.state = SoundState::Stale;
        return false;
    }

    let channels = usize::from(data.info().channels);
    let next = if data.streamed() {
        frontier.min(sound.cursor + MIN_SAMPLES_EXTRACTED * channels)
    } else {
        frontier
    };
    if next <= sound.cursor {
        // Waiting on the decoder to advance the frontier.
        return false;
    }

    let Some(buffer) = sound.free.pop_front() else {
        return false;
    };
    let uploaded = backend_check!(backend.upload(
        buffer,
        data.format(),
        &data.decoded()[sound.cursor..next],
        data.info().sample_rate,
    ))
    .is_some();
    if !uploaded {
        sound.free.push_front(buffer);
        return false;
    }
    sound.staged.push(buffer);
    sound.cursor = next;

    if data.fully_decoded() && sound.cursor >= frontier {
        if sound.loops == 0 {
            sound.state = SoundState::Stale;
        } else {
            sound.loops -= 1;
            sound.cursor = 0;
        }
    }
    true
}

/// Queues all staged buffers onto the voice in order and promotes them to
/// in-flight. On backend failure they stay staged for the next tick.
pub(crate) fn submit_staged(
    sound: &mut PlayingSound,
    voice: VoiceId,
    backend: &mut dyn AudioBackend,
) {
    if sound.staged.is_empty() {
        return;
    }
    if backend_check!(backend.queue_buffers(voice, &sound.staged)).is_some() {
        for buffer in sound.staged.drain(..) {
            sound.in_flight.push_back(buffer);
        }
    }
}
