//! Cue templates and the per-tick playing-cue state machine.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, error};

use cuedeck_core::{Handle, Priority, SoundCategory, SoundId, SoundOption};
use cuedeck_decode::{SampleData, decode_more};

use crate::backend::{AudioBackend, VoiceId, backend_check};
use crate::category::CategoryMixer;
use crate::config::{MIN_SAMPLES_BUFFERED_ON_CREATION, MIN_SAMPLES_EXTRACTED};
use crate::sound::{PlayingSound, SoundState, buffer_next, submit_staged};

/// One entry of a cue template's playlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CueElement {
    pub sound: SoundId,
    /// Additional plays after the first; 0 plays the sound once.
    pub loops: u32,
}

impl CueElement {
    pub fn once(sound: SoundId) -> Self {
        Self { sound, loops: 0 }
    }
}

/// Immutable playback recipe: an ordered sound list, a category, a
/// priority, and optionally an interrupt sound spliced in on demand.
pub struct CueTemplate {
    pub(crate) category: SoundCategory,
    pub(crate) priority: Priority,
    pub(crate) elements: Vec<CueElement>,
    pub(crate) interrupt: Option<SoundId>,
    pub(crate) channels: u16,
    /// Live instances; pruned against the playing arena on each play.
    pub(crate) live: Vec<Handle<PlayingCue>>,
}

impl CueTemplate {
    pub fn category(&self) -> SoundCategory {
        self.category
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn elements(&self) -> &[CueElement] {
        &self.elements
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CueState {
    Playing,
    /// The last sound has nothing left to stage; in-flight buffers drain.
    Stale,
    NotPlaying,
    /// The interrupt sound was spliced in and is draining.
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PauseKind {
    /// Paused through `pause()`; only an explicit `start()` resumes it.
    User,
    /// Paused by a category/all sweep; the matching sweep resumes it.
    Bulk,
}

/// Runtime instantiation of a template bound to one voice.
pub struct PlayingCue {
    pub(crate) template: Handle<CueTemplate>,
    pub(crate) category: SoundCategory,
    pub(crate) priority: Priority,
    pub(crate) voice: VoiceId,
    /// The sound currently producing buffers.
    pub(crate) playing_index: usize,
    /// The sound whose in-flight buffers are still draining; trails
    /// `playing_index` by at most one.
    pub(crate) waiting_index: usize,
    pub(crate) sounds: Vec<PlayingSound>,
    pub(crate) interrupt_id: Option<SoundId>,
    /// Instantiated lazily on the first splice.
    pub(crate) interrupt: Option<PlayingSound>,
    pub(crate) option: SoundOption,
    pub(crate) state: CueState,
    pub(crate) paused: Option<PauseKind>,
}

impl PlayingCue {
    pub fn state(&self) -> CueState {
        self.state
    }

    pub fn category(&self) -> SoundCategory {
        self.category
    }

    pub fn voice(&self) -> VoiceId {
        self.voice
    }
}

/// Advances one cue by one tick: apply options, reclaim, retire/advance,
/// decode ahead, stage and submit, in that order.
pub(crate) fn update_cue(
    cue: &mut PlayingCue,
    bank: &mut HashMap<SoundId, SampleData>,
    backend: &mut dyn AudioBackend,
    mixer: &CategoryMixer,
) {
    if cue.state == CueState::NotPlaying {
        return;
    }

    apply_options(cue, backend, mixer);

    if cue.state == CueState::Interrupted {
        update_interrupted(cue, bank, backend);
        return;
    }

    reclaim(cue, backend);

    if cue.waiting_index >= cue.sounds.len() {
        // The last sound's final buffer came home; the engine releases the
        // voice and the arena slot.
        cue.state = CueState::NotPlaying;
        return;
    }

    if cue.sounds[cue.playing_index].state == SoundState::Stale {
        if cue.playing_index + 1 < cue.sounds.len() {
            cue.playing_index += 1;
            cue.sounds[cue.playing_index].state = SoundState::Playing;
        } else {
            cue.state = CueState::Stale;
        }
    }
    if cue.state == CueState::Stale {
        return;
    }

    let sound = &mut cue.sounds[cue.playing_index];
    let Some(data) = bank.get_mut(&sound.sound) else {
        error!(sound = ?sound.sound, "playing sound missing from the sample store");
        return;
    };
    decode_ahead(sound, data);
    buffer_next(sound, data, backend);
    submit_staged(sound, cue.voice, backend);
}

/// Pushes the composed gain and the live position/velocity to the voice.
/// The only place category gain reaches the backend.
pub(crate) fn apply_options(cue: &PlayingCue, backend: &mut dyn AudioBackend, mixer: &CategoryMixer) {
    let gain = mixer.composed_gain(cue.category, cue.option.gain);
    backend_check!(backend.set_gain(cue.voice, gain));
    backend_check!(backend.set_position(cue.voice, cue.option.position));
    backend_check!(backend.set_velocity(cue.voice, cue.option.velocity));
}

/// Returns processed buffers to the ring they came from, walking the
/// sound list from the waiting index in queue order, then advances the
/// waiting index past sounds whose last buffer just came home.
fn reclaim(cue: &mut PlayingCue, backend: &mut dyn AudioBackend) {
    let processed = backend_check!(backend.processed_buffer_count(cue.voice)).unwrap_or(0);
    if processed > 0 {
        let returned =
            backend_check!(backend.unqueue_buffers(cue.voice, processed)).unwrap_or_default();
        let mut remaining = returned.len();
        let mut index = cue.waiting_index;
        while remaining > 0 && index < cue.sounds.len() {
            let sound = &mut cue.sounds[index];
            if let Some(buffer) = sound.in_flight.pop_front() {
                sound.free.push_back(buffer);
                remaining -= 1;
            } else {
                index += 1;
            }
        }
    }

    while cue.waiting_index < cue.sounds.len() {
        let sound = &mut cue.sounds[cue.waiting_index];
        if sound.state == SoundState::Stale && sound.all_buffers_home() {
            sound.state = SoundState::Finished;
            cue.waiting_index += 1;
        } else {
            break;
        }
    }
}

fn decode_ahead(sound: &PlayingSound, data: &mut SampleData) {
    let channels = usize::from(data.info().channels);
    let margin = MIN_SAMPLES_EXTRACTED * channels;
    if !data.fully_decoded() && data.decoded_samples().saturating_sub(sound.cursor) < margin {
        decode_more(data, margin);
    }
}

/// Splices the template's interrupt sound onto the cue, discarding the
/// remaining queue: recall the outgoing sounds' buffers, pre-decode the
/// interrupt sound, stage exactly one buffer, stop and clear the voice,
/// submit, play.
pub(crate) fn splice_interrupt(
    cue: &mut PlayingCue,
    bank: &mut HashMap<SoundId, SampleData>,
    backend: &mut dyn AudioBackend,
) -> bool {
    let Some(interrupt_id) = cue.interrupt_id else {
        return false;
    };
    let Some(data) = bank.get_mut(&interrupt_id) else {
        error!(sound = ?interrupt_id, "interrupt sound missing from the sample store");
        return false;
    };

    for index in cue.waiting_index..=cue.playing_index {
        if let Some(sound) = cue.sounds.get_mut(index) {
            sound.recall_buffers();
        }
    }

    if cue.interrupt.is_none() {
        cue.interrupt = PlayingSound::new(backend, data, 0);
    }
    let Some(sound) = cue.interrupt.as_mut() else {
        return false;
    };
    // Re-splicing restarts the interrupt sound from the top.
    sound.recall_buffers();
    sound.cursor = 0;
    sound.state = SoundState::Playing;

    let channels = usize::from(data.info().channels);
    decode_more(data, MIN_SAMPLES_BUFFERED_ON_CREATION * channels);

    buffer_next(sound, data, backend);
    backend_check!(backend.stop(cue.voice));
    backend_check!(backend.clear_queue(cue.voice));
    submit_staged(sound, cue.voice, backend);
    backend_check!(backend.play(cue.voice));

    debug!(voice = ?cue.voice, sound = ?interrupt_id, "interrupt sound spliced");
    cue.state = CueState::Interrupted;
    cue.paused = None;
    true
}

/// Interrupted cues treat the interrupt sound as both waiting and playing
/// sound; it drains like a one-element playlist.
fn update_interrupted(
    cue: &mut PlayingCue,
    bank: &mut HashMap<SoundId, SampleData>,
    backend: &mut dyn AudioBackend,
) {
    let Some(sound) = cue.interrupt.as_mut() else {
        cue.state = CueState::NotPlaying;
        return;
    };

    let processed = backend_check!(backend.processed_buffer_count(cue.voice)).unwrap_or(0);
    if processed > 0 {
        let returned =
            backend_check!(backend.unqueue_buffers(cue.voice, processed)).unwrap_or_default();
        for _ in 0..returned.len() {
            if let Some(buffer) = sound.in_flight.pop_front() {
                sound.free.push_back(buffer);
            }
        }
    }

    if sound.state == SoundState::Stale && sound.all_buffers_home() {
        sound.state = SoundState::Finished;
        cue.state = CueState::NotPlaying;
        return;
    }

    if sound.state == SoundState::Playing {
        let Some(data) = bank.get_mut(&sound.sound) else {
            error!(sound = ?sound.sound, "interrupt sound missing from the sample store");
            return;
        };
        decode_ahead(sound, data);
        buffer_next(sound, data, backend);
        submit_staged(sound, cue.voice, backend);
    }
}
