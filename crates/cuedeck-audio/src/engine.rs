//! The engine facade: loading, cue creation, playback control, the tick.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, warn};

use cuedeck_core::{
    Arena, CategoryOption, Handle, Priority, SoundCategory, SoundId, SoundOption,
};
use cuedeck_decode::{SampleData, decode_more};

use crate::backend::{AudioBackend, BackendError, VoiceId, backend_check};
use crate::category::CategoryMixer;
use crate::config::{
    MAX_SAMPLES_FOR_NON_STREAM, MAX_SOURCE_PER_CUE, MIN_SAMPLES_BUFFERED_ON_CREATION,
};
use crate::cue::{self, CueElement, CueState, CueTemplate, PauseKind, PlayingCue};
use crate::scheduler::VoiceScheduler;
use crate::sound::{PlayingSound, SoundState, buffer_next, submit_staged};

/// Priority-driven playback manager over a fixed voice pool.
///
/// Single-threaded and cooperative: the host calls [`SoundEngine::update`]
/// once per tick; `stop` takes effect synchronously, `play` no later than
/// the end of the next tick. Load failures and scheduler rejections come
/// back as `None`; handle misses as `false`.
pub struct SoundEngine {
    backend: Box<dyn AudioBackend>,
    sounds: HashMap<SoundId, SampleData>,
    templates: Arena<CueTemplate>,
    playing: Arena<PlayingCue>,
    scheduler: VoiceScheduler,
    mixer: CategoryMixer,
}

impl SoundEngine {
    /// Pre-allocates the voice pool on the given backend.
    pub fn new(mut backend: Box<dyn AudioBackend>) -> Result<Self, BackendError> {
        let scheduler = VoiceScheduler::new(backend.as_mut())?;
        Ok(Self {
            backend,
            sounds: HashMap::new(),
            templates: Arena::new(),
            playing: Arena::new(),
            scheduler,
            mixer: CategoryMixer::new(),
        })
    }

    /// Loads a sound fully into memory. Mono only; the name is the file
    /// stem.
    pub fn create_data(&mut self, path: &Path) -> Option<SoundId> {
        let name = sound_name_from_path(path)?;
        let mut file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                error!(path = %path.display(), error = %err, "cannot open sound file");
                return None;
            }
        };
        self.create_data_from(&mut file, &name)
    }

    /// Loads a sound fully from an arbitrary stream.
    pub fn create_data_from(&mut self, stream: &mut dyn Read, name: &str) -> Option<SoundId> {
        match SampleData::load_fully(name, stream, MAX_SAMPLES_FOR_NON_STREAM) {
            Ok(data) => Some(self.insert_sound(data)),
            Err(err) => {
                error!(sound = name, error = %err, "failed to load sound");
                None
            }
        }
    }

    /// Opens a sound for incremental streaming. Mono or stereo.
    pub fn create_streamed(&mut self, path: &Path) -> Option<SoundId> {
        let name = sound_name_from_path(path)?;
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                error!(path = %path.display(), error = %err, "cannot open sound file");
                return None;
            }
        };
        self.create_streamed_from(Box::new(file), &name)
    }

    /// Opens a streamed sound over an arbitrary stream.
    pub fn create_streamed_from(
        &mut self,
        stream: Box<dyn Read + Send>,
        name: &str,
    ) -> Option<SoundId> {
        match SampleData::open_streamed(name, stream) {
            Ok(data) => Some(self.insert_sound(data)),
            Err(err) => {
                error!(sound = name, error = %err, "failed to open streamed sound");
                None
            }
        }
    }

    fn insert_sound(&mut self, data: SampleData) -> SoundId {
        let id = data.id();
        if self.sounds.contains_key(&id) {
            warn!(sound = data.name(), "sound already loaded; keeping the first");
            return id;
        }
        debug!(
            sound = data.name(),
            channels = data.info().channels,
            sample_rate = data.info().sample_rate,
            streamed = data.streamed(),
            "sound loaded"
        );
        self.sounds.insert(id, data);
        id
    }

    /// Builds an immutable cue template. Unknown sounds and channel-count
    /// mismatches are logged and omitted rather than failing the cue;
    /// `None` only when nothing valid remains.
    pub fn create_cue(
        &mut self,
        elements: &[CueElement],
        category: SoundCategory,
        priority: Priority,
        interrupt: Option<SoundId>,
    ) -> Option<Handle<CueTemplate>> {
        let mut kept = Vec::with_capacity(elements.len());
        let mut channels: Option<u16> = None;
        for element in elements {
            let Some(data) = self.sounds.get(&element.sound) else {
                warn!(sound = ?element.sound, "unknown sound omitted from cue");
                continue;
            };
            match channels {
                None => {
                    channels = Some(data.info().channels);
                    kept.push(*element);
                }
                Some(expected) if data.info().channels == expected => kept.push(*element),
                Some(expected) => {
                    warn!(
                        sound = data.name(),
                        expected,
                        got = data.info().channels,
                        "channel mismatch; sound omitted from cue"
                    );
                }
            }
        }
        let channels = match channels {
            Some(channels) => channels,
            None => {
                warn!("cue has no usable sounds; not created");
                return None;
            }
        };

        let interrupt = interrupt.and_then(|id| match self.sounds.get(&id) {
            Some(data) if data.info().channels == channels => Some(id),
            Some(data) => {
                warn!(
                    sound = data.name(),
                    "interrupt sound channel mismatch; dropped"
                );
                None
            }
            None => {
                warn!(sound = ?id, "unknown interrupt sound dropped");
                None
            }
        });

        Some(self.templates.insert(CueTemplate {
            category,
            priority,
            elements: kept,
            interrupt,
            channels,
            live: Vec::new(),
        }))
    }

    /// Schedules a playing instance of the template onto a voice.
    ///
    /// `None` when the template is dead, its live-instance cap is hit, or
    /// the pool is exhausted and no live cue of the same category is
    /// equally or less urgent than the incoming one.
    pub fn play(&mut self, template: Handle<CueTemplate>) -> Option<Handle<PlayingCue>> {
        let (category, priority, elements, interrupt_id) = {
            let playing = &self.playing;
            let tmpl = self.templates.get_mut(template)?;
            tmpl.live.retain(|handle| playing.contains(*handle));
            if tmpl.live.len() >= MAX_SOURCE_PER_CUE {
                debug!(?template, "per-cue instance cap reached; play rejected");
                return None;
            }
            (
                tmpl.category,
                tmpl.priority,
                tmpl.elements.clone(),
                tmpl.interrupt,
            )
        };

        let voice = match self.scheduler.take_free() {
            Some(voice) => voice,
            None => match self.scheduler.least_urgent(category) {
                Some((victim_priority, victim)) if victim_priority >= priority => {
                    debug!(
                        ?victim,
                        victim_priority, incoming = priority, "preempting least urgent cue"
                    );
                    self.stop_cue(victim);
                    self.scheduler.take_free()?
                }
                _ => {
                    debug!(?category, priority, "voice pool exhausted; play rejected");
                    return None;
                }
            },
        };

        let mut sounds = Vec::with_capacity(elements.len());
        for element in &elements {
            let Some(data) = self.sounds.get(&element.sound) else {
                continue;
            };
            match PlayingSound::new(self.backend.as_mut(), data, element.loops) {
                Some(sound) => sounds.push(sound),
                None => {
                    for sound in &mut sounds {
                        sound.release(self.backend.as_mut());
                    }
                    self.scheduler.release(voice);
                    return None;
                }
            }
        }
        if sounds.is_empty() {
            self.scheduler.release(voice);
            return None;
        }

        sounds[0].state = SoundState::Playing;
        if let Some(data) = self.sounds.get_mut(&sounds[0].sound) {
            let channels = usize::from(data.info().channels);
            decode_more(data, MIN_SAMPLES_BUFFERED_ON_CREATION * channels);
            buffer_next(&mut sounds[0], data, self.backend.as_mut());
        }

        let handle = self.playing.insert(PlayingCue {
            template,
            category,
            priority,
            voice,
            playing_index: 0,
            waiting_index: 0,
            sounds,
            interrupt_id,
            interrupt: None,
            option: SoundOption::default(),
            state: CueState::Playing,
            paused: None,
        });
        self.scheduler.insert(category, priority, handle);
        if let Some(tmpl) = self.templates.get_mut(template) {
            tmpl.live.push(handle);
        }

        if let Some(cue) = self.playing.get_mut(handle) {
            backend_check!(self.backend.set_relative(voice, true));
            cue::apply_options(cue, self.backend.as_mut(), &self.mixer);
            submit_staged(&mut cue.sounds[0], voice, self.backend.as_mut());
            backend_check!(self.backend.play(voice));
        }
        debug!(?handle, ?voice, ?category, priority, "cue playing");
        Some(handle)
    }

    /// Stops a playing cue synchronously and releases its voice. `false`
    /// when the handle no longer resolves.
    pub fn stop(&mut self, handle: Handle<PlayingCue>) -> bool {
        self.stop_cue(handle)
    }

    /// Pauses a playing cue, keeping its voice and scheduler membership.
    pub fn pause(&mut self, handle: Handle<PlayingCue>) -> bool {
        let Some(cue) = self.playing.get_mut(handle) else {
            return false;
        };
        if cue.paused.is_none() {
            backend_check!(self.backend.pause(cue.voice));
        }
        cue.paused = Some(PauseKind::User);
        true
    }

    /// Resumes a paused cue, however it was paused.
    pub fn start(&mut self, handle: Handle<PlayingCue>) -> bool {
        let Some(cue) = self.playing.get_mut(handle) else {
            return false;
        };
        if cue.paused.is_some() {
            backend_check!(self.backend.play(cue.voice));
            cue.paused = None;
        }
        true
    }

    /// Splices the template's interrupt sound onto the cue, discarding its
    /// remaining queue. Degenerates to [`SoundEngine::stop`] when the
    /// template has no interrupt sound.
    pub fn interrupt(&mut self, handle: Handle<PlayingCue>) -> bool {
        let has_interrupt = match self.playing.get(handle) {
            Some(cue) => cue.interrupt_id.is_some(),
            None => return false,
        };
        if !has_interrupt {
            return self.stop_cue(handle);
        }
        let Some(cue) = self.playing.get_mut(handle) else {
            return false;
        };
        cue::splice_interrupt(cue, &mut self.sounds, self.backend.as_mut())
    }

    /// Replaces the live options pushed to the voice on the next tick.
    pub fn set_option(&mut self, handle: Handle<PlayingCue>, option: SoundOption) -> bool {
        match self.playing.get_mut(handle) {
            Some(cue) => {
                cue.option = option;
                true
            }
            None => false,
        }
    }

    pub fn stop_category(&mut self, category: SoundCategory) {
        for handle in self.playing.handles() {
            if self
                .playing
                .get(handle)
                .is_some_and(|cue| cue.category == category)
            {
                self.stop_cue(handle);
            }
        }
    }

    /// Pauses every playing cue of the category; returns the handles this
    /// call actually paused.
    pub fn pause_category(&mut self, category: SoundCategory) -> Vec<Handle<PlayingCue>> {
        self.pause_bulk(Some(category))
    }

    /// Resumes the cues a bulk pause suspended; user-paused cues stay
    /// paused. Returns the handles this call resumed.
    pub fn start_category(&mut self, category: SoundCategory) -> Vec<Handle<PlayingCue>> {
        self.start_bulk(Some(category))
    }

    pub fn stop_all(&mut self) {
        for handle in self.playing.handles() {
            self.stop_cue(handle);
        }
    }

    pub fn pause_all(&mut self) -> Vec<Handle<PlayingCue>> {
        self.pause_bulk(None)
    }

    pub fn start_all(&mut self) -> Vec<Handle<PlayingCue>> {
        self.start_bulk(None)
    }

    pub fn set_category_gain(&mut self, category: SoundCategory, option: CategoryOption) {
        self.mixer.set(category, option);
    }

    pub fn category_gain(&self, category: SoundCategory) -> CategoryOption {
        self.mixer.get(category)
    }

    pub fn set_master_gain(&mut self, option: CategoryOption) {
        self.mixer.set_master(option);
    }

    pub fn master_gain(&self) -> CategoryOption {
        self.mixer.master()
    }

    /// Advances every live cue one tick, visiting cues in handle order.
    pub fn update(&mut self) {
        for handle in self.playing.handles() {
            let Some(cue) = self.playing.get_mut(handle) else {
                continue;
            };
            cue::update_cue(cue, &mut self.sounds, self.backend.as_mut(), &self.mixer);
            let retired = cue.state == CueState::NotPlaying;
            if retired {
                self.stop_cue(handle);
            }
        }
    }

    /// State of a playing cue, or `None` once the handle is dead.
    pub fn cue_state(&self, handle: Handle<PlayingCue>) -> Option<CueState> {
        self.playing.get(handle).map(|cue| cue.state)
    }

    /// Read-only access to a loaded sound.
    pub fn sample(&self, id: SoundId) -> Option<&SampleData> {
        self.sounds.get(&id)
    }

    /// Read-only snapshot for inspection.
    pub fn info(&self) -> EngineInfo {
        let playing = self
            .playing
            .iter()
            .map(|(handle, cue)| PlayingCueInfo {
                slot: handle.slot(),
                uid: handle.uid(),
                category: cue.category,
                priority: cue.priority,
                voice: cue.voice,
                state: cue.state,
                gain: cue.option.gain,
                playing_index: cue.playing_index,
                waiting_index: cue.waiting_index,
                paused: cue.paused.is_some(),
                sounds: cue
                    .sounds
                    .iter()
                    .map(|sound| PlayingSoundInfo {
                        sound: sound.sound,
                        state: sound.state,
                        free: sound.free.len(),
                        staged: sound.staged.len(),
                        in_flight: sound.in_flight.len(),
                        ring: sound.ring.len(),
                        cursor: sound.cursor,
                        loops: sound.loops,
                    })
                    .collect(),
            })
            .collect();

        let mut sounds: Vec<LoadedSoundInfo> = self
            .sounds
            .values()
            .map(|data| LoadedSoundInfo {
                id: data.id(),
                name: data.name().to_owned(),
                channels: data.info().channels,
                sample_rate: data.info().sample_rate,
                streamed: data.streamed(),
                decoded_samples: data.decoded_samples(),
                total_read: data.total_read(),
                fully_read: data.fully_read(),
                fully_decoded: data.fully_decoded(),
            })
            .collect();
        sounds.sort_by(|a, b| a.name.cmp(&b.name));

        EngineInfo {
            voices: self.scheduler.voices().to_vec(),
            free_voices: self.scheduler.free_voices().to_vec(),
            playing,
            sounds,
        }
    }

    fn pause_bulk(&mut self, category: Option<SoundCategory>) -> Vec<Handle<PlayingCue>> {
        let mut affected = Vec::new();
        for handle in self.playing.handles() {
            let Some(cue) = self.playing.get_mut(handle) else {
                continue;
            };
            if category.is_some_and(|wanted| wanted != cue.category) {
                continue;
            }
            if cue.paused.is_some() || cue.state == CueState::NotPlaying {
                continue;
            }
            backend_check!(self.backend.pause(cue.voice));
            cue.paused = Some(PauseKind::Bulk);
            affected.push(handle);
        }
        affected
    }

    fn start_bulk(&mut self, category: Option<SoundCategory>) -> Vec<Handle<PlayingCue>> {
        let mut affected = Vec::new();
        for handle in self.playing.handles() {
            let Some(cue) = self.playing.get_mut(handle) else {
                continue;
            };
            if category.is_some_and(|wanted| wanted != cue.category) {
                continue;
            }
            if cue.paused != Some(PauseKind::Bulk) {
                continue;
            }
            backend_check!(self.backend.play(cue.voice));
            cue.paused = None;
            affected.push(handle);
        }
        affected
    }

    /// Tears one playing cue down: voice stopped and cleared, ring buffers
    /// deleted, scheduler and template bookkeeping updated, slot freed.
    fn stop_cue(&mut self, handle: Handle<PlayingCue>) -> bool {
        let Some(mut cue) = self.playing.remove(handle) else {
            return false;
        };
        backend_check!(self.backend.stop(cue.voice));
        backend_check!(self.backend.clear_queue(cue.voice));
        for sound in &mut cue.sounds {
            sound.release(self.backend.as_mut());
        }
        if let Some(sound) = cue.interrupt.as_mut() {
            sound.release(self.backend.as_mut());
        }
        self.scheduler.remove(cue.category, handle);
        self.scheduler.release(cue.voice);
        if let Some(tmpl) = self.templates.get_mut(cue.template) {
            tmpl.live.retain(|live| *live != handle);
        }
        debug!(?handle, voice = ?cue.voice, "cue stopped");
        true
    }
}

impl Drop for SoundEngine {
    fn drop(&mut self) {
        self.stop_all();
        let voices = self.scheduler.voices().to_vec();
        backend_check!(self.backend.delete_voices(&voices));
    }
}

fn sound_name_from_path(path: &Path) -> Option<String> {
    match path.file_stem().and_then(|stem| stem.to_str()) {
        Some(stem) => Some(stem.to_owned()),
        None => {
            error!(path = %path.display(), "sound path has no usable file stem");
            None
        }
    }
}

/// Snapshot of the engine for inspection tooling.
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub voices: Vec<VoiceId>,
    pub free_voices: Vec<VoiceId>,
    pub playing: Vec<PlayingCueInfo>,
    pub sounds: Vec<LoadedSoundInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayingCueInfo {
    pub slot: u32,
    pub uid: u64,
    pub category: SoundCategory,
    pub priority: Priority,
    pub voice: VoiceId,
    pub state: CueState,
    pub gain: f32,
    pub playing_index: usize,
    pub waiting_index: usize,
    pub paused: bool,
    pub sounds: Vec<PlayingSoundInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayingSoundInfo {
    pub sound: SoundId,
    pub state: SoundState,
    pub free: usize,
    pub staged: usize,
    pub in_flight: usize,
    pub ring: usize,
    pub cursor: usize,
    pub loops: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadedSoundInfo {
    pub id: SoundId,
    pub name: String,
    pub channels: u16,
    pub sample_rate: u32,
    pub streamed: bool,
    pub decoded_samples: usize,
    pub total_read: usize,
    pub fully_read: bool,
    pub fully_decoded: bool,
}
