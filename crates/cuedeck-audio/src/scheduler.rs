//! Voice pool bookkeeping and per-category priority queues.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use cuedeck_core::{Handle, Priority, SoundCategory};

use crate::backend::{AudioBackend, BackendError, VoiceId};
use crate::config::MAX_SOURCES;
use crate::cue::PlayingCue;

/// Heap entry. The heap's top is the least urgent live cue: the largest
/// priority value, ties broken toward the higher slot.
struct CueRank {
    priority: Priority,
    slot: u32,
    handle: Handle<PlayingCue>,
}

impl PartialEq for CueRank {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.slot == other.slot
    }
}

impl Eq for CueRank {}

impl PartialOrd for CueRank {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CueRank {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then(self.slot.cmp(&other.slot))
    }
}

pub(crate) struct VoiceScheduler {
    voices: Vec<VoiceId>,
    /// Free stack; the most recently released voice is reused first.
    free: Vec<VoiceId>,
    queues: HashMap<SoundCategory, BinaryHeap<CueRank>>,
}

impl VoiceScheduler {
    pub(crate) fn new(backend: &mut dyn AudioBackend) -> Result<Self, BackendError> {
        let voices = backend.gen_voices(MAX_SOURCES)?;
        let free = voices.clone();
        Ok(Self {
            voices,
            free,
            queues: HashMap::new(),
        })
    }

    pub(crate) fn take_free(&mut self) -> Option<VoiceId> {
        self.free.pop()
    }

    pub(crate) fn release(&mut self, voice: VoiceId) {
        self.free.push(voice);
    }

    /// The preemption candidate for `category`: priority and handle of its
    /// least urgent live cue.
    pub(crate) fn least_urgent(
        &self,
        category: SoundCategory,
    ) -> Option<(Priority, Handle<PlayingCue>)> {
        self.queues
            .get(&category)?
            .peek()
            .map(|rank| (rank.priority, rank.handle))
    }

    pub(crate) fn insert(
        &mut self,
        category: SoundCategory,
        priority: Priority,
        handle: Handle<PlayingCue>,
    ) {
        self.queues.entry(category).or_default().push(CueRank {
            priority,
            slot: handle.slot(),
            handle,
        });
    }

    pub(crate) fn remove(&mut self, category: SoundCategory, handle: Handle<PlayingCue>) {
        if let Some(queue) = self.queues.get_mut(&category) {
            queue.retain(|rank| rank.handle != handle);
        }
    }

    pub(crate) fn voices(&self) -> &[VoiceId] {
        &self.voices
    }

    pub(crate) fn free_voices(&self) -> &[VoiceId] {
        &self.free
    }

    pub(crate) fn free_count(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::VoiceScheduler;
    use crate::config::MAX_SOURCES;
    use crate::tests::harness::FakeBackend;

    #[test]
    fn pool_starts_full() {
        let mut backend = FakeBackend::new();
        let scheduler = VoiceScheduler::new(&mut backend).expect("init failed");
        assert_eq!(scheduler.free_count(), MAX_SOURCES);
        assert_eq!(scheduler.voices().len(), MAX_SOURCES);
    }

    #[test]
    fn released_voice_is_reused_first() {
        let mut backend = FakeBackend::new();
        let mut scheduler = VoiceScheduler::new(&mut backend).expect("init failed");
        let first = scheduler.take_free().expect("pool empty");
        let second = scheduler.take_free().expect("pool empty");
        scheduler.release(first);
        assert_eq!(scheduler.take_free(), Some(first));
        scheduler.release(second);
        scheduler.release(first);
        assert_eq!(scheduler.free_count(), MAX_SOURCES);
    }
}
