use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Interned symbolic name of a loaded sound.
///
/// A copyable 64-bit token derived from the sound's name (FNV-1a). The
/// loader hands these out; everything downstream keys on the token and
/// never touches the string again. [`SoundId::NULL`] is the load-failure
/// sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SoundId(u64);

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

impl SoundId {
    pub const NULL: SoundId = SoundId(0);

    pub fn new(name: &str) -> Self {
        let mut hash = FNV_OFFSET;
        for byte in name.bytes() {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        // Zero is reserved for NULL; an (astronomically unlikely) collision
        // with it must still produce a live id.
        SoundId(if hash == 0 { FNV_OFFSET } else { hash })
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "SoundId(null)")
        } else {
            write!(f, "SoundId({:#018x})", self.0)
        }
    }
}

/// Grouping tag for bulk control and shared gain.
///
/// The master gain pair is held separately by the mixer and composes on top
/// of every category, so it is not a member of this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SoundCategory {
    Music,
    Sfx,
    Dialog,
    Ambience,
    Ui,
}

impl SoundCategory {
    pub const ALL: [SoundCategory; 5] = [
        SoundCategory::Music,
        SoundCategory::Sfx,
        SoundCategory::Dialog,
        SoundCategory::Ambience,
        SoundCategory::Ui,
    ];
}

/// Interleaved PCM layouts the audio backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    FloatMono,
    FloatStereo,
}

impl SampleFormat {
    pub fn channels(self) -> u16 {
        match self {
            SampleFormat::FloatMono => 1,
            SampleFormat::FloatStereo => 2,
        }
    }

    pub fn from_channels(channels: u16) -> Option<Self> {
        match channels {
            1 => Some(SampleFormat::FloatMono),
            2 => Some(SampleFormat::FloatStereo),
            _ => None,
        }
    }
}

/// Cue urgency. Lower values win contention; [`PRIORITY_HIGHEST`] outranks
/// everything.
pub type Priority = i32;

pub const PRIORITY_HIGHEST: Priority = -1;

/// Live playback options, pushed to the owning voice every tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SoundOption {
    pub gain: f32,
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Default for SoundOption {
    fn default() -> Self {
        Self {
            gain: 1.0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
        }
    }
}

/// Per-category gain pair: the user's volume slider times the game-driven
/// attenuation. Composed multiplicatively with the master pair on update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryOption {
    pub user_gain: f32,
    pub game_gain: f32,
}

impl Default for CategoryOption {
    fn default() -> Self {
        Self {
            user_gain: 1.0,
            game_gain: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::SoundId;

    #[test]
    fn same_name_same_id() {
        assert_eq!(SoundId::new("door_slam"), SoundId::new("door_slam"));
        assert_ne!(SoundId::new("door_slam"), SoundId::new("door_creak"));
    }

    #[test]
    fn null_is_distinguishable() {
        assert!(SoundId::NULL.is_null());
        assert!(!SoundId::new("").is_null());
    }
}
