//! Engine tunables. The decode-side constants are re-exported here so the
//! whole set is visible in one place.

pub use cuedeck_decode::config::{
    HEADER_BLOCK, MAX_DURATION_FOR_NON_STREAM, MAX_SAMPLES_FOR_NON_STREAM,
    MIN_DURATION_BUFFERED_ON_CREATION, MIN_DURATION_EXTRACTED, MIN_SAMPLES_BUFFERED_ON_CREATION,
    MIN_SAMPLES_EXTRACTED, READ_CHUNK, SAMPLE_APPROXIMATION,
};

/// Size of the shared voice pool.
pub const MAX_SOURCES: usize = 5;

/// Most simultaneous live instances of one cue template.
pub const MAX_SOURCE_PER_CUE: usize = 3;

/// Backend buffers per channel in each playing sound's ring.
pub const BUFFERS_PER_CHANNEL: usize = 5;
