//! Decode-side tunables. Durations are seconds; sample counts are frames at
//! the approximation rate unless noted otherwise.

/// Bytes read per attempt while opening a push codec. Most container
/// headers fit in the first block; a second block covers the rest.
pub const HEADER_BLOCK: usize = 8 * 1024;

/// Nominal rate used to convert the duration tunables into sample counts.
pub const SAMPLE_APPROXIMATION: u32 = 44_100;

/// How much audio one staged buffer carries for a streamed sound.
pub const MIN_DURATION_EXTRACTED: f32 = 0.5;

/// How much audio is pre-decoded before a voice starts or an interrupt
/// sound is spliced in.
pub const MIN_DURATION_BUFFERED_ON_CREATION: f32 = 0.2;

/// Longest sound accepted for fully-loaded use; anything longer is
/// truncated (and should be streamed instead).
pub const MAX_DURATION_FOR_NON_STREAM: f32 = 10.0;

/// Bytes pulled from the input stream per residue refill.
pub const READ_CHUNK: usize = (16.0 * 1024.0 * MIN_DURATION_EXTRACTED * 2.0) as usize;

pub const MIN_SAMPLES_EXTRACTED: usize =
    (SAMPLE_APPROXIMATION as f32 * MIN_DURATION_EXTRACTED) as usize;

pub const MIN_SAMPLES_BUFFERED_ON_CREATION: usize =
    (SAMPLE_APPROXIMATION as f32 * MIN_DURATION_BUFFERED_ON_CREATION) as usize;

pub const MAX_SAMPLES_FOR_NON_STREAM: usize =
    (SAMPLE_APPROXIMATION as f32 * MAX_DURATION_FOR_NON_STREAM) as usize;
