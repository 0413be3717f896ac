//! Bundled QOA (Quite OK Audio) codec.
//!
//! QOA is the engine's streaming container: every frame is self-contained
//! (it carries its own LMS predictor state), so a push decoder never needs
//! to seek and can resynchronize after damage. Layout:
//!
//! ```text
//! File header (8 bytes):
//!   "qoaf" magic + u32 BE samples per channel
//! Frame (repeats):
//!   header: u8 channels, u24 BE sample rate, u16 BE samples/channel,
//!           u16 BE frame size in bytes (header included)
//!   per channel: LMS history[4] + weights[4], i16 BE
//!   slices: ceil(samples/20) per channel, channel-interleaved u64 BE;
//!           4-bit scalefactor + 20 x 3-bit quantized residuals
//! ```

use crate::codec::{CodecError, CodecInfo, DecodedAudio, DecodedFrame, FramePcm, PushCodec};

use tracing::warn;

pub(crate) const MAGIC: [u8; 4] = *b"qoaf";

const FILE_HEADER_SIZE: usize = 8;
const FRAME_HEADER_SIZE: usize = 8;
const SLICE_LEN: usize = 20;
const MAX_SLICES_PER_FRAME: usize = 256;
const MAX_FRAME_SAMPLES: usize = MAX_SLICES_PER_FRAME * SLICE_LEN;
const LMS_STATE_SIZE: usize = 16;

const SCALEFACTOR_TAB: [i32; 16] = [
    1, 7, 21, 45, 84, 138, 211, 304, 421, 562, 731, 928, 1157, 1419, 1715, 2048,
];

// residual/scalefactor in -8..=8 mapped to a 3-bit index
const QUANT_TAB: [u8; 17] = [7, 7, 7, 5, 5, 3, 3, 1, 0, 0, 2, 2, 4, 4, 6, 6, 6];

// dequant_tab[sf][q] = round(scalefactor * [0.75, -0.75, 2.5, -2.5, 4.5, -4.5, 7.0, -7.0][q])
const DEQUANT_TAB: [[i32; 8]; 16] = [
    [1, -1, 3, -3, 5, -5, 7, -7],
    [5, -5, 18, -18, 32, -32, 49, -49],
    [16, -16, 53, -53, 95, -95, 147, -147],
    [34, -34, 113, -113, 203, -203, 315, -315],
    [63, -63, 210, -210, 378, -378, 588, -588],
    [104, -104, 345, -345, 621, -621, 966, -966],
    [158, -158, 528, -528, 950, -950, 1477, -1477],
    [228, -228, 760, -760, 1368, -1368, 2128, -2128],
    [316, -316, 1053, -1053, 1895, -1895, 2947, -2947],
    [422, -422, 1405, -1405, 2529, -2529, 3934, -3934],
    [548, -548, 1828, -1828, 3290, -3290, 5117, -5117],
    [696, -696, 2320, -2320, 4176, -4176, 6496, -6496],
    [868, -868, 2893, -2893, 5207, -5207, 8099, -8099],
    [1064, -1064, 3548, -3548, 6386, -6386, 9933, -9933],
    [1286, -1286, 4288, -4288, 7718, -7718, 12005, -12005],
    [1536, -1536, 5120, -5120, 9216, -9216, 14336, -14336],
];

#[derive(Debug, Clone, Copy)]
struct Lms {
    history: [i32; 4],
    weights: [i32; 4],
}

impl Lms {
    fn encoder_init() -> Self {
        Self {
            history: [0; 4],
            weights: [0, 0, -(1 << 13), 1 << 14],
        }
    }

    fn predict(&self) -> i32 {
        self.history
            .iter()
            .zip(&self.weights)
            .map(|(h, w)| h * w)
            .sum::<i32>()
            >> 13
    }

    fn update(&mut self, sample: i32, residual: i32) {
        let delta = residual >> 4;
        for (weight, history) in self.weights.iter_mut().zip(&self.history) {
            *weight += if *history < 0 { -delta } else { delta };
        }
        self.history.rotate_left(1);
        self.history[3] = sample;
    }
}

fn clamp_i16(v: i32) -> i32 {
    v.clamp(-32768, 32767)
}

fn read_u16(bytes: &[u8]) -> u16 {
    u16::from_be_bytes([bytes[0], bytes[1]])
}

fn read_u24(bytes: &[u8]) -> u32 {
    u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]])
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(raw)
}

/// Decodes one 64-bit slice into up to `out.len()` samples.
fn decode_slice(slice: u64, lms: &mut Lms, out: &mut [i16]) {
    let scalefactor = ((slice >> 60) & 0xF) as usize;
    for (index, sample_out) in out.iter_mut().enumerate().take(SLICE_LEN) {
        let quantized = ((slice >> (57 - index * 3)) & 0x7) as usize;
        let dequantized = DEQUANT_TAB[scalefactor][quantized];
        let sample = clamp_i16(lms.predict() + dequantized);
        lms.update(sample, dequantized);
        *sample_out = sample as i16;
    }
}

/// Push-style QOA decoder over an externally managed byte span.
pub struct QoaStream {
    info: CodecInfo,
    total_frames: u64,
    emitted_frames: u64,
}

impl QoaStream {
    /// Sample frames declared by the file header.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }
}

/// Opens a push decoder over the start of a QOA stream.
///
/// Needs the file header plus the first frame header to learn the channel
/// count and rate; anything shorter is [`CodecError::NeedMoreData`]. On
/// success returns the decoder and the bytes consumed (the file header
/// only; the first frame is left for [`PushCodec::decode_frame`]).
pub fn open_push(input: &[u8]) -> Result<(QoaStream, usize), CodecError> {
    if input.len() < FILE_HEADER_SIZE + FRAME_HEADER_SIZE {
        return Err(CodecError::NeedMoreData);
    }
    if input[..4] != MAGIC {
        return Err(CodecError::UnknownContainer);
    }
    let total_frames = u32::from_be_bytes([input[4], input[5], input[6], input[7]]);
    if total_frames == 0 {
        return Err(CodecError::EmptyStream);
    }

    let channels = u16::from(input[FILE_HEADER_SIZE]);
    let sample_rate = read_u24(&input[FILE_HEADER_SIZE + 1..]);
    if channels == 0 || channels > 2 {
        return Err(CodecError::UnsupportedChannels(channels));
    }
    if sample_rate == 0 {
        return Err(CodecError::Decode("zero sample rate in frame header".into()));
    }

    Ok((
        QoaStream {
            info: CodecInfo {
                channels,
                sample_rate,
            },
            total_frames: u64::from(total_frames),
            emitted_frames: 0,
        },
        FILE_HEADER_SIZE,
    ))
}

impl PushCodec for QoaStream {
    fn info(&self) -> CodecInfo {
        self.info
    }

    fn decode_frame(&mut self, input: &[u8]) -> Result<DecodedFrame, CodecError> {
        if self.emitted_frames >= self.total_frames {
            // Everything declared by the header has been produced; the
            // driver turns this into fully-decoded once the stream is dry.
            return Err(CodecError::NeedMoreData);
        }
        if input.len() < FRAME_HEADER_SIZE {
            return Err(CodecError::NeedMoreData);
        }

        let channels = usize::from(input[0]);
        let sample_rate = read_u24(&input[1..]);
        let frame_samples = usize::from(read_u16(&input[4..]));
        let frame_size = usize::from(read_u16(&input[6..]));

        // Validate the header before trusting frame_size; a damaged header
        // is skipped byte-wise until a plausible one lines up again.
        if channels != usize::from(self.info.channels)
            || sample_rate != self.info.sample_rate
            || frame_samples == 0
            || frame_samples > MAX_FRAME_SAMPLES
        {
            return Err(CodecError::CorruptFrame {
                reason: "implausible frame header",
                skip: 1,
            });
        }
        let slices = frame_samples.div_ceil(SLICE_LEN);
        let expected_size = FRAME_HEADER_SIZE + channels * LMS_STATE_SIZE + slices * channels * 8;
        if frame_size != expected_size {
            return Err(CodecError::CorruptFrame {
                reason: "frame size disagrees with sample count",
                skip: 1,
            });
        }
        if input.len() < frame_size {
            return Err(CodecError::NeedMoreData);
        }

        let mut offset = FRAME_HEADER_SIZE;
        let mut lms = Vec::with_capacity(channels);
        for _ in 0..channels {
            let mut state = Lms {
                history: [0; 4],
                weights: [0; 4],
            };
            for i in 0..4 {
                state.history[i] =
                    i32::from(i16::from_be_bytes([input[offset + i * 2], input[offset + i * 2 + 1]]));
            }
            offset += 8;
            for i in 0..4 {
                state.weights[i] =
                    i32::from(i16::from_be_bytes([input[offset + i * 2], input[offset + i * 2 + 1]]));
            }
            offset += 8;
        }

        let mut planes: Vec<Vec<f32>> = vec![Vec::with_capacity(frame_samples); channels];
        let mut scratch = [0i16; SLICE_LEN];
        for slice_index in 0..slices {
            let start = slice_index * SLICE_LEN;
            let count = SLICE_LEN.min(frame_samples - start);
            for (channel, plane) in planes.iter_mut().enumerate() {
                let slice = read_u64(&input[offset..]);
                offset += 8;
                decode_slice(slice, &mut lms[channel], &mut scratch[..count]);
                plane.extend(scratch[..count].iter().map(|s| f32::from(*s) / 32768.0));
            }
        }

        // The last frame may carry padding past the declared total.
        let keep = frame_samples.min((self.total_frames - self.emitted_frames) as usize);
        for plane in &mut planes {
            plane.truncate(keep);
        }
        self.emitted_frames += keep as u64;

        let pcm = match planes.len() {
            1 => FramePcm::Mono(planes.pop().unwrap_or_default()),
            _ => {
                let right = planes.pop().unwrap_or_default();
                let left = planes.pop().unwrap_or_default();
                FramePcm::Stereo { left, right }
            }
        };
        Ok(DecodedFrame {
            bytes_consumed: frame_size,
            pcm,
        })
    }
}

/// Decodes an entire in-memory QOA stream, stopping at `max_frames`.
///
/// Used by the fully-loaded path; the streamed path drives [`QoaStream`]
/// incrementally instead.
pub fn decode_memory(bytes: &[u8], max_frames: usize) -> Result<DecodedAudio, CodecError> {
    let (mut codec, consumed) = open_push(bytes)?;
    let info = codec.info();
    let channels = usize::from(info.channels);
    let mut used = consumed;
    let mut samples = Vec::new();
    let mut truncated = false;

    loop {
        if samples.len() / channels >= max_frames {
            truncated = codec.emitted_frames < codec.total_frames;
            samples.truncate(max_frames * channels);
            break;
        }
        match codec.decode_frame(&bytes[used..]) {
            Ok(frame) => {
                used += frame.bytes_consumed;
                frame.pcm.interleave_into(&mut samples);
            }
            Err(CodecError::NeedMoreData) => break,
            Err(CodecError::CorruptFrame { reason, skip }) => {
                warn!(reason, skip, "skipping corrupt frame in memory decode");
                used += skip.min(bytes.len() - used);
                if used >= bytes.len() {
                    break;
                }
            }
            Err(err) => return Err(err),
        }
    }

    Ok(DecodedAudio {
        info,
        samples,
        truncated,
    })
}

/// Encodes one slice of up to 20 samples, trying every scalefactor and
/// keeping the one with the lowest squared error.
fn encode_slice(samples: &[i16], lms: &mut Lms) -> u64 {
    let mut best_slice = 0u64;
    let mut best_error = i64::MAX;
    let mut best_lms = *lms;

    for sf in 0..16 {
        let mut trial_lms = *lms;
        let mut slice = (sf as u64) << 60;
        let mut total_error = 0i64;

        for (index, &sample) in samples.iter().enumerate().take(SLICE_LEN) {
            let predicted = trial_lms.predict();
            let residual = i32::from(sample) - predicted;
            let scaled = (residual / SCALEFACTOR_TAB[sf].max(1)).clamp(-8, 8);
            let quantized = QUANT_TAB[(scaled + 8) as usize];
            let dequantized = DEQUANT_TAB[sf][usize::from(quantized)];
            let reconstructed = clamp_i16(predicted + dequantized);
            trial_lms.update(reconstructed, dequantized);

            let error = i64::from((i32::from(sample) - reconstructed).abs());
            total_error += error * error;
            slice |= u64::from(quantized) << (57 - index * 3);
        }

        if total_error < best_error {
            best_error = total_error;
            best_slice = slice;
            best_lms = trial_lms;
        }
    }

    *lms = best_lms;
    best_slice
}

/// Encodes interleaved 16-bit PCM into a complete QOA stream.
///
/// The asset pipeline's job in a shipped game; here it also builds the
/// fixtures the decode and engine tests play back.
pub fn encode(pcm: &[i16], channels: u16, sample_rate: u32) -> Vec<u8> {
    assert!(
        (1..=2).contains(&channels),
        "QOA encoder supports mono and stereo only"
    );
    let channels = usize::from(channels);
    let total_frames = pcm.len() / channels;

    let mut planes: Vec<Vec<i16>> = vec![Vec::with_capacity(total_frames); channels];
    for frame in pcm.chunks_exact(channels) {
        for (plane, &sample) in planes.iter_mut().zip(frame) {
            plane.push(sample);
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&(total_frames as u32).to_be_bytes());

    let mut lms: Vec<Lms> = vec![Lms::encoder_init(); channels];
    let mut start = 0;
    while start < total_frames {
        let frame_samples = (total_frames - start).min(MAX_FRAME_SAMPLES);
        let slices = frame_samples.div_ceil(SLICE_LEN);
        let frame_size = FRAME_HEADER_SIZE + channels * LMS_STATE_SIZE + slices * channels * 8;

        out.push(channels as u8);
        out.extend_from_slice(&sample_rate.to_be_bytes()[1..4]);
        out.extend_from_slice(&(frame_samples as u16).to_be_bytes());
        out.extend_from_slice(&(frame_size as u16).to_be_bytes());

        for state in &lms {
            for value in state.history {
                out.extend_from_slice(&(value as i16).to_be_bytes());
            }
            for value in state.weights {
                out.extend_from_slice(&(value as i16).to_be_bytes());
            }
        }

        for slice_index in 0..slices {
            let lo = start + slice_index * SLICE_LEN;
            let hi = (lo + SLICE_LEN).min(start + frame_samples);
            for (plane, state) in planes.iter().zip(&mut lms) {
                let slice = encode_slice(&plane[lo..hi], state);
                out.extend_from_slice(&slice.to_be_bytes());
            }
        }

        start += frame_samples;
    }

    out
}
