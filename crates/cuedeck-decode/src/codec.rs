//! The codec seam: a push-style streaming decoder interface.
//!
//! The driver owns the byte residue and feeds spans of it to the codec; the
//! codec reports how many bytes each frame consumed. "I need more input"
//! ([`CodecError::NeedMoreData`]) is a distinct signal, not a failure, so
//! the driver can tell a short read apart from a damaged stream.

use thiserror::Error;

/// Stream parameters reported by a codec once its header is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecInfo {
    pub channels: u16,
    pub sample_rate: u32,
}

/// One decoded frame of planar PCM.
///
/// Codecs hand back their native planar layout; interleaving for the
/// backend is always the driver's job.
#[derive(Debug, Clone, PartialEq)]
pub enum FramePcm {
    Mono(Vec<f32>),
    Stereo { left: Vec<f32>, right: Vec<f32> },
}

impl FramePcm {
    /// Number of sample frames (per-channel samples) in this frame.
    pub fn frames(&self) -> usize {
        match self {
            FramePcm::Mono(samples) => samples.len(),
            FramePcm::Stereo { left, .. } => left.len(),
        }
    }

    /// Appends this frame to `out` in interleaved order.
    pub fn interleave_into(&self, out: &mut Vec<f32>) {
        match self {
            FramePcm::Mono(samples) => out.extend_from_slice(samples),
            FramePcm::Stereo { left, right } => {
                out.reserve(left.len() * 2);
                for (l, r) in left.iter().zip(right) {
                    out.push(*l);
                    out.push(*r);
                }
            }
        }
    }
}

/// Result of one successful [`PushCodec::decode_frame`] call.
#[derive(Debug)]
pub struct DecodedFrame {
    /// Bytes of the input span the frame occupied; the driver advances its
    /// residue cursor by this much.
    pub bytes_consumed: usize,
    pub pcm: FramePcm,
}

/// A fully decoded in-memory sound, as produced by the whole-file paths.
#[derive(Debug)]
pub struct DecodedAudio {
    pub info: CodecInfo,
    /// Interleaved samples.
    pub samples: Vec<f32>,
    /// True when decoding stopped at the caller's frame cap before the
    /// stream ended.
    pub truncated: bool,
}

#[derive(Debug, Error)]
pub enum CodecError {
    /// The input span ends mid-header or mid-frame. Append more bytes and
    /// retry; only a real error once the stream is exhausted.
    #[error("more input bytes required")]
    NeedMoreData,
    /// The stream does not start with a container this codec recognizes.
    #[error("unrecognized container magic")]
    UnknownContainer,
    /// The container declares zero audio.
    #[error("stream declares no samples")]
    EmptyStream,
    /// More channels than the engine's formats can express.
    #[error("unsupported channel count {0}")]
    UnsupportedChannels(u16),
    /// A damaged frame. `skip` is how many bytes the driver should step
    /// over before retrying.
    #[error("corrupt frame: {reason}")]
    CorruptFrame { reason: &'static str, skip: usize },
    /// Any other decoder-internal failure.
    #[error("{0}")]
    Decode(String),
}

impl CodecError {
    pub fn is_need_more_data(&self) -> bool {
        matches!(self, CodecError::NeedMoreData)
    }
}

/// Push-style streaming decoder.
///
/// Implementations are created by a codec-specific `open_push` that parses
/// the container header out of an initial byte span and reports how many
/// bytes it consumed.
pub trait PushCodec: Send {
    fn info(&self) -> CodecInfo;

    /// Decodes exactly one frame from the start of `input`.
    ///
    /// On success the caller must advance its input cursor by
    /// [`DecodedFrame::bytes_consumed`] before the next call.
    fn decode_frame(&mut self, input: &[u8]) -> Result<DecodedFrame, CodecError>;
}
