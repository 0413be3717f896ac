//! The decoder driver: bounded incremental decode for streamed sounds.

use std::io::ErrorKind;

use tracing::{trace, warn};

use crate::codec::CodecError;
use crate::config::READ_CHUNK;
use crate::store::{SampleData, read_into};

/// Ensures at least `min_samples` additional interleaved samples are
/// decoded past the current frontier, or the sound becomes fully decoded,
/// whichever comes first.
///
/// Per-call work is bounded by the request plus one residue refill per
/// codec stall, so a tick never decodes more than playback is about to
/// consume. No-op for fully-loaded sounds.
pub fn decode_more(sample: &mut SampleData, min_samples: usize) {
    if sample.fully_decoded || !sample.streamed {
        return;
    }
    let target = sample.decoded.len().saturating_add(min_samples);

    while sample.decoded.len() < target && !sample.fully_decoded {
        let Some(codec) = sample.codec.as_mut() else {
            sample.fully_decoded = true;
            break;
        };
        match codec.decode_frame(&sample.residue[sample.used..]) {
            Ok(frame) => {
                sample.used += frame.bytes_consumed;
                frame.pcm.interleave_into(&mut sample.decoded);
                if frame.bytes_consumed == 0 && frame.pcm.frames() == 0 && !refill(sample) {
                    // A codec that neither consumes nor produces cannot make
                    // progress on this span.
                    break;
                }
            }
            Err(CodecError::NeedMoreData) => {
                if sample.fully_read {
                    if sample.used < sample.residue.len() {
                        trace!(
                            sound = %sample.name,
                            trailing = sample.residue.len() - sample.used,
                            "dropping partial trailing frame"
                        );
                        sample.used = sample.residue.len();
                    }
                    sample.fully_decoded = true;
                } else if !refill(sample) {
                    break;
                }
            }
            Err(CodecError::CorruptFrame { reason, skip }) => {
                let remaining = sample.residue.len() - sample.used;
                if remaining == 0 {
                    if !refill(sample) {
                        break;
                    }
                    continue;
                }
                warn!(sound = %sample.name, reason, skip, "skipping corrupt frame");
                sample.used += skip.clamp(1, remaining);
            }
            Err(err) => {
                warn!(sound = %sample.name, error = %err, "codec failure; abandoning stream decode");
                sample.fully_decoded = true;
            }
        }
    }
}

/// Pulls up to [`READ_CHUNK`] more bytes into the residue. A short read
/// marks the stream fully read. Returns whether any bytes arrived.
fn refill(sample: &mut SampleData) -> bool {
    if sample.fully_read {
        return false;
    }
    let Some(stream) = sample.stream.as_mut() else {
        sample.fully_read = true;
        return false;
    };

    let before = sample.residue.len();
    sample.residue.resize(before + READ_CHUNK, 0);
    let filled = match read_into(stream.as_mut(), &mut sample.residue[before..]) {
        Ok(n) => n,
        Err(err) if err.kind() == ErrorKind::Interrupted => 0,
        Err(err) => {
            warn!(sound = %sample.name, error = %err, "stream read failed; treating as end of stream");
            0
        }
    };
    sample.residue.truncate(before + filled);
    sample.total_read += filled;
    if filled < READ_CHUNK {
        sample.fully_read = true;
        sample.stream = None;
    }
    filled > 0
}
