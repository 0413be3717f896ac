//! Symphonia-backed whole-file decoding for the fully-loaded path.
//!
//! Short one-shot sounds arrive in whatever container the asset pipeline
//! produced (ogg, flac, wav, mp3...). They are read into memory in full and
//! decoded in one call here; only the bundled QOA codec supports push-style
//! streaming.

use std::io::{self, Cursor};

use symphonia::core::audio::{AudioBufferRef, SampleBuffer, SignalSpec};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use tracing::warn;

use crate::codec::{CodecError, CodecInfo, DecodedAudio};

/// Decodes an entire in-memory stream into interleaved f32, stopping once
/// `max_frames` sample frames have been produced.
pub fn decode_all_memory(bytes: Vec<u8>, max_frames: usize) -> Result<DecodedAudio, CodecError> {
    let mss = MediaSourceStream::new(
        Box::new(Cursor::new(bytes)),
        MediaSourceStreamOptions::default(),
    );

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|err| match err {
            SymphoniaError::Unsupported(_) => CodecError::UnknownContainer,
            other => CodecError::Decode(format!("container probe failed: {other}")),
        })?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| CodecError::Decode("missing default audio track".into()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|err| CodecError::Decode(format!("decoder init failed: {err}")))?;

    let mut sample_rate = params.sample_rate.unwrap_or(0);
    let mut channels = params
        .channels
        .as_ref()
        .map(|set| set.count() as u16)
        .unwrap_or(0);

    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut samples = Vec::new();
    let mut truncated = false;

    loop {
        // The spec may only become known after the first decoded buffer;
        // apply the cap once channels are established.
        if channels > 0 && samples.len() / usize::from(channels.max(1)) >= max_frames {
            truncated = true;
            break;
        }
        match format.next_packet() {
            Ok(packet) => {
                if packet.track_id() != track_id {
                    continue;
                }
                match decoder.decode(&packet) {
                    Ok(audio_buf) => {
                        if sample_rate == 0 {
                            sample_rate = audio_buf.spec().rate;
                        }
                        if channels == 0 {
                            channels = audio_buf.spec().channels.count() as u16;
                        }
                        append_interleaved(&mut sample_buf, &mut samples, audio_buf);
                    }
                    Err(SymphoniaError::DecodeError(err)) => {
                        warn!(error = %err, "skipping corrupt packet");
                        continue;
                    }
                    Err(SymphoniaError::ResetRequired) => {
                        decoder.reset();
                        continue;
                    }
                    Err(err) => {
                        return Err(CodecError::Decode(format!("decode failed: {err}")));
                    }
                }
            }
            Err(SymphoniaError::IoError(err)) if err.kind() == io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(err) => {
                return Err(CodecError::Decode(format!("read packet failed: {err}")));
            }
        }
    }

    if sample_rate == 0 || channels == 0 {
        return Err(CodecError::Decode(format!(
            "no stream spec after decode: sample_rate={sample_rate} channels={channels}"
        )));
    }
    if channels > 2 {
        return Err(CodecError::UnsupportedChannels(channels));
    }
    if truncated {
        samples.truncate(max_frames * usize::from(channels));
    }

    Ok(DecodedAudio {
        info: CodecInfo {
            channels,
            sample_rate,
        },
        samples,
        truncated,
    })
}

fn append_interleaved(
    sample_buf: &mut Option<SampleBuffer<f32>>,
    samples: &mut Vec<f32>,
    audio_buf: AudioBufferRef<'_>,
) {
    let spec = SignalSpec::new(audio_buf.spec().rate, audio_buf.spec().channels);
    let capacity = audio_buf.capacity() as u64;
    let needs_realloc = sample_buf
        .as_ref()
        .is_none_or(|buf| buf.capacity() < audio_buf.capacity());
    if needs_realloc {
        *sample_buf = Some(SampleBuffer::<f32>::new(capacity, spec));
    }

    let Some(buf) = sample_buf.as_mut() else {
        return;
    };
    buf.copy_interleaved_ref(audio_buf);
    samples.extend_from_slice(buf.samples());
}
