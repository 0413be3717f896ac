//! The sample store: one [`SampleData`] per loaded sound.
//!
//! A fully-loaded sound is decoded in its entirety at creation and never
//! touches its stream again. A streamed sound keeps its stream and push
//! codec alive; the driver appends to `decoded` and advances the
//! read/decoded frontiers as playback needs more audio.

use std::io::Read;

use tracing::warn;

use cuedeck_core::{SampleFormat, SoundId};

use crate::codec::{CodecError, CodecInfo, PushCodec};
use crate::config::HEADER_BLOCK;
use crate::{probe, qoa};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read sound stream: {0}")]
    Read(#[from] std::io::Error),
    /// Fully-loaded sounds are mono; stereo data must go through
    /// [`SampleData::open_streamed`].
    #[error("stereo sounds must be streamed")]
    StereoNotStreamed,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Decoded PCM and undecoded byte residue for one loaded sound.
///
/// Shared-read by any number of playing sounds; the decoder driver is the
/// sole mutator and only ever appends to `decoded` and advances frontiers.
pub struct SampleData {
    pub(crate) id: SoundId,
    pub(crate) name: String,
    /// Input stream; `None` once fully read (and always for fully-loaded
    /// sounds, which consume it at creation).
    pub(crate) stream: Option<Box<dyn Read + Send>>,
    /// Bytes of `residue` the codec has consumed.
    pub(crate) used: usize,
    /// Bytes read from the stream but not yet consumed by the codec.
    pub(crate) residue: Vec<u8>,
    pub(crate) total_read: usize,
    pub(crate) fully_read: bool,
    /// Push decoder state; streamed sounds only.
    pub(crate) codec: Option<Box<dyn PushCodec>>,
    pub(crate) info: CodecInfo,
    /// Interleaved decoded samples.
    pub(crate) decoded: Vec<f32>,
    pub(crate) fully_decoded: bool,
    pub(crate) format: SampleFormat,
    pub(crate) streamed: bool,
}

impl std::fmt::Debug for SampleData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleData")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("stream", &self.stream.as_ref().map(|_| "..."))
            .field("used", &self.used)
            .field("residue", &self.residue)
            .field("total_read", &self.total_read)
            .field("fully_read", &self.fully_read)
            .field("codec", &self.codec.as_ref().map(|_| "..."))
            .field("info", &self.info)
            .field("decoded", &self.decoded)
            .field("fully_decoded", &self.fully_decoded)
            .field("format", &self.format)
            .field("streamed", &self.streamed)
            .finish()
    }
}

impl SampleData {
    /// Reads the whole stream and decodes it in one call. Mono only; the
    /// decoded length is capped at `max_frames` sample frames (the cap is
    /// reported, not fatal).
    pub fn load_fully(
        name: &str,
        stream: &mut dyn Read,
        max_frames: usize,
    ) -> Result<SampleData, LoadError> {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        let total_read = bytes.len();

        let decoded = if bytes.starts_with(&qoa::MAGIC) {
            qoa::decode_memory(&bytes, max_frames)?
        } else {
            probe::decode_all_memory(bytes, max_frames)?
        };
        if decoded.truncated {
            warn!(
                sound = name,
                max_frames, "sound too long for fully-loaded use; decoded data truncated"
            );
        }
        if decoded.info.channels != 1 {
            return Err(LoadError::StereoNotStreamed);
        }

        Ok(SampleData {
            id: SoundId::new(name),
            name: name.to_owned(),
            stream: None,
            used: 0,
            residue: Vec::new(),
            total_read,
            fully_read: true,
            codec: None,
            info: decoded.info,
            decoded: decoded.samples,
            fully_decoded: true,
            format: SampleFormat::FloatMono,
            streamed: false,
        })
    }

    /// Opens a push decoder over the stream, reading header blocks until
    /// the codec has enough to report its stream parameters. Decoding
    /// happens incrementally afterwards, driven by
    /// [`crate::driver::decode_more`].
    pub fn open_streamed(
        name: &str,
        mut stream: Box<dyn Read + Send>,
    ) -> Result<SampleData, LoadError> {
        let mut residue = Vec::new();
        let mut total_read = 0;
        let mut fully_read = false;

        let (codec, used) = loop {
            let before = residue.len();
            residue.resize(before + HEADER_BLOCK, 0);
            let filled = read_into(stream.as_mut(), &mut residue[before..])?;
            residue.truncate(before + filled);
            total_read += filled;
            if filled < HEADER_BLOCK {
                fully_read = true;
            }

            match qoa::open_push(&residue) {
                Ok(pair) => break pair,
                Err(err) if err.is_need_more_data() && !fully_read => continue,
                Err(err) => return Err(err.into()),
            }
        };

        let info = codec.info();
        let format = SampleFormat::from_channels(info.channels)
            .ok_or(CodecError::UnsupportedChannels(info.channels))?;

        Ok(SampleData {
            id: SoundId::new(name),
            name: name.to_owned(),
            stream: if fully_read { None } else { Some(stream) },
            used,
            residue,
            total_read,
            fully_read,
            codec: Some(Box::new(codec)),
            info,
            decoded: Vec::new(),
            fully_decoded: false,
            format,
            streamed: true,
        })
    }

    pub fn id(&self) -> SoundId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn info(&self) -> CodecInfo {
        self.info
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn streamed(&self) -> bool {
        self.streamed
    }

    /// Interleaved decoded samples so far.
    pub fn decoded(&self) -> &[f32] {
        &self.decoded
    }

    /// The decoded frontier, in interleaved samples.
    pub fn decoded_samples(&self) -> usize {
        self.decoded.len()
    }

    pub fn fully_decoded(&self) -> bool {
        self.fully_decoded
    }

    pub fn fully_read(&self) -> bool {
        self.fully_read
    }

    pub fn total_read(&self) -> usize {
        self.total_read
    }

    /// Bytes of the residue the codec has consumed.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn residue_len(&self) -> usize {
        self.residue.len()
    }
}

/// Reads until `buf` is full or the stream ends; returns bytes read.
pub(crate) fn read_into(stream: &mut dyn Read, buf: &mut [u8]) -> Result<usize, std::io::Error> {
    let mut filled = 0;
    while filled < buf.len() {
        match stream.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::SampleData;
    use crate::codec::CodecError;
    use crate::qoa;
    use crate::store::LoadError;

    fn sine_fixture(frames: usize, channels: u16) -> Vec<u8> {
        let mut pcm = Vec::with_capacity(frames * usize::from(channels));
        for i in 0..frames {
            let t = i as f32 / 44_100.0;
            let sample = (f32::sin(t * 440.0 * std::f32::consts::TAU) * 12000.0) as i16;
            for _ in 0..channels {
                pcm.push(sample);
            }
        }
        qoa::encode(&pcm, channels, 44_100)
    }

    #[test]
    fn load_fully_decodes_everything_up_front() {
        let bytes = sine_fixture(5000, 1);
        let mut stream = Cursor::new(bytes);
        let sample = SampleData::load_fully("beep", &mut stream, usize::MAX).expect("load failed");

        assert!(sample.fully_read());
        assert!(sample.fully_decoded());
        assert!(!sample.streamed());
        assert_eq!(sample.decoded_samples(), 5000);
        assert_eq!(sample.info().channels, 1);
    }

    #[test]
    fn load_fully_truncates_at_cap_but_stays_usable() {
        let bytes = sine_fixture(9000, 1);
        let mut stream = Cursor::new(bytes);
        let sample = SampleData::load_fully("long", &mut stream, 6000).expect("load failed");

        assert_eq!(sample.decoded_samples(), 6000);
        assert!(sample.fully_decoded());
    }

    #[test]
    fn load_fully_rejects_stereo() {
        let bytes = sine_fixture(2000, 2);
        let mut stream = Cursor::new(bytes);
        let err = SampleData::load_fully("wide", &mut stream, usize::MAX).unwrap_err();
        assert!(matches!(err, LoadError::StereoNotStreamed));
    }

    #[test]
    fn load_fully_rejects_garbage() {
        let mut stream = Cursor::new(vec![0x42u8; 512]);
        let err = SampleData::load_fully("noise", &mut stream, usize::MAX).unwrap_err();
        assert!(matches!(
            err,
            LoadError::Codec(CodecError::UnknownContainer) | LoadError::Codec(CodecError::Decode(_))
        ));
    }

    #[test]
    fn open_streamed_reports_info_without_decoding() {
        let bytes = sine_fixture(44_100, 2);
        let sample =
            SampleData::open_streamed("music", Box::new(Cursor::new(bytes))).expect("open failed");

        assert!(sample.streamed());
        assert!(!sample.fully_decoded());
        assert_eq!(sample.decoded_samples(), 0);
        assert_eq!(sample.info().channels, 2);
        assert_eq!(sample.info().sample_rate, 44_100);
        // Only header blocks have been pulled so far.
        assert!(sample.total_read() <= 2 * crate::config::HEADER_BLOCK);
    }

    #[test]
    fn open_streamed_rejects_truncated_header() {
        let bytes = sine_fixture(44_100, 1);
        let sample = SampleData::open_streamed("stub", Box::new(Cursor::new(bytes[..6].to_vec())));
        assert!(matches!(
            sample,
            Err(LoadError::Codec(CodecError::NeedMoreData))
        ));
    }
}
