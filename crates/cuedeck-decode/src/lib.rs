//! Streaming decode layer for the cuedeck engine.
//!
//! Three pieces live here:
//!
//! - the codec seam ([`codec::PushCodec`]) plus the two implementations the
//!   engine ships with: the bundled QOA codec ([`qoa`]) for push-style
//!   streaming, and a symphonia-backed whole-file decoder ([`probe`]) for
//!   sounds small enough to load fully;
//! - the sample store ([`store::SampleData`]): decoded PCM plus the
//!   undecoded byte residue of each loaded sound;
//! - the decoder driver ([`driver::decode_more`]): pulls bytes from the
//!   input stream and feeds the codec until a requested minimum of PCM is
//!   available, bounding per-call work.

pub mod codec;
pub mod config;
pub mod driver;
pub mod probe;
pub mod qoa;
pub mod store;

pub use codec::{CodecError, CodecInfo, DecodedAudio, DecodedFrame, FramePcm, PushCodec};
pub use driver::decode_more;
pub use store::{LoadError, SampleData};
