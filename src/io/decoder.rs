//! Whole-file decoding into interleaved `f32` samples.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to open audio file: {0}")]
    Io(#[from] std::io::Error),
    #[error("decoder error: {0}")]
    Symphonia(#[from] SymphoniaError),
    #[error("no decodable audio track")]
    NoTrack,
    #[error("audio track does not declare a sample rate")]
    UnknownSampleRate,
    #[error("unsupported channel count: {0}")]
    UnsupportedChannels(usize),
}

/// A fully decoded file.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples.
    pub samples: Vec<f32>,
    pub channels: usize,
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels
        }
    }
}

/// Decode every packet of the first audio track in `path`.
///
/// Only mono and stereo files are accepted.
pub fn decode_file(path: impl AsRef<Path>) -> Result<DecodedAudio, DecodeError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or(DecodeError::UnknownSampleRate)?;
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0);

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut buffer: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            // Chained streams aren't supported, treat a reset as the end
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!(path = ?path, err = e, "skipping malformed packet");
                continue;
            }
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count();
        }

        let frames = decoded.capacity();
        let too_small = buffer
            .as_ref()
            .map_or(true, |b| b.capacity() < frames * spec.channels.count());
        if too_small {
            buffer = Some(SampleBuffer::new(frames as u64, spec));
        }
        if let Some(sample_buffer) = buffer.as_mut() {
            sample_buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buffer.samples());
        }
    }

    if !(1..=2).contains(&channels) {
        return Err(DecodeError::UnsupportedChannels(channels));
    }

    debug!(
        path = ?path,
        channels,
        sample_rate,
        frames = samples.len() / channels,
        "decoded audio file"
    );

    Ok(DecodedAudio {
        samples,
        channels,
        sample_rate,
    })
}
