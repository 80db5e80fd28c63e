//! Track decoding with symphonia
//!
//! Decoding is CPU-bound and can take a while for long tracks, so the async
//! entry point runs it on tokio's blocking pool and the control thread only
//! awaits the result.

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use super::DecodedBuffer;
use crate::track::TrackLocator;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("cannot open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt audio data: {0}")]
    Corrupt(String),

    #[error("file contains no audio")]
    Empty,

    /// The blocking decode task panicked or was cancelled
    #[error("decode task failed: {0}")]
    Task(String),
}

/// Decode a track off the calling thread
pub async fn decode(locator: &TrackLocator) -> Result<DecodedBuffer, DecodeError> {
    let locator = locator.clone();
    tokio::task::spawn_blocking(move || decode_blocking(&locator))
        .await
        .map_err(|e| DecodeError::Task(e.to_string()))?
}

pub fn decode_blocking(locator: &TrackLocator) -> Result<DecodedBuffer, DecodeError> {
    match locator {
        TrackLocator::Path(path) => decode_file(path),
        TrackLocator::Memory { bytes, .. } => {
            decode_source(Box::new(Cursor::new(bytes.clone())), locator.extension().as_deref())
        }
    }
}

pub fn decode_file(path: &Path) -> Result<DecodedBuffer, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    decode_source(Box::new(file), extension.as_deref())
}

fn decode_source(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<DecodedBuffer, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| match e {
            SymphoniaError::Unsupported(what) => DecodeError::UnsupportedFormat(what.to_string()),
            other => DecodeError::Corrupt(other.to_string()),
        })?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat("no audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut bad_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                log::warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // damaged packets are skipped, like most players do
                log::warn!("Skipping undecodable packet: {}", e);
                bad_packets += 1;
                continue;
            }
            Err(e) => return Err(DecodeError::Corrupt(e.to_string())),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            sample_rate.get_or_insert(spec.rate);
            channels.get_or_insert(spec.channels.count());
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }

        if let Some(buf) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buf.samples());
        }
    }

    if samples.is_empty() {
        return Err(if bad_packets > 0 {
            DecodeError::Corrupt(format!("{} packets failed to decode", bad_packets))
        } else {
            DecodeError::Empty
        });
    }

    let sample_rate = sample_rate.ok_or_else(|| DecodeError::UnsupportedFormat("unknown sample rate".to_string()))?;
    let buffer = DecodedBuffer::from_interleaved(&samples, channels.unwrap_or(2), sample_rate);
    log::debug!(
        "Decoded {} frames at {}Hz ({:.1}s)",
        buffer.frames(),
        sample_rate,
        buffer.duration_seconds()
    );
    Ok(buffer)
}
