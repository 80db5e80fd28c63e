//! Dropped-file ingestion
//!
//! Files arrive as raw bytes with an optional MIME type. Anything that is not
//! audio is refused before the decoder ever sees it; accepted files are
//! decoded once to learn their duration and become library tracks.

use std::sync::Arc;

use thiserror::Error;

use crate::source::{decode, DecodeError};
use crate::track::{extension_of, Track, TrackId, TrackLocator};

/// Extensions accepted when no MIME type is known
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "flac", "mp3", "ogg", "m4a", "aac", "aiff", "aif", "opus"];

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("{name} is not an audio file ({mime})")]
    NotAudio { name: String, mime: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// A file handed over by the UI
#[derive(Clone)]
pub struct DroppedFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Arc<[u8]>,
}

impl DroppedFile {
    pub fn new(name: impl Into<String>, mime_type: Option<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime_type,
            bytes: bytes.into(),
        }
    }

    /// `audio/*` MIME, or a known audio extension when the MIME is missing
    pub fn is_audio(&self) -> bool {
        match self.mime_type.as_deref() {
            Some(mime) if !mime.is_empty() => mime.to_ascii_lowercase().starts_with("audio/"),
            _ => is_audio_name(&self.name),
        }
    }
}

impl std::fmt::Debug for DroppedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DroppedFile")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}

pub fn is_audio_name(name: &str) -> bool {
    extension_of(name).is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.as_str()))
}

/// Turn one dropped file into a track with id `id`
pub async fn ingest(file: DroppedFile, id: TrackId) -> Result<Track, IngestError> {
    if !file.is_audio() {
        let mime = file.mime_type.clone().unwrap_or_else(|| "unknown type".to_string());
        log::warn!("Rejected drop of {}: {}", file.name, mime);
        return Err(IngestError::NotAudio { name: file.name, mime });
    }

    let locator = TrackLocator::Memory {
        name: file.name.clone(),
        bytes: file.bytes,
    };
    let buffer = decode(&locator).await?;
    let track = Track::from_drop(id, &file.name, locator, buffer.duration_seconds());
    log::info!("Ingested {} as {} ({}s)", file.name, id, track.duration_secs);
    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::fixtures::wav_bytes;

    #[test]
    fn test_audio_detection() {
        let with_mime = |mime: &str, name: &str| DroppedFile::new(name, Some(mime.to_string()), Vec::new());
        let without_mime = |name: &str| DroppedFile::new(name, None, Vec::new());

        assert!(with_mime("audio/mpeg", "song").is_audio());
        assert!(with_mime("Audio/FLAC", "song.flac").is_audio());
        assert!(!with_mime("image/png", "cover.mp3").is_audio());
        assert!(without_mime("Track.AIF").is_audio());
        assert!(without_mime("take.opus").is_audio());
        assert!(!without_mime("notes.txt").is_audio());
        assert!(!without_mime("wav").is_audio());
    }

    #[tokio::test]
    async fn test_non_audio_rejected_before_decode() {
        // valid audio bytes, but declared as an image: must not be decoded
        let file = DroppedFile::new("cover.png", Some("image/png".to_string()), wav_bytes(48000, 480));
        let err = ingest(file, TrackId(1)).await.unwrap_err();
        match err {
            IngestError::NotAudio { name, mime } => {
                assert_eq!(name, "cover.png");
                assert_eq!(mime, "image/png");
            }
            other => panic!("expected NotAudio, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ingest_wav_builds_track() {
        let file = DroppedFile::new("Late Night.wav", Some("audio/wav".to_string()), wav_bytes(48000, 48000 * 3));
        let track = ingest(file, TrackId(4)).await.unwrap();

        assert_eq!(track.id, TrackId(4));
        assert_eq!(track.title(), "Late Night");
        assert_eq!(track.metadata.album, "Local file");
        assert_eq!(track.duration_secs, 3);
        assert!(matches!(track.locator, TrackLocator::Memory { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_audio_is_decode_error() {
        let file = DroppedFile::new("broken.flac", None, b"fLaC but nothing after".to_vec());
        let err = ingest(file, TrackId(1)).await.unwrap_err();
        assert!(matches!(err, IngestError::Decode(_)), "{err:?}");
    }
}
