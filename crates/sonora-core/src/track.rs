//! Library track records
//!
//! A `Track` is referenced by playback, never owned by it: the state machine
//! keeps a clone of the selected record and decodes from its locator.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Stable identity of a library track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the audio for a track comes from
#[derive(Clone)]
pub enum TrackLocator {
    /// A file on disk
    Path(PathBuf),
    /// Bytes of a dropped file, kept in memory for the session
    Memory {
        name: String,
        bytes: Arc<[u8]>,
    },
}

impl TrackLocator {
    /// File extension used as a format hint for the decoder
    pub fn extension(&self) -> Option<String> {
        let name = match self {
            TrackLocator::Path(path) => path.file_name()?.to_str()?,
            TrackLocator::Memory { name, .. } => name.as_str(),
        };
        extension_of(name)
    }
}

impl fmt::Debug for TrackLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackLocator::Path(path) => write!(f, "Path({:?})", path),
            TrackLocator::Memory { name, bytes } => {
                write!(f, "Memory({:?}, {} bytes)", name, bytes.len())
            }
        }
    }
}

impl fmt::Display for TrackLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackLocator::Path(path) => write!(f, "{}", path.display()),
            TrackLocator::Memory { name, .. } => write!(f, "{} (dropped)", name),
        }
    }
}

/// Lowercased extension of a file name, if it has one
pub(crate) fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// File name with its last extension removed
pub(crate) fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Descriptive metadata; the only part of a track that may change after load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub bpm: Option<f32>,
    pub key: Option<String>,
    pub genre: String,
    pub year: Option<u16>,
}

#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub locator: TrackLocator,
    /// Whole seconds
    pub duration_secs: u32,
    pub metadata: TrackMetadata,
}

impl Track {
    pub fn new(id: TrackId, locator: TrackLocator, duration_secs: u32, metadata: TrackMetadata) -> Self {
        Self {
            id,
            locator,
            duration_secs,
            metadata,
        }
    }

    /// Build the library record for a freshly ingested file
    ///
    /// Title is the file name without extension; the remaining fields carry
    /// the placeholders shown for local files.
    pub fn from_drop(id: TrackId, file_name: &str, locator: TrackLocator, duration_seconds: f64) -> Self {
        let metadata = TrackMetadata {
            title: strip_extension(file_name).to_string(),
            artist: "Unknown".to_string(),
            album: "Local file".to_string(),
            genre: "Unknown".to_string(),
            ..Default::default()
        };
        Self::new(id, locator, duration_seconds.round().max(0.0) as u32, metadata)
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {} ({}:{:02})",
            self.metadata.artist,
            self.metadata.title,
            self.duration_secs / 60,
            self.duration_secs % 60
        )
    }
}
