//! In-memory track library
//!
//! Holds the tracks added this session. Nothing is persisted.

use std::path::Path;

use crate::ingest::{ingest, is_audio_name, DroppedFile, IngestError};
use crate::source::decode;
use crate::track::{Track, TrackId, TrackLocator, TrackMetadata};

pub struct Library {
    tracks: Vec<Track>,
    next_id: u64,
}

impl Library {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    fn allocate_id(&mut self) -> TrackId {
        let id = TrackId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Ingest a batch of dropped files
    ///
    /// Each file succeeds or fails on its own; the accepted ones are added
    /// in drop order and the failures are returned with their file names.
    pub async fn ingest_dropped(&mut self, files: Vec<DroppedFile>) -> Vec<(String, IngestError)> {
        let mut failures = Vec::new();
        for file in files {
            let name = file.name.clone();
            let id = self.allocate_id();
            match ingest(file, id).await {
                Ok(track) => self.tracks.push(track),
                Err(e) => {
                    log::warn!("Drop of {} failed: {}", name, e);
                    failures.push((name, e));
                }
            }
        }
        failures
    }

    /// Add a file from disk
    pub async fn ingest_path(&mut self, path: &Path) -> Result<&Track, IngestError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        if !is_audio_name(&name) {
            return Err(IngestError::NotAudio {
                name,
                mime: "unknown type".to_string(),
            });
        }

        let locator = TrackLocator::Path(path.to_path_buf());
        let buffer = decode(&locator).await?;
        let id = self.allocate_id();
        let track = Track::from_drop(id, &name, locator, buffer.duration_seconds());
        log::info!("Added {} as {}", path.display(), id);

        self.tracks.push(track);
        Ok(&self.tracks[self.tracks.len() - 1])
    }

    pub fn update_metadata(&mut self, id: TrackId, metadata: TrackMetadata) -> bool {
        match self.tracks.iter_mut().find(|t| t.id == id) {
            Some(track) => {
                track.metadata = metadata;
                true
            }
            None => false,
        }
    }
}

impl Default for Library {
    fn default() -> Self {
        Self::new()
    }
}
