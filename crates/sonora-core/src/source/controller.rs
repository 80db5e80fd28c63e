//! Source lifecycle: decode, start, stop
//!
//! The controller creates a fresh `SourceUnit` per track and wires it into
//! the graph. It never holds more than it is handed: the caller keeps the
//! `SourceHandle` and must stop it before starting the next track.

use basedrop::{Handle, Shared};

use super::{decode, DecodeError, DecodedBuffer, SourceHandle, SourceId, SourceUnit, SourceVoice};
use crate::engine::{gc_handle, EngineError};
use crate::track::TrackLocator;

/// The slice of the signal graph a source controller needs
pub trait SourceGraph {
    /// Sample rate the graph renders at
    fn output_sample_rate(&self) -> u32;

    /// Whether a source is connected (as seen from the control side)
    fn has_connected_source(&self) -> bool;

    /// Attach a started voice to the graph input
    fn connect_source(&mut self, voice: SourceVoice) -> Result<(), EngineError>;

    /// Detach the voice with `id`; unknown ids are ignored
    fn disconnect_source(&mut self, id: SourceId) -> Result<(), EngineError>;
}

pub struct SourceLifecycleController {
    next_id: u64,
    gc: Handle,
}

impl SourceLifecycleController {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            gc: gc_handle(),
        }
    }

    /// Fetch and decode a track without blocking the control thread
    pub async fn decode(&self, locator: &TrackLocator) -> Result<DecodedBuffer, DecodeError> {
        decode(locator).await
    }

    /// Build, start and connect a fresh unit for `buffer`
    ///
    /// Refuses with `GraphMisuse` while another source is still connected.
    pub fn start_track<G>(&mut self, buffer: DecodedBuffer, pitch: f32, graph: &mut G) -> Result<SourceHandle, EngineError>
    where
        G: SourceGraph + ?Sized,
    {
        if graph.has_connected_source() {
            return Err(EngineError::misuse("start_track while a source is still connected"));
        }

        let id = SourceId(self.next_id);
        self.next_id += 1;

        let unit = SourceUnit::new(id, Shared::new(&self.gc, buffer), graph.output_sample_rate());
        unit.set_playback_rate(pitch);
        let (voice, handle) = unit.start();
        graph.connect_source(voice)?;

        log::info!("Source {:?} started (rate {:.2})", id, handle.playback_rate());
        Ok(handle)
    }

    /// Stop and disconnect; a no-op for a handle that is already stopped
    ///
    /// If the disconnect cannot be queued the handle stays live, so the call
    /// can be repeated.
    pub fn stop_current<G>(&mut self, handle: &mut SourceHandle, graph: &mut G) -> Result<(), EngineError>
    where
        G: SourceGraph + ?Sized,
    {
        if !handle.is_live() {
            return Ok(());
        }
        graph.disconnect_source(handle.id())?;
        handle.stop();
        log::info!("Source {:?} stopped", handle.id());
        Ok(())
    }
}

impl Default for SourceLifecycleController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{StereoBuffer, StereoSample};

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum GraphEvent {
        Connect(SourceId),
        Disconnect(SourceId),
    }

    /// Records every structural change and checks the single-source rule
    #[derive(Default)]
    pub(crate) struct FakeGraph {
        pub connected: Option<SourceId>,
        pub events: Vec<GraphEvent>,
        pub max_connected: usize,
        pub voices: Vec<SourceVoice>,
        /// Refuse disconnects, as a full command queue would
        pub refuse_disconnect: bool,
    }

    impl SourceGraph for FakeGraph {
        fn output_sample_rate(&self) -> u32 {
            48000
        }

        fn has_connected_source(&self) -> bool {
            self.connected.is_some()
        }

        fn connect_source(&mut self, voice: SourceVoice) -> Result<(), EngineError> {
            if self.connected.is_some() {
                return Err(EngineError::misuse("second source"));
            }
            self.connected = Some(voice.id());
            self.events.push(GraphEvent::Connect(voice.id()));
            self.max_connected = self.max_connected.max(1);
            self.voices.push(voice);
            Ok(())
        }

        fn disconnect_source(&mut self, id: SourceId) -> Result<(), EngineError> {
            if self.refuse_disconnect {
                return Err(EngineError::misuse("command queue full"));
            }
            if self.connected == Some(id) {
                self.connected = None;
                self.events.push(GraphEvent::Disconnect(id));
            }
            Ok(())
        }
    }

    pub(crate) fn tone(frames: usize) -> DecodedBuffer {
        DecodedBuffer::new(StereoBuffer::from_vec(vec![StereoSample::mono(0.5); frames]), 48000)
    }

    #[test]
    fn test_switch_stops_before_start() {
        let mut controller = SourceLifecycleController::new();
        let mut graph = FakeGraph::default();

        let mut first = controller.start_track(tone(100), 1.0, &mut graph).unwrap();
        controller.stop_current(&mut first, &mut graph).unwrap();
        let second = controller.start_track(tone(100), 1.0, &mut graph).unwrap();

        assert_eq!(
            graph.events,
            vec![
                GraphEvent::Connect(first.id()),
                GraphEvent::Disconnect(first.id()),
                GraphEvent::Connect(second.id()),
            ]
        );
        assert_eq!(graph.max_connected, 1);
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn test_start_while_connected_is_misuse() {
        let mut controller = SourceLifecycleController::new();
        let mut graph = FakeGraph::default();
        let _playing = controller.start_track(tone(10), 1.0, &mut graph).unwrap();

        let err = controller.start_track(tone(10), 1.0, &mut graph).unwrap_err();
        assert!(matches!(err, EngineError::GraphMisuse(_)));
        assert_eq!(graph.events.len(), 1);
    }

    #[test]
    fn test_stop_twice_is_noop() {
        let mut controller = SourceLifecycleController::new();
        let mut graph = FakeGraph::default();
        let mut handle = controller.start_track(tone(10), 1.0, &mut graph).unwrap();

        controller.stop_current(&mut handle, &mut graph).unwrap();
        controller.stop_current(&mut handle, &mut graph).unwrap();
        assert_eq!(graph.events.len(), 2);
        assert!(!handle.is_live());
    }

    #[test]
    fn test_failed_disconnect_keeps_handle_live() {
        let mut controller = SourceLifecycleController::new();
        let mut graph = FakeGraph::default();
        let mut handle = controller.start_track(tone(10), 1.0, &mut graph).unwrap();

        graph.refuse_disconnect = true;
        assert!(controller.stop_current(&mut handle, &mut graph).is_err());
        assert!(handle.is_live());
        assert_eq!(graph.connected, Some(handle.id()));

        graph.refuse_disconnect = false;
        controller.stop_current(&mut handle, &mut graph).unwrap();
        assert!(!handle.is_live());
        assert_eq!(graph.connected, None);
    }

    #[test]
    fn test_pitch_applied_at_start() {
        let mut controller = SourceLifecycleController::new();
        let mut graph = FakeGraph::default();
        let handle = controller.start_track(tone(10), 1.5, &mut graph).unwrap();
        assert_eq!(handle.playback_rate(), 1.5);

        let mut graph = FakeGraph::default();
        let handle = controller.start_track(tone(10), 9.0, &mut graph).unwrap();
        assert_eq!(handle.playback_rate(), 2.0);
    }
}
