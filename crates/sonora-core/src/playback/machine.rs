//! Playback state machine
//!
//! Coordinates user intent with the engine and the source controller. All
//! control logic runs on one thread; the only suspension point is the decode
//! inside [`PlaybackStateMachine::load`].
//!
//! Track loads are split in two so a UI can run the decode on its own task:
//! [`begin_load`](PlaybackStateMachine::begin_load) stops the current source
//! and hands out a ticket, [`complete_load`](PlaybackStateMachine::complete_load)
//! accepts the decoded buffer only if the ticket is still the pending one.

use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};

use super::{PlaybackEvent, PlaybackSession, PlaybackState};
use crate::effect::{EffectParameterStore, EffectPath, EffectsState};
use crate::engine::{EngineError, SignalGraphEngine};
use crate::source::{DecodeError, DecodedBuffer, SourceHandle, SourceLifecycleController};
use crate::track::{Track, TrackId, TrackLocator};

/// Identity of one decode request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub track_id: TrackId,
    /// Increases with every `begin_load`
    pub generation: u64,
}

/// Everything needed to run the decode for a ticket
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub locator: TrackLocator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The source is connected and playing
    Started,
    /// A newer selection superseded this result
    Discarded,
}

pub struct PlaybackStateMachine {
    state: PlaybackState,
    engine: SignalGraphEngine,
    store: Arc<EffectParameterStore>,
    sources: SourceLifecycleController,
    session: PlaybackSession,
    /// Tracks "play" falls back to when nothing is selected
    active_view: Vec<Track>,
    generation: u64,
    events: Sender<PlaybackEvent>,
}

impl PlaybackStateMachine {
    /// Create the machine in `Idle` along with the receiving end of its events
    pub fn new(engine: SignalGraphEngine, store: Arc<EffectParameterStore>) -> (Self, Receiver<PlaybackEvent>) {
        let (events, receiver) = channel::unbounded();
        let machine = Self {
            state: PlaybackState::Idle,
            engine,
            store,
            sources: SourceLifecycleController::new(),
            session: PlaybackSession::default(),
            active_view: Vec::new(),
            generation: 0,
            events,
        };
        (machine, receiver)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_track(&self) -> Option<&Track> {
        self.session.current_track.as_ref()
    }

    pub fn source(&self) -> Option<&SourceHandle> {
        self.session.source.as_ref()
    }

    pub fn effects(&self) -> Arc<EffectsState> {
        self.store.get()
    }

    pub fn engine(&self) -> &SignalGraphEngine {
        &self.engine
    }

    pub fn active_view(&self) -> &[Track] {
        &self.active_view
    }

    /// Replace the list "play" picks its first track from
    pub fn set_active_view(&mut self, tracks: Vec<Track>) {
        self.active_view = tracks;
    }

    /// Record a user gesture (click, key press, typed command)
    pub fn notify_user_gesture(&self) {
        self.engine.gate().record_interaction();
    }

    /// Open the audio device and build the graph
    ///
    /// Only acts in `Idle`. Without a prior gesture the machine stays `Idle`
    /// and returns `EngineUnavailable`; a backend failure also lands back in
    /// `Idle` so the request can be repeated.
    pub fn request_engine_activation(&mut self) -> Result<(), EngineError> {
        if self.state != PlaybackState::Idle {
            log::debug!("Activation requested in {}, nothing to do", self.state);
            return Ok(());
        }
        if !self.engine.gate().has_interacted() {
            log::warn!("Activation requested before any user interaction");
            return Err(EngineError::EngineUnavailable);
        }

        self.transition(PlaybackState::Activating);
        let effects = self.store.get();
        let result = self
            .engine
            .activate()
            .and_then(|()| self.engine.apply_parameters(&effects));

        match result {
            Ok(()) => {
                self.transition(PlaybackState::Ready);
                Ok(())
            }
            Err(e) => {
                log::error!("Engine activation failed: {}", e);
                self.transition(PlaybackState::Idle);
                Err(e)
            }
        }
    }

    /// Stop whatever plays and start loading `track`
    pub fn begin_load(&mut self, track: Track) -> Result<LoadRequest, EngineError> {
        if !self.state.engine_active() {
            log::warn!("Cannot select {} while {}", track.id, self.state);
            return Err(EngineError::EngineUnavailable);
        }

        self.stop_source()?;
        if self.state == PlaybackState::Paused {
            self.engine.resume()?;
        }

        // a load already in flight keeps the fallback it recorded
        if self.state != PlaybackState::Loading {
            self.session.fallback_track = self.session.current_track.take();
        }
        self.generation += 1;
        let ticket = LoadTicket {
            track_id: track.id,
            generation: self.generation,
        };
        let locator = track.locator.clone();
        log::info!("Loading {} from {} (generation {})", track.id, locator, ticket.generation);

        self.session.pending = Some(ticket);
        self.session.current_track = Some(track.clone());
        self.transition(PlaybackState::Loading);
        self.emit(PlaybackEvent::TrackChanged(Some(track)));

        Ok(LoadRequest { ticket, locator })
    }

    /// Accept the decode result for `ticket`
    ///
    /// Results for any ticket other than the pending one are dropped. A
    /// decode failure returns the machine to `Ready` with the previously
    /// selected track restored, and is reported both as a `TrackUnplayable`
    /// notice and as the returned error.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<DecodedBuffer, DecodeError>,
    ) -> Result<LoadOutcome, EngineError> {
        if self.session.pending != Some(ticket) {
            log::warn!(
                "Discarding load of {} (generation {}): superseded",
                ticket.track_id,
                ticket.generation
            );
            return Ok(LoadOutcome::Discarded);
        }
        self.session.pending = None;

        let buffer = match result {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("Track {} is unplayable: {}", ticket.track_id, e);
                let title = self
                    .session
                    .current_track
                    .take()
                    .map(|t| t.metadata.title)
                    .unwrap_or_default();
                self.transition(PlaybackState::Ready);
                self.emit(PlaybackEvent::TrackUnplayable {
                    track_id: ticket.track_id,
                    title,
                    reason: e.to_string(),
                });
                self.restore_fallback_track();
                return Err(e.into());
            }
        };

        let pitch = self.store.get().pitch;
        match self.sources.start_track(buffer, pitch, &mut self.engine) {
            Ok(handle) => {
                self.session.source = Some(handle);
                self.session.fallback_track = None;
                self.transition(PlaybackState::Playing);
                Ok(LoadOutcome::Started)
            }
            Err(e) => {
                self.session.current_track = None;
                self.transition(PlaybackState::Ready);
                self.restore_fallback_track();
                Err(e)
            }
        }
    }

    /// Decode `request` and complete it
    pub async fn load(&mut self, request: LoadRequest) -> Result<LoadOutcome, EngineError> {
        let result = self.sources.decode(&request.locator).await;
        self.complete_load(request.ticket, result)
    }

    pub async fn select_track(&mut self, track: Track) -> Result<LoadOutcome, EngineError> {
        let request = self.begin_load(track)?;
        self.load(request).await
    }

    /// The play button
    ///
    /// In `Idle` the first press opens audio. When a load has to start, the
    /// request is returned for the caller to decode.
    pub fn toggle_play_pause(&mut self) -> Result<Option<LoadRequest>, EngineError> {
        match self.state {
            PlaybackState::Idle => {
                self.request_engine_activation()?;
                Ok(None)
            }
            PlaybackState::Activating | PlaybackState::Loading => Ok(None),
            PlaybackState::Playing => {
                self.engine.suspend()?;
                self.transition(PlaybackState::Paused);
                Ok(None)
            }
            PlaybackState::Paused if self.session.has_source() => {
                self.engine.resume()?;
                self.transition(PlaybackState::Playing);
                Ok(None)
            }
            PlaybackState::Ready | PlaybackState::Paused => {
                // replay the last track, else start the view from the top
                let next = self
                    .session
                    .current_track
                    .clone()
                    .or_else(|| self.active_view.first().cloned());
                match next {
                    Some(track) => self.begin_load(track).map(Some),
                    None => {
                        log::debug!("Play pressed with an empty view");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Change one effect parameter and push it to the live graph
    pub fn set_effect(&mut self, path: &str, value: f32) -> Result<Arc<EffectsState>, EngineError> {
        if !self.state.engine_active() {
            return Err(EngineError::misuse(format!("effect edit {} while {}", path, self.state)));
        }
        let path: EffectPath = path.parse()?;

        let effects = self.store.set_path(path, value);
        self.engine.apply_parameters(&effects)?;
        if path == EffectPath::Pitch {
            if let Some(handle) = &self.session.source {
                handle.set_playback_rate(effects.pitch);
            }
        }
        self.emit(PlaybackEvent::EffectsChanged(effects.clone()));
        Ok(effects)
    }

    /// Restore every effect to its default
    pub fn reset_effects(&mut self) -> Result<Arc<EffectsState>, EngineError> {
        if !self.state.engine_active() {
            return Err(EngineError::misuse(format!("effect reset while {}", self.state)));
        }

        let effects = self.store.reset();
        self.engine.apply_parameters(&effects)?;
        if let Some(handle) = &self.session.source {
            handle.set_playback_rate(effects.pitch);
        }
        self.emit(PlaybackEvent::EffectsChanged(effects.clone()));
        Ok(effects)
    }

    /// Check for a source that played to its end
    pub fn poll(&mut self) -> Result<(), EngineError> {
        if self.state != PlaybackState::Playing {
            return Ok(());
        }
        let finished = self.session.source.as_ref().is_some_and(SourceHandle::is_finished);
        if !finished {
            return Ok(());
        }

        self.stop_source()?;
        self.transition(PlaybackState::Ready);
        if let Some(track) = &self.session.current_track {
            log::info!("Track {} ended", track.id);
            self.emit(PlaybackEvent::TrackEnded(track.id));
        }
        Ok(())
    }

    /// Stop playback and release the audio device
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        self.stop_source()?;
        self.engine.teardown()?;
        self.session.pending = None;
        self.session.fallback_track = None;
        if self.session.current_track.take().is_some() {
            self.emit(PlaybackEvent::TrackChanged(None));
        }
        self.transition(PlaybackState::Idle);
        Ok(())
    }

    /// Stop and disconnect the current source
    ///
    /// On failure the handle stays in the session, still live, so the
    /// engine's view of the connection and the session agree.
    fn stop_source(&mut self) -> Result<(), EngineError> {
        if let Some(handle) = self.session.source.as_mut() {
            self.sources.stop_current(handle, &mut self.engine)?;
            self.session.source = None;
        }
        Ok(())
    }

    /// Make the track selected before the failed load current again
    fn restore_fallback_track(&mut self) {
        self.session.current_track = self.session.fallback_track.take();
        self.emit(PlaybackEvent::TrackChanged(self.session.current_track.clone()));
    }

    fn transition(&mut self, to: PlaybackState) {
        let from = self.state;
        if from == to {
            return;
        }
        log::info!("Playback: {} -> {}", from, to);
        self.state = to;
        self.emit(PlaybackEvent::StateChanged { from, to });
    }

    fn emit(&self, event: PlaybackEvent) {
        if self.events.send(event).is_err() {
            log::debug!("Playback event dropped: no receiver");
        }
    }
}
