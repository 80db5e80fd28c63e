//! Signal graph engine
//!
//! The engine owns the persistent processing graph. On activation it builds
//! the topology once, hands a `GraphRenderer` to the audio backend and keeps
//! three lock-free channels to it:
//!
//! - **LiveParams**: per-field atomics for effect parameters
//! - **Command queue**: source connect/disconnect, applied at block start
//! - **GraphAtomics**: what the renderer actually holds, for the UI
//!
//! The control side mirrors the connection state so misuse (a second source,
//! teardown with a source attached) is refused synchronously instead of
//! being discovered on the audio thread.

pub mod command;
mod error;
mod gc;
mod nodes;
pub mod params;
mod renderer;
pub mod topology;

use std::sync::Arc;

pub use command::{command_channel, CommandSender, GraphCommand, COMMAND_QUEUE_CAPACITY};
pub use error::EngineError;
pub use gc::gc_handle;
pub use params::{GraphAtomics, LiveParams, ParamSnapshot};
pub use renderer::GraphRenderer;
pub use topology::{Node, NodeId, NodeKind, Topology, TopologyBuilder};

use crate::audio::{ActivationGate, AudioBackend, OutputStream, StreamSpec};
use crate::config::ReverbConfig;
use crate::effect::EffectsState;
use crate::source::{SourceGraph, SourceId, SourceVoice};
use crate::types::DEFAULT_SAMPLE_RATE;

/// Resources that exist only while the engine is active
struct ActiveGraph {
    stream: Box<dyn OutputStream>,
    commands: CommandSender,
    spec: StreamSpec,
    /// Control-side view of the connected source
    connected: Option<SourceId>,
    node_count: usize,
}

pub struct SignalGraphEngine {
    backend: Box<dyn AudioBackend>,
    gate: ActivationGate,
    reverb: ReverbConfig,
    master_gain: f32,
    params: Arc<LiveParams>,
    atomics: Arc<GraphAtomics>,
    active: Option<ActiveGraph>,
}

impl SignalGraphEngine {
    pub fn new(backend: Box<dyn AudioBackend>, gate: ActivationGate, reverb: ReverbConfig, master_gain: f32) -> Self {
        let initial = ParamSnapshot::from_state(&EffectsState::default(), master_gain, DEFAULT_SAMPLE_RATE);
        Self {
            backend,
            gate,
            reverb,
            master_gain,
            params: Arc::new(LiveParams::new(&initial)),
            atomics: Arc::new(GraphAtomics::new()),
            active: None,
        }
    }

    pub fn gate(&self) -> &ActivationGate {
        &self.gate
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Negotiated output format, while active
    pub fn stream_spec(&self) -> Option<StreamSpec> {
        self.active.as_ref().map(|a| a.spec)
    }

    /// Nodes allocated for the current activation
    pub fn node_count(&self) -> usize {
        self.active.as_ref().map_or(0, |a| a.node_count)
    }

    pub fn atomics(&self) -> Arc<GraphAtomics> {
        self.atomics.clone()
    }

    /// Values the renderer reads on its next block
    pub fn live_parameters(&self) -> ParamSnapshot {
        self.params.snapshot()
    }

    /// Build the graph and open the output
    ///
    /// Refused until the activation gate has seen a user gesture. Calling it
    /// again while active does nothing.
    pub fn activate(&mut self) -> Result<(), EngineError> {
        if self.active.is_some() {
            log::debug!("activate: engine already active");
            return Ok(());
        }
        if !self.gate.has_interacted() {
            log::warn!("activate: no user interaction yet, audio stays closed");
            return Err(EngineError::EngineUnavailable);
        }

        let topology = Topology::standard()?;
        let node_count = topology.len();
        let spec = self.backend.negotiate()?;

        self.atomics.reset();
        let (tx, rx) = command_channel();
        let renderer = GraphRenderer::new(
            topology,
            rx,
            self.params.clone(),
            self.atomics.clone(),
            &self.reverb,
            spec.sample_rate,
        );
        let stream = self.backend.start(renderer)?;

        log::info!(
            "Signal graph active on {} backend: {} nodes, {}Hz",
            self.backend.name(),
            node_count,
            spec.sample_rate
        );
        self.active = Some(ActiveGraph {
            stream,
            commands: CommandSender::new(tx),
            spec,
            connected: None,
            node_count,
        });
        Ok(())
    }

    /// Clamp `state` and publish it to the renderer. Never rewires.
    pub fn apply_parameters(&self, state: &EffectsState) -> Result<(), EngineError> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| EngineError::misuse("parameters applied before activation"))?;
        let snapshot = ParamSnapshot::from_state(state, self.master_gain, active.spec.sample_rate);
        self.params.publish(&snapshot);
        log::debug!("Published parameters: {:?}", snapshot);
        Ok(())
    }

    /// Queue the connection of a started source into the first EQ stage
    pub fn connect_source(&mut self, voice: SourceVoice) -> Result<(), EngineError> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| EngineError::misuse("connect_source before activation"))?;
        if let Some(current) = active.connected {
            return Err(EngineError::misuse(format!(
                "connect {:?} while {:?} is still connected",
                voice.id(),
                current
            )));
        }

        let id = voice.id();
        active
            .commands
            .send(GraphCommand::Connect(Box::new(voice)))
            .map_err(|_| EngineError::misuse("command queue full"))?;
        active.connected = Some(id);
        Ok(())
    }

    /// Queue the disconnection of `id`; stale or unknown ids are ignored
    pub fn disconnect_source(&mut self, id: SourceId) -> Result<(), EngineError> {
        let Some(active) = self.active.as_mut() else {
            return Ok(());
        };
        if active.connected != Some(id) {
            log::debug!("disconnect_source: {:?} is not connected, ignoring", id);
            return Ok(());
        }

        active
            .commands
            .send(GraphCommand::Disconnect { id })
            .map_err(|_| EngineError::misuse("command queue full"))?;
        active.connected = None;
        Ok(())
    }

    pub fn connected_source(&self) -> Option<SourceId> {
        self.active.as_ref().and_then(|a| a.connected)
    }

    /// Stop rendering (silence, sources hold position)
    pub fn suspend(&mut self) -> Result<(), EngineError> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| EngineError::misuse("suspend before activation"))?;
        self.atomics.set_suspended(true);
        active.stream.suspend()?;
        log::info!("Signal graph suspended");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), EngineError> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| EngineError::misuse("resume before activation"))?;
        active.stream.resume()?;
        self.atomics.set_suspended(false);
        log::info!("Signal graph resumed");
        Ok(())
    }

    /// Release every node and the output stream
    ///
    /// Only valid once the source has been disconnected.
    pub fn teardown(&mut self) -> Result<(), EngineError> {
        let Some(active) = self.active.as_ref() else {
            return Ok(());
        };
        if let Some(id) = active.connected {
            return Err(EngineError::misuse(format!("teardown while {:?} is connected", id)));
        }

        // dropping the stream drops the renderer with it
        self.active = None;
        self.atomics.reset();
        log::info!("Signal graph torn down");
        Ok(())
    }
}

impl SourceGraph for SignalGraphEngine {
    fn output_sample_rate(&self) -> u32 {
        self.stream_spec().map_or(DEFAULT_SAMPLE_RATE, |spec| spec.sample_rate)
    }

    fn has_connected_source(&self) -> bool {
        self.connected_source().is_some()
    }

    fn connect_source(&mut self, voice: SourceVoice) -> Result<(), EngineError> {
        SignalGraphEngine::connect_source(self, voice)
    }

    fn disconnect_source(&mut self, id: SourceId) -> Result<(), EngineError> {
        SignalGraphEngine::disconnect_source(self, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{OfflineBackend, OfflineOutput};
    use crate::source::fake_graph::tone;
    use crate::source::SourceLifecycleController;

    fn engine() -> (SignalGraphEngine, OfflineOutput) {
        let backend = OfflineBackend::new(48000);
        let output = backend.output();
        let engine = SignalGraphEngine::new(Box::new(backend), ActivationGate::new(), ReverbConfig::default(), 1.0);
        (engine, output)
    }

    #[test]
    fn test_activation_requires_gesture() {
        let (mut engine, output) = engine();
        assert!(matches!(engine.activate(), Err(EngineError::EngineUnavailable)));
        assert!(!engine.is_active());

        engine.gate().record_interaction();
        engine.activate().unwrap();
        assert!(engine.is_active());
        assert!(output.is_running());
        assert_eq!(engine.node_count(), 12);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let (mut engine, _output) = engine();
        engine.gate().record_interaction();
        engine.activate().unwrap();
        let spec = engine.stream_spec();
        engine.activate().unwrap();
        assert_eq!(engine.stream_spec(), spec);
    }

    #[test]
    fn test_backend_failure_leaves_engine_inactive() {
        let mut backend = OfflineBackend::new(48000);
        backend.fail_next_open();
        let gate = ActivationGate::new();
        gate.record_interaction();
        let mut engine = SignalGraphEngine::new(Box::new(backend), gate, ReverbConfig::default(), 1.0);

        assert!(matches!(engine.activate(), Err(EngineError::Audio(_))));
        assert!(!engine.is_active());
        engine.activate().unwrap();
    }

    #[test]
    fn test_parameters_before_activation_refused() {
        let (engine, _output) = engine();
        let err = engine.apply_parameters(&EffectsState::default()).unwrap_err();
        assert!(matches!(err, EngineError::GraphMisuse(_)));
    }

    #[test]
    fn test_apply_parameters_clamps_feedback() {
        let (mut engine, _output) = engine();
        engine.gate().record_interaction();
        engine.activate().unwrap();

        let mut state = EffectsState::default();
        state.delay.feedback = 1.5;
        engine.apply_parameters(&state).unwrap();
        assert_eq!(engine.live_parameters().delay_feedback, 0.9);
    }

    #[test]
    fn test_eq_edits_last_writer_wins() {
        let (mut engine, _output) = engine();
        engine.gate().record_interaction();
        engine.activate().unwrap();

        let mut state = EffectsState::default();
        state.eq_bands[0].gain_db = -6.0;
        engine.apply_parameters(&state).unwrap();
        state.eq_bands[0].gain_db = -3.0;
        engine.apply_parameters(&state).unwrap();
        assert_eq!(engine.live_parameters().eq_gain_db[0], -3.0);
    }

    #[test]
    fn test_single_source_through_real_renderer() {
        let (mut engine, output) = engine();
        engine.gate().record_interaction();
        engine.activate().unwrap();
        let atomics = engine.atomics();
        let mut controller = SourceLifecycleController::new();

        let mut first = controller.start_track(tone(48000), 1.0, &mut engine).unwrap();
        output.render(256);
        assert_eq!(atomics.connected_source(), Some(first.id().0));

        // a second start without stopping is refused
        assert!(controller.start_track(tone(48000), 1.0, &mut engine).is_err());

        controller.stop_current(&mut first, &mut engine).unwrap();
        let second = controller.start_track(tone(48000), 1.0, &mut engine).unwrap();
        let block = output.render(256);

        assert_eq!(atomics.connected_source(), Some(second.id().0));
        assert_eq!(atomics.max_connected(), 1);
        assert!((block[0].left - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_teardown_requires_disconnected_source() {
        let (mut engine, output) = engine();
        engine.gate().record_interaction();
        engine.activate().unwrap();
        let mut controller = SourceLifecycleController::new();
        let mut handle = controller.start_track(tone(100), 1.0, &mut engine).unwrap();

        assert!(matches!(engine.teardown(), Err(EngineError::GraphMisuse(_))));
        assert!(engine.is_active());

        controller.stop_current(&mut handle, &mut engine).unwrap();
        engine.teardown().unwrap();
        assert!(!engine.is_active());
        assert!(!output.is_running());
    }

    #[test]
    fn test_suspend_silences_output() {
        let (mut engine, output) = engine();
        engine.gate().record_interaction();
        engine.activate().unwrap();
        let mut controller = SourceLifecycleController::new();
        let handle = controller.start_track(tone(48000), 1.0, &mut engine).unwrap();

        output.render(64);
        engine.suspend().unwrap();
        assert_eq!(output.render(64).peak(), 0.0);
        assert_eq!(handle.position_frames(), 64);

        engine.resume().unwrap();
        assert!(output.render(64).peak() > 0.0);
    }
}
