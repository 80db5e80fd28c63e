//! The render-thread side of the graph
//!
//! `GraphRenderer` is moved into the backend on activation and from then on
//! is touched only by the audio thread. Each block it:
//! 1. applies queued connect/disconnect commands, in order
//! 2. picks up changed parameters (coefficients recomputed only on change)
//! 3. evaluates the topology sample by sample
//!
//! Per sample, nodes are evaluated in topological order; delay lines emit
//! their stored sample, and after the pass the summed inputs of every delay
//! line (dry signal plus feedback) are written back.

use std::sync::Arc;

use rtrb::Consumer;

use super::command::GraphCommand;
use super::nodes::{DelayLine, EqFilter, ReverbTank};
use super::params::{GraphAtomics, LiveParams, ParamSnapshot, MAX_DELAY_SECONDS};
use super::topology::{NodeId, NodeKind, Topology};
use crate::config::ReverbConfig;
use crate::effect::FilterShape;
use crate::source::SourceVoice;
use crate::types::{StereoBuffer, StereoSample};

enum Processor {
    /// Source input, mixer and output: the summed inputs pass through
    Sum,
    Eq(EqFilter),
    Delay(DelayLine),
    Gain(f32),
    Reverb(ReverbTank),
}

impl Processor {
    fn for_kind(kind: NodeKind, reverb: &ReverbConfig, sample_rate: u32) -> Self {
        match kind {
            NodeKind::SourceInput | NodeKind::Mixer | NodeKind::Output => Processor::Sum,
            NodeKind::Eq(band) => Processor::Eq(EqFilter::new(FilterShape::BANDS[band])),
            NodeKind::DelayLine => {
                Processor::Delay(DelayLine::new((MAX_DELAY_SECONDS * sample_rate as f32) as usize))
            }
            NodeKind::FeedbackGain | NodeKind::DelaySend | NodeKind::ReverbSend => Processor::Gain(0.0),
            NodeKind::MasterGain => Processor::Gain(1.0),
            NodeKind::ReverbTank => Processor::Reverb(ReverbTank::new(reverb, sample_rate)),
        }
    }
}

pub struct GraphRenderer {
    topology: Topology,
    processors: Vec<Processor>,
    /// Output of every node for the current sample
    values: Vec<StereoSample>,
    source: Option<Box<SourceVoice>>,
    commands: Consumer<GraphCommand>,
    params: Arc<LiveParams>,
    applied: Option<ParamSnapshot>,
    atomics: Arc<GraphAtomics>,
    sample_rate: u32,
}

impl GraphRenderer {
    pub fn new(
        topology: Topology,
        commands: Consumer<GraphCommand>,
        params: Arc<LiveParams>,
        atomics: Arc<GraphAtomics>,
        reverb: &ReverbConfig,
        sample_rate: u32,
    ) -> Self {
        let processors = topology
            .nodes()
            .map(|(_, node)| Processor::for_kind(node.kind, reverb, sample_rate))
            .collect();
        let values = vec![StereoSample::silence(); topology.len()];

        Self {
            topology,
            processors,
            values,
            source: None,
            commands,
            params,
            applied: None,
            atomics,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Fill `block` with the next `block.len()` frames
    pub fn render(&mut self, block: &mut StereoBuffer) {
        self.process_commands();

        if self.atomics.is_suspended() {
            block.fill_silence();
            return;
        }

        self.refresh_params();
        for frame in block.iter_mut() {
            *frame = self.tick();
        }
        self.atomics.add_frames(block.len() as u64);
    }

    fn process_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            match command {
                GraphCommand::Connect(voice) => {
                    if self.source.is_some() {
                        // the control side never queues this; drop the newcomer
                        log::error!("Ignoring connect of {:?}: a source is already connected", voice.id());
                        continue;
                    }
                    self.atomics.set_connected(Some(voice.id().0));
                    self.source = Some(voice);
                }
                GraphCommand::Disconnect { id } => {
                    if self.source.as_ref().map(|v| v.id()) == Some(id) {
                        // buffer memory is reclaimed by the GC thread
                        self.source = None;
                        self.atomics.set_connected(None);
                    }
                }
            }
        }
    }

    fn refresh_params(&mut self) {
        let snapshot = self.params.snapshot();
        if self.applied == Some(snapshot) {
            return;
        }

        let sample_rate = self.sample_rate;
        for (index, (_, node)) in self.topology.nodes().enumerate() {
            match (&mut self.processors[index], node.kind) {
                (Processor::Eq(eq), NodeKind::Eq(band)) => {
                    eq.set(snapshot.eq_frequency_hz[band], snapshot.eq_gain_db[band], sample_rate)
                }
                (Processor::Delay(line), NodeKind::DelayLine) => {
                    line.set_delay_samples((snapshot.delay_time_seconds * sample_rate as f32).round() as usize)
                }
                (Processor::Gain(gain), NodeKind::FeedbackGain) => *gain = snapshot.delay_feedback,
                (Processor::Gain(gain), NodeKind::DelaySend) => *gain = snapshot.delay_mix,
                (Processor::Gain(gain), NodeKind::ReverbSend) => *gain = snapshot.reverb_mix,
                (Processor::Gain(gain), NodeKind::MasterGain) => *gain = snapshot.master_gain,
                _ => {}
            }
        }
        self.applied = Some(snapshot);
    }

    #[inline]
    fn sum_inputs(&self, id: NodeId) -> StereoSample {
        let mut sum = StereoSample::silence();
        for input in &self.topology.node(id).inputs {
            sum += self.values[input.index()];
        }
        sum
    }

    #[inline]
    fn tick(&mut self) -> StereoSample {
        let input = match self.source.as_mut() {
            Some(voice) => voice.next_frame(),
            None => StereoSample::silence(),
        };
        let input_id = self.topology.input();

        for position in 0..self.topology.evaluation_order().len() {
            let id = self.topology.evaluation_order()[position];
            let index = id.index();

            let value = if id == input_id {
                input
            } else {
                let sum = self.sum_inputs(id);
                match &mut self.processors[index] {
                    Processor::Sum => sum,
                    Processor::Eq(eq) => eq.process(sum),
                    Processor::Gain(gain) => sum * *gain,
                    Processor::Reverb(tank) => tank.process(sum),
                    // inputs land in the line after the pass
                    Processor::Delay(line) => line.read(),
                }
            };
            self.values[index] = value;
        }

        for position in 0..self.topology.deferred().len() {
            let id = self.topology.deferred()[position];
            let sum = self.sum_inputs(id);
            if let Processor::Delay(line) = &mut self.processors[id.index()] {
                line.write(sum);
            }
        }

        self.values[self.topology.output().index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::EffectsState;
    use crate::engine::command::{command_channel, CommandSender};
    use crate::engine::gc_handle;
    use crate::source::{DecodedBuffer, SourceHandle, SourceId, SourceUnit};
    use basedrop::Shared;

    const SR: u32 = 48000;

    struct Rig {
        renderer: GraphRenderer,
        sender: CommandSender,
        params: Arc<LiveParams>,
        atomics: Arc<GraphAtomics>,
    }

    impl Rig {
        fn new(state: &EffectsState) -> Self {
            let (tx, rx) = command_channel();
            let params = Arc::new(LiveParams::new(&ParamSnapshot::from_state(state, 1.0, SR)));
            let atomics = Arc::new(GraphAtomics::new());
            let renderer = GraphRenderer::new(
                Topology::standard().unwrap(),
                rx,
                params.clone(),
                atomics.clone(),
                &ReverbConfig::default(),
                SR,
            );
            Self {
                renderer,
                sender: CommandSender::new(tx),
                params,
                atomics,
            }
        }

        fn connect(&mut self, id: u64, frames: Vec<StereoSample>) -> SourceHandle {
            let buffer = DecodedBuffer::new(StereoBuffer::from_vec(frames), SR);
            let unit = SourceUnit::new(SourceId(id), Shared::new(&gc_handle(), buffer), SR);
            let (voice, handle) = unit.start();
            self.sender.send(GraphCommand::Connect(Box::new(voice))).unwrap();
            handle
        }

        fn render(&mut self, frames: usize) -> StereoBuffer {
            let mut block = StereoBuffer::silence(frames);
            self.renderer.render(&mut block);
            block
        }
    }

    fn impulse(len: usize) -> Vec<StereoSample> {
        let mut frames = vec![StereoSample::silence(); len];
        frames[0] = StereoSample::mono(1.0);
        frames
    }

    #[test]
    fn test_dry_path_unity_when_wet_mixes_zero() {
        let mut rig = Rig::new(&EffectsState::default());
        let frames: Vec<StereoSample> = (0..64).map(|i| StereoSample::new(i as f32 * 0.01, -0.2)).collect();
        rig.connect(1, frames.clone());

        let out = rig.render(64);
        for (got, want) in out.iter().zip(&frames) {
            assert!((got.left - want.left).abs() < 1e-6);
            assert!((got.right - want.right).abs() < 1e-6);
        }
    }

    #[test]
    fn test_silence_without_source() {
        let mut rig = Rig::new(&EffectsState::default());
        let out = rig.render(128);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(rig.atomics.frames_rendered(), 128);
    }

    #[test]
    fn test_delay_echo_timing() {
        let mut state = EffectsState::default();
        state.delay.time_seconds = 0.001; // 48 samples
        state.delay.mix = 0.5;
        let mut rig = Rig::new(&state);
        rig.connect(1, impulse(256));

        let out = rig.render(256);
        assert!((out[0].left - 1.0).abs() < 1e-6, "dry impulse");
        assert!((out[48].left - 0.5).abs() < 1e-6, "echo at 48: {}", out[48].left);
        assert!(out.iter().skip(49).all(|s| s.left.abs() < 1e-6), "no feedback, single echo");
    }

    #[test]
    fn test_feedback_decays() {
        let mut state = EffectsState::default();
        state.delay.time_seconds = 0.001;
        state.delay.mix = 1.0;
        state.delay.feedback = 1.5; // clamped to 0.9
        let mut rig = Rig::new(&state);
        rig.connect(1, impulse(SR as usize));

        let out = rig.render(SR as usize);
        // successive echoes shrink by the clamped feedback
        assert!((out[48].left - 1.0).abs() < 1e-5);
        assert!((out[96].left - 0.9).abs() < 1e-5);
        assert!((out[144].left - 0.81).abs() < 1e-5);
        let tail = out.iter().skip(SR as usize - 4800).map(|s| s.peak()).fold(0.0, f32::max);
        assert!(tail < 1e-3, "tail = {}", tail);
    }

    #[test]
    fn test_parameter_change_picked_up_next_block() {
        let mut rig = Rig::new(&EffectsState::default());
        rig.connect(1, vec![StereoSample::mono(0.5); 256]);
        let before = rig.render(64);
        assert!((before[63].left - 0.5).abs() < 1e-6);

        let mut louder = ParamSnapshot::from_state(&EffectsState::default(), 1.0, SR);
        louder.master_gain = 2.0;
        rig.params.publish(&louder);
        let after = rig.render(64);
        assert!((after[0].left - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_disconnect_then_connect_in_one_block() {
        let mut rig = Rig::new(&EffectsState::default());
        let first = rig.connect(1, vec![StereoSample::mono(0.25); 1024]);
        rig.render(32);
        assert_eq!(rig.atomics.connected_source(), Some(1));

        rig.sender.send(GraphCommand::Disconnect { id: first.id() }).unwrap();
        rig.connect(2, vec![StereoSample::mono(0.75); 1024]);
        let out = rig.render(32);

        assert_eq!(rig.atomics.connected_source(), Some(2));
        assert_eq!(rig.atomics.max_connected(), 1);
        assert!((out[0].left - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_second_connect_refused_on_render_side() {
        let mut rig = Rig::new(&EffectsState::default());
        rig.connect(1, vec![StereoSample::mono(0.25); 64]);
        rig.connect(2, vec![StereoSample::mono(0.75); 64]);
        let out = rig.render(8);
        assert_eq!(rig.atomics.connected_source(), Some(1));
        assert!((out[0].left - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_suspended_renders_silence_and_holds_position() {
        let mut rig = Rig::new(&EffectsState::default());
        let handle = rig.connect(1, vec![StereoSample::mono(0.5); 1024]);
        rig.render(16);
        assert_eq!(handle.position_frames(), 16);

        rig.atomics.set_suspended(true);
        let out = rig.render(16);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(handle.position_frames(), 16);
    }
}
