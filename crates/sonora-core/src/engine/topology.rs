//! Processing topology as an arena of nodes
//!
//! Nodes live in a `Vec` and refer to their inputs by `NodeId`, so the delay
//! feedback cycle is just two indices pointing at each other. A delay line
//! emits only what was written into it earlier, which makes its incoming
//! edges deferred: they are excluded from the evaluation order and summed
//! into the line after every other node has produced its sample.
//!
//! ```text
//! Source → EQ0 → EQ1 → EQ2 ─┬──────────────────────────────┐
//!                           ├→ DelayLine ─┬→ DelaySend ─────┤
//!                           │      ▲      └→ FeedbackGain ┐ ├→ Mixer → Master → Output
//!                           │      └──────────────────────┘ │
//!                           └→ ReverbTank → ReverbSend ─────┘
//! ```

use std::collections::VecDeque;

use super::EngineError;
use crate::effect::NUM_EQ_BANDS;

/// Index of a node in the topology arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u16);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Where the connected source enters the graph
    SourceInput,
    /// One band of the series equalizer
    Eq(usize),
    DelayLine,
    FeedbackGain,
    DelaySend,
    ReverbTank,
    ReverbSend,
    /// Sums dry and wet branches at unity
    Mixer,
    MasterGain,
    Output,
}

impl NodeKind {
    /// Nodes whose output depends only on earlier samples
    pub fn has_memory(self) -> bool {
        matches!(self, NodeKind::DelayLine)
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,
    pub inputs: Vec<NodeId>,
}

#[derive(Debug, Default)]
pub struct TopologyBuilder {
    nodes: Vec<Node>,
}

impl TopologyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u16);
        self.nodes.push(Node {
            kind,
            inputs: Vec::new(),
        });
        id
    }

    pub fn connect(&mut self, from: NodeId, to: NodeId) -> &mut Self {
        self.nodes[to.index()].inputs.push(from);
        self
    }

    /// Validate the wiring and compute the evaluation order
    ///
    /// Fails when a cycle does not pass through a node with memory, since
    /// such a graph has no per-sample evaluation order.
    pub fn build(self) -> Result<Topology, EngineError> {
        let n = self.nodes.len();
        let mut indegree = vec![0usize; n];
        let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); n];

        for (to, node) in self.nodes.iter().enumerate() {
            if node.kind.has_memory() {
                continue;
            }
            for input in &node.inputs {
                if input.index() >= n {
                    return Err(EngineError::misuse(format!(
                        "node {} reads from missing node {}",
                        to,
                        input.index()
                    )));
                }
                indegree[to] += 1;
                consumers[input.index()].push(to);
            }
        }

        let mut ready: VecDeque<usize> = (0..n).filter(|&i| indegree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = ready.pop_front() {
            order.push(NodeId(i as u16));
            for &consumer in &consumers[i] {
                indegree[consumer] -= 1;
                if indegree[consumer] == 0 {
                    ready.push_back(consumer);
                }
            }
        }

        if order.len() != n {
            return Err(EngineError::misuse("topology contains a cycle without a delay line"));
        }

        let deferred = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind.has_memory())
            .map(|(i, _)| NodeId(i as u16))
            .collect();

        let find = |kind: NodeKind| {
            self.nodes
                .iter()
                .position(|node| node.kind == kind)
                .map(|i| NodeId(i as u16))
        };
        let input = find(NodeKind::SourceInput)
            .ok_or_else(|| EngineError::misuse("topology has no source input"))?;
        let output =
            find(NodeKind::Output).ok_or_else(|| EngineError::misuse("topology has no output"))?;

        Ok(Topology {
            nodes: self.nodes,
            order,
            deferred,
            input,
            output,
        })
    }
}

/// Validated, immutable wiring of the graph
#[derive(Debug, Clone)]
pub struct Topology {
    nodes: Vec<Node>,
    order: Vec<NodeId>,
    deferred: Vec<NodeId>,
    input: NodeId,
    output: NodeId,
}

impl Topology {
    /// The graph every activation renders
    pub fn standard() -> Result<Self, EngineError> {
        let mut b = TopologyBuilder::new();

        let source = b.add(NodeKind::SourceInput);
        let eq: [NodeId; NUM_EQ_BANDS] = std::array::from_fn(|band| b.add(NodeKind::Eq(band)));
        let delay = b.add(NodeKind::DelayLine);
        let feedback = b.add(NodeKind::FeedbackGain);
        let delay_send = b.add(NodeKind::DelaySend);
        let reverb = b.add(NodeKind::ReverbTank);
        let reverb_send = b.add(NodeKind::ReverbSend);
        let mixer = b.add(NodeKind::Mixer);
        let master = b.add(NodeKind::MasterGain);
        let output = b.add(NodeKind::Output);

        b.connect(source, eq[0]);
        for pair in eq.windows(2) {
            b.connect(pair[0], pair[1]);
        }
        let last_eq = eq[NUM_EQ_BANDS - 1];

        // delay branch with its feedback loop
        b.connect(last_eq, delay)
            .connect(feedback, delay)
            .connect(delay, feedback)
            .connect(delay, delay_send);

        b.connect(last_eq, reverb).connect(reverb, reverb_send);

        // dry path plus both sends
        b.connect(last_eq, mixer)
            .connect(delay_send, mixer)
            .connect(reverb_send, mixer);

        b.connect(mixer, master).connect(master, output);
        b.build()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (NodeId(i as u16), node))
    }

    /// Nodes in per-sample evaluation order
    pub fn evaluation_order(&self) -> &[NodeId] {
        &self.order
    }

    /// Nodes with memory, written after every other node has been evaluated
    pub fn deferred(&self) -> &[NodeId] {
        &self.deferred
    }

    pub fn input(&self) -> NodeId {
        self.input
    }

    pub fn output(&self) -> NodeId {
        self.output
    }

    pub fn find(&self, kind: NodeKind) -> Option<NodeId> {
        self.nodes().find(|(_, node)| node.kind == kind).map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(topology: &Topology, kind: NodeKind) -> usize {
        let id = topology.find(kind).unwrap();
        topology
            .evaluation_order()
            .iter()
            .position(|&n| n == id)
            .unwrap()
    }

    #[test]
    fn test_standard_topology_shape() {
        let topology = Topology::standard().unwrap();
        assert_eq!(topology.len(), 12);
        assert_eq!(topology.evaluation_order().len(), 12);
        assert_eq!(topology.deferred(), &[topology.find(NodeKind::DelayLine).unwrap()]);

        let delay = topology.node(topology.find(NodeKind::DelayLine).unwrap());
        assert!(delay.inputs.contains(&topology.find(NodeKind::FeedbackGain).unwrap()));
        let mixer = topology.node(topology.find(NodeKind::Mixer).unwrap());
        assert_eq!(mixer.inputs.len(), 3);
    }

    #[test]
    fn test_evaluation_order_respects_edges() {
        let topology = Topology::standard().unwrap();
        assert!(position(&topology, NodeKind::SourceInput) < position(&topology, NodeKind::Eq(0)));
        assert!(position(&topology, NodeKind::Eq(0)) < position(&topology, NodeKind::Eq(1)));
        assert!(position(&topology, NodeKind::Eq(2)) < position(&topology, NodeKind::ReverbTank));
        assert!(position(&topology, NodeKind::DelayLine) < position(&topology, NodeKind::FeedbackGain));
        assert!(position(&topology, NodeKind::DelaySend) < position(&topology, NodeKind::Mixer));
        assert!(position(&topology, NodeKind::ReverbSend) < position(&topology, NodeKind::Mixer));
        assert!(position(&topology, NodeKind::MasterGain) < position(&topology, NodeKind::Output));
    }

    #[test]
    fn test_cycle_without_memory_rejected() {
        let mut b = TopologyBuilder::new();
        let source = b.add(NodeKind::SourceInput);
        let gain = b.add(NodeKind::FeedbackGain);
        let mixer = b.add(NodeKind::Mixer);
        let output = b.add(NodeKind::Output);
        b.connect(source, mixer)
            .connect(mixer, gain)
            .connect(gain, mixer)
            .connect(mixer, output);

        assert!(matches!(b.build(), Err(EngineError::GraphMisuse(_))));
    }

    #[test]
    fn test_missing_output_rejected() {
        let mut b = TopologyBuilder::new();
        let source = b.add(NodeKind::SourceInput);
        let eq = b.add(NodeKind::Eq(0));
        b.connect(source, eq);
        assert!(matches!(b.build(), Err(EngineError::GraphMisuse(_))));
    }
}
