//! Lock-free command queue from the control thread to the renderer
//!
//! Source connections are the only structural change the render thread ever
//! sees. They travel through an `rtrb` SPSC ring buffer and are applied at
//! the start of the next block, strictly in the order they were pushed, so a
//! disconnect queued before a connect is always applied first.

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::source::{SourceId, SourceVoice};

/// Capacity of the queue; each track switch uses two slots
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

pub enum GraphCommand {
    /// Attach a started source to the graph input
    ///
    /// Boxed so the enum stays pointer-sized in the ring buffer.
    Connect(Box<SourceVoice>),
    /// Detach the source with this id (ignored if another one is connected)
    Disconnect { id: SourceId },
}

impl std::fmt::Debug for GraphCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphCommand::Connect(voice) => write!(f, "Connect({:?})", voice.id()),
            GraphCommand::Disconnect { id } => write!(f, "Disconnect({:?})", id),
        }
    }
}

pub fn command_channel() -> (Producer<GraphCommand>, Consumer<GraphCommand>) {
    RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Control-side end of the queue
pub struct CommandSender {
    producer: Producer<GraphCommand>,
}

impl CommandSender {
    pub fn new(producer: Producer<GraphCommand>) -> Self {
        Self { producer }
    }

    /// Push without blocking; a full queue hands the command back
    pub fn send(&mut self, command: GraphCommand) -> Result<(), GraphCommand> {
        log::debug!("queue: {:?}", command);
        self.producer.push(command).map_err(|err| match err {
            PushError::Full(cmd) => cmd,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_arrive_in_order() {
        let (tx, mut rx) = command_channel();
        let mut sender = CommandSender::new(tx);
        sender.send(GraphCommand::Disconnect { id: SourceId(1) }).unwrap();
        sender.send(GraphCommand::Disconnect { id: SourceId(2) }).unwrap();

        let ids: Vec<SourceId> = std::iter::from_fn(|| rx.pop().ok())
            .map(|cmd| match cmd {
                GraphCommand::Disconnect { id } => id,
                GraphCommand::Connect(voice) => voice.id(),
            })
            .collect();
        assert_eq!(ids, vec![SourceId(1), SourceId(2)]);
    }

    #[test]
    fn test_full_queue_returns_command() {
        let (tx, _rx) = command_channel();
        let mut sender = CommandSender::new(tx);
        for i in 0..COMMAND_QUEUE_CAPACITY as u64 {
            sender.send(GraphCommand::Disconnect { id: SourceId(i + 1) }).unwrap();
        }
        let rejected = sender.send(GraphCommand::Disconnect { id: SourceId(999) });
        assert!(matches!(rejected, Err(GraphCommand::Disconnect { id: SourceId(999) })));
    }
}
