//! Track sources: decoding and the single-use units that feed the graph

mod buffer;
mod controller;
mod decode;
mod unit;

pub use buffer::DecodedBuffer;
pub use controller::{SourceGraph, SourceLifecycleController};
pub use decode::{decode, decode_blocking, decode_file, DecodeError};
pub use unit::{SourceAtomics, SourceHandle, SourceId, SourceUnit, SourceVoice};

#[cfg(test)]
pub(crate) use controller::tests as fake_graph;
#[cfg(test)]
pub(crate) use decode::tests as fixtures;
