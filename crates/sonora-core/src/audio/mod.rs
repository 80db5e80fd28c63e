//! Audio output for sonora
//!
//! The signal graph is rendered by whichever backend the engine is given:
//!
//! - **CpalBackend**: hardware output through cpal; the stream callback owns
//!   the `GraphRenderer` exclusively
//! - **OfflineBackend**: renders on demand from the calling thread
//!
//! Both are opened only after the `ActivationGate` has seen a user gesture.

mod backend;
mod config;
mod cpal_backend;
mod device;
mod error;
mod offline;

pub use backend::{ActivationGate, AudioBackend, OutputStream, StreamSpec};
pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
pub use cpal_backend::CpalBackend;
pub use device::{get_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
pub use offline::{OfflineBackend, OfflineOutput};
