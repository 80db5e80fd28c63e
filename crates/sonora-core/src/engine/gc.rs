//! Deferred deallocation for decoded audio
//!
//! Decoded tracks are wrapped in `basedrop::Shared`. When the renderer drops
//! the last reference (a source being disconnected), the buffer is only
//! enqueued; a background collector thread frees it later, so the audio
//! thread never calls into the allocator for large frees.
//!
//! ```ignore
//! use basedrop::Shared;
//! use sonora_core::engine::gc_handle;
//!
//! let buffer = Shared::new(&gc_handle(), decoded);
//! ```

use basedrop::{Collector, Handle};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::Duration;

/// Process-wide handle; the Collector itself lives on the GC thread
static GC_HANDLE: OnceLock<Handle> = OnceLock::new();

fn init_gc() -> Handle {
    let (tx, rx) = mpsc::channel();

    thread::Builder::new()
        .name("sonora-gc".to_string())
        .spawn(move || {
            // Collector is !Sync, so it is created on the thread that runs it
            let mut collector = Collector::new();
            tx.send(collector.handle()).expect("GC handle receiver dropped");
            log::info!("Audio GC thread started");

            loop {
                collector.collect();
                thread::sleep(Duration::from_millis(100));
            }
        })
        .expect("Failed to spawn audio GC thread");

    rx.recv().expect("Failed to receive GC handle")
}

/// Handle for creating `Shared<T>` allocations
pub fn gc_handle() -> Handle {
    GC_HANDLE.get_or_init(init_gc).clone()
}
