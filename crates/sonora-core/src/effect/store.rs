//! Snapshot store for the desired effect parameters

use std::sync::Arc;

use arc_swap::ArcSwap;

use super::{EffectPath, EffectsState};
use crate::engine::EngineError;

/// Current desired value of every effect parameter
///
/// Updates copy the current snapshot, change one field and swap the whole
/// state in, so a reader always sees a complete `EffectsState`. Values are
/// stored as given; the engine clamps them when publishing to the renderer.
pub struct EffectParameterStore {
    current: ArcSwap<EffectsState>,
}

impl EffectParameterStore {
    pub fn new(initial: EffectsState) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    pub fn get(&self) -> Arc<EffectsState> {
        self.current.load_full()
    }

    /// Set one parameter by its dotted path
    pub fn set(&self, path: &str, value: f32) -> Result<Arc<EffectsState>, EngineError> {
        let path: EffectPath = path.parse()?;
        Ok(self.set_path(path, value))
    }

    /// Returns the snapshot this call installed, even if another writer has
    /// replaced it since
    pub fn set_path(&self, path: EffectPath, value: f32) -> Arc<EffectsState> {
        let mut written = None;
        let previous = self.current.rcu(|current| {
            let mut next = EffectsState::clone(current);
            path.apply(&mut next, value);
            let next = Arc::new(next);
            written = Some(next.clone());
            next
        });
        log::debug!("effect {} = {}", path, value);
        // rcu runs the closure at least once
        written.unwrap_or(previous)
    }

    /// Restore every parameter to its default
    pub fn reset(&self) -> Arc<EffectsState> {
        self.replace(EffectsState::default())
    }

    pub fn replace(&self, state: EffectsState) -> Arc<EffectsState> {
        let state = Arc::new(state);
        self.current.store(state.clone());
        state
    }
}

impl Default for EffectParameterStore {
    fn default() -> Self {
        Self::new(EffectsState::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_writer_wins() {
        let store = EffectParameterStore::default();
        store.set("eqBands.0.gain", -6.0).unwrap();
        store.set("eqBands.0.gain", -3.0).unwrap();
        assert_eq!(store.get().eq_bands[0].gain_db, -3.0);
    }

    #[test]
    fn test_store_keeps_raw_values() {
        let store = EffectParameterStore::default();
        let state = store.set("delay.feedback", 1.5).unwrap();
        assert_eq!(state.delay.feedback, 1.5);
    }

    #[test]
    fn test_unknown_path_leaves_store_unchanged() {
        let store = EffectParameterStore::default();
        store.set("reverb.mix", 0.4).unwrap();
        let before = store.get();

        let err = store.set("reverb.size", 0.9).unwrap_err();
        assert!(matches!(err, EngineError::InvalidParameter(_)));
        assert_eq!(*store.get(), *before);
    }

    #[test]
    fn test_snapshots_are_immutable() {
        let store = EffectParameterStore::default();
        let old = store.get();
        store.set("pitch", 1.5).unwrap();
        assert_eq!(old.pitch, 1.0);
        assert_eq!(store.get().pitch, 1.5);
    }

    #[test]
    fn test_reset_and_replace() {
        let store = EffectParameterStore::default();
        let mut custom = EffectsState::default();
        custom.delay.mix = 0.7;
        store.replace(custom.clone());
        assert_eq!(*store.get(), custom);

        store.reset();
        assert_eq!(*store.get(), EffectsState::default());
    }

    #[test]
    fn test_set_returns_its_own_write() {
        let store = Arc::new(EffectParameterStore::default());
        let handles: Vec<_> = (0..4)
            .map(|writer| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..500 {
                        let value = (writer * 1000 + i) as f32;
                        let written = store.set_path(EffectPath::DelayMix, value);
                        assert_eq!(written.delay.mix, value);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_concurrent_writers_touch_separate_fields() {
        let store = Arc::new(EffectParameterStore::default());
        let handles: Vec<_> = (0..4)
            .map(|band_or_delay| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..200 {
                        let value = i as f32;
                        match band_or_delay {
                            0..=2 => store.set_path(EffectPath::EqGain(band_or_delay), value),
                            _ => store.set_path(EffectPath::DelayTime, value),
                        };
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = store.get();
        for band in &state.eq_bands {
            assert_eq!(band.gain_db, 199.0);
        }
        assert_eq!(state.delay.time_seconds, 199.0);
    }
}
