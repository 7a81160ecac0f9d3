//! Read models shared between the detection loop and its observers.
//!
//! The loop owns all mutable state. Observers only ever see copies
//! published here, so they can render or log without touching the
//! engine's locks mid-decision.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::consensus::{ConsensusDecision, ContentLabel};
use crate::volume::{ControlMode, VolumeSummary};

/// Point-in-time view of the whole engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub decision: Option<ConsensusDecision<ContentLabel>>,
    pub window_len: usize,
    pub volume: VolumeSummary,
    pub frames_seen: u64,
    pub frames_analyzed: u64,
    pub updated_at_ms: u64,
}

impl Default for EngineSnapshot {
    fn default() -> Self {
        Self {
            decision: None,
            window_len: 0,
            volume: VolumeSummary {
                mode: ControlMode::Idle,
                current_level: 0.0,
                preferred_level: 0.0,
                fade_target: None,
                device_errors: 0,
            },
            frames_seen: 0,
            frames_analyzed: 0,
            updated_at_ms: 0,
        }
    }
}

/// Shared handle the pipeline publishes snapshots through. Cloning the
/// hub clones the handle, not the snapshot.
#[derive(Clone, Debug)]
pub struct SnapshotHub {
    inner: Arc<Mutex<EngineSnapshot>>,
}

impl SnapshotHub {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(EngineSnapshot::default())),
        }
    }

    /// Replace the published snapshot wholesale.
    pub fn publish(&self, snapshot: EngineSnapshot) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        *guard = snapshot;
    }

    /// Edit the published snapshot in place. Lets a writer refresh its
    /// own fields without clobbering the rest.
    pub fn update(&self, apply: impl FnOnce(&mut EngineSnapshot)) {
        let mut guard = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        apply(&mut guard);
    }

    /// Copy out the latest snapshot.
    pub fn latest(&self) -> EngineSnapshot {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Lock-free mirror of the current output level for high-rate readers.
#[derive(Clone, Debug)]
pub struct LiveLevel {
    level_bits: Arc<AtomicU32>,
}

impl LiveLevel {
    pub fn new() -> Self {
        Self {
            level_bits: Arc::new(AtomicU32::new(0.0f32.to_bits())),
        }
    }

    pub fn set(&self, level: f32) {
        self.level_bits.store(level.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.level_bits.load(Ordering::Relaxed))
    }
}

impl Default for LiveLevel {
    fn default() -> Self {
        Self::new()
    }
}
