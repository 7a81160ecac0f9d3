//! Temporal consensus over noisy per-frame classifications.
//!
//! Individual frames lie: transitions, overlays, and compression artifacts
//! all produce spurious labels. A bounded window of recent samples votes,
//! weighted by confidence and recency, so the published decision only moves
//! when the evidence does.

mod engine;
mod sample;
#[cfg(test)]
mod tests;
mod window;

pub use engine::{ConsensusConfig, ConsensusEngine};
pub use sample::{ClassificationSample, ConsensusDecision, ContentLabel, Trend};
pub use window::ConsensusWindow;
