//! Data model shared by the classification and consensus stages.

use serde::{Deserialize, Serialize};

/// One content class in the binary reference set.
///
/// The consensus engine itself is generic over the label type; this enum is
/// what the shipped classifiers and the volume controller speak.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContentLabel {
    /// Content the user wants at full preferred volume.
    Target,
    /// Everything else (ads, menus, unrelated windows).
    Other,
}

impl ContentLabel {
    pub fn label(self) -> &'static str {
        match self {
            ContentLabel::Target => "target",
            ContentLabel::Other => "other",
        }
    }
}

/// A single classifier verdict stamped with its arrival time.
///
/// `at_ms` is caller-supplied monotonic milliseconds; keeping time as data
/// keeps the consensus math a pure function of its inputs.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClassificationSample<L> {
    pub label: L,
    pub confidence: f32,
    pub at_ms: u64,
}

impl<L> ClassificationSample<L> {
    /// Build a sample, clamping confidence into [0, 1]. Out-of-range values
    /// are upstream data errors; the window must stay usable regardless.
    pub fn new(label: L, confidence: f32, at_ms: u64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            label,
            confidence,
            at_ms,
        }
    }
}

/// Direction of the winning score relative to the previous decision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Rising,
    Falling,
    Stable,
}

impl Trend {
    pub fn label(self) -> &'static str {
        match self {
            Trend::Rising => "rising",
            Trend::Falling => "falling",
            Trend::Stable => "stable",
        }
    }
}

/// Outcome of one consensus evaluation.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ConsensusDecision<L> {
    pub label: L,
    /// Winning label's share of the total vote weight, in [0, 1].
    pub score: f32,
    pub trend: Trend,
    pub at_ms: u64,
}
