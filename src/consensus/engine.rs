use super::sample::{ClassificationSample, ConsensusDecision, Trend};
use super::window::ConsensusWindow;
use crate::config::EngineConfig;
use anyhow::{bail, Result};

/// Tuning for the consensus vote.
#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub window_size: usize,
    pub confidence_exponent: f32,
    pub recency_half_life_ms: u64,
    pub trend_epsilon: f32,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            window_size: crate::config::DEFAULT_WINDOW_SIZE,
            confidence_exponent: crate::config::DEFAULT_CONFIDENCE_EXPONENT,
            recency_half_life_ms: crate::config::DEFAULT_RECENCY_HALF_LIFE_MS,
            trend_epsilon: crate::config::DEFAULT_TREND_EPSILON,
        }
    }
}

impl From<&EngineConfig> for ConsensusConfig {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            window_size: cfg.window_size,
            confidence_exponent: cfg.confidence_exponent,
            recency_half_life_ms: cfg.recency_half_life_ms,
            trend_epsilon: cfg.trend_epsilon,
        }
    }
}

/// Turns a stream of noisy classification samples into stable decisions.
///
/// Every sample in the window casts a vote weighted by
/// `confidence ^ exponent` times an exponential recency decay. The
/// superlinear confidence term lets one near-certain frame outvote several
/// uncertain opposites; the decay stops stale frames from pinning the
/// decision after the content really changes. Exact score ties go to the
/// previous winner so the decision does not flap.
pub struct ConsensusEngine<L> {
    window: ConsensusWindow<L>,
    config: ConsensusConfig,
    previous: Option<ConsensusDecision<L>>,
}

impl<L: Copy + Eq> ConsensusEngine<L> {
    pub fn new(config: ConsensusConfig) -> Result<Self> {
        if config.window_size == 0 {
            bail!("consensus window size must be at least 1, got 0");
        }
        if !config.confidence_exponent.is_finite() || config.confidence_exponent < 1.0 {
            bail!(
                "confidence exponent must be >= 1.0, got {}",
                config.confidence_exponent
            );
        }
        if config.recency_half_life_ms == 0 {
            bail!("recency half-life must be at least 1 ms, got 0");
        }
        if !(0.0..=1.0).contains(&config.trend_epsilon) {
            bail!(
                "trend epsilon must be between 0.0 and 1.0, got {}",
                config.trend_epsilon
            );
        }
        Ok(Self {
            window: ConsensusWindow::new(config.window_size),
            config,
            previous: None,
        })
    }

    /// Append a sample and recompute the decision.
    pub fn submit(&mut self, sample: ClassificationSample<L>) -> ConsensusDecision<L> {
        let now_ms = sample.at_ms;
        self.window.push(sample);
        self.decide(now_ms)
    }

    /// Recompute from the current window without adding a sample.
    ///
    /// Returns `None` when the window is empty; callers surface that as an
    /// explicit unknown state rather than inventing a label.
    pub fn reevaluate(&mut self, now_ms: u64) -> Option<ConsensusDecision<L>> {
        if self.window.is_empty() {
            return None;
        }
        Some(self.decide(now_ms))
    }

    pub fn last_decision(&self) -> Option<&ConsensusDecision<L>> {
        self.previous.as_ref()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    /// Forget all samples and the previous decision.
    pub fn reset(&mut self) {
        self.window.clear();
        self.previous = None;
    }

    // Callers guarantee a non-empty window.
    fn decide(&mut self, now_ms: u64) -> ConsensusDecision<L> {
        // First-seen order keeps the tally walk deterministic.
        let mut tally: Vec<(L, f32)> = Vec::new();
        let mut total = 0.0f32;
        for sample in self.window.iter() {
            let weight = self.vote_weight(sample, now_ms);
            total += weight;
            match tally.iter_mut().find(|entry| entry.0 == sample.label) {
                Some(entry) => entry.1 += weight,
                None => tally.push((sample.label, weight)),
            }
        }

        let previous_label = self.previous.map(|d| d.label);
        // Non-empty window means at least one tally entry.
        let (mut label, mut winning_sum) = tally[0];
        for &(candidate, sum) in &tally[1..] {
            if sum > winning_sum || (sum == winning_sum && Some(candidate) == previous_label) {
                label = candidate;
                winning_sum = sum;
            }
        }

        let score = if total > 0.0 {
            (winning_sum / total).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let trend = match &self.previous {
            Some(prev) if prev.label == label => {
                let delta = score - prev.score;
                if delta > self.config.trend_epsilon {
                    Trend::Rising
                } else if delta < -self.config.trend_epsilon {
                    Trend::Falling
                } else {
                    Trend::Stable
                }
            }
            // A new winner has no earlier score to compare against.
            _ => Trend::Stable,
        };

        let decision = ConsensusDecision {
            label,
            score,
            trend,
            at_ms: now_ms,
        };
        self.previous = Some(decision);
        decision
    }

    fn vote_weight(&self, sample: &ClassificationSample<L>, now_ms: u64) -> f32 {
        let confidence = sample.confidence.clamp(0.0, 1.0);
        let conf_weight = confidence.powf(self.config.confidence_exponent);
        let age_ms = now_ms.saturating_sub(sample.at_ms);
        let half_lives = age_ms as f32 / self.config.recency_half_life_ms as f32;
        conf_weight * 0.5f32.powf(half_lives)
    }
}
