use super::defaults::{
    MAX_CONFIDENCE_EXPONENT, MAX_FADE_DURATION_MS, MAX_FRAME_CHANNEL_CAPACITY, MAX_HISTORY_SIZE,
    MAX_INTERVAL_MS, MAX_RECENCY_HALF_LIFE_MS, MAX_TICK_INTERVAL_MS, MAX_WINDOW_SIZE,
    MIN_TICK_INTERVAL_MS,
};
use super::{AppConfig, EngineConfig};
use anyhow::{bail, Context, Result};
use clap::Parser;

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values and normalize the preference path. Invalid values
    /// are rejected, never clamped.
    pub fn validate(&mut self) -> Result<()> {
        if !(1..=MAX_WINDOW_SIZE).contains(&self.window_size) {
            bail!(
                "--window-size must be between 1 and {MAX_WINDOW_SIZE}, got {}",
                self.window_size
            );
        }
        if !(1.0..=MAX_CONFIDENCE_EXPONENT).contains(&self.confidence_exponent) {
            bail!(
                "--confidence-exponent must be between 1.0 and {MAX_CONFIDENCE_EXPONENT}, got {}",
                self.confidence_exponent
            );
        }
        if self.recency_half_life_ms == 0 || self.recency_half_life_ms > MAX_RECENCY_HALF_LIFE_MS {
            bail!(
                "--recency-half-life-ms must be between 1 and {MAX_RECENCY_HALF_LIFE_MS} ms, got {}",
                self.recency_half_life_ms
            );
        }
        if !(0.0..=1.0).contains(&self.decision_threshold) {
            bail!(
                "--decision-threshold must be between 0.0 and 1.0, got {}",
                self.decision_threshold
            );
        }
        if !(0.0..=1.0).contains(&self.trend_epsilon) {
            bail!(
                "--trend-epsilon must be between 0.0 and 1.0, got {}",
                self.trend_epsilon
            );
        }
        if self.fade_duration_ms == 0 || self.fade_duration_ms > MAX_FADE_DURATION_MS {
            bail!(
                "--fade-duration-ms must be between 1 and {MAX_FADE_DURATION_MS} ms, got {}",
                self.fade_duration_ms
            );
        }
        if !(0.0..=1.0).contains(&self.attenuation_fraction) {
            bail!(
                "--attenuation-fraction must be between 0.0 and 1.0, got {}",
                self.attenuation_fraction
            );
        }
        if !(0.0..=1.0).contains(&self.duck_floor) {
            bail!(
                "--duck-floor must be between 0.0 and 1.0, got {}",
                self.duck_floor
            );
        }
        if !(0.0..=1.0).contains(&self.scene_sensitivity) {
            bail!(
                "--scene-sensitivity must be between 0.0 and 1.0, got {}",
                self.scene_sensitivity
            );
        }
        if self.capture_interval_ms == 0 || self.capture_interval_ms > MAX_INTERVAL_MS {
            bail!(
                "--capture-interval-ms must be between 1 and {MAX_INTERVAL_MS} ms, got {}",
                self.capture_interval_ms
            );
        }
        if !(MIN_TICK_INTERVAL_MS..=MAX_TICK_INTERVAL_MS).contains(&self.tick_interval_ms) {
            bail!(
                "--tick-interval-ms must be between {MIN_TICK_INTERVAL_MS} and {MAX_TICK_INTERVAL_MS} ms, got {}",
                self.tick_interval_ms
            );
        }
        if self.volume_poll_ms == 0 || self.volume_poll_ms > MAX_INTERVAL_MS {
            bail!(
                "--volume-poll-ms must be between 1 and {MAX_INTERVAL_MS} ms, got {}",
                self.volume_poll_ms
            );
        }
        if !(0.0..=1.0).contains(&self.noise_threshold) {
            bail!(
                "--noise-threshold must be between 0.0 and 1.0, got {}",
                self.noise_threshold
            );
        }
        if !(1..=MAX_HISTORY_SIZE).contains(&self.history_size) {
            bail!(
                "--history-size must be between 1 and {MAX_HISTORY_SIZE}, got {}",
                self.history_size
            );
        }
        if !(1..=MAX_FRAME_CHANNEL_CAPACITY).contains(&self.frame_channel_capacity) {
            bail!(
                "--frame-channel-capacity must be between 1 and {MAX_FRAME_CHANNEL_CAPACITY}, got {}",
                self.frame_channel_capacity
            );
        }

        if let Some(path) = &mut self.prefs_file {
            if path.is_dir() {
                bail!(
                    "--prefs-file '{}' is a directory, expected a file path",
                    path.display()
                );
            }
            // Store an absolute path so background threads agree on it.
            if path.exists() {
                *path = path.canonicalize().with_context(|| {
                    format!("failed to canonicalize prefs file '{}'", path.display())
                })?;
            }
        }

        Ok(())
    }

    /// Snapshot the current CLI-controlled engine settings for downstream
    /// consumers.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            window_size: self.window_size,
            confidence_exponent: self.confidence_exponent,
            recency_half_life_ms: self.recency_half_life_ms,
            decision_threshold: self.decision_threshold,
            trend_epsilon: self.trend_epsilon,
            fade_duration_ms: self.fade_duration_ms,
            attenuation_fraction: self.attenuation_fraction,
            duck_floor: self.duck_floor,
            scene_sensitivity: self.scene_sensitivity,
            capture_interval_ms: self.capture_interval_ms,
            tick_interval_ms: self.tick_interval_ms,
            volume_poll_ms: self.volume_poll_ms,
            noise_threshold: self.noise_threshold,
            history_size: self.history_size,
            frame_channel_capacity: self.frame_channel_capacity,
            shutdown_policy: self.shutdown_policy,
        }
    }
}
