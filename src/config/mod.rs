//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub use defaults::{
    DEFAULT_ATTENUATION_FRACTION, DEFAULT_CAPTURE_INTERVAL_MS, DEFAULT_CONFIDENCE_EXPONENT,
    DEFAULT_DECISION_THRESHOLD, DEFAULT_DUCK_FLOOR, DEFAULT_FADE_DURATION_MS,
    DEFAULT_FRAME_CHANNEL_CAPACITY, DEFAULT_HISTORY_SIZE, DEFAULT_NOISE_THRESHOLD,
    DEFAULT_RECENCY_HALF_LIFE_MS, DEFAULT_SCENE_SENSITIVITY, DEFAULT_TICK_INTERVAL_MS,
    DEFAULT_TREND_EPSILON, DEFAULT_VOLUME_POLL_MS, DEFAULT_WINDOW_SIZE,
};

/// CLI options for the screenduck engine. Validated values keep the
/// consensus and volume stages within their documented domains.
#[derive(Debug, Parser, Clone)]
#[command(about = "Content-aware adaptive volume engine", author, version)]
pub struct AppConfig {
    /// Samples retained by the consensus window
    #[arg(long = "window-size", default_value_t = DEFAULT_WINDOW_SIZE)]
    pub window_size: usize,

    /// Exponent applied to sample confidence when weighting votes
    #[arg(
        long = "confidence-exponent",
        default_value_t = DEFAULT_CONFIDENCE_EXPONENT
    )]
    pub confidence_exponent: f32,

    /// Half-life of a sample's voting influence (milliseconds)
    #[arg(
        long = "recency-half-life-ms",
        default_value_t = DEFAULT_RECENCY_HALF_LIFE_MS
    )]
    pub recency_half_life_ms: u64,

    /// Minimum winning score before the volume controller reacts
    #[arg(long = "decision-threshold", default_value_t = DEFAULT_DECISION_THRESHOLD)]
    pub decision_threshold: f32,

    /// Dead zone when comparing successive scores for the trend readout
    #[arg(long = "trend-epsilon", default_value_t = DEFAULT_TREND_EPSILON)]
    pub trend_epsilon: f32,

    /// Duration of one volume fade (milliseconds)
    #[arg(long = "fade-duration-ms", default_value_t = DEFAULT_FADE_DURATION_MS)]
    pub fade_duration_ms: u64,

    /// Fraction removed from the preferred level while non-target content plays
    #[arg(
        long = "attenuation-fraction",
        default_value_t = DEFAULT_ATTENUATION_FRACTION
    )]
    pub attenuation_fraction: f32,

    /// Floor for the ducked level, as a fraction of the preferred level
    #[arg(long = "duck-floor", default_value_t = DEFAULT_DUCK_FLOOR)]
    pub duck_floor: f32,

    /// Scene-change sensitivity (0 analyzes any change, 1 effectively none)
    #[arg(long = "scene-sensitivity", default_value_t = DEFAULT_SCENE_SENSITIVITY)]
    pub scene_sensitivity: f32,

    /// Spacing between capture cycles (milliseconds)
    #[arg(
        long = "capture-interval-ms",
        default_value_t = DEFAULT_CAPTURE_INTERVAL_MS
    )]
    pub capture_interval_ms: u64,

    /// Spacing between fade timer ticks (milliseconds)
    #[arg(long = "tick-interval-ms", default_value_t = DEFAULT_TICK_INTERVAL_MS)]
    pub tick_interval_ms: u64,

    /// Spacing between external volume polls (milliseconds)
    #[arg(long = "volume-poll-ms", default_value_t = DEFAULT_VOLUME_POLL_MS)]
    pub volume_poll_ms: u64,

    /// Smallest observed level change treated as a user adjustment
    #[arg(long = "noise-threshold", default_value_t = DEFAULT_NOISE_THRESHOLD)]
    pub noise_threshold: f32,

    /// Decisions retained in the published history ring
    #[arg(long = "history-size", default_value_t = DEFAULT_HISTORY_SIZE)]
    pub history_size: usize,

    /// Frame channel capacity between the source and the detection loop
    #[arg(
        long = "frame-channel-capacity",
        default_value_t = DEFAULT_FRAME_CHANNEL_CAPACITY
    )]
    pub frame_channel_capacity: usize,

    /// What the fade timer does with an in-flight fade on shutdown
    #[arg(
        long = "shutdown-policy",
        value_enum,
        default_value_t = ShutdownPolicy::FinishFade
    )]
    pub shutdown_policy: ShutdownPolicy,

    /// Preference file location (JSON)
    #[arg(long = "prefs-file", env = "SCREENDUCK_PREFS")]
    pub prefs_file: Option<PathBuf>,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "SCREENDUCK_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "SCREENDUCK_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Enable verbose timing logs
    #[arg(long)]
    pub log_timings: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            confidence_exponent: DEFAULT_CONFIDENCE_EXPONENT,
            recency_half_life_ms: DEFAULT_RECENCY_HALF_LIFE_MS,
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
            trend_epsilon: DEFAULT_TREND_EPSILON,
            fade_duration_ms: DEFAULT_FADE_DURATION_MS,
            attenuation_fraction: DEFAULT_ATTENUATION_FRACTION,
            duck_floor: DEFAULT_DUCK_FLOOR,
            scene_sensitivity: DEFAULT_SCENE_SENSITIVITY,
            capture_interval_ms: DEFAULT_CAPTURE_INTERVAL_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            volume_poll_ms: DEFAULT_VOLUME_POLL_MS,
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            history_size: DEFAULT_HISTORY_SIZE,
            frame_channel_capacity: DEFAULT_FRAME_CHANNEL_CAPACITY,
            shutdown_policy: ShutdownPolicy::FinishFade,
            prefs_file: None,
            logs: false,
            no_logs: false,
            log_timings: false,
        }
    }
}

/// Tunable parameters for the detection + volume pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub window_size: usize,
    pub confidence_exponent: f32,
    pub recency_half_life_ms: u64,
    pub decision_threshold: f32,
    pub trend_epsilon: f32,
    pub fade_duration_ms: u64,
    pub attenuation_fraction: f32,
    pub duck_floor: f32,
    pub scene_sensitivity: f32,
    pub capture_interval_ms: u64,
    pub tick_interval_ms: u64,
    pub volume_poll_ms: u64,
    pub noise_threshold: f32,
    pub history_size: usize,
    pub frame_channel_capacity: usize,
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            confidence_exponent: DEFAULT_CONFIDENCE_EXPONENT,
            recency_half_life_ms: DEFAULT_RECENCY_HALF_LIFE_MS,
            decision_threshold: DEFAULT_DECISION_THRESHOLD,
            trend_epsilon: DEFAULT_TREND_EPSILON,
            fade_duration_ms: DEFAULT_FADE_DURATION_MS,
            attenuation_fraction: DEFAULT_ATTENUATION_FRACTION,
            duck_floor: DEFAULT_DUCK_FLOOR,
            scene_sensitivity: DEFAULT_SCENE_SENSITIVITY,
            capture_interval_ms: DEFAULT_CAPTURE_INTERVAL_MS,
            tick_interval_ms: DEFAULT_TICK_INTERVAL_MS,
            volume_poll_ms: DEFAULT_VOLUME_POLL_MS,
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            history_size: DEFAULT_HISTORY_SIZE,
            frame_channel_capacity: DEFAULT_FRAME_CHANNEL_CAPACITY,
            shutdown_policy: ShutdownPolicy::FinishFade,
        }
    }
}

/// Behavior of the fade timer when the engine is asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ShutdownPolicy {
    /// Complete an in-flight fade to its terminal target with one final set.
    FinishFade,
    /// Stop immediately, leaving the device at the current level.
    HaltAtCurrent,
    /// Re-issue the level the device had when the controller started.
    RestoreStartup,
}

impl ShutdownPolicy {
    pub fn label(self) -> &'static str {
        match self {
            ShutdownPolicy::FinishFade => "finish-fade",
            ShutdownPolicy::HaltAtCurrent => "halt-at-current",
            ShutdownPolicy::RestoreStartup => "restore-startup",
        }
    }
}
