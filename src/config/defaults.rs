//! Default values for the CLI flags, kept in one place so the flag
//! definitions, validation bounds, and tests stay in sync.

/// Samples retained by the consensus window.
pub const DEFAULT_WINDOW_SIZE: usize = 12;

/// Exponent applied to sample confidence when weighting votes.
pub const DEFAULT_CONFIDENCE_EXPONENT: f32 = 2.0;

/// Half-life of a sample's voting influence (milliseconds).
pub const DEFAULT_RECENCY_HALF_LIFE_MS: u64 = 2_500;

/// Minimum winning score before the volume controller reacts.
pub const DEFAULT_DECISION_THRESHOLD: f32 = 0.6;

/// Dead zone when comparing successive scores for the trend readout.
pub const DEFAULT_TREND_EPSILON: f32 = 0.02;

/// Duration of one volume fade (milliseconds).
pub const DEFAULT_FADE_DURATION_MS: u64 = 1_000;

/// Fraction removed from the preferred level while non-target content plays.
pub const DEFAULT_ATTENUATION_FRACTION: f32 = 0.8;

/// Floor for the ducked level, as a fraction of the preferred level.
pub const DEFAULT_DUCK_FLOOR: f32 = 0.1;

/// Scene-change sensitivity (normalized mean frame difference).
pub const DEFAULT_SCENE_SENSITIVITY: f32 = 0.12;

/// Spacing between capture cycles (milliseconds).
pub const DEFAULT_CAPTURE_INTERVAL_MS: u64 = 500;

/// Spacing between fade timer ticks (milliseconds).
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 33;

/// Spacing between external volume polls (milliseconds).
pub const DEFAULT_VOLUME_POLL_MS: u64 = 500;

/// Smallest observed level change treated as a user adjustment.
pub const DEFAULT_NOISE_THRESHOLD: f32 = 0.01;

/// Decisions retained in the published history ring.
pub const DEFAULT_HISTORY_SIZE: usize = 60;

/// Frame channel capacity between the source and the detection loop.
pub const DEFAULT_FRAME_CHANNEL_CAPACITY: usize = 8;

pub(super) const MAX_WINDOW_SIZE: usize = 256;
pub(super) const MAX_CONFIDENCE_EXPONENT: f32 = 8.0;
pub(super) const MAX_RECENCY_HALF_LIFE_MS: u64 = 600_000;
pub(super) const MAX_FADE_DURATION_MS: u64 = 60_000;
pub(super) const MAX_INTERVAL_MS: u64 = 60_000;
pub(super) const MIN_TICK_INTERVAL_MS: u64 = 1;
pub(super) const MAX_TICK_INTERVAL_MS: u64 = 1_000;
pub(super) const MAX_HISTORY_SIZE: usize = 4_096;
pub(super) const MAX_FRAME_CHANNEL_CAPACITY: usize = 256;
