use super::fade::{clamp_level, FadePlan};
use crate::config::{EngineConfig, ShutdownPolicy};
use crate::consensus::{ConsensusDecision, ContentLabel};
use crate::log_debug;
use anyhow::{bail, Result};
use serde::Serialize;

/// Writes levels to the real audio device.
///
/// Every level change funnels through this trait, so tests and offline
/// runs can substitute a fake without touching the rest of the pipeline.
pub trait AudioEndpoint {
    fn volume(&mut self) -> Result<f32>;
    fn set_volume(&mut self, level: f32) -> Result<()>;
    fn name(&self) -> &'static str {
        "unknown_endpoint"
    }
}

/// Tuning for the volume state machine.
#[derive(Debug, Clone)]
pub struct VolumeConfig {
    pub fade_duration_ms: u64,
    pub decision_threshold: f32,
    pub attenuation_fraction: f32,
    pub duck_floor: f32,
    pub noise_threshold: f32,
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: crate::config::DEFAULT_FADE_DURATION_MS,
            decision_threshold: crate::config::DEFAULT_DECISION_THRESHOLD,
            attenuation_fraction: crate::config::DEFAULT_ATTENUATION_FRACTION,
            duck_floor: crate::config::DEFAULT_DUCK_FLOOR,
            noise_threshold: crate::config::DEFAULT_NOISE_THRESHOLD,
            shutdown_policy: ShutdownPolicy::FinishFade,
        }
    }
}

impl From<&EngineConfig> for VolumeConfig {
    fn from(cfg: &EngineConfig) -> Self {
        Self {
            fade_duration_ms: cfg.fade_duration_ms,
            decision_threshold: cfg.decision_threshold,
            attenuation_fraction: cfg.attenuation_fraction,
            duck_floor: cfg.duck_floor,
            noise_threshold: cfg.noise_threshold,
            shutdown_policy: cfg.shutdown_policy,
        }
    }
}

/// What the controller is doing right now.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ControlMode {
    /// No consensus acted on yet.
    Idle,
    /// Fade in flight toward a higher level.
    FadingUp,
    /// Fade in flight toward a lower level.
    FadingDown,
    /// Fade complete; sitting at its target.
    Holding,
}

impl ControlMode {
    pub fn label(self) -> &'static str {
        match self {
            ControlMode::Idle => "idle",
            ControlMode::FadingUp => "fading_up",
            ControlMode::FadingDown => "fading_down",
            ControlMode::Holding => "holding",
        }
    }

    pub fn is_fading(self) -> bool {
        matches!(self, ControlMode::FadingUp | ControlMode::FadingDown)
    }
}

/// Read-only view of the controller for snapshot publishing.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolumeSummary {
    pub mode: ControlMode,
    pub current_level: f32,
    pub preferred_level: f32,
    pub fade_target: Option<f32>,
    pub device_errors: u64,
}

/// Drives the audio device toward the level each consensus decision asks
/// for, without fighting the user.
///
/// Preference learning is deliberately narrow: only a user change observed
/// while Holding or Idle with target content active updates
/// `preferred_level`. Readings taken mid-fade are the controller's own
/// writes echoing back and are ignored.
pub struct VolumeController {
    cfg: VolumeConfig,
    mode: ControlMode,
    current_level: f32,
    preferred_level: f32,
    startup_level: f32,
    fade: Option<FadePlan>,
    active_label: Option<ContentLabel>,
    device_errors: u64,
}

impl VolumeController {
    /// Build a controller, reading the device's starting level. That level
    /// doubles as the initial preference when none was persisted.
    pub fn new(
        cfg: VolumeConfig,
        endpoint: &mut dyn AudioEndpoint,
        stored_preference: Option<f32>,
    ) -> Result<Self> {
        if cfg.fade_duration_ms == 0 {
            bail!("fade duration must be at least 1 ms, got 0");
        }
        if !(0.0..=1.0).contains(&cfg.decision_threshold) {
            bail!(
                "decision threshold must be between 0.0 and 1.0, got {}",
                cfg.decision_threshold
            );
        }
        if !(0.0..=1.0).contains(&cfg.attenuation_fraction) {
            bail!(
                "attenuation fraction must be between 0.0 and 1.0, got {}",
                cfg.attenuation_fraction
            );
        }
        if !(0.0..=1.0).contains(&cfg.duck_floor) {
            bail!(
                "duck floor must be between 0.0 and 1.0, got {}",
                cfg.duck_floor
            );
        }
        if !(0.0..=1.0).contains(&cfg.noise_threshold) {
            bail!(
                "noise threshold must be between 0.0 and 1.0, got {}",
                cfg.noise_threshold
            );
        }

        let mut device_errors = 0u64;
        let startup_level = match endpoint.volume() {
            Ok(level) => clamp_level(level),
            Err(err) => {
                device_errors += 1;
                log_debug(&format!(
                    "startup volume read failed on {}: {err:#}",
                    endpoint.name()
                ));
                0.5
            }
        };
        let preferred_level = stored_preference.map(clamp_level).unwrap_or(startup_level);

        Ok(Self {
            cfg,
            mode: ControlMode::Idle,
            current_level: startup_level,
            preferred_level,
            startup_level,
            fade: None,
            active_label: None,
            device_errors,
        })
    }

    /// React to a consensus decision. Weak decisions change nothing;
    /// strong ones schedule a fade toward the level its label asks for.
    pub fn on_consensus(&mut self, decision: &ConsensusDecision<ContentLabel>, now_ms: u64) {
        if decision.score < self.cfg.decision_threshold {
            return;
        }
        self.active_label = Some(decision.label);
        let desired = self.desired_level(decision.label);
        self.steer_toward(desired, now_ms);
    }

    /// Advance an in-flight fade and push the interpolated level to the
    /// device. A failed write keeps the plan; the next tick computes from
    /// the clock, not from the failed level.
    pub fn tick(&mut self, endpoint: &mut dyn AudioEndpoint, now_ms: u64) {
        let Some(fade) = self.fade else {
            return;
        };
        let level = fade.level_at(now_ms);
        match endpoint.set_volume(level) {
            Ok(()) => {
                self.current_level = level;
                if fade.finished(now_ms) {
                    // Holding only once the terminal level is on the device.
                    self.fade = None;
                    self.mode = ControlMode::Holding;
                }
            }
            Err(err) => {
                self.device_errors += 1;
                log_debug(&format!(
                    "volume set to {level:.3} failed on {}: {err:#}",
                    endpoint.name()
                ));
            }
        }
    }

    /// Fold in a polled device level. User adjustments move the current
    /// level; they also move the preference, but only while target content
    /// is active and no fade is running.
    pub fn observe_external_level(&mut self, observed: f32) {
        if self.mode.is_fading() {
            return;
        }
        let observed = clamp_level(observed);
        if (observed - self.current_level).abs() <= self.cfg.noise_threshold {
            return;
        }
        self.current_level = observed;
        if self.active_label == Some(ContentLabel::Target) {
            self.preferred_level = observed;
        }
    }

    /// Wind down per the configured shutdown policy.
    pub fn shutdown(&mut self, endpoint: &mut dyn AudioEndpoint) {
        let final_level = match self.cfg.shutdown_policy {
            ShutdownPolicy::FinishFade => self.fade.map(|fade| fade.target_level),
            ShutdownPolicy::HaltAtCurrent => None,
            ShutdownPolicy::RestoreStartup => Some(self.startup_level),
        };
        self.fade = None;
        if let Some(level) = final_level {
            match endpoint.set_volume(level) {
                Ok(()) => self.current_level = level,
                Err(err) => {
                    self.device_errors += 1;
                    log_debug(&format!(
                        "shutdown volume set to {level:.3} failed on {}: {err:#}",
                        endpoint.name()
                    ));
                }
            }
        }
        self.mode = ControlMode::Idle;
    }

    pub fn summary(&self) -> VolumeSummary {
        VolumeSummary {
            mode: self.mode,
            current_level: self.current_level,
            preferred_level: self.preferred_level,
            fade_target: self.fade.map(|fade| fade.target_level),
            device_errors: self.device_errors,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.mode
    }

    pub fn current_level(&self) -> f32 {
        self.current_level
    }

    pub fn preferred_level(&self) -> f32 {
        self.preferred_level
    }

    pub fn active_label(&self) -> Option<ContentLabel> {
        self.active_label
    }

    pub fn device_errors(&self) -> u64 {
        self.device_errors
    }

    /// Count a device failure hit by a collaborator, such as a failed
    /// level poll, so every device fault lands in one total.
    pub fn note_device_error(&mut self) {
        self.device_errors += 1;
    }

    fn desired_level(&self, label: ContentLabel) -> f32 {
        match label {
            ContentLabel::Target => self.preferred_level,
            ContentLabel::Other => {
                let ducked = self.preferred_level * (1.0 - self.cfg.attenuation_fraction);
                let floor = self.preferred_level * self.cfg.duck_floor;
                clamp_level(ducked.max(floor))
            }
        }
    }

    fn steer_toward(&mut self, desired: f32, now_ms: u64) {
        if let Some(fade) = self.fade {
            // Re-triggering the fade already in flight is a no-op.
            if levels_equal(fade.target_level, desired) {
                return;
            }
            // New target mid-fade: redirect from the interpolated level so
            // the output never jumps.
            let from = fade.level_at(now_ms);
            self.current_level = from;
            self.begin_fade(from, desired, now_ms);
            return;
        }
        if levels_equal(self.current_level, desired) {
            self.mode = ControlMode::Holding;
            return;
        }
        self.begin_fade(self.current_level, desired, now_ms);
    }

    fn begin_fade(&mut self, from: f32, to: f32, now_ms: u64) {
        self.fade = Some(FadePlan::new(from, to, now_ms, self.cfg.fade_duration_ms));
        // Direction names the level's motion, not the content class, so a
        // restore still counts as FadingDown when the user parked the
        // volume above the preference.
        self.mode = if to > from {
            ControlMode::FadingUp
        } else {
            ControlMode::FadingDown
        };
    }
}

fn levels_equal(a: f32, b: f32) -> bool {
    (a - b).abs() < 1e-6
}
