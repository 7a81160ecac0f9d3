/// One in-flight fade between two levels.
///
/// Interpolation is a pure function of `now_ms`, so a missed timer tick
/// costs smoothness, never correctness.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadePlan {
    pub start_level: f32,
    pub target_level: f32,
    pub started_at_ms: u64,
    pub duration_ms: u64,
}

impl FadePlan {
    pub fn new(start_level: f32, target_level: f32, started_at_ms: u64, duration_ms: u64) -> Self {
        Self {
            start_level: clamp_level(start_level),
            target_level: clamp_level(target_level),
            started_at_ms,
            duration_ms,
        }
    }

    /// Linearly interpolated level at `now_ms`, clamped to the fade span.
    pub fn level_at(&self, now_ms: u64) -> f32 {
        let elapsed = now_ms.saturating_sub(self.started_at_ms);
        if elapsed >= self.duration_ms {
            return self.target_level;
        }
        let fraction = elapsed as f32 / self.duration_ms as f32;
        self.start_level + (self.target_level - self.start_level) * fraction
    }

    pub fn finished(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.started_at_ms) >= self.duration_ms
    }
}

/// Clamp a level into the device's [0, 1] domain.
pub(crate) fn clamp_level(level: f32) -> f32 {
    if level.is_finite() {
        level.clamp(0.0, 1.0)
    } else {
        0.0
    }
}
