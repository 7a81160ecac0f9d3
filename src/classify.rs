//! Classifier seam between the capture loop and the consensus engine.
//!
//! Real deployments plug an external model in behind [`FrameClassifier`].
//! The crate ships a scripted replay classifier for offline runs and a
//! luminance-band heuristic so the pipeline works end to end without one.

use crate::consensus::ContentLabel;
use crate::scene::Frame;
use anyhow::{bail, Result};

/// One classifier verdict for a single frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Classification {
    pub label: ContentLabel,
    pub confidence: f32,
}

/// Produces a content label for each frame it is shown.
///
/// `classify` takes `&mut self` so stateful model backends do not need
/// interior mutability. Errors mean "no verdict this frame"; the caller
/// skips the sample and keeps going.
pub trait FrameClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<Classification>;
    fn reset(&mut self) {}
    fn name(&self) -> &'static str {
        "unknown_classifier"
    }
}

/// Replays a predetermined verdict sequence, repeating the final entry
/// once the script runs out. Deterministic input for offline runs.
#[derive(Debug, Clone)]
pub struct ScriptedClassifier {
    script: Vec<Classification>,
    cursor: usize,
}

impl ScriptedClassifier {
    pub fn new(script: Vec<Classification>) -> Result<Self> {
        if script.is_empty() {
            bail!("scripted classifier needs at least one entry");
        }
        Ok(Self { script, cursor: 0 })
    }
}

impl FrameClassifier for ScriptedClassifier {
    fn classify(&mut self, _frame: &Frame) -> Result<Classification> {
        let verdict = self.script[self.cursor];
        if self.cursor + 1 < self.script.len() {
            self.cursor += 1;
        }
        Ok(verdict)
    }

    fn reset(&mut self) {
        self.cursor = 0;
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Cheap heuristic that calls a frame Target when its mean luminance falls
/// inside a configured band. Confidence peaks at the band center, drops to
/// 0.5 at the edges, and recovers toward 1.0 as the mean leaves the band
/// well behind.
#[derive(Debug, Clone)]
pub struct LumaBandClassifier {
    band_low: f32,
    band_high: f32,
}

impl LumaBandClassifier {
    pub fn new(band_low: f32, band_high: f32) -> Result<Self> {
        if !(0.0..=255.0).contains(&band_low)
            || !(0.0..=255.0).contains(&band_high)
            || band_low >= band_high
        {
            bail!("luma band must satisfy 0 <= low < high <= 255, got {band_low}..{band_high}");
        }
        Ok(Self {
            band_low,
            band_high,
        })
    }
}

impl FrameClassifier for LumaBandClassifier {
    fn classify(&mut self, frame: &Frame) -> Result<Classification> {
        let center = (self.band_low + self.band_high) / 2.0;
        let half_width = (self.band_high - self.band_low) / 2.0;
        // 0 at the band center, 1 at either edge, >1 outside.
        let distance = (frame.mean_luma() - center).abs() / half_width;
        let (label, confidence) = if distance <= 1.0 {
            (ContentLabel::Target, 1.0 - 0.5 * distance)
        } else {
            (ContentLabel::Other, (0.5 + 0.5 * (distance - 1.0)).min(1.0))
        };
        Ok(Classification { label, confidence })
    }

    fn name(&self) -> &'static str {
        "luma_band"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(level: u8) -> Frame {
        Frame::solid(16, 16, level).expect("valid frame")
    }

    #[test]
    fn scripted_replays_then_repeats_last_entry() {
        let mut classifier = ScriptedClassifier::new(vec![
            Classification {
                label: ContentLabel::Target,
                confidence: 0.9,
            },
            Classification {
                label: ContentLabel::Other,
                confidence: 0.2,
            },
        ])
        .expect("non-empty script");

        let first = classifier.classify(&frame(0)).expect("verdict");
        assert_eq!(first.label, ContentLabel::Target);
        let second = classifier.classify(&frame(0)).expect("verdict");
        assert_eq!(second.label, ContentLabel::Other);
        let third = classifier.classify(&frame(0)).expect("verdict");
        assert_eq!(third, second);

        classifier.reset();
        let again = classifier.classify(&frame(0)).expect("verdict");
        assert_eq!(again, first);
    }

    #[test]
    fn scripted_rejects_empty_script() {
        assert!(ScriptedClassifier::new(Vec::new()).is_err());
    }

    #[test]
    fn luma_band_center_is_confident_target() {
        let mut classifier = LumaBandClassifier::new(90.0, 170.0).expect("valid band");
        let verdict = classifier.classify(&frame(130)).expect("verdict");
        assert_eq!(verdict.label, ContentLabel::Target);
        assert!((verdict.confidence - 1.0).abs() < 1e-3);
    }

    #[test]
    fn luma_band_edge_is_uncertain() {
        let mut classifier = LumaBandClassifier::new(90.0, 170.0).expect("valid band");
        let verdict = classifier.classify(&frame(170)).expect("verdict");
        assert_eq!(verdict.label, ContentLabel::Target);
        assert!((verdict.confidence - 0.5).abs() < 1e-2);
    }

    #[test]
    fn luma_band_far_outside_is_confident_other() {
        let mut classifier = LumaBandClassifier::new(90.0, 170.0).expect("valid band");
        let verdict = classifier.classify(&frame(255)).expect("verdict");
        assert_eq!(verdict.label, ContentLabel::Other);
        assert!((verdict.confidence - 1.0).abs() < 1e-6);
    }

    #[test]
    fn luma_band_rejects_bad_bounds() {
        assert!(LumaBandClassifier::new(170.0, 90.0).is_err());
        assert!(LumaBandClassifier::new(-1.0, 90.0).is_err());
        assert!(LumaBandClassifier::new(90.0, 256.0).is_err());
        assert!(LumaBandClassifier::new(90.0, 90.0).is_err());
    }

    #[test]
    fn classifier_names_are_stable() {
        let scripted = ScriptedClassifier::new(vec![Classification {
            label: ContentLabel::Target,
            confidence: 1.0,
        }])
        .expect("non-empty script");
        assert_eq!(scripted.name(), "scripted");
        let band = LumaBandClassifier::new(90.0, 170.0).expect("valid band");
        assert_eq!(band.name(), "luma_band");
    }
}
