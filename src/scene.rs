//! Scene-change gating over the incoming frame stream.
//!
//! Running the classifier on a static screen wastes model time. The gate
//! keeps a coarse digest of the last analyzed frame and lets a new frame
//! through only when the picture has moved enough.

use anyhow::{bail, Result};

/// Side length of the mean-pooled digest grid.
const DIGEST_GRID: usize = 16;

/// Grayscale frame as delivered by the capture collaborator, row-major.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub luma: Vec<u8>,
}

impl Frame {
    /// Build a frame, checking that the buffer matches the dimensions.
    pub fn new(width: u32, height: u32, luma: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if expected == 0 {
            bail!("frame dimensions must be nonzero, got {width}x{height}");
        }
        if luma.len() != expected {
            bail!(
                "frame buffer holds {} bytes, expected {expected} for {width}x{height}",
                luma.len()
            );
        }
        Ok(Self {
            width,
            height,
            luma,
        })
    }

    /// Uniform frame, handy for tests and synthetic sources.
    pub fn solid(width: u32, height: u32, level: u8) -> Result<Self> {
        let len = width as usize * height as usize;
        Self::new(width, height, vec![level; len])
    }

    /// Average luminance over the whole frame, in [0, 255].
    pub fn mean_luma(&self) -> f32 {
        let sum: u64 = self.luma.iter().map(|&p| p as u64).sum();
        sum as f32 / self.luma.len() as f32
    }
}

/// Coarse luminance summary used to compare frames cheaply.
///
/// Pooling to a fixed grid makes the comparison independent of the capture
/// resolution and cheap enough to run on every frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDigest {
    cells: Vec<f32>,
}

impl FrameDigest {
    pub fn from_frame(frame: &Frame) -> Self {
        let w = frame.width as usize;
        let h = frame.height as usize;
        let mut cells = Vec::with_capacity(DIGEST_GRID * DIGEST_GRID);
        for gy in 0..DIGEST_GRID {
            let y0 = gy * h / DIGEST_GRID;
            let y1 = ((gy + 1) * h).div_ceil(DIGEST_GRID);
            for gx in 0..DIGEST_GRID {
                let x0 = gx * w / DIGEST_GRID;
                let x1 = ((gx + 1) * w).div_ceil(DIGEST_GRID);
                let mut sum = 0u64;
                for y in y0..y1 {
                    for &p in &frame.luma[y * w + x0..y * w + x1] {
                        sum += p as u64;
                    }
                }
                let count = ((y1 - y0) * (x1 - x0)) as f32;
                cells.push(sum as f32 / count);
            }
        }
        Self { cells }
    }

    /// Mean absolute cell difference, normalized to [0, 1].
    pub fn difference(&self, other: &FrameDigest) -> f32 {
        let total: f32 = self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(a, b)| (a - b).abs())
            .sum();
        (total / self.cells.len() as f32 / 255.0).clamp(0.0, 1.0)
    }
}

/// Frame-difference gate deciding which frames are worth classifying.
#[derive(Debug, Clone)]
pub struct SceneChangeGate {
    sensitivity: f32,
    reference: Option<FrameDigest>,
}

impl SceneChangeGate {
    pub fn new(sensitivity: f32) -> Result<Self> {
        validate_sensitivity(sensitivity)?;
        Ok(Self {
            sensitivity,
            reference: None,
        })
    }

    /// Decide whether `frame` differs enough from the last analyzed frame.
    ///
    /// The reference digest only advances when the answer is yes, so slow
    /// cumulative drift still triggers once it adds up.
    pub fn should_analyze(&mut self, frame: &Frame) -> bool {
        let digest = FrameDigest::from_frame(frame);
        let passes = match &self.reference {
            // Nothing analyzed yet, so there is nothing to compare against.
            None => true,
            Some(reference) => reference.difference(&digest) > self.sensitivity,
        };
        if passes {
            self.reference = Some(digest);
        }
        passes
    }

    /// Adjust sensitivity at runtime. Out-of-range values are rejected and
    /// the previous setting stays in force.
    pub fn set_sensitivity(&mut self, sensitivity: f32) -> Result<()> {
        validate_sensitivity(sensitivity)?;
        self.sensitivity = sensitivity;
        Ok(())
    }

    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// Drop the reference so the next frame is always analyzed.
    pub fn reset(&mut self) {
        self.reference = None;
    }
}

fn validate_sensitivity(sensitivity: f32) -> Result<()> {
    if !sensitivity.is_finite() || !(0.0..=1.0).contains(&sensitivity) {
        bail!("scene sensitivity must be between 0.0 and 1.0, got {sensitivity}");
    }
    Ok(())
}
