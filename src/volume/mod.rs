//! Volume control: fades, preference memory, and the audio device seam.
//!
//! The controller is the single writer of the output level. It reacts to
//! consensus decisions with timed fades, learns the user's preferred level
//! for target content, and treats its own in-flight fades as authoritative
//! so it never mistakes them for user adjustments.

mod controller;
mod fade;

pub use controller::{AudioEndpoint, ControlMode, VolumeConfig, VolumeController, VolumeSummary};
pub use fade::FadePlan;
