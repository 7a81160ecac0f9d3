pub mod classify;
pub mod config;
pub mod consensus;
pub mod persist;
pub mod pipeline;
pub mod scene;
pub mod snapshot;
mod telemetry;
pub mod volume;

mod logging;

pub use logging::{
    crash_log_path, init_logging, install_panic_hook, log_debug, log_file_path, log_panic,
};
pub use telemetry::{init_tracing, tracing_log_path};
pub use pipeline::{DetectionJob, DetectionPipeline, FrameSource, RunMetrics, StopReason};
