use anyhow::Result;
use clap::Parser;
use screenduck::classify::LumaBandClassifier;
use screenduck::config::{
    AppConfig, EngineConfig, ShutdownPolicy, DEFAULT_ATTENUATION_FRACTION,
    DEFAULT_CAPTURE_INTERVAL_MS, DEFAULT_CONFIDENCE_EXPONENT, DEFAULT_DECISION_THRESHOLD,
    DEFAULT_DUCK_FLOOR, DEFAULT_FADE_DURATION_MS, DEFAULT_RECENCY_HALF_LIFE_MS,
    DEFAULT_SCENE_SENSITIVITY, DEFAULT_TICK_INTERVAL_MS, DEFAULT_TREND_EPSILON,
    DEFAULT_WINDOW_SIZE,
};
use screenduck::persist::PreferenceStore;
use screenduck::pipeline::{metrics_line, run_offline, DetectionPipeline, FrameSource};
use screenduck::scene::Frame;
use screenduck::volume::AudioEndpoint;

/// Synthetic benchmark harness for the detection + ducking pipeline.
#[derive(Debug, Parser)]
#[command(about = "Replay a synthetic content scenario through the full ducking pipeline")]
struct Args {
    /// Human-friendly label recorded in the output metrics
    #[arg(long, default_value = "scenario")]
    label: String,

    /// Number of target/other content alternations in the scenario
    #[arg(long, default_value_t = 2)]
    cycles: u32,

    /// Frames of target content per cycle
    #[arg(long = "target-frames", default_value_t = 6)]
    target_frames: u32,

    /// Frames of non-target content per cycle
    #[arg(long = "other-frames", default_value_t = 6)]
    other_frames: u32,

    /// Synthetic frame width in pixels
    #[arg(long = "frame-width", default_value_t = 64)]
    frame_width: u32,

    /// Synthetic frame height in pixels
    #[arg(long = "frame-height", default_value_t = 64)]
    frame_height: u32,

    /// Lower edge of the target luminance band
    #[arg(long = "band-low", default_value_t = 80.0)]
    band_low: f32,

    /// Upper edge of the target luminance band
    #[arg(long = "band-high", default_value_t = 160.0)]
    band_high: f32,

    /// Device level when the run starts
    #[arg(long = "start-level", default_value_t = 0.8)]
    start_level: f32,

    #[arg(long = "window-size", default_value_t = DEFAULT_WINDOW_SIZE)]
    window_size: usize,

    #[arg(
        long = "confidence-exponent",
        default_value_t = DEFAULT_CONFIDENCE_EXPONENT
    )]
    confidence_exponent: f32,

    #[arg(
        long = "recency-half-life-ms",
        default_value_t = DEFAULT_RECENCY_HALF_LIFE_MS
    )]
    recency_half_life_ms: u64,

    #[arg(long = "decision-threshold", default_value_t = DEFAULT_DECISION_THRESHOLD)]
    decision_threshold: f32,

    #[arg(long = "trend-epsilon", default_value_t = DEFAULT_TREND_EPSILON)]
    trend_epsilon: f32,

    #[arg(long = "fade-duration-ms", default_value_t = DEFAULT_FADE_DURATION_MS)]
    fade_duration_ms: u64,

    #[arg(
        long = "attenuation-fraction",
        default_value_t = DEFAULT_ATTENUATION_FRACTION
    )]
    attenuation_fraction: f32,

    #[arg(long = "duck-floor", default_value_t = DEFAULT_DUCK_FLOOR)]
    duck_floor: f32,

    #[arg(long = "scene-sensitivity", default_value_t = DEFAULT_SCENE_SENSITIVITY)]
    scene_sensitivity: f32,

    #[arg(
        long = "capture-interval-ms",
        default_value_t = DEFAULT_CAPTURE_INTERVAL_MS
    )]
    capture_interval_ms: u64,

    #[arg(long = "tick-interval-ms", default_value_t = DEFAULT_TICK_INTERVAL_MS)]
    tick_interval_ms: u64,

    #[arg(
        long = "shutdown-policy",
        value_enum,
        default_value_t = ShutdownPolicy::FinishFade
    )]
    shutdown_policy: ShutdownPolicy,

    /// Enable file logging for the run
    #[arg(long, default_value_t = false)]
    logs: bool,
}

/// In-memory audio device standing in for the OS mixer.
struct SimulatedEndpoint {
    level: f32,
}

impl AudioEndpoint for SimulatedEndpoint {
    fn volume(&mut self) -> Result<f32> {
        Ok(self.level)
    }

    fn set_volume(&mut self, level: f32) -> Result<()> {
        self.level = level;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

struct ScenarioSource {
    frames: Vec<Frame>,
    cursor: usize,
}

impl FrameSource for ScenarioSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.frames.get(self.cursor).cloned();
        self.cursor += 1;
        Ok(frame)
    }

    fn name(&self) -> &'static str {
        "scenario"
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    screenduck::install_panic_hook();
    init_diagnostics(&args);

    let frames = synthesize_frames(&args)?;
    let engine_cfg = build_engine_config(&args);
    let classifier = LumaBandClassifier::new(args.band_low, args.band_high)?;
    let endpoint = SimulatedEndpoint {
        level: args.start_level,
    };
    let mut pipeline = DetectionPipeline::new(
        &engine_cfg,
        Box::new(classifier),
        Box::new(endpoint),
        PreferenceStore::disabled(),
    )?;
    let mut source = ScenarioSource { frames, cursor: 0 };

    let metrics = run_offline(&mut pipeline, &mut source);
    let snapshot = pipeline.snapshot();

    println!(
        "{}|label={}|final_level={:.3}|final_mode={}",
        metrics_line(&metrics),
        args.label,
        snapshot.volume.current_level,
        snapshot.volume.mode.label()
    );

    Ok(())
}

fn init_diagnostics(args: &Args) {
    if !args.logs {
        return;
    }
    let config = AppConfig {
        logs: true,
        ..AppConfig::default()
    };
    screenduck::init_logging(&config);
    screenduck::init_tracing(&config);
}

fn build_engine_config(args: &Args) -> EngineConfig {
    EngineConfig {
        window_size: args.window_size,
        confidence_exponent: args.confidence_exponent,
        recency_half_life_ms: args.recency_half_life_ms,
        decision_threshold: args.decision_threshold,
        trend_epsilon: args.trend_epsilon,
        fade_duration_ms: args.fade_duration_ms,
        attenuation_fraction: args.attenuation_fraction,
        duck_floor: args.duck_floor,
        scene_sensitivity: args.scene_sensitivity,
        capture_interval_ms: args.capture_interval_ms,
        tick_interval_ms: args.tick_interval_ms,
        shutdown_policy: args.shutdown_policy,
        ..EngineConfig::default()
    }
}

/// Alternating solid frames: target-band luma for the target phase, luma
/// well above the band for the other phase. The alternation keeps each
/// frame past the scene gate at default sensitivity.
fn synthesize_frames(args: &Args) -> Result<Vec<Frame>> {
    let center = (args.band_low + args.band_high) / 2.0;
    let half_width = (args.band_high - args.band_low) / 2.0;
    let target_lumas = [
        (center - half_width / 2.0).clamp(0.0, 255.0) as u8,
        (center + half_width / 2.0).clamp(0.0, 255.0) as u8,
    ];
    let other_lumas = [
        (args.band_high + half_width).clamp(0.0, 255.0) as u8,
        (args.band_high + 2.0 * half_width).clamp(0.0, 255.0) as u8,
    ];

    let mut frames = Vec::new();
    for _ in 0..args.cycles {
        for i in 0..args.target_frames {
            frames.push(Frame::solid(
                args.frame_width,
                args.frame_height,
                target_lumas[(i % 2) as usize],
            )?);
        }
        for i in 0..args.other_frames {
            frames.push(Frame::solid(
                args.frame_width,
                args.frame_height,
                other_lumas[(i % 2) as usize],
            )?);
        }
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn default_args_parse() {
        let args = Args::try_parse_from(["duck_benchmark"]).expect("defaults should parse");
        assert_eq!(args.cycles, 2);
        assert_eq!(args.target_frames, 6);
        assert_eq!(args.other_frames, 6);
        assert!((args.band_low - 80.0).abs() < f32::EPSILON);
        assert!((args.band_high - 160.0).abs() < f32::EPSILON);
    }

    #[test]
    fn engine_flags_reach_the_config() {
        let args = Args::try_parse_from([
            "duck_benchmark",
            "--window-size",
            "5",
            "--attenuation-fraction",
            "0.5",
            "--shutdown-policy",
            "restore-startup",
        ])
        .expect("flags should parse");
        let cfg = build_engine_config(&args);
        assert_eq!(cfg.window_size, 5);
        assert!((cfg.attenuation_fraction - 0.5).abs() < f32::EPSILON);
        assert_eq!(cfg.shutdown_policy, ShutdownPolicy::RestoreStartup);
    }

    #[test]
    fn scenario_alternates_past_the_gate() {
        let args = Args::try_parse_from(["duck_benchmark"]).expect("defaults should parse");
        let frames = synthesize_frames(&args).expect("scenario should build");
        assert_eq!(
            frames.len(),
            (args.cycles * (args.target_frames + args.other_frames)) as usize
        );
        let first = frames[0].mean_luma();
        let second = frames[1].mean_luma();
        assert!((first - second).abs() / 255.0 > DEFAULT_SCENE_SENSITIVITY);
        assert!(first > args.band_low && first < args.band_high);
        let ducked = frames[args.target_frames as usize].mean_luma();
        assert!(ducked > args.band_high);
    }
}
