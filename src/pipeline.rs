//! Detection loop wiring: frames in, volume out.
//!
//! One loop owns the whole decision path. Frames pass the scene gate,
//! get classified, feed the consensus vote, and the winning decision
//! steers the volume controller. A separate ticker thread advances
//! fades so ramps stay smooth even when frames stall or a classifier
//! call runs long; live jobs share only the level-side state between
//! threads, so classification never holds the ticker's lock.

use crate::classify::FrameClassifier;
use crate::config::EngineConfig;
use crate::consensus::{
    ClassificationSample, ConsensusConfig, ConsensusDecision, ConsensusEngine, ContentLabel,
};
use crate::log_debug;
use crate::persist::PreferenceStore;
use crate::scene::{Frame, SceneChangeGate};
use crate::snapshot::{EngineSnapshot, LiveLevel, SnapshotHub};
use crate::volume::{AudioEndpoint, VolumeConfig, VolumeController, VolumeSummary};
use anyhow::Result;
use crossbeam_channel::{bounded, RecvTimeoutError, TrySendError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Source of luma frames for the detection loop. `None` means the
/// stream ended.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn name(&self) -> &'static str {
        "unknown_source"
    }
}

/// Explains why a run stopped so benchmarks can classify outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    SourceExhausted,
    ManualStop,
    SourceError(String),
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            StopReason::SourceExhausted => "source_exhausted",
            StopReason::ManualStop => "manual_stop",
            StopReason::SourceError(_) => "source_error",
        }
    }
}

/// Counters collected over a run for observability and CI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMetrics {
    pub run_ms: u64,
    pub frames_seen: u64,
    pub frames_analyzed: u64,
    pub frames_dropped: u64,
    pub classifier_errors: u64,
    pub decisions: u64,
    pub decision_flips: u64,
    pub device_errors: u64,
    pub stop_reason: StopReason,
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self {
            run_ms: 0,
            frames_seen: 0,
            frames_analyzed: 0,
            frames_dropped: 0,
            classifier_errors: 0,
            decisions: 0,
            decision_flips: 0,
            device_errors: 0,
            stop_reason: StopReason::SourceExhausted,
        }
    }
}

/// Render the counters as one pipe-delimited line for logs and CI greps.
pub fn metrics_line(metrics: &RunMetrics) -> String {
    format!(
        "duck_metrics|stop={}|run_ms={}|frames_seen={}|frames_analyzed={}|frames_dropped={}|classifier_errors={}|decisions={}|decision_flips={}|device_errors={}",
        metrics.stop_reason.label(),
        metrics.run_ms,
        metrics.frames_seen,
        metrics.frames_analyzed,
        metrics.frames_dropped,
        metrics.classifier_errors,
        metrics.decisions,
        metrics.decision_flips,
        metrics.device_errors,
    )
}

pub(crate) fn log_run_metrics(metrics: &RunMetrics) {
    log_debug(&metrics_line(metrics));
    tracing::info!(
        stop = metrics.stop_reason.label(),
        run_ms = metrics.run_ms,
        frames_seen = metrics.frames_seen,
        frames_analyzed = metrics.frames_analyzed,
        frames_dropped = metrics.frames_dropped,
        classifier_errors = metrics.classifier_errors,
        decisions = metrics.decisions,
        decision_flips = metrics.decision_flips,
        device_errors = metrics.device_errors,
        "detection run stopped"
    );
}

/// Frame side of the pipeline: gate, classifier, vote, history.
///
/// Owned by whichever loop drives frames. Live jobs keep it off the
/// shared mutex, so a slow classifier never blocks the fade ticker.
struct DecisionStage {
    gate: SceneChangeGate,
    classifier: Box<dyn FrameClassifier + Send>,
    consensus: ConsensusEngine<ContentLabel>,
    history: VecDeque<ConsensusDecision<ContentLabel>>,
    history_size: usize,
    last_label: Option<ContentLabel>,
    frames_seen: u64,
    frames_analyzed: u64,
    classifier_errors: u64,
    decisions: u64,
    decision_flips: u64,
}

impl DecisionStage {
    /// Run one frame through the gate, classifier, and consensus vote.
    ///
    /// Classifier failures are absorbed: the frame casts no vote and the
    /// loop keeps going.
    fn analyze(&mut self, frame: &Frame, now_ms: u64) -> Option<ConsensusDecision<ContentLabel>> {
        self.frames_seen += 1;
        if !self.gate.should_analyze(frame) {
            return None;
        }
        self.frames_analyzed += 1;

        let classification = match self.classifier.classify(frame) {
            Ok(classification) => classification,
            Err(err) => {
                self.classifier_errors += 1;
                log_debug(&format!(
                    "classifier {} failed, frame skipped: {err:#}",
                    self.classifier.name()
                ));
                return None;
            }
        };

        let sample =
            ClassificationSample::new(classification.label, classification.confidence, now_ms);
        let decision = self.consensus.submit(sample);
        self.decisions += 1;
        if let Some(last) = self.last_label {
            if last != decision.label {
                self.decision_flips += 1;
                log_debug(&format!(
                    "decision flipped to {} (score {:.3})",
                    decision.label.label(),
                    decision.score
                ));
                tracing::debug!(
                    label = decision.label.label(),
                    score = f64::from(decision.score),
                    "decision flip"
                );
            }
        }
        self.last_label = Some(decision.label);
        self.push_history(decision);
        Some(decision)
    }

    fn push_history(&mut self, decision: ConsensusDecision<ContentLabel>) {
        self.history.push_back(decision);
        while self.history.len() > self.history_size {
            self.history.pop_front();
        }
    }
}

/// Level side of the pipeline: controller, endpoint, preference store.
/// The only part a live job shares between threads.
struct ControlStage {
    controller: VolumeController,
    endpoint: Box<dyn AudioEndpoint + Send>,
    store: PreferenceStore,
}

impl ControlStage {
    fn on_consensus(&mut self, decision: &ConsensusDecision<ContentLabel>, now_ms: u64) {
        self.controller.on_consensus(decision, now_ms);
    }

    fn tick(&mut self, now_ms: u64) {
        self.controller.tick(self.endpoint.as_mut(), now_ms);
    }

    /// Read the device level back and let the controller learn from it.
    /// Failed reads count toward the device error total.
    fn poll_device(&mut self) {
        match self.endpoint.volume() {
            Ok(level) => self.controller.observe_external_level(level),
            Err(err) => {
                self.controller.note_device_error();
                log_debug(&format!(
                    "volume read failed on {}: {err:#}",
                    self.endpoint.name()
                ));
                tracing::warn!(device = self.endpoint.name(), error = %err, "device level read failed");
            }
        }
    }

    fn shutdown(&mut self, now_ms: u64) {
        self.controller.shutdown(self.endpoint.as_mut());
        if let Err(err) = self.store.save(self.controller.preferred_level(), now_ms) {
            log_debug(&format!("failed to persist preferences: {err:#}"));
        }
    }

    fn summary(&self) -> VolumeSummary {
        self.controller.summary()
    }
}

fn publish_state(
    hub: &SnapshotHub,
    live_level: &LiveLevel,
    decision: &DecisionStage,
    control: &ControlStage,
    now_ms: u64,
) {
    let snapshot = EngineSnapshot {
        decision: decision.consensus.last_decision().copied(),
        window_len: decision.consensus.window_len(),
        volume: control.summary(),
        frames_seen: decision.frames_seen,
        frames_analyzed: decision.frames_analyzed,
        updated_at_ms: now_ms,
    };
    live_level.set(snapshot.volume.current_level);
    hub.publish(snapshot);
}

fn compose_metrics(decision: &DecisionStage, control: &ControlStage) -> RunMetrics {
    RunMetrics {
        frames_seen: decision.frames_seen,
        frames_analyzed: decision.frames_analyzed,
        classifier_errors: decision.classifier_errors,
        decisions: decision.decisions,
        decision_flips: decision.decision_flips,
        device_errors: control.controller.device_errors(),
        ..RunMetrics::default()
    }
}

/// Owns every stage of the decision path and the audio endpoint.
///
/// All time comes in as caller-supplied milliseconds, so the same code
/// drives live threads and deterministic offline runs.
pub struct DetectionPipeline {
    cfg: EngineConfig,
    decision: DecisionStage,
    control: ControlStage,
    hub: SnapshotHub,
    live_level: LiveLevel,
}

impl DetectionPipeline {
    pub fn new(
        cfg: &EngineConfig,
        classifier: Box<dyn FrameClassifier + Send>,
        mut endpoint: Box<dyn AudioEndpoint + Send>,
        store: PreferenceStore,
    ) -> Result<Self> {
        let gate = SceneChangeGate::new(cfg.scene_sensitivity)?;
        let consensus = ConsensusEngine::new(ConsensusConfig::from(cfg))?;
        let stored_preference = store.load().map(|stored| stored.preferred_level);
        let controller =
            VolumeController::new(VolumeConfig::from(cfg), endpoint.as_mut(), stored_preference)?;
        Ok(Self {
            cfg: cfg.clone(),
            decision: DecisionStage {
                gate,
                classifier,
                consensus,
                history: VecDeque::new(),
                history_size: cfg.history_size.max(1),
                last_label: None,
                frames_seen: 0,
                frames_analyzed: 0,
                classifier_errors: 0,
                decisions: 0,
                decision_flips: 0,
            },
            control: ControlStage {
                controller,
                endpoint,
                store,
            },
            hub: SnapshotHub::new(),
            live_level: LiveLevel::new(),
        })
    }

    /// Run one frame through the gate, classifier, and consensus vote,
    /// then let the controller react to the verdict.
    pub fn process_frame(
        &mut self,
        frame: &Frame,
        now_ms: u64,
    ) -> Option<ConsensusDecision<ContentLabel>> {
        let decision = self.decision.analyze(frame, now_ms);
        if let Some(decision) = decision {
            self.control.on_consensus(&decision, now_ms);
        }
        self.publish_snapshot(now_ms);
        decision
    }

    /// Recompute the decision from the existing window when no frame
    /// arrived. An empty window stays an explicit unknown.
    pub fn refresh(&mut self, now_ms: u64) {
        if let Some(decision) = self.decision.consensus.reevaluate(now_ms) {
            self.control.on_consensus(&decision, now_ms);
        }
        self.publish_snapshot(now_ms);
    }

    /// Advance any in-flight fade by one step.
    pub fn tick(&mut self, now_ms: u64) {
        self.control.tick(now_ms);
        self.publish_snapshot(now_ms);
    }

    /// Read the device level back and let the controller learn from it.
    pub fn poll_device(&mut self, now_ms: u64) {
        self.control.poll_device();
        self.publish_snapshot(now_ms);
    }

    /// Adjust the scene gate while running. Rejects bad values and
    /// keeps the old sensitivity.
    pub fn set_sensitivity(&mut self, sensitivity: f32) -> Result<()> {
        self.decision.gate.set_sensitivity(sensitivity)
    }

    /// Apply the shutdown policy and persist the learned preference.
    pub fn shutdown(&mut self, now_ms: u64) {
        self.control.shutdown(now_ms);
        self.publish_snapshot(now_ms);
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.hub.latest()
    }

    pub fn snapshot_hub(&self) -> SnapshotHub {
        self.hub.clone()
    }

    pub fn live_level(&self) -> LiveLevel {
        self.live_level.clone()
    }

    /// Counter totals so far. Run-level fields (run_ms, dropped frames,
    /// stop reason) are filled in by the drivers.
    pub fn metrics(&self) -> RunMetrics {
        compose_metrics(&self.decision, &self.control)
    }

    pub fn is_fading(&self) -> bool {
        self.control.controller.mode().is_fading()
    }

    /// Most recent decisions, oldest first.
    pub fn recent_decisions(&self) -> Vec<ConsensusDecision<ContentLabel>> {
        self.decision.history.iter().copied().collect()
    }

    fn publish_snapshot(&self, now_ms: u64) {
        publish_state(
            &self.hub,
            &self.live_level,
            &self.decision,
            &self.control,
            now_ms,
        );
    }
}

/// Drive the pipeline against a frame source on a synthetic clock.
///
/// Frames arrive at the configured capture interval with fade ticks
/// interleaved, so results are reproducible without real devices or
/// timers. Used by the benchmark harness and tests.
pub fn run_offline(pipeline: &mut DetectionPipeline, source: &mut dyn FrameSource) -> RunMetrics {
    let capture_interval_ms = pipeline.config().capture_interval_ms.max(1);
    let tick_step_ms = pipeline.config().tick_interval_ms.max(1);
    let poll_every_ms = pipeline.config().volume_poll_ms.max(1);
    let fade_duration_ms = pipeline.config().fade_duration_ms;

    let mut now_ms = 0u64;
    let mut last_poll_ms = 0u64;
    let mut stop_reason = StopReason::SourceExhausted;
    loop {
        match source.next_frame() {
            Ok(Some(frame)) => {
                pipeline.process_frame(&frame, now_ms);
                let target_ms = now_ms + capture_interval_ms;
                while now_ms < target_ms {
                    now_ms = (now_ms + tick_step_ms).min(target_ms);
                    pipeline.tick(now_ms);
                    if now_ms.saturating_sub(last_poll_ms) >= poll_every_ms {
                        pipeline.poll_device(now_ms);
                        last_poll_ms = now_ms;
                    }
                }
            }
            Ok(None) => break,
            Err(err) => {
                log_debug(&format!("frame source {} failed: {err:#}", source.name()));
                stop_reason = StopReason::SourceError(format!("{err:#}"));
                break;
            }
        }
    }

    // Let an in-flight fade land before applying the shutdown policy.
    let drain_deadline_ms = now_ms + fade_duration_ms + tick_step_ms;
    while pipeline.is_fading() && now_ms < drain_deadline_ms {
        now_ms += tick_step_ms;
        pipeline.tick(now_ms);
    }

    pipeline.shutdown(now_ms);

    let mut metrics = pipeline.metrics();
    metrics.run_ms = now_ms;
    metrics.stop_reason = stop_reason;
    log_run_metrics(&metrics);
    metrics
}

/// Handle for a live detection run. Callers poll snapshots while it
/// runs and collect final metrics with [`DetectionJob::wait`].
pub struct DetectionJob {
    receiver: mpsc::Receiver<RunMetrics>,
    handles: Vec<thread::JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    hub: SnapshotHub,
    live_level: LiveLevel,
}

impl DetectionJob {
    /// Signal every worker to wind down after the current step.
    pub fn request_stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.hub.latest()
    }

    pub fn snapshot_hub(&self) -> SnapshotHub {
        self.hub.clone()
    }

    pub fn live_level(&self) -> f32 {
        self.live_level.get()
    }

    /// Block until the run finishes and collect its metrics.
    pub fn wait(mut self) -> RunMetrics {
        let metrics = match self.receiver.recv() {
            Ok(metrics) => metrics,
            Err(_) => RunMetrics {
                stop_reason: StopReason::SourceError("detection worker disconnected".to_string()),
                ..RunMetrics::default()
            },
        };
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        metrics
    }
}

/// Spawn the live detection threads: a producer pulling frames, the
/// decision loop, and a fade ticker. The decision loop owns the gate,
/// classifier, and vote outright; only the control stage sits behind
/// the mutex the ticker takes, so classification never delays a tick.
pub fn start_detection_job(
    pipeline: DetectionPipeline,
    mut source: Box<dyn FrameSource + Send>,
) -> DetectionJob {
    let DetectionPipeline {
        cfg,
        mut decision,
        control,
        hub,
        live_level,
    } = pipeline;
    let stop_flag = Arc::new(AtomicBool::new(false));
    let control = Arc::new(Mutex::new(control));
    let started = Instant::now();
    let dropped = Arc::new(AtomicU64::new(0));
    let (frame_tx, frame_rx) =
        bounded::<Result<Frame, String>>(cfg.frame_channel_capacity.max(1));

    let capture_interval = Duration::from_millis(cfg.capture_interval_ms.max(1));
    let producer_stop = stop_flag.clone();
    let producer_dropped = dropped.clone();
    let producer = thread::spawn(move || loop {
        if producer_stop.load(Ordering::Relaxed) {
            break;
        }
        match source.next_frame() {
            Ok(Some(frame)) => match frame_tx.try_send(Ok(frame)) {
                Ok(()) => {}
                // A slow decision loop sheds frames instead of lagging.
                Err(TrySendError::Full(_)) => {
                    producer_dropped.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Disconnected(_)) => break,
            },
            Ok(None) => break,
            Err(err) => {
                let _ = frame_tx.try_send(Err(format!("{err:#}")));
                break;
            }
        }
        thread::sleep(capture_interval);
    });

    let ticker_stop = stop_flag.clone();
    let ticker_control = control.clone();
    let ticker_hub = hub.clone();
    let ticker_level = live_level.clone();
    let tick_interval = Duration::from_millis(cfg.tick_interval_ms.max(1));
    let poll_every_ms = cfg.volume_poll_ms.max(1);
    let ticker = thread::spawn(move || {
        let mut last_poll_ms = 0u64;
        while !ticker_stop.load(Ordering::Relaxed) {
            thread::sleep(tick_interval);
            let now_ms = started.elapsed().as_millis() as u64;
            let mut control = ticker_control.lock().unwrap_or_else(|e| e.into_inner());
            control.tick(now_ms);
            if now_ms.saturating_sub(last_poll_ms) >= poll_every_ms {
                control.poll_device();
                last_poll_ms = now_ms;
            }
            // Publish before releasing the control lock so a final
            // post-shutdown snapshot cannot be overwritten by a stale one.
            let summary = control.summary();
            ticker_level.set(summary.current_level);
            ticker_hub.update(|snapshot| {
                snapshot.volume = summary;
                snapshot.updated_at_ms = now_ms;
            });
        }
    });

    let worker_stop = stop_flag.clone();
    let worker_control = control.clone();
    let worker_hub = hub.clone();
    let worker_level = live_level.clone();
    let worker_dropped = dropped.clone();
    let (tx, rx) = mpsc::sync_channel(1);
    let wait_time = Duration::from_millis(cfg.capture_interval_ms.max(1));
    let worker = thread::spawn(move || {
        let mut stop_reason = StopReason::SourceExhausted;
        loop {
            if worker_stop.load(Ordering::Relaxed) {
                stop_reason = StopReason::ManualStop;
                break;
            }
            match frame_rx.recv_timeout(wait_time) {
                Ok(Ok(frame)) => {
                    // Classify with no lock held. Samples are stamped at
                    // arrival; the fade clock starts when the verdict lands.
                    let frame_ms = started.elapsed().as_millis() as u64;
                    let outcome = decision.analyze(&frame, frame_ms);
                    let now_ms = started.elapsed().as_millis() as u64;
                    let mut control = worker_control.lock().unwrap_or_else(|e| e.into_inner());
                    if let Some(outcome) = outcome {
                        control.on_consensus(&outcome, now_ms);
                    }
                    publish_state(&worker_hub, &worker_level, &decision, &control, now_ms);
                }
                Ok(Err(message)) => {
                    stop_reason = StopReason::SourceError(message);
                    break;
                }
                Err(RecvTimeoutError::Timeout) => {
                    let now_ms = started.elapsed().as_millis() as u64;
                    let refreshed = decision.consensus.reevaluate(now_ms);
                    let mut control = worker_control.lock().unwrap_or_else(|e| e.into_inner());
                    if let Some(refreshed) = refreshed {
                        control.on_consensus(&refreshed, now_ms);
                    }
                    publish_state(&worker_hub, &worker_level, &decision, &control, now_ms);
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        worker_stop.store(true, Ordering::Relaxed);

        let now_ms = started.elapsed().as_millis() as u64;
        let mut control = worker_control.lock().unwrap_or_else(|e| e.into_inner());
        control.shutdown(now_ms);
        let mut metrics = compose_metrics(&decision, &control);
        metrics.frames_dropped = worker_dropped.load(Ordering::Relaxed);
        metrics.run_ms = now_ms;
        metrics.stop_reason = stop_reason;
        publish_state(&worker_hub, &worker_level, &decision, &control, now_ms);
        drop(control);
        log_run_metrics(&metrics);
        let _ = tx.send(metrics);
    });

    DetectionJob {
        receiver: rx,
        handles: vec![producer, ticker, worker],
        stop_flag,
        hub,
        live_level,
    }
}
