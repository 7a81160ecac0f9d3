use super::engine::{ConsensusConfig, ConsensusEngine};
use super::sample::{ClassificationSample, ContentLabel, Trend};
use super::window::ConsensusWindow;
use crate::config::EngineConfig;
use ContentLabel::{Other, Target};

fn engine() -> ConsensusEngine<ContentLabel> {
    ConsensusEngine::new(ConsensusConfig::default()).expect("default config should be valid")
}

fn engine_with_window(window_size: usize) -> ConsensusEngine<ContentLabel> {
    let config = ConsensusConfig {
        window_size,
        ..ConsensusConfig::default()
    };
    ConsensusEngine::new(config).expect("config should be valid")
}

fn sample(
    label: ContentLabel,
    confidence: f32,
    at_ms: u64,
) -> ClassificationSample<ContentLabel> {
    ClassificationSample::new(label, confidence, at_ms)
}

#[test]
fn rejects_invalid_config() {
    let zero_window = ConsensusConfig {
        window_size: 0,
        ..ConsensusConfig::default()
    };
    assert!(ConsensusEngine::<ContentLabel>::new(zero_window).is_err());

    let sublinear = ConsensusConfig {
        confidence_exponent: 0.5,
        ..ConsensusConfig::default()
    };
    assert!(ConsensusEngine::<ContentLabel>::new(sublinear).is_err());

    let nan_exponent = ConsensusConfig {
        confidence_exponent: f32::NAN,
        ..ConsensusConfig::default()
    };
    assert!(ConsensusEngine::<ContentLabel>::new(nan_exponent).is_err());

    let zero_half_life = ConsensusConfig {
        recency_half_life_ms: 0,
        ..ConsensusConfig::default()
    };
    assert!(ConsensusEngine::<ContentLabel>::new(zero_half_life).is_err());

    let wide_epsilon = ConsensusConfig {
        trend_epsilon: 1.5,
        ..ConsensusConfig::default()
    };
    assert!(ConsensusEngine::<ContentLabel>::new(wide_epsilon).is_err());
}

#[test]
fn consensus_config_mirrors_engine_config() {
    let engine_cfg = EngineConfig {
        window_size: 7,
        confidence_exponent: 3.0,
        recency_half_life_ms: 1_000,
        trend_epsilon: 0.05,
        ..EngineConfig::default()
    };
    let cfg = ConsensusConfig::from(&engine_cfg);
    assert_eq!(cfg.window_size, 7);
    assert_eq!(cfg.confidence_exponent, 3.0);
    assert_eq!(cfg.recency_half_life_ms, 1_000);
    assert_eq!(cfg.trend_epsilon, 0.05);
}

#[test]
fn empty_window_produces_no_decision() {
    let mut engine = engine();
    assert!(engine.reevaluate(0).is_none());
    assert!(engine.last_decision().is_none());
}

#[test]
fn single_sample_wins_with_full_score() {
    let mut engine = engine();
    let decision = engine.submit(sample(Target, 0.4, 0));
    assert_eq!(decision.label, Target);
    assert!((decision.score - 1.0).abs() < 1e-6);
    assert_eq!(decision.trend, Trend::Stable);
}

#[test]
fn zero_confidence_still_names_a_winner() {
    let mut engine = engine();
    let decision = engine.submit(sample(Target, 0.0, 0));
    assert_eq!(decision.label, Target);
    assert_eq!(decision.score, 0.0);
}

#[test]
fn identical_streams_give_identical_decisions() {
    let stream = [
        (Target, 0.9, 0),
        (Other, 0.4, 500),
        (Target, 0.7, 1_000),
        (Other, 0.95, 1_500),
        (Other, 0.6, 2_000),
        (Target, 0.2, 2_500),
    ];
    let mut first = engine();
    let mut second = engine();
    for (label, confidence, at_ms) in stream {
        let a = first.submit(sample(label, confidence, at_ms));
        let b = second.submit(sample(label, confidence, at_ms));
        assert_eq!(a, b);
    }
}

#[test]
fn recency_flips_decision_after_content_change() {
    let mut engine = engine();
    for i in 0..12u64 {
        let decision = engine.submit(sample(Target, 0.8, i * 500));
        assert_eq!(decision.label, Target);
    }
    let mut labels = Vec::new();
    for i in 12..17u64 {
        labels.push(engine.submit(sample(Other, 0.8, i * 500)).label);
    }
    // The stale majority holds briefly, then the fresh run takes over.
    assert_eq!(labels[0], Target);
    assert_eq!(labels[4], Other);
    assert!(labels.contains(&Other));
}

#[test]
fn one_confident_frame_outvotes_several_uncertain() {
    let mut engine = engine_with_window(5);
    let decision = engine.submit(sample(Target, 0.99, 0));
    assert_eq!(decision.label, Target);
    let mut last = decision;
    for i in 1..=4u64 {
        last = engine.submit(sample(Other, 0.2, i * 500));
    }
    assert_eq!(last.label, Target);
    assert!(last.score > 0.5);
}

#[test]
fn eviction_forgets_the_oldest_sample() {
    let early = sample(Target, 0.9, 0);
    let late: Vec<_> = (1..=5u64)
        .map(|i| sample(Other, 0.3 + 0.01 * i as f32, i * 500))
        .collect();

    let mut with_early = engine_with_window(5);
    with_early.submit(early);
    let mut without_early = engine_with_window(5);

    let mut a = None;
    let mut b = None;
    for s in &late {
        a = Some(with_early.submit(*s));
        b = Some(without_early.submit(*s));
    }
    let a = a.expect("submitted at least one sample");
    let b = b.expect("submitted at least one sample");
    assert_eq!(a.label, b.label);
    assert_eq!(a.score, b.score);
}

#[test]
fn exact_tie_keeps_previous_label() {
    let mut engine = engine();
    assert_eq!(engine.submit(sample(Target, 0.8, 1_000)).label, Target);
    let tied = engine.submit(sample(Other, 0.8, 1_000));
    assert_eq!(tied.label, Target);
    assert!((tied.score - 0.5).abs() < 1e-6);

    let mut engine = self::engine();
    assert_eq!(engine.submit(sample(Other, 0.8, 1_000)).label, Other);
    assert_eq!(engine.submit(sample(Target, 0.8, 1_000)).label, Other);
}

#[test]
fn trend_rises_while_support_builds() {
    let mut engine = engine_with_window(3);
    let trends: Vec<_> = [
        (Other, 0.9, 0),
        (Target, 0.9, 500),
        (Target, 0.9, 1_000),
        (Target, 0.9, 1_500),
        (Target, 0.9, 2_000),
    ]
    .into_iter()
    .map(|(label, confidence, at_ms)| engine.submit(sample(label, confidence, at_ms)).trend)
    .collect();
    assert_eq!(
        trends,
        [
            Trend::Stable,
            Trend::Stable,
            Trend::Rising,
            Trend::Rising,
            Trend::Stable,
        ]
    );
}

#[test]
fn trend_falls_as_opposition_arrives() {
    let mut engine = engine_with_window(3);
    for i in 0..3u64 {
        engine.submit(sample(Target, 0.9, i * 500));
    }
    let decision = engine.submit(sample(Other, 0.6, 1_500));
    assert_eq!(decision.label, Target);
    assert_eq!(decision.trend, Trend::Falling);
}

#[test]
fn reevaluate_keeps_relative_scores_without_new_samples() {
    let mut engine = engine();
    engine.submit(sample(Target, 0.9, 0));
    let before = engine.submit(sample(Other, 0.7, 2_000));
    let after = engine
        .reevaluate(10_000)
        .expect("window is not empty");
    assert_eq!(after.label, before.label);
    assert!((after.score - before.score).abs() < 1e-4);
    assert_eq!(after.at_ms, 10_000);
    assert_eq!(after.trend, Trend::Stable);
}

#[test]
fn reset_clears_window_and_history() {
    let mut engine = engine();
    engine.submit(sample(Target, 0.9, 0));
    engine.reset();
    assert_eq!(engine.window_len(), 0);
    assert!(engine.last_decision().is_none());
    assert!(engine.reevaluate(500).is_none());
}

#[test]
fn supports_more_than_two_classes() {
    #[derive(Debug, Copy, Clone, PartialEq, Eq)]
    enum Scene {
        Court,
        Studio,
        Ad,
    }

    let config = ConsensusConfig {
        window_size: 4,
        ..ConsensusConfig::default()
    };
    let mut engine = ConsensusEngine::new(config).expect("config should be valid");
    engine.submit(ClassificationSample::new(Scene::Court, 0.9, 0));
    engine.submit(ClassificationSample::new(Scene::Studio, 0.5, 500));
    engine.submit(ClassificationSample::new(Scene::Ad, 0.5, 1_000));
    let decision = engine.submit(ClassificationSample::new(Scene::Studio, 0.7, 1_500));
    assert_eq!(decision.label, Scene::Studio);
    assert!(decision.score < 1.0);
}

#[test]
fn sample_confidence_is_clamped() {
    assert_eq!(sample(Target, 1.7, 0).confidence, 1.0);
    assert_eq!(sample(Target, -0.3, 0).confidence, 0.0);
    assert_eq!(sample(Target, f32::NAN, 0).confidence, 0.0);
}

#[test]
fn window_evicts_oldest_at_capacity() {
    let mut window = ConsensusWindow::new(3);
    for i in 0..4u64 {
        window.push(sample(Target, 0.5, i));
    }
    assert_eq!(window.len(), 3);
    assert_eq!(window.capacity(), 3);
    let oldest = window.iter().next().expect("window is not empty");
    assert_eq!(oldest.at_ms, 1);
}

#[test]
fn window_clear_empties_samples() {
    let mut window = ConsensusWindow::new(2);
    window.push(sample(Other, 0.5, 0));
    assert!(!window.is_empty());
    window.clear();
    assert!(window.is_empty());
    assert_eq!(window.len(), 0);
}

#[test]
fn label_names_are_stable() {
    assert_eq!(Target.label(), "target");
    assert_eq!(Other.label(), "other");
    assert_eq!(Trend::Rising.label(), "rising");
    assert_eq!(Trend::Falling.label(), "falling");
    assert_eq!(Trend::Stable.label(), "stable");
}
