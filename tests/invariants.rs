//! Property tests over random-walk bar windows.

use proptest::prelude::*;
use trendphase::prelude::*;

/// Random walk from 100 built from (change, spread, volume) steps
fn walk(steps: &[(f64, f64, f64)]) -> Vec<Bar> {
    let mut price: f64 = 100.0;
    steps
        .iter()
        .enumerate()
        .map(|(i, &(change, spread, volume))| {
            let open = price;
            price = (price + change).max(1.0);
            let close = price;
            Bar::new(
                i as i64 * 86_400_000,
                open,
                open.max(close) + spread,
                (open.min(close) - spread).max(0.5),
                close,
                volume,
            )
        })
        .collect()
}

fn bars_strategy(max_len: usize) -> impl Strategy<Value = Vec<Bar>> {
    prop::collection::vec((-3.0f64..3.0, 0.0f64..2.0, 100.0f64..5000.0), 0..max_len)
        .prop_map(|steps| walk(&steps))
}

fn scope_strategy() -> impl Strategy<Value = TrendScope> {
    prop_oneof![
        Just(TrendScope::Primary),
        Just(TrendScope::Secondary),
        Just(TrendScope::Minor),
    ]
}

fn phase_strategy() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::Accumulation),
        Just(Phase::PublicParticipation),
        Just(Phase::Panic),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn levels_are_capped_and_sorted(bars in bars_strategy(300), scope in scope_strategy()) {
        let levels = LevelLocator::default().locate(&bars, scope);
        prop_assert!(levels.len() <= 5);
        for pair in levels.windows(2) {
            prop_assert!((pair[0].strength, pair[0].touch_count) >= (pair[1].strength, pair[1].touch_count));
        }
        for level in &levels {
            prop_assert!(level.touch_count >= scope.min_touches());
            prop_assert!(level.last_touch_index < bars.len());
        }
    }

    #[test]
    fn valid_lines_meet_threshold(bars in bars_strategy(300), scope in scope_strategy()) {
        if let Some(line) = TrendLineFitter::default().fit(&bars, scope) {
            prop_assert!((0.0..=1.0).contains(&line.goodness_of_fit));
            if line.is_valid {
                prop_assert!(line.goodness_of_fit > 0.6);
                prop_assert!(line.touch_count >= 2);
            }
            prop_assert!(line.start_point.index <= line.end_point.index);
            prop_assert!(line.end_point.index < bars.len());
        } else {
            prop_assert!(bars.len().min(scope.window()) < 10);
        }
    }

    #[test]
    fn price_confirmation_implies_magnitude(
        bars in bars_strategy(120),
        ratio in 0.5f64..3.0,
    ) {
        let signals = BreakoutDetector::default().detect_from_history(
            &bars,
            &LevelLocator::default(),
            TrendScope::Secondary,
            &VolumeAnalysis::from_ratio(ratio),
        );
        for s in &signals {
            if s.price_confirmed {
                prop_assert!(s.magnitude >= 0.01);
            }
            prop_assert!(s.breakout_index + 5 >= bars.len());
            if s.strength == Strength::Strong {
                prop_assert_eq!(s.confirmations(), 3);
            }
        }
    }

    #[test]
    fn transition_probability_is_bounded(bars in bars_strategy(150), phase in phase_strategy()) {
        let t = TransitionModel::default().estimate(&bars, phase);
        prop_assert!((0.0..=1.0).contains(&t.probability));
        prop_assert!((0.0..=1.0).contains(&t.current_phase_strength));
        if t.probability == 0.0 {
            prop_assert_eq!(t.next_phase, phase);
        }
        if bars.len() < 60 {
            prop_assert_eq!(t.probability, 0.0);
            prop_assert!(t.signals.is_empty());
        }
    }

    #[test]
    fn short_history_is_accumulation(bars in bars_strategy(30), ratio in 0.0f64..5.0) {
        let volume = VolumeAnalysis::from_ratio(ratio);
        for direction in [TrendDirection::Upward, TrendDirection::Downward, TrendDirection::Sideways] {
            prop_assert_eq!(PhaseClassifier::default().classify(&bars, direction, &volume), Phase::Accumulation);
        }
    }

    #[test]
    fn analysis_is_idempotent(bars in bars_strategy(200), scope in scope_strategy()) {
        let engine = AnalysisEngine::default();
        let volume = VolumeAnalysis::from_bars(&bars);
        let first = engine.analyze(&bars, scope, &volume).unwrap();
        let second = engine.analyze(&bars, scope, &volume).unwrap();
        prop_assert_eq!(first, second);
    }
}

#[test]
fn wire_shape_uses_snake_case() {
    use serde_json::{json, to_value};

    assert_eq!(to_value(Phase::PublicParticipation).unwrap(), json!("public_participation"));
    assert_eq!(to_value(TrendScope::Primary).unwrap(), json!("primary"));
    assert_eq!(to_value(Strength::Strong).unwrap(), json!("strong"));
    assert_eq!(to_value(LevelKind::Support).unwrap(), json!("support"));

    let transition = PhaseTransition::unchanged(Phase::Panic);
    assert_eq!(
        to_value(&transition).unwrap(),
        json!({
            "probability": 0.0,
            "next_phase": "panic",
            "signals": [],
            "current_phase_strength": 0.0,
        })
    );

    let bar: Bar = serde_json::from_value(json!({
        "timestamp": null,
        "open": 1.0,
        "high": 2.0,
        "low": 0.5,
        "close": 1.5,
        "volume": 10.0,
    }))
    .unwrap();
    assert_eq!(bar.timestamp, None);
}
