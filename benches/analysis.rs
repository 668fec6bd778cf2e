//! Benchmarks for trend, level and phase analysis.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use trendphase::prelude::*;

/// Deterministic pseudo-random walk with cycles, so pivots and levels exist
fn generate_bars(n: usize) -> Vec<Bar> {
  let mut bars = Vec::with_capacity(n);
  let mut price = 100.0;

  for i in 0..n {
    let change = ((i * 7 + 13) % 100) as f64 / 50.0 - 1.0 + ((i as f64) * 0.15).sin() * 0.8;
    let volatility = 2.0 + ((i * 3) % 10) as f64 / 5.0;

    let o = price;
    let c = (price + change).max(1.0);
    let h = o.max(c) + volatility * 0.5;
    let l = (o.min(c) - volatility * 0.5).max(0.5);
    let v = 1000.0 + ((i * 11) % 17) as f64 * 150.0;

    bars.push(Bar::new(i as i64 * 86_400_000, o, h, l, c, v));
    price = c;
  }

  bars
}

fn bench_analyzers(c: &mut Criterion) {
  let bars = generate_bars(250);
  let volume = VolumeAnalysis::from_bars(&bars);
  let mut group = c.benchmark_group("analyzers");

  let fitter = TrendLineFitter::default();
  group.bench_function("trend_line", |b| {
    b.iter(|| fitter.fit(black_box(&bars), TrendScope::Primary))
  });

  let locator = LevelLocator::default();
  group.bench_function("levels", |b| {
    b.iter(|| locator.locate(black_box(&bars), TrendScope::Primary))
  });

  let levels = locator.locate(&bars, TrendScope::Primary);
  let detector = BreakoutDetector::default();
  group.bench_function("breakout", |b| {
    b.iter(|| detector.detect(black_box(&bars), black_box(&levels), &volume))
  });

  let classifier = PhaseClassifier::default();
  group.bench_function("phase", |b| {
    b.iter(|| classifier.classify(black_box(&bars), TrendDirection::Upward, &volume))
  });

  let model = TransitionModel::default();
  group.bench_function("transition", |b| {
    b.iter(|| model.estimate(black_box(&bars), Phase::PublicParticipation))
  });

  group.finish();
}

fn bench_full_analysis(c: &mut Criterion) {
  let engine = AnalysisEngine::default();
  let mut group = c.benchmark_group("analyze");

  for size in [60, 250, 1000] {
    let bars = generate_bars(size);
    let volume = VolumeAnalysis::from_bars(&bars);
    group.bench_with_input(BenchmarkId::new("all_scopes", size), &bars, |b, bars| {
      b.iter(|| engine.analyze_all_scopes(black_box(bars), &volume))
    });
  }

  group.finish();
}

fn bench_parallel(c: &mut Criterion) {
  let engine = AnalysisEngine::default();
  let universe: Vec<(String, Vec<Bar>)> = (0..64)
    .map(|k| (format!("SYM{k}"), generate_bars(250 + k)))
    .collect();
  let volumes: Vec<VolumeAnalysis> = universe.iter().map(|(_, bars)| VolumeAnalysis::from_bars(bars)).collect();

  c.bench_function("analyze_parallel_64", |b| {
    b.iter(|| {
      let instruments: Vec<(&str, &[Bar], &VolumeAnalysis)> = universe
        .iter()
        .zip(&volumes)
        .map(|((symbol, bars), volume)| (symbol.as_str(), bars.as_slice(), volume))
        .collect();
      analyze_parallel(&engine, TrendScope::Secondary, instruments)
    })
  });
}

criterion_group!(benches, bench_analyzers, bench_full_analysis, bench_parallel);
criterion_main!(benches);
