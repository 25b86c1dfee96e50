//! # MelodyMap Performance Benchmarks
//!
//! Every request retrains from scratch, so session latency is dominated by
//! the optimizer and by candidate scoring. These benchmarks track both.
//!
//! ## Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//!
//! # Run specific benchmark group
//! cargo bench training
//! cargo bench session
//! ```

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use melodymap::config::EngineConfig;
use melodymap::ensemble::{self, CandidateScores, EnsembleWeights};
use melodymap::labels::TrainingSet;
use melodymap::neighbors::NeighborScorer;
use melodymap::normalize::NormalizationStats;
use melodymap::regressor::ParametricRegressor;
use melodymap::session::{CancellationToken, ScoringSession};
use melodymap::track::{AudioFeatures, FeatureVector, TrackRecord};
use std::hint::black_box;

/// Deterministic pseudo-varied tracks
fn create_test_tracks(prefix: &str, count: usize) -> Vec<TrackRecord> {
    (0..count)
        .map(|i| {
            let phase = i as f64 * 0.37;
            TrackRecord {
                id: format!("{prefix}{i:04}"),
                name: format!("Track {i:04}"),
                artist: format!("Artist {}", i % 20),
                popularity: Some((i * 7 % 100) as f64),
                audio_features: Some(AudioFeatures {
                    danceability: Some(0.5 + 0.4 * phase.sin()),
                    energy: Some(0.5 + 0.4 * (phase * 1.3).cos()),
                    valence: Some((i % 10) as f64 / 10.0),
                    tempo: Some(80.0 + (i * 13 % 90) as f64),
                }),
            }
        })
        .collect()
}

fn training_set(count: usize) -> (NormalizationStats, TrainingSet) {
    let vectors: Vec<FeatureVector> = create_test_tracks("h", count)
        .iter()
        .map(|t| FeatureVector::extract(t).expect("bench tracks are complete"))
        .collect();
    let stats = NormalizationStats::fit(&vectors).expect("non-empty");
    (stats, TrainingSet::from_ranked(stats.apply(&vectors)))
}

/// Benchmark predictor fitting
fn benchmark_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");

    for size in [10, 50].iter() {
        let (_, training) = training_set(*size);
        group.bench_with_input(BenchmarkId::new("adam_1000_steps", size), &training, |b, training| {
            b.iter(|| {
                ParametricRegressor::default()
                    .fit(black_box(training), &CancellationToken::new())
                    .expect("fit succeeds")
            })
        });
    }

    let (_, training) = training_set(50);
    group.bench_function("normalization_fit", |b| {
        let vectors: Vec<FeatureVector> = training.examples().iter().map(|e| e.vector).collect();
        b.iter(|| NormalizationStats::fit(black_box(&vectors)))
    });

    group.finish();
}

/// Benchmark candidate scoring and ranking
fn benchmark_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");

    let (stats, training) = training_set(50);
    let mut scorer = NeighborScorer::new(5);
    scorer.fit(&training);
    let candidate = stats.normalize(&FeatureVector([55.0, 0.6, 0.4, 0.5, 118.0]));

    group.bench_function("neighbor_score_50", |b| {
        b.iter(|| scorer.score(black_box(&candidate)))
    });

    let scores: Vec<CandidateScores> = create_test_tracks("c", 100)
        .into_iter()
        .enumerate()
        .map(|(i, track)| CandidateScores {
            track,
            neighbor: (i % 7) as f64 / 7.0,
            parametric: (i % 11) as f64 / 11.0,
        })
        .collect();
    group.bench_function("rank_100_candidates", |b| {
        b.iter_batched(
            || scores.clone(),
            |scores| ensemble::rank(scores, EnsembleWeights::default(), 20),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

/// Benchmark a whole session, the latency a request sees
fn benchmark_session(c: &mut Criterion) {
    let mut group = c.benchmark_group("session");
    group.sample_size(20);

    let history = create_test_tracks("h", 50);
    let candidates = create_test_tracks("c", 100);

    group.bench_function("recommend_50x100", |b| {
        b.iter_batched(
            || (history.clone(), candidates.clone()),
            |(history, candidates)| {
                ScoringSession::new(EngineConfig::default())
                    .and_then(|session| session.recommend(history, candidates, 20))
                    .expect("session succeeds")
            },
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

// Group all benchmarks
criterion_group!(benches, benchmark_training, benchmark_scoring, benchmark_session);

criterion_main!(benches);
