use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;
use reflex_core::{ClassifierParams, StimulusKind};
use reflex_experiment::{
    PositionRange, SessionConfig, SessionEvent, SessionStateMachine, TrialSpec,
};
use reflex_timing::ManualTimer;

fn session(trials: usize) -> SessionConfig {
    SessionConfig {
        guess_time_limit: 0.1,
        response_time_limit: 0.5,
        generated_duration: 1.0,
        random_positions: true,
        include_distractor: true,
        position_range: PositionRange {
            min_x: -400.0,
            max_x: 400.0,
            min_y: -300.0,
            max_y: 300.0,
        },
        trials: (0..trials)
            .map(|i| TrialSpec {
                delay: Some(0.5),
                is_distractor: Some(i % 5 == 0),
                ..TrialSpec::default()
            })
            .collect(),
    }
}

pub fn bench_classify(c: &mut Criterion) {
    let params = ClassifierParams::new(0.1, 0.5);
    c.bench_function("classify", |b| {
        b.iter(|| {
            for rt in [0.0, 0.05, 0.3, 0.6] {
                black_box(params.classify(1.0, StimulusKind::Normal, black_box(rt)).ok());
            }
        })
    });
}

pub fn bench_full_session(c: &mut Criterion) {
    let mut g = c.benchmark_group("session");
    g.sample_size(50);

    g.bench_function("200_trials", |b| {
        b.iter_batched(
            || {
                let clock = ManualTimer::new();
                let sm = SessionStateMachine::new(
                    session(200),
                    clock.clone(),
                    StdRng::seed_from_u64(42),
                )
                .expect("valid session");
                (sm, clock)
            },
            |(mut sm, clock)| {
                sm.start().unwrap();
                while !sm.is_finished() {
                    clock.advance_secs(0.5);
                    for event in sm.update() {
                        sm.handle_event(event).unwrap();
                    }
                    clock.advance_secs(0.3);
                    sm.handle_event(SessionEvent::ResponseNow).unwrap();
                    sm.drain_signals();
                }
                black_box(sm.results().summary())
            },
            BatchSize::SmallInput,
        )
    });

    g.finish();
}

criterion_group!(benches, bench_classify, bench_full_session);
criterion_main!(benches);
