use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glimmer_core::{ManualTiming, SceneConfig};
use glimmer_engine::{Budget, NullBackend, Scene, TaskId, WorkScheduler, WorkTask};

fn scene(capacity: usize) -> (Rc<ManualTiming>, Scene) {
    let mut config = SceneConfig::default();
    config.capacity.desired_sprite_capacity = capacity;
    // Benchmarks measure throughput, not slicing.
    config.timing.max_work_time_ms = 1.0e9;
    let timing = Rc::new(ManualTiming::new());
    let scene = Scene::new(&config, timing.clone(), Box::new(NullBackend)).unwrap();
    (timing, scene)
}

fn drain(timing: &ManualTiming, scene: &Scene) {
    while timing.take_frame().is_some() {
        timing.advance(16.0);
        scene.tick().unwrap();
    }
}

fn count(counter: &mut u64, _: &Budget<'_>) -> glimmer_core::GlimmerResult<bool> {
    *counter += 1;
    Ok(true)
}

fn bench_scheduler_churn(c: &mut Criterion) {
    let names: Vec<&'static str> = (0..64)
        .map(|i| &*Box::leak(format!("task-{}", i).into_boxed_str()))
        .collect();

    c.bench_function("scheduler_schedule_and_run_64", |b| {
        let timing = Rc::new(ManualTiming::new());
        let scheduler: WorkScheduler<u64> = WorkScheduler::new(timing, f64::INFINITY);
        let mut counter = 0u64;
        b.iter(|| {
            for name in &names {
                scheduler.schedule_unique_task(WorkTask::new(TaskId::Named(name), Rc::new(count)));
            }
            scheduler.perform_work(&mut counter).unwrap();
            black_box(counter)
        })
    });
}

fn bench_create_sprites(c: &mut Criterion) {
    c.bench_function("create_10k_sprites", |b| {
        b.iter(|| {
            let (_timing, scene) = scene(10_000);
            for _ in 0..10_000 {
                black_box(scene.create_sprite().unwrap());
            }
        })
    });
}

fn bench_full_lifecycle(c: &mut Criterion) {
    c.bench_function("lifecycle_1k_sprites_enter_exit", |b| {
        b.iter(|| {
            let (timing, scene) = scene(1_000);
            let sprites: Vec<_> = (0..1_000).map(|_| scene.create_sprite().unwrap()).collect();
            for (i, sprite) in sprites.iter().enumerate() {
                let x = i as f32;
                sprite
                    .enter(move |view| {
                        view.set_position_world((x, x))?;
                        view.set_transition_time_ms(32.0)
                    })
                    .unwrap()
                    .exit(|view| view.set_transition_time_ms(0.0))
                    .unwrap();
            }
            drain(&timing, &scene);
            black_box(scene.stats().unwrap())
        })
    });
}

criterion_group!(
    benches,
    bench_scheduler_churn,
    bench_create_sprites,
    bench_full_lifecycle
);
criterion_main!(benches);
