use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glimmer_core::{
    FrameHandle, GlimmerError, GlimmerResult, LifecyclePhase, ManualTiming, SceneConfig,
    TimingSource,
};
use glimmer_engine::{GpuCall, HitTestParams, RecordingBackend, Scene, Sprite, SpriteView};

const FRAME_MS: f64 = 16.0;

fn config(capacity: usize) -> SceneConfig {
    let mut config = SceneConfig::default();
    config.capacity.desired_sprite_capacity = capacity;
    config
}

fn create_scene(capacity: usize) -> (Rc<ManualTiming>, Scene) {
    let timing = Rc::new(ManualTiming::new());
    let scene = Scene::new(&config(capacity), timing.clone(), Box::new(RecordingBackend::new()))
        .expect("scene should build");
    (timing, scene)
}

/// Fire the pending frame, if any. Returns whether a tick ran.
fn frame(timing: &ManualTiming, scene: &Scene) -> GlimmerResult<bool> {
    if timing.take_frame().is_none() {
        return Ok(false);
    }
    timing.advance(FRAME_MS);
    scene.tick()?;
    Ok(true)
}

fn run_until_idle(timing: &ManualTiming, scene: &Scene) {
    for _ in 0..10_000 {
        if !frame(timing, scene).expect("tick should succeed") {
            return;
        }
    }
    panic!("scene never went idle");
}

fn instant_exit(view: &mut SpriteView<'_>) -> GlimmerResult<()> {
    view.set_transition_time_ms(0.0)
}

fn assert_index_matches_phase(sprites: &[Sprite]) {
    for sprite in sprites {
        assert_eq!(
            sprite.index().is_some(),
            sprite.phase().holds_swatch(),
            "{:?}",
            sprite
        );
    }
}

#[test]
fn test_enter_walks_the_full_lifecycle() {
    let backend = RecordingBackend::new();
    let log = backend.log();
    let timing = Rc::new(ManualTiming::new());
    let scene = Scene::new(&config(16), timing.clone(), Box::new(backend)).unwrap();

    let sprite = scene.create_sprite().unwrap();
    assert_eq!(sprite.phase(), LifecyclePhase::Rest);
    sprite
        .enter(|view| {
            view.set_position_world((10.0, 20.0))?;
            view.set_fill_color([255.0, 128.0, 0.0])?;
            view.set_transition_time_ms(500.0)
        })
        .unwrap();

    let mut phases = vec![sprite.phase()];
    while frame(&timing, &scene).unwrap() {
        if phases.last() != Some(&sprite.phase()) {
            phases.push(sprite.phase());
        }
    }

    assert_eq!(
        phases,
        vec![
            LifecyclePhase::HasCallback,
            LifecyclePhase::NeedsRebase,
            LifecyclePhase::NeedsTextureSync,
            LifecyclePhase::Rest,
        ]
    );
    let stats = scene.stats().unwrap();
    assert_eq!(stats.task_runs.removal, 0);
    assert_eq!(stats.rest, 1);
    assert!(scene.elapsed_time_ms().unwrap() >= 500.0);

    assert_eq!(
        log.count(|call| matches!(call, GpuCall::RunRebase { count: 1, .. })),
        1
    );
    assert_eq!(
        log.count(|call| matches!(call, GpuCall::WriteTargetRows { first_row: 0, .. })),
        1
    );
    assert!(log.count(|call| matches!(call, GpuCall::Draw { instance_count: 1, .. })) > 1);
}

#[test]
fn test_scene_goes_idle() {
    let (timing, scene) = create_scene(4);
    let sprite = scene.create_sprite().unwrap();
    sprite.enter(|view| view.set_transition_time_ms(100.0)).unwrap();
    run_until_idle(&timing, &scene);

    assert!(timing.pending_frame().is_none());
    assert!(!scene.has_pending_work());
    let requests = timing.request_count();
    timing.advance(1000.0);
    assert_eq!(timing.request_count(), requests);
}

#[test]
fn test_removed_swatch_goes_to_next_sprite() {
    let (timing, scene) = create_scene(2);
    let a = scene.create_sprite().unwrap();
    let _b = scene.create_sprite().unwrap();
    let former = a.index();

    a.exit(instant_exit).unwrap();
    run_until_idle(&timing, &scene);
    assert!(a.is_removed());
    assert_eq!(a.index(), None);

    let c = scene.create_sprite().unwrap();
    assert_eq!(c.index(), former);
}

#[test]
fn test_sprite_churn_keeps_storage_bounded() {
    let (timing, scene) = create_scene(4);
    let kept = scene.create_sprite().unwrap();
    kept.exit(instant_exit).unwrap();
    run_until_idle(&timing, &scene);

    for round in 0..500 {
        let batch: Vec<_> = (0..3).map(|_| scene.create_sprite().unwrap()).collect();
        for sprite in &batch {
            sprite.exit(instant_exit).unwrap();
        }
        run_until_idle(&timing, &scene);
        let stats = scene.stats().unwrap();
        assert_eq!(stats.sprites, 0, "round {}", round);
        assert!(stats.instance_count <= 4);
    }

    let stats = scene.stats().unwrap();
    assert_eq!(stats.removed, 1501);
    assert!(kept.is_removed());
    let err = kept.update(|_| Ok(())).unwrap_err();
    assert!(matches!(err, GlimmerError::InvalidArgument(_)));
}

#[test]
fn test_waiting_sprites_drain_in_order() {
    let (timing, scene) = create_scene(2);
    let held: Vec<_> = (0..2).map(|_| scene.create_sprite().unwrap()).collect();
    let waiting: Vec<_> = (0..3).map(|_| scene.create_sprite().unwrap()).collect();
    assert!(waiting.iter().all(|sprite| sprite.phase() == LifecyclePhase::Created));

    waiting[1].abandon().unwrap();
    for sprite in &held {
        sprite.exit(instant_exit).unwrap();
    }
    run_until_idle(&timing, &scene);

    assert_eq!(waiting[0].index(), Some(0));
    assert!(waiting[1].is_removed() && waiting[1].is_abandoned());
    assert_eq!(waiting[2].index(), Some(1));
    assert!(waiting[2].is_active());
}

#[test]
fn test_callback_registered_while_waiting_runs_after_assignment() {
    let (timing, scene) = create_scene(1);
    let first = scene.create_sprite().unwrap();
    let second = scene.create_sprite().unwrap();
    let ran = Rc::new(Cell::new(false));
    let flag = Rc::clone(&ran);
    second
        .enter(move |view| {
            flag.set(true);
            view.set_order(2.0)
        })
        .unwrap();

    first.exit(instant_exit).unwrap();
    run_until_idle(&timing, &scene);
    assert!(ran.get());
    assert_eq!(second.phase(), LifecyclePhase::Rest);
}

#[test]
fn test_exit_animation_removes_after_arrival() {
    let (timing, scene) = create_scene(4);
    let sprite = scene.create_sprite().unwrap();
    sprite.exit(|view| view.set_transition_time_ms(300.0)).unwrap();

    for _ in 0..4 {
        frame(&timing, &scene).unwrap();
    }
    assert_eq!(sprite.phase(), LifecyclePhase::Rest);
    assert!(!sprite.is_removed());
    assert!(sprite.update(|_| Ok(())).is_err());

    run_until_idle(&timing, &scene);
    assert!(sprite.is_removed());
    let stats = scene.stats().unwrap();
    assert!(stats.task_runs.removal > 0);
    assert_eq!(stats.instance_count, 0);
}

#[test]
fn test_failed_callback_does_not_strand_sprite() {
    let (timing, scene) = create_scene(4);
    let broken = scene.create_sprite().unwrap();
    broken
        .enter(|_| Err(GlimmerError::callback("bad data")))
        .unwrap();

    let err = frame(&timing, &scene).unwrap_err();
    assert!(matches!(err, GlimmerError::Callback(_)));
    assert_ne!(broken.phase(), LifecyclePhase::HasCallback);

    run_until_idle(&timing, &scene);
    assert_eq!(broken.phase(), LifecyclePhase::Rest);
}

#[test]
fn test_updates_chain_through_lifecycle() {
    let (timing, scene) = create_scene(8);
    let sprites: Vec<_> = (0..8).map(|_| scene.create_sprite().unwrap()).collect();
    for (i, sprite) in sprites.iter().enumerate() {
        let order = i as f32;
        sprite.enter(move |view| view.set_order(order)).unwrap();
        sprite.update(|view| view.set_transition_time_ms(50.0)).unwrap();
        if i % 3 == 0 {
            sprite.exit(instant_exit).unwrap();
        }
    }

    for _ in 0..5 {
        frame(&timing, &scene).unwrap();
        assert_index_matches_phase(&sprites);
    }
    run_until_idle(&timing, &scene);
    assert_index_matches_phase(&sprites);

    for (i, sprite) in sprites.iter().enumerate() {
        if i % 3 == 0 {
            assert!(sprite.is_removed());
        } else {
            assert_eq!(sprite.phase(), LifecyclePhase::Rest);
        }
    }
}

#[test]
fn test_hit_test_reports_hits_in_depth_order() {
    let backend = RecordingBackend::new().with_hit_resolver(|_, candidate| candidate[2] % 2.0 == 0.0);
    let timing = Rc::new(ManualTiming::new());
    let scene = Scene::new(&config(4), timing.clone(), Box::new(backend)).unwrap();
    let sprites: Vec<_> = (0..5).map(|_| scene.create_sprite().unwrap()).collect();

    let result = scene
        .hit_test(&HitTestParams {
            sprites: &sprites,
            x: 5.0,
            y: 5.0,
            width: 2.0,
            height: 2.0,
            inclusive: false,
        })
        .unwrap();

    assert_eq!(result.len(), 5);
    assert!(result.values()[4] < 0.0, "waiting sprite cannot be hit");
    assert_eq!(result.hits_by_depth(), vec![2, 0]);
    assert!((result.values()[2] - 2.0).abs() < 0.25);
}

/// Clock that moves forward every time it is read, so any loop that checks
/// the time eventually runs out of budget.
#[derive(Default)]
struct CreepingTiming {
    now: Cell<f64>,
    pending: Cell<Option<FrameHandle>>,
    handles: Cell<u64>,
}

impl TimingSource for CreepingTiming {
    fn now(&self) -> f64 {
        let now = self.now.get() + 0.5;
        self.now.set(now);
        now
    }

    fn request_frame(&self) -> FrameHandle {
        let handle = FrameHandle(self.handles.get());
        self.handles.set(handle.0 + 1);
        self.pending.set(Some(handle));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if self.pending.get() == Some(handle) {
            self.pending.set(None);
        }
    }
}

#[test]
fn test_work_is_spread_across_frames() {
    let mut config = config(4096);
    config.timing.steps_between_remaining_time_checks = 4;
    config.timing.max_work_time_ms = 5.0;
    let timing = Rc::new(CreepingTiming::default());
    let scene = Scene::new(&config, timing.clone(), Box::new(RecordingBackend::new())).unwrap();

    let sprites: Vec<_> = (0..400).map(|_| scene.create_sprite().unwrap()).collect();
    for sprite in &sprites {
        sprite.enter(|view| view.set_transition_time_ms(0.0)).unwrap();
    }

    timing.pending.take();
    scene.tick().unwrap();
    let stats = scene.stats().unwrap();
    assert!(stats.has_callback > 0, "first frame should run out of budget");
    assert!(stats.has_callback < 400, "first frame should make progress");

    let mut frames = 1;
    while timing.pending.take().is_some() {
        scene.tick().unwrap();
        frames += 1;
        assert!(frames < 10_000, "scene never went idle");
    }
    assert!(sprites.iter().all(|sprite| sprite.phase() == LifecyclePhase::Rest));
}

#[test]
fn test_scene_rejects_reentrant_tick() {
    let (timing, scene) = create_scene(2);
    let scene = Rc::new(scene);
    let inner = Rc::clone(&scene);
    let seen = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&seen);
    let sprite = scene.create_sprite().unwrap();
    sprite
        .enter(move |_| {
            *slot.borrow_mut() = inner.tick().err().map(|err| err.is_fatal());
            Ok(())
        })
        .unwrap();

    frame(&timing, &scene).unwrap();
    assert_eq!(*seen.borrow(), Some(true));
}
