//! Headless lifecycle simulation on a manual clock.

use std::rc::Rc;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use glimmer_core::{GlimmerResult, ManualTiming, SceneConfig, TimingSource};
use glimmer_engine::{GpuCall, GpuLog, RecordingBackend, Scene, SceneStats, Sprite, SpriteView};

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub sprites: usize,
    pub frame_ms: f64,
    pub max_frames: u64,
    pub skip_update: bool,
    pub keep: bool,
}

/// Phase counts after one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameReport {
    pub frame: u64,
    pub time_ms: f64,
    pub stats: SceneStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: &'static str,
    pub frames: u64,
    pub sprites_active: usize,
    pub sprites_waiting: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct GpuSummary {
    pub draws: usize,
    pub rebases: usize,
    pub row_uploads: usize,
    pub rows_uploaded: usize,
}

impl GpuSummary {
    fn from_log(log: &GpuLog) -> Self {
        let mut summary = GpuSummary::default();
        for call in log.calls() {
            match call {
                GpuCall::Draw { .. } => summary.draws += 1,
                GpuCall::RunRebase { .. } => summary.rebases += 1,
                GpuCall::WriteTargetRows { row_count, .. } => {
                    summary.row_uploads += 1;
                    summary.rows_uploaded += row_count;
                }
                _ => {}
            }
        }
        summary
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationSummary {
    pub sprites: usize,
    pub frames: u64,
    pub simulated_ms: f64,
    pub stages: Vec<StageReport>,
    pub gpu: GpuSummary,
    pub stats: SceneStats,
}

struct Simulation {
    timing: Rc<ManualTiming>,
    scene: Scene,
    frame_ms: f64,
    max_frames: u64,
    frames: u64,
    on_frame: Box<dyn FnMut(&FrameReport)>,
}

impl Simulation {
    /// Tick until the scene stops asking for frames.
    fn run_until_idle(&mut self, stage: &'static str) -> Result<StageReport> {
        let start = self.frames;
        while self.timing.take_frame().is_some() {
            if self.frames >= self.max_frames {
                bail!("scene still busy after {} frames", self.max_frames);
            }
            self.scene
                .tick()
                .with_context(|| format!("tick failed during {}", stage))?;
            self.frames += 1;
            let report = FrameReport {
                frame: self.frames,
                time_ms: self.timing.now(),
                stats: self.scene.stats()?,
            };
            tracing::debug!(
                frame = report.frame,
                rest = report.stats.rest,
                has_callback = report.stats.has_callback,
                needs_rebase = report.stats.needs_rebase,
                needs_texture_sync = report.stats.needs_texture_sync,
                removed = report.stats.removed,
                waiting = report.stats.waiting,
                "frame"
            );
            (self.on_frame)(&report);
            self.timing.advance(self.frame_ms);
        }

        let stats = self.scene.stats()?;
        let report = StageReport {
            stage,
            frames: self.frames - start,
            sprites_active: stats.active(),
            sprites_waiting: stats.waiting,
        };
        tracing::info!(stage, frames = report.frames, active = report.sprites_active, "stage settled");
        Ok(report)
    }
}

fn enter(index: usize) -> impl FnOnce(&mut SpriteView<'_>) -> GlimmerResult<()> {
    let column = (index % 100) as f32;
    let row = (index / 100) as f32;
    move |view: &mut SpriteView<'_>| -> GlimmerResult<()> {
        view.set_position_world([column, row])?;
        view.set_size_world(0.8)?;
        view.set_size_pixel(2.0)?;
        view.set_fill_color([64.0, 128.0, 255.0])?;
        view.set_order(index as f32)
    }
}

fn update(view: &mut SpriteView<'_>) -> GlimmerResult<()> {
    view.set_fill_color([255.0, 160.0, 32.0])?;
    view.set_size_world(1.0)
}

fn exit(view: &mut SpriteView<'_>) -> GlimmerResult<()> {
    view.set_fill_color([255.0, 160.0, 32.0, 0.0])?;
    view.set_size_world(0.0)
}

/// Drive `options.sprites` sprites through enter, update and exit.
///
/// `on_frame` sees every frame's phase counts.
pub fn run(
    config: &SceneConfig,
    options: &SimulateOptions,
    on_frame: impl FnMut(&FrameReport) + 'static,
) -> Result<SimulationSummary> {
    if options.frame_ms <= 0.0 || !options.frame_ms.is_finite() {
        bail!("frame duration must be a positive number of milliseconds");
    }

    let timing = Rc::new(ManualTiming::new());
    let backend = RecordingBackend::new();
    let gpu_log = backend.log();
    let scene = Scene::new(config, timing.clone(), Box::new(backend))?;
    let mut sim = Simulation {
        timing,
        scene,
        frame_ms: options.frame_ms,
        max_frames: options.max_frames,
        frames: 0,
        on_frame: Box::new(on_frame),
    };

    let sprites: Vec<Sprite> = (0..options.sprites)
        .map(|_| sim.scene.create_sprite())
        .collect::<Result<_, _>>()?;
    for (i, sprite) in sprites.iter().enumerate() {
        sprite.enter(enter(i))?;
    }
    let mut stages = vec![sim.run_until_idle("enter")?];

    if !options.skip_update {
        for sprite in &sprites {
            sprite.update(update)?;
        }
        stages.push(sim.run_until_idle("update")?);
    }

    if !options.keep {
        for sprite in &sprites {
            sprite.exit(exit)?;
        }
        stages.push(sim.run_until_idle("exit")?);
    }

    Ok(SimulationSummary {
        sprites: options.sprites,
        frames: sim.frames,
        simulated_ms: sim.frames as f64 * options.frame_ms,
        stages,
        gpu: GpuSummary::from_log(&gpu_log),
        stats: sim.scene.stats()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(sprites: usize) -> SimulateOptions {
        SimulateOptions {
            sprites,
            frame_ms: 16.0,
            max_frames: 10_000,
            skip_update: false,
            keep: false,
        }
    }

    fn config(capacity: usize) -> SceneConfig {
        let mut config = SceneConfig::default();
        config.capacity.desired_sprite_capacity = capacity;
        config
    }

    #[test]
    fn test_full_lifecycle_removes_every_sprite() {
        let summary = run(&config(64), &options(40), |_| {}).unwrap();
        assert_eq!(summary.stages.len(), 3);
        assert_eq!(summary.stats.removed, 40);
        assert_eq!(summary.stats.active(), 0);
        assert!(summary.gpu.draws > 0);
        assert!(summary.gpu.rebases > 0);
    }

    #[test]
    fn test_keep_leaves_sprites_at_rest() {
        let mut opts = options(10);
        opts.keep = true;
        let summary = run(&config(16), &opts, |_| {}).unwrap();
        assert_eq!(summary.stats.rest, 10);
        assert_eq!(summary.stages.last().map(|s| s.stage), Some("update"));
    }

    #[test]
    fn test_oversubscribed_scene_drains_waiting_sprites() {
        let summary = run(&config(8), &options(20), |_| {}).unwrap();
        assert_eq!(summary.stages[0].sprites_waiting, 12);
        assert_eq!(summary.stats.waiting, 0);
        assert_eq!(summary.stats.removed, 20);
    }

    #[test]
    fn test_frame_reports_are_streamed() {
        let seen = Rc::new(std::cell::Cell::new(0u64));
        let counter = Rc::clone(&seen);
        let summary = run(&config(16), &options(4), move |_| counter.set(counter.get() + 1)).unwrap();
        assert_eq!(seen.get(), summary.frames);
    }

    #[test]
    fn test_rejects_bad_frame_duration() {
        let mut opts = options(1);
        opts.frame_ms = 0.0;
        assert!(run(&config(4), &opts, |_| {}).is_err());
    }
}
