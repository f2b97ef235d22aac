//! The host-facing entry point tying the scheduler to a coordinator.

use std::cell::{RefCell, RefMut};
use std::rc::Rc;

use glimmer_core::{AttributeLayout, GlimmerError, GlimmerResult, SceneConfig, TimingSource};

use crate::coordinator::{Coordinator, SceneStats};
use crate::gpu::GpuBackend;
use crate::scheduler::WorkScheduler;
use crate::sprite::Sprite;
use crate::tasks::{self, HitTestArea, HitTestResult};

/// Candidates and area for [`Scene::hit_test`].
#[derive(Debug, Clone, Copy)]
pub struct HitTestParams<'a> {
    pub sprites: &'a [Sprite],
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub inclusive: bool,
}

/// A sprite scene driven by host frame callbacks.
///
/// The host calls [`Scene::tick`] whenever the [`TimingSource`] fires a frame
/// it was asked for. Every other method must be called outside a tick.
pub struct Scene {
    coordinator: Rc<RefCell<Coordinator>>,
    scheduler: WorkScheduler<Coordinator>,
    layout: AttributeLayout,
}

impl Scene {
    pub fn new(
        config: &SceneConfig,
        timing: Rc<dyn TimingSource>,
        gpu: Box<dyn GpuBackend>,
    ) -> GlimmerResult<Self> {
        config.validate()?;
        let layout = AttributeLayout::new(
            config.capacity.desired_sprite_capacity,
            config.capacity.max_texture_size,
        )?;
        if layout.capacity < config.capacity.desired_sprite_capacity {
            tracing::warn!(
                desired = config.capacity.desired_sprite_capacity,
                capacity = layout.capacity,
                "sprite capacity limited by max texture size"
            );
        }

        let scheduler = WorkScheduler::new(timing, config.timing.max_work_time_ms);
        let coordinator = Coordinator::new(config, layout, scheduler.clone(), gpu)?;
        tracing::info!(
            capacity = layout.capacity,
            texture = %format!("{}x{}", layout.texture_width, layout.texture_height),
            "scene created"
        );

        Ok(Self {
            coordinator: Rc::new(RefCell::new(coordinator)),
            scheduler,
            layout,
        })
    }

    pub fn layout(&self) -> &AttributeLayout {
        &self.layout
    }

    /// Run one frame's worth of queued work.
    pub fn tick(&self) -> GlimmerResult<()> {
        if self.scheduler.is_performing_work() {
            return Err(GlimmerError::internal("scene ticked from inside a tick"));
        }
        let mut coordinator = self.borrow_coordinator()?;
        self.scheduler.perform_work(&mut coordinator)
    }

    /// True while queued work is waiting for a frame.
    pub fn has_pending_work(&self) -> bool {
        let (present, future) = self.scheduler.pending_counts();
        present + future > 0
    }

    pub fn create_sprite(&self) -> GlimmerResult<Sprite> {
        let mut coordinator = self.borrow_coordinator()?;
        let id = coordinator.create_sprite()?;
        let status = coordinator.status(id)?;
        Ok(Sprite {
            id,
            status,
            coordinator: Rc::clone(&self.coordinator),
        })
    }

    /// Test sprites of this scene against a box. See [`HitTestResult`].
    pub fn hit_test(&self, params: &HitTestParams<'_>) -> GlimmerResult<HitTestResult> {
        if let Some(foreign) = params
            .sprites
            .iter()
            .find(|sprite| !Rc::ptr_eq(&sprite.coordinator, &self.coordinator))
        {
            return Err(GlimmerError::invalid_argument(format!(
                "sprite {} belongs to another scene",
                foreign.id
            )));
        }
        let ids: Vec<_> = params.sprites.iter().map(|sprite| sprite.id).collect();
        let area = HitTestArea {
            x: params.x,
            y: params.y,
            width: params.width,
            height: params.height,
            inclusive: params.inclusive,
        };
        let mut coordinator = self.borrow_coordinator()?;
        tasks::hit_test(&mut coordinator, &ids, &area)
    }

    pub fn stats(&self) -> GlimmerResult<SceneStats> {
        Ok(self.borrow_coordinator()?.stats())
    }

    pub fn elapsed_time_ms(&self) -> GlimmerResult<f64> {
        Ok(self.borrow_coordinator()?.elapsed_time_ms())
    }

    /// Resume requesting frames for queued work.
    pub fn enable(&self) {
        self.scheduler.enable();
    }

    /// Stop requesting frames. Queued work is kept until re-enabled.
    pub fn disable(&self) {
        self.scheduler.disable();
    }

    fn borrow_coordinator(&self) -> GlimmerResult<RefMut<'_, Coordinator>> {
        self.coordinator
            .try_borrow_mut()
            .map_err(|_| GlimmerError::busy("the scene is ticking"))
    }
}
