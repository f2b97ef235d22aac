//! Shared engine state: sprites, swatches, index ranges and task queuing.

use std::collections::VecDeque;
use std::ops::Range;
use std::rc::Rc;

use serde::Serialize;

use glimmer_core::{
    Attribute, AttributeLayout, GlimmerError, GlimmerResult, IndexRange, LifecyclePhase,
    SceneConfig, TimeRange, TimingSource,
};

use crate::gpu::GpuBackend;
use crate::scheduler::{TaskCallback, TaskId, WorkScheduler, WorkTask};
use crate::sprite::{CallbackKind, SpriteCallback, SpriteId, SpriteProperties, SpriteStatus};
use crate::tasks;
use crate::view::{SpriteView, SwatchView};

/// How many times each task body has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskRuns {
    pub assign_waiting: u64,
    pub run_callbacks: u64,
    pub rebase: u64,
    pub texture_sync: u64,
    pub removal: u64,
    pub draw: u64,
}

/// Snapshot of scene bookkeeping.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneStats {
    pub capacity: usize,
    /// Sprites with a live record: waiting or holding a swatch.
    pub sprites: usize,
    pub instance_count: usize,
    pub waiting: usize,
    pub created: usize,
    pub rest: usize,
    pub has_callback: usize,
    pub needs_rebase: usize,
    pub needs_texture_sync: usize,
    /// Sprites removed or abandoned since the scene was created.
    pub removed: usize,
    pub elapsed_ms: f64,
    pub task_runs: TaskRuns,
}

impl SceneStats {
    pub fn count(&self, phase: LifecyclePhase) -> usize {
        match phase {
            LifecyclePhase::Created => self.created,
            LifecyclePhase::Rest => self.rest,
            LifecyclePhase::HasCallback => self.has_callback,
            LifecyclePhase::NeedsRebase => self.needs_rebase,
            LifecyclePhase::NeedsTextureSync => self.needs_texture_sync,
            LifecyclePhase::Removed => self.removed,
        }
    }

    /// Sprites currently holding a swatch.
    pub fn active(&self) -> usize {
        self.rest + self.has_callback + self.needs_rebase + self.needs_texture_sync
    }
}

/// An arena slot. `generation` advances every time the slot is released.
struct SpriteSlot {
    generation: u32,
    props: Option<SpriteProperties>,
}

/// Owner of every piece of mutable engine state.
///
/// Task functions in [`crate::tasks`] receive `&mut Coordinator` from the
/// scheduler. Sprite handles reach it through the scene's shared cell.
pub struct Coordinator {
    pub(crate) layout: AttributeLayout,
    pub(crate) default_transition_time_ms: f64,
    pub(crate) steps_between_checks: usize,
    pub(crate) hit_test_max_candidates: usize,

    timing: Rc<dyn TimingSource>,
    scheduler: WorkScheduler<Coordinator>,
    pub(crate) gpu: Box<dyn GpuBackend>,
    start_ms: f64,

    /// Sprite records addressed by [`SpriteId`]. Removed sprites free their slot.
    slots: Vec<SpriteSlot>,
    free_slots: Vec<usize>,
    removed_total: usize,
    /// The sprite holding each swatch index, `None` once it was removed.
    pub(crate) sprites: Vec<Option<SpriteId>>,
    /// Sprites in `Created` waiting for a swatch, oldest first.
    pub(crate) waiting: VecDeque<SpriteId>,
    /// CPU mirror of the target-values texture.
    pub(crate) target_values: Vec<f32>,
    swatch_generations: Vec<u32>,
    /// One past the highest swatch index drawn.
    pub(crate) instance_count: usize,

    pub(crate) removed_range: IndexRange,
    pub(crate) callbacks_range: IndexRange,
    pub(crate) rebase_range: IndexRange,
    pub(crate) needs_texture_sync_range: IndexRange,
    pub(crate) to_be_removed_range: IndexRange,
    /// Arrival times of the sprites in `to_be_removed_range`.
    pub(crate) to_be_removed_ts_range: TimeRange,
    /// Keep drawing until the high bound has passed.
    pub(crate) to_draw_ts_range: TimeRange,

    pub(crate) task_runs: TaskRuns,
}

impl Coordinator {
    pub fn new(
        config: &SceneConfig,
        layout: AttributeLayout,
        scheduler: WorkScheduler<Coordinator>,
        mut gpu: Box<dyn GpuBackend>,
    ) -> GlimmerResult<Self> {
        gpu.init(&layout, &layout.instance_swatch_uvs())?;
        let timing = Rc::clone(scheduler.timing());
        let start_ms = timing.now();

        tracing::debug!(
            capacity = layout.capacity,
            width = layout.texture_width,
            height = layout.texture_height,
            "coordinator initialized"
        );

        Ok(Self {
            layout,
            default_transition_time_ms: config.timing.default_transition_time_ms,
            steps_between_checks: config.timing.steps_between_remaining_time_checks.max(1),
            hit_test_max_candidates: config.capacity.hit_test_max_candidates,
            timing,
            scheduler,
            gpu,
            start_ms,
            slots: Vec::new(),
            free_slots: Vec::new(),
            removed_total: 0,
            sprites: Vec::new(),
            waiting: VecDeque::new(),
            target_values: vec![0.0; layout.buffer_len()],
            swatch_generations: vec![0; layout.capacity],
            instance_count: 0,
            removed_range: IndexRange::new(),
            callbacks_range: IndexRange::new(),
            rebase_range: IndexRange::new(),
            needs_texture_sync_range: IndexRange::new(),
            to_be_removed_range: IndexRange::new(),
            to_be_removed_ts_range: TimeRange::new(),
            to_draw_ts_range: TimeRange::new(),
            task_runs: TaskRuns::default(),
        })
    }

    #[cfg(test)]
    pub(crate) fn scheduler(&self) -> &WorkScheduler<Coordinator> {
        &self.scheduler
    }

    pub fn layout(&self) -> &AttributeLayout {
        &self.layout
    }

    pub fn capacity(&self) -> usize {
        self.layout.capacity
    }

    pub fn instance_count(&self) -> usize {
        self.instance_count
    }

    /// Milliseconds since the coordinator was created.
    pub fn elapsed_time_ms(&self) -> f64 {
        self.timing.now() - self.start_ms
    }

    pub fn status(&self, id: SpriteId) -> GlimmerResult<Rc<SpriteStatus>> {
        Ok(Rc::clone(&self.props(id)?.status))
    }

    /// The live record behind `id`, or `None` once its sprite was removed.
    pub(crate) fn live_props(&self, id: SpriteId) -> Option<&SpriteProperties> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.props.as_ref())
    }

    fn live_props_mut(&mut self, id: SpriteId) -> Option<&mut SpriteProperties> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation())
            .and_then(|slot| slot.props.as_mut())
    }

    pub(crate) fn props(&self, id: SpriteId) -> GlimmerResult<&SpriteProperties> {
        self.live_props(id)
            .ok_or_else(|| GlimmerError::internal(format!("unknown sprite {}", id)))
    }

    pub(crate) fn props_mut(&mut self, id: SpriteId) -> GlimmerResult<&mut SpriteProperties> {
        self.live_props_mut(id)
            .ok_or_else(|| GlimmerError::internal(format!("unknown sprite {}", id)))
    }

    /// Records reached through a user's handle, which may outlive them.
    fn handle_props_mut(&mut self, id: SpriteId) -> GlimmerResult<&mut SpriteProperties> {
        self.live_props_mut(id)
            .ok_or_else(|| GlimmerError::invalid_argument(format!("sprite {} was removed", id)))
    }

    /// Phase at swatch `index`. Vacated swatches read as `Removed`; `None`
    /// past the highest swatch ever assigned.
    pub(crate) fn phase_at(&self, index: usize) -> Option<LifecyclePhase> {
        match self.sprites.get(index)? {
            Some(id) => self.live_props(*id).map(|props| props.phase()),
            None => Some(LifecyclePhase::Removed),
        }
    }

    pub(crate) fn sprite_at(&self, index: usize) -> GlimmerResult<SpriteId> {
        self.sprites
            .get(index)
            .copied()
            .flatten()
            .ok_or_else(|| GlimmerError::internal(format!("no sprite at swatch {}", index)))
    }

    pub(crate) fn set_phase(&mut self, id: SpriteId, phase: LifecyclePhase) -> GlimmerResult<()> {
        self.props_mut(id)?.set_phase(phase)
    }

    fn swatch_range(&self, index: usize) -> Range<usize> {
        let start = index * self.layout.values_per_swatch;
        start..start + self.layout.values_per_swatch
    }

    pub(crate) fn zero_swatch(&mut self, index: usize) {
        let range = self.swatch_range(index);
        self.target_values[range].fill(0.0);
    }

    /// Resolve a sprite's swatch link, failing if it is missing or stale.
    fn live_swatch(&self, id: SpriteId) -> GlimmerResult<usize> {
        let view = self
            .props(id)?
            .view
            .ok_or_else(|| GlimmerError::internal(format!("sprite {} has no attribute view", id)))?;
        let current = self.swatch_generations.get(view.index).copied();
        if current != Some(view.generation) {
            return Err(GlimmerError::internal(format!(
                "sprite {} holds a detached view of swatch {}",
                id, view.index
            )));
        }
        Ok(view.index)
    }

    pub(crate) fn sprite_view(&mut self, id: SpriteId) -> GlimmerResult<SpriteView<'_>> {
        let index = self.live_swatch(id)?;
        let range = self.swatch_range(index);
        Ok(SpriteView::new(index, &mut self.target_values[range]))
    }

    /// The sprite's transition time attribute. Absolute once its callback has run.
    pub(crate) fn transition_time_ms(&self, id: SpriteId) -> GlimmerResult<f64> {
        let index = self.live_swatch(id)?;
        let offset = self.swatch_range(index).start + Attribute::TransitionTimeMs.offset();
        Ok(f64::from(self.target_values[offset]))
    }

    /// Allocate a sprite, assigning a swatch now if one is free.
    pub fn create_sprite(&mut self) -> GlimmerResult<SpriteId> {
        let id = match self.free_slots.pop() {
            Some(slot) => {
                let entry = &mut self.slots[slot];
                entry.props = Some(SpriteProperties::new());
                SpriteId::new(slot, entry.generation)
            }
            None => {
                self.slots.push(SpriteSlot {
                    generation: 0,
                    props: Some(SpriteProperties::new()),
                });
                SpriteId::new(self.slots.len() - 1, 0)
            }
        };

        let full = !self.removed_range.is_defined() && self.sprites.len() >= self.capacity();
        if !self.waiting.is_empty() || full {
            self.waiting.push_back(id);
            tracing::trace!(sprite = %id, waiting = self.waiting.len(), "sprite waiting for a swatch");
            return Ok(id);
        }

        let index = self
            .get_next_index()?
            .ok_or_else(|| GlimmerError::internal("no free swatch for a sprite that did not wait"))?;
        self.assign_sprite_to_index(id, index)?;
        Ok(id)
    }

    /// The next swatch to hand out: a removed one if any, else a fresh one.
    pub fn get_next_index(&mut self) -> GlimmerResult<Option<usize>> {
        let Some((low, high)) = self.removed_range.bounds() else {
            let next = self.sprites.len();
            return Ok((next < self.capacity()).then_some(next));
        };

        for index in low..=high {
            if self.phase_at(index) == Some(LifecyclePhase::Removed) {
                self.removed_range.truncate_to_within(index + 1, high);
                return Ok(Some(index));
            }
        }
        Err(GlimmerError::internal(format!(
            "removed range [{}, {}] holds no removed sprite",
            low, high
        )))
    }

    /// Give a `Created` sprite the swatch at `index` and bring it to `Rest`.
    pub fn assign_sprite_to_index(&mut self, id: SpriteId, index: usize) -> GlimmerResult<()> {
        let phase = self.props(id)?.phase();
        if phase != LifecyclePhase::Created {
            return Err(GlimmerError::internal(format!(
                "sprite {} assigned a swatch from phase {}",
                id, phase
            )));
        }
        if index >= self.capacity() || index > self.sprites.len() {
            return Err(GlimmerError::internal(format!(
                "swatch {} out of bounds ({} sprites, capacity {})",
                index,
                self.sprites.len(),
                self.capacity()
            )));
        }

        self.zero_swatch(index);
        let generation = self.swatch_generations[index];
        if index == self.sprites.len() {
            self.sprites.push(Some(id));
        } else {
            self.sprites[index] = Some(id);
        }

        let props = self.props_mut(id)?;
        props.view = Some(SwatchView { index, generation });
        props.set_index(Some(index));
        props.set_phase(LifecyclePhase::Rest)?;

        self.instance_count = self.instance_count.max(index + 1);
        Ok(())
    }

    /// Release a sprite's swatch. The sprite must hold one.
    pub fn remove_sprite(&mut self, id: SpriteId) -> GlimmerResult<()> {
        let props = self.props_mut(id)?;
        if props.phase() == LifecyclePhase::Removed {
            return Err(GlimmerError::internal(format!("sprite {} removed twice", id)));
        }
        let index = props
            .index()
            .ok_or_else(|| GlimmerError::internal(format!("sprite {} removed without a swatch", id)))?;

        props.set_phase(LifecyclePhase::Removed)?;
        props.set_index(None);
        props.view = None;
        props.clear_callbacks();
        self.sprites[index] = None;
        self.release_slot(id);

        // Invalidate any outstanding view of this swatch.
        self.swatch_generations[index] = self.swatch_generations[index].wrapping_add(1);
        if index + 1 == self.instance_count {
            self.instance_count -= 1;
        }
        self.removed_range.expand_to_include(index);

        if !self.waiting.is_empty() {
            self.queue_assign_waiting();
        }
        tracing::trace!(sprite = %id, index, "sprite removed");
        Ok(())
    }

    /// Mark a waiting sprite as abandoned; it will never receive a swatch.
    pub fn abandon_sprite(&mut self, id: SpriteId) -> GlimmerResult<()> {
        let props = self.handle_props_mut(id)?;
        if props.phase() != LifecyclePhase::Created {
            return Err(GlimmerError::invalid_argument(format!(
                "only waiting sprites can be abandoned; sprite {} is {}",
                id,
                props.phase()
            )));
        }
        props.mark_abandoned();
        props.clear_callbacks();
        props.set_phase(LifecyclePhase::Removed)?;

        self.waiting.retain(|waiting| *waiting != id);
        self.release_slot(id);
        Ok(())
    }

    /// Drop a removed sprite's record and free its slot for reuse.
    fn release_slot(&mut self, id: SpriteId) {
        if let Some(slot) = self.slots.get_mut(id.slot()) {
            if slot.generation == id.generation() {
                slot.props = None;
                slot.generation = slot.generation.wrapping_add(1);
                self.free_slots.push(id.slot());
                self.removed_total += 1;
            }
        }
    }

    /// Store a sprite callback and schedule it if the sprite is at rest.
    pub fn set_sprite_callback(
        &mut self,
        id: SpriteId,
        kind: CallbackKind,
        callback: SpriteCallback,
    ) -> GlimmerResult<()> {
        let props = self.handle_props_mut(id)?;
        if props.is_abandoned() || props.phase() == LifecyclePhase::Removed {
            return Err(GlimmerError::invalid_argument(format!(
                "cannot add {} callback to removed sprite {}",
                kind, id
            )));
        }
        if props.to_be_removed {
            return Err(GlimmerError::invalid_argument(format!(
                "cannot add {} callback to exiting sprite {}",
                kind, id
            )));
        }

        props.set_callback(kind, callback);
        if kind == CallbackKind::Exit {
            props.to_be_removed = true;
        }

        if props.phase() == LifecyclePhase::Rest {
            props.set_phase(LifecyclePhase::HasCallback)?;
            if let Some(index) = props.index() {
                self.callbacks_range.expand_to_include(index);
            }
            self.queue_run_callbacks();
        }
        Ok(())
    }

    pub fn stats(&self) -> SceneStats {
        let mut stats = SceneStats {
            capacity: self.capacity(),
            instance_count: self.instance_count,
            waiting: self.waiting.len(),
            removed: self.removed_total,
            elapsed_ms: self.elapsed_time_ms(),
            task_runs: self.task_runs,
            ..SceneStats::default()
        };
        for props in self.slots.iter().filter_map(|slot| slot.props.as_ref()) {
            stats.sprites += 1;
            match props.phase() {
                LifecyclePhase::Created => stats.created += 1,
                LifecyclePhase::Rest => stats.rest += 1,
                LifecyclePhase::HasCallback => stats.has_callback += 1,
                LifecyclePhase::NeedsRebase => stats.needs_rebase += 1,
                LifecyclePhase::NeedsTextureSync => stats.needs_texture_sync += 1,
                // Released on removal; counted through `removed_total`.
                LifecyclePhase::Removed => {}
            }
        }
        stats
    }

    fn queue_task(&self, id: TaskId, callback: TaskCallback<Coordinator>) {
        self.scheduler.schedule_unique_task(WorkTask::new(id, callback));
    }

    pub fn queue_assign_waiting(&self) {
        self.queue_task(tasks::ASSIGN_WAITING, Rc::new(tasks::assign_waiting));
    }

    pub fn queue_run_callbacks(&self) {
        self.queue_task(tasks::RUN_CALLBACKS, Rc::new(tasks::run_callbacks));
    }

    pub fn queue_rebase(&self) {
        self.queue_task(tasks::REBASE, Rc::new(tasks::rebase));
    }

    pub fn queue_texture_sync(&self) {
        self.queue_task(tasks::TEXTURE_SYNC, Rc::new(tasks::texture_sync));
    }

    pub fn queue_removal(&self) {
        self.queue_task(tasks::REMOVAL, Rc::new(tasks::removal));
    }

    pub fn queue_draw(&self) {
        self.queue_task(tasks::DRAW, Rc::new(tasks::draw));
    }
}
