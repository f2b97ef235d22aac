use glimmer_core::{Attribute, GlimmerError, GlimmerResult, LifecyclePhase};

use super::StepCounter;
use crate::coordinator::Coordinator;
use crate::scheduler::Budget;

/// Run the earliest pending callback of every sprite in `HasCallback`.
///
/// Before a callback runs its transition time is set to the default duration.
/// Afterwards the duration becomes an absolute arrival time and the sprite
/// moves on to `NeedsRebase` (still animating) or `NeedsTextureSync`. That
/// step also runs when the callback fails, and the failure is returned only
/// once the range and queues are consistent again.
pub fn run_callbacks(coordinator: &mut Coordinator, budget: &Budget<'_>) -> GlimmerResult<bool> {
    coordinator.task_runs.run_callbacks += 1;

    let Some((low, high)) = coordinator.callbacks_range.bounds() else {
        return Ok(true);
    };
    coordinator.callbacks_range.clear();

    let elapsed = coordinator.elapsed_time_ms();
    let default_duration = coordinator.default_transition_time_ms as f32;
    let mut counter = StepCounter::new(coordinator.steps_between_checks);
    let mut index = low;
    let mut ran = 0usize;
    let mut failure = None;
    let mut latest_arrival: Option<f64> = None;

    while index <= high {
        if counter.tick() && budget.is_exhausted() {
            tracing::debug!(ran, "run_callbacks out of time");
            break;
        }
        if coordinator.phase_at(index) != Some(LifecyclePhase::HasCallback) {
            index += 1;
            continue;
        }

        let id = coordinator.sprite_at(index)?;
        let (kind, callback) = coordinator
            .props_mut(id)?
            .take_next_callback()
            .ok_or_else(|| GlimmerError::internal(format!("sprite {} in has_callback without a callback", id)))?;

        let result = {
            let mut view = coordinator.sprite_view(id)?;
            view.set(Attribute::TransitionTimeMs, &[default_duration])?;
            callback(&mut view)
        };
        ran += 1;

        let arrival = {
            let mut view = coordinator.sprite_view(id)?;
            let arrival = f64::from(view.transition_time_ms()) + elapsed;
            view.set(Attribute::TransitionTimeMs, &[arrival as f32])?;
            arrival
        };
        latest_arrival = Some(latest_arrival.map_or(arrival, |latest| latest.max(arrival)));

        if arrival > elapsed {
            coordinator.set_phase(id, LifecyclePhase::NeedsRebase)?;
            coordinator.rebase_range.expand_to_include(index);
        } else {
            coordinator.set_phase(id, LifecyclePhase::NeedsTextureSync)?;
            coordinator.needs_texture_sync_range.expand_to_include(index);
            let props = coordinator.props(id)?;
            if props.to_be_removed() && !props.has_callback() {
                // Nothing left to interpolate toward.
                coordinator.zero_swatch(index);
            }
        }
        index += 1;

        if let Err(err) = result {
            tracing::error!(sprite = %id, callback = %kind, "sprite callback failed: {}", err);
            failure = Some(err);
            break;
        }
    }

    if index <= high {
        coordinator.callbacks_range.expand_to_include(index);
        coordinator.callbacks_range.expand_to_include(high);
        coordinator.queue_run_callbacks();
    }
    if coordinator.rebase_range.is_defined() {
        coordinator.queue_rebase();
    }
    if coordinator.needs_texture_sync_range.is_defined() {
        coordinator.queue_texture_sync();
    }
    if let Some(arrival) = latest_arrival {
        let extends = coordinator
            .to_draw_ts_range
            .high_bound()
            .map_or(true, |until| arrival > until);
        coordinator.to_draw_ts_range.expand_to_include(arrival);
        if extends {
            coordinator.queue_draw();
        }
    }

    tracing::debug!(ran, "run_callbacks finished");
    match failure {
        Some(err) => Err(err),
        None => Ok(true),
    }
}
