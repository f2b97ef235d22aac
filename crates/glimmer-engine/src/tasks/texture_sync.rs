use glimmer_core::{GlimmerResult, IndexRange, LifecyclePhase};

use super::StepCounter;
use crate::coordinator::Coordinator;
use crate::scheduler::Budget;

/// Upload changed swatches to the target texture in whole rows and settle
/// each `NeedsTextureSync` sprite into its next phase.
///
/// Rows that a pending rebase still has to read are left alone: the task
/// then re-queues itself behind the rebase.
pub fn texture_sync(coordinator: &mut Coordinator, budget: &Budget<'_>) -> GlimmerResult<bool> {
    coordinator.task_runs.texture_sync += 1;

    let per_row = coordinator.layout.swatches_per_row;
    let capacity = coordinator.capacity();
    let sync_rows = coordinator
        .needs_texture_sync_range
        .row_expanded(per_row, capacity);
    let Some((low, high)) = sync_rows.bounds() else {
        return Ok(true);
    };

    let rebase_rows = coordinator.rebase_range.row_expanded(per_row, capacity);
    if sync_rows.overlaps(&rebase_rows) {
        tracing::warn!(
            sync = ?sync_rows.bounds(),
            rebase = ?rebase_rows.bounds(),
            "texture_sync deferred behind pending rebase"
        );
        coordinator.queue_rebase();
        coordinator.queue_texture_sync();
        return Ok(true);
    }

    let requested_high = coordinator
        .needs_texture_sync_range
        .high_bound()
        .unwrap_or(high);
    coordinator.needs_texture_sync_range.clear();

    let elapsed = coordinator.elapsed_time_ms();
    let mut counter = StepCounter::new(coordinator.steps_between_checks);
    let mut checked_at = 0usize;
    let mut index = low;
    let mut synced = 0usize;
    let mut removed = 0usize;
    let mut run_callbacks = false;
    let mut schedule_removal = false;

    while index <= high {
        counter.tick();
        // Only stop on a row boundary so every uploaded row is complete.
        if index > low && index % per_row == 0 {
            if counter.steps() - checked_at >= coordinator.steps_between_checks {
                checked_at = counter.steps();
                if budget.is_exhausted() {
                    tracing::debug!(synced, "texture_sync out of time");
                    break;
                }
            }
        }
        if coordinator.phase_at(index) != Some(LifecyclePhase::NeedsTextureSync) {
            index += 1;
            continue;
        }

        let id = coordinator.sprite_at(index)?;
        let props = coordinator.props(id)?;
        let (has_callback, to_be_removed) = (props.has_callback(), props.to_be_removed());
        synced += 1;

        if has_callback {
            coordinator.set_phase(id, LifecyclePhase::HasCallback)?;
            coordinator.callbacks_range.expand_to_include(index);
            run_callbacks = true;
        } else if !to_be_removed {
            coordinator.set_phase(id, LifecyclePhase::Rest)?;
        } else {
            let arrival = coordinator.transition_time_ms(id)?;
            if arrival <= elapsed {
                coordinator.zero_swatch(index);
                coordinator.remove_sprite(id)?;
                removed += 1;
            } else {
                coordinator.set_phase(id, LifecyclePhase::Rest)?;
                coordinator.to_be_removed_range.expand_to_include(index);
                coordinator.to_be_removed_ts_range.expand_to_include(arrival);
                schedule_removal = true;
            }
        }
        index += 1;
    }

    if index > low {
        let first_row = low / per_row;
        let row_count = (index - 1) / per_row - first_row + 1;
        let values_per_row = coordinator.layout.values_per_row();
        let start = first_row * values_per_row;
        let end = start + row_count * values_per_row;
        coordinator
            .gpu
            .write_target_rows(first_row, row_count, &coordinator.target_values[start..end])?;
    }

    if index <= requested_high {
        coordinator.needs_texture_sync_range = IndexRange::from_bounds(index, requested_high);
        coordinator.queue_texture_sync();
    }
    if run_callbacks {
        coordinator.queue_run_callbacks();
    }
    if schedule_removal {
        coordinator.queue_removal();
    }
    coordinator.queue_draw();

    tracing::debug!(synced, removed, "texture_sync finished");
    Ok(true)
}
