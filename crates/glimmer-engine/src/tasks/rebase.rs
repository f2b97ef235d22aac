use glimmer_core::{GlimmerError, GlimmerResult, LifecyclePhase};

use crate::coordinator::Coordinator;
use crate::scheduler::Budget;

/// Collapse in-flight animations of `NeedsRebase` sprites into a fresh
/// previous value and velocity at the current time.
///
/// The rebase command reads the current target texture, so this must run
/// before those sprites' new targets are uploaded.
pub fn rebase(coordinator: &mut Coordinator, _budget: &Budget<'_>) -> GlimmerResult<bool> {
    coordinator.task_runs.rebase += 1;

    let Some((low, high)) = coordinator.rebase_range.bounds() else {
        return Err(GlimmerError::internal("rebase ran with an empty rebase range"));
    };

    let mut swatch_uvs = Vec::new();
    for index in low..=high {
        if coordinator.phase_at(index) != Some(LifecyclePhase::NeedsRebase) {
            continue;
        }
        swatch_uvs.extend_from_slice(&coordinator.layout.swatch_uv(index));
    }
    let count = swatch_uvs.len() / 2;
    if count == 0 {
        return Err(GlimmerError::internal(format!(
            "rebase range [{}, {}] holds no sprite needing a rebase",
            low, high
        )));
    }

    let elapsed = coordinator.elapsed_time_ms();
    coordinator.gpu.stage_rebase_inputs(&swatch_uvs)?;
    coordinator.gpu.run_rebase(count, elapsed)?;

    for index in low..=high {
        if coordinator.phase_at(index) != Some(LifecyclePhase::NeedsRebase) {
            continue;
        }
        let id = coordinator.sprite_at(index)?;
        coordinator.set_phase(id, LifecyclePhase::NeedsTextureSync)?;
        coordinator.needs_texture_sync_range.expand_to_include(index);
    }

    coordinator.gpu.copy_rebase_output_to_previous()?;
    coordinator.rebase_range.clear();
    coordinator.queue_texture_sync();

    tracing::debug!(count, "rebase finished");
    Ok(true)
}
