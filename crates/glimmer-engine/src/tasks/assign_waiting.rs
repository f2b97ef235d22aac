use glimmer_core::{GlimmerError, GlimmerResult, LifecyclePhase};

use super::StepCounter;
use crate::coordinator::Coordinator;
use crate::scheduler::Budget;

/// Hand freed swatches to waiting sprites, oldest first.
///
/// Walks the removed range and the waiting queue in lockstep, skipping
/// abandoned sprites and indices whose sprite is not actually removed.
pub fn assign_waiting(coordinator: &mut Coordinator, budget: &Budget<'_>) -> GlimmerResult<bool> {
    coordinator.task_runs.assign_waiting += 1;

    let Some((low, high)) = coordinator.removed_range.bounds() else {
        return Err(GlimmerError::internal("assign_waiting ran with no removed swatches"));
    };
    if coordinator.waiting.is_empty() {
        return Err(GlimmerError::internal("assign_waiting ran with no waiting sprites"));
    }

    let mut counter = StepCounter::new(coordinator.steps_between_checks);
    let mut index = low;
    let mut assigned = 0usize;
    let mut promoted = false;

    while index <= high {
        if counter.tick() && budget.is_exhausted() {
            tracing::debug!(assigned, "assign_waiting out of time");
            break;
        }
        let Some(&id) = coordinator.waiting.front() else {
            break;
        };
        if coordinator.live_props(id).map_or(true, |props| props.is_abandoned()) {
            coordinator.waiting.pop_front();
            continue;
        }
        if coordinator.phase_at(index) != Some(LifecyclePhase::Removed) {
            index += 1;
            continue;
        }

        coordinator.waiting.pop_front();
        coordinator.assign_sprite_to_index(id, index)?;
        assigned += 1;

        // Callbacks registered while waiting run on a later pass of run_callbacks.
        if coordinator.props(id)?.has_callback() {
            coordinator.set_phase(id, LifecyclePhase::HasCallback)?;
            coordinator.callbacks_range.expand_to_include(index);
            promoted = true;
        }
        index += 1;
    }

    coordinator.removed_range.truncate_to_within(index, high);

    if !coordinator.waiting.is_empty() && coordinator.removed_range.is_defined() {
        coordinator.queue_assign_waiting();
    }
    if promoted {
        coordinator.queue_run_callbacks();
    }

    tracing::debug!(
        assigned,
        waiting = coordinator.waiting.len(),
        "assign_waiting finished"
    );
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::coordinator;
    use crate::sprite::{CallbackKind, SpriteId};
    use crate::tasks::{self, tests::StepClock};
    use crate::view::SpriteView;

    fn noop(_: &mut SpriteView<'_>) -> GlimmerResult<()> {
        Ok(())
    }

    fn release(coordinator: &mut Coordinator, id: SpriteId) {
        coordinator.set_phase(id, LifecyclePhase::NeedsTextureSync).unwrap();
        coordinator.remove_sprite(id).unwrap();
    }

    #[test]
    fn test_requires_removed_range_and_waiting_sprites() {
        let (_timing, mut coordinator) = coordinator(2);
        let err = assign_waiting(&mut coordinator, &Budget::unlimited()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_assigns_in_fifo_order_skipping_abandoned() {
        let (_timing, mut coordinator) = coordinator(3);
        let held: Vec<_> = (0..3).map(|_| coordinator.create_sprite().unwrap()).collect();
        let w1 = coordinator.create_sprite().unwrap();
        let w2 = coordinator.create_sprite().unwrap();
        let w3 = coordinator.create_sprite().unwrap();
        coordinator.abandon_sprite(w1).unwrap();

        release(&mut coordinator, held[2]);
        release(&mut coordinator, held[0]);
        assign_waiting(&mut coordinator, &Budget::unlimited()).unwrap();

        assert_eq!(coordinator.props(w2).unwrap().index(), Some(0));
        assert_eq!(coordinator.props(w3).unwrap().index(), Some(2));
        assert!(coordinator.waiting.is_empty());
        assert!(!coordinator.removed_range.is_defined());
    }

    #[test]
    fn test_promotes_sprites_with_pending_callbacks() {
        let (_timing, mut coordinator) = coordinator(1);
        let a = coordinator.create_sprite().unwrap();
        let b = coordinator.create_sprite().unwrap();
        coordinator
            .set_sprite_callback(b, CallbackKind::Enter, Box::new(noop))
            .unwrap();
        assert_eq!(coordinator.props(b).unwrap().phase(), LifecyclePhase::Created);

        release(&mut coordinator, a);
        assign_waiting(&mut coordinator, &Budget::unlimited()).unwrap();
        assert_eq!(
            coordinator.props(b).unwrap().phase(),
            LifecyclePhase::HasCallback
        );
        assert!(coordinator.callbacks_range.contains(0));
    }

    #[test]
    fn test_leftover_swatches_stay_removed() {
        let (_timing, mut coordinator) = coordinator(2);
        let a = coordinator.create_sprite().unwrap();
        let b = coordinator.create_sprite().unwrap();
        let w = coordinator.create_sprite().unwrap();
        release(&mut coordinator, a);
        release(&mut coordinator, b);
        assign_waiting(&mut coordinator, &Budget::unlimited()).unwrap();

        assert_eq!(coordinator.props(w).unwrap().index(), Some(0));
        assert_eq!(coordinator.removed_range.bounds(), Some((1, 1)));
    }

    #[test]
    fn test_out_of_time_resumes_in_queue_order() {
        let (_timing, mut coordinator) = coordinator(8);
        coordinator.steps_between_checks = 1;
        let held: Vec<_> = (0..8).map(|_| coordinator.create_sprite().unwrap()).collect();
        let waiting: Vec<_> = (0..6).map(|_| coordinator.create_sprite().unwrap()).collect();
        coordinator.abandon_sprite(waiting[2]).unwrap();
        for &id in &held {
            release(&mut coordinator, id);
        }
        coordinator.scheduler().unschedule_task(tasks::ASSIGN_WAITING);

        let clock = StepClock::new(1.0);
        assign_waiting(&mut coordinator, &clock.budget(3)).unwrap();

        assert_eq!(coordinator.props(waiting[0]).unwrap().index(), Some(0));
        assert_eq!(coordinator.props(waiting[1]).unwrap().index(), Some(1));
        assert_eq!(coordinator.props(waiting[3]).unwrap().index(), Some(2));
        assert_eq!(coordinator.props(waiting[4]).unwrap().index(), None);
        assert_eq!(
            coordinator.waiting.iter().copied().collect::<Vec<_>>(),
            vec![waiting[4], waiting[5]]
        );
        assert_eq!(coordinator.removed_range.bounds(), Some((3, 7)));
        assert!(coordinator.scheduler().is_scheduled_id(tasks::ASSIGN_WAITING));

        assign_waiting(&mut coordinator, &Budget::unlimited()).unwrap();
        assert_eq!(coordinator.props(waiting[4]).unwrap().index(), Some(3));
        assert_eq!(coordinator.props(waiting[5]).unwrap().index(), Some(4));
        assert!(coordinator.waiting.is_empty());
        assert_eq!(coordinator.removed_range.bounds(), Some((5, 7)));
    }
}
