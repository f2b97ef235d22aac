use glimmer_core::{GlimmerResult, LifecyclePhase};

use super::StepCounter;
use crate::coordinator::Coordinator;
use crate::scheduler::Budget;

/// Retire exiting sprites whose exit transition has arrived.
///
/// Due sprites get a zeroed swatch and go through one more texture sync,
/// which releases them. Sprites not yet due stay in the range.
pub fn removal(coordinator: &mut Coordinator, budget: &Budget<'_>) -> GlimmerResult<bool> {
    coordinator.task_runs.removal += 1;

    let Some((low, high)) = coordinator.to_be_removed_range.bounds() else {
        return Ok(true);
    };

    let elapsed = coordinator.elapsed_time_ms();
    if let Some(earliest) = coordinator.to_be_removed_ts_range.low_bound() {
        if earliest > elapsed {
            coordinator.queue_removal();
            return Ok(true);
        }
    }

    coordinator.to_be_removed_range.clear();
    coordinator.to_be_removed_ts_range.clear();

    let mut counter = StepCounter::new(coordinator.steps_between_checks);
    let mut index = low;
    let mut retired = 0usize;

    while index <= high {
        if counter.tick() && budget.is_exhausted() {
            tracing::debug!(retired, "removal out of time");
            // Unvisited sprites may already be due.
            coordinator.to_be_removed_range.expand_to_include(index);
            coordinator.to_be_removed_range.expand_to_include(high);
            coordinator.to_be_removed_ts_range.expand_to_include(elapsed);
            break;
        }
        if coordinator.phase_at(index) != Some(LifecyclePhase::Rest) {
            index += 1;
            continue;
        }
        let id = coordinator.sprite_at(index)?;
        if !coordinator.props(id)?.to_be_removed() {
            index += 1;
            continue;
        }

        let arrival = coordinator.transition_time_ms(id)?;
        if arrival <= elapsed {
            coordinator.zero_swatch(index);
            coordinator.set_phase(id, LifecyclePhase::NeedsTextureSync)?;
            coordinator.needs_texture_sync_range.expand_to_include(index);
            retired += 1;
        } else {
            coordinator.to_be_removed_range.expand_to_include(index);
            coordinator.to_be_removed_ts_range.expand_to_include(arrival);
        }
        index += 1;
    }

    if coordinator.to_be_removed_range.is_defined() {
        coordinator.queue_removal();
    }
    if retired > 0 {
        coordinator.queue_texture_sync();
    }

    tracing::debug!(retired, "removal finished");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::coordinator;
    use crate::sprite::SpriteId;
    use crate::tasks::{self, tests::StepClock};
    use glimmer_core::Attribute;

    fn exiting(coordinator: &mut Coordinator, arrival: f32) -> SpriteId {
        let id = coordinator.create_sprite().unwrap();
        let index = coordinator.props(id).unwrap().index().unwrap();
        coordinator.props_mut(id).unwrap().to_be_removed = true;
        coordinator
            .sprite_view(id)
            .unwrap()
            .set(Attribute::TransitionTimeMs, &[arrival])
            .unwrap();
        coordinator.to_be_removed_range.expand_to_include(index);
        coordinator
            .to_be_removed_ts_range
            .expand_to_include(f64::from(arrival));
        id
    }

    #[test]
    fn test_short_circuits_before_earliest_arrival() {
        let (timing, mut coordinator) = coordinator(4);
        let a = exiting(&mut coordinator, 300.0);
        timing.advance(100.0);

        removal(&mut coordinator, &Budget::unlimited()).unwrap();
        assert_eq!(coordinator.props(a).unwrap().phase(), LifecyclePhase::Rest);
        assert!(coordinator.to_be_removed_range.is_defined());
        assert!(coordinator.scheduler().is_scheduled_id(tasks::REMOVAL));
    }

    #[test]
    fn test_retires_due_sprites_and_keeps_the_rest() {
        let (timing, mut coordinator) = coordinator(4);
        let due = exiting(&mut coordinator, 100.0);
        let later = exiting(&mut coordinator, 900.0);
        timing.advance(200.0);

        removal(&mut coordinator, &Budget::unlimited()).unwrap();
        assert_eq!(
            coordinator.props(due).unwrap().phase(),
            LifecyclePhase::NeedsTextureSync
        );
        assert_eq!(coordinator.props(later).unwrap().phase(), LifecyclePhase::Rest);
        assert_eq!(coordinator.to_be_removed_range.bounds(), Some((1, 1)));
        assert_eq!(coordinator.to_be_removed_ts_range.low_bound(), Some(900.0));
        assert!(coordinator.needs_texture_sync_range.contains(0));
        assert!(coordinator
            .sprite_view(due)
            .unwrap()
            .values()
            .iter()
            .all(|v| *v == 0.0));
    }

    #[test]
    fn test_out_of_time_keeps_unvisited_sprites_due() {
        let (timing, mut coordinator) = coordinator(8);
        coordinator.steps_between_checks = 1;
        let ids: Vec<_> = (0..5).map(|_| exiting(&mut coordinator, 100.0)).collect();
        let statuses: Vec<_> = ids.iter().map(|&id| coordinator.status(id).unwrap()).collect();
        timing.advance(200.0);
        coordinator.scheduler().unschedule_task(tasks::REMOVAL);

        let clock = StepClock::new(1.0);
        removal(&mut coordinator, &clock.budget(2)).unwrap();

        assert_eq!(statuses[0].phase(), LifecyclePhase::NeedsTextureSync);
        assert_eq!(statuses[1].phase(), LifecyclePhase::NeedsTextureSync);
        assert!(statuses[2..].iter().all(|s| s.phase() == LifecyclePhase::Rest));
        assert_eq!(coordinator.to_be_removed_range.bounds(), Some((2, 4)));
        assert_eq!(coordinator.to_be_removed_ts_range.low_bound(), Some(200.0));
        assert_eq!(coordinator.needs_texture_sync_range.bounds(), Some((0, 1)));
        assert!(coordinator.scheduler().is_scheduled_id(tasks::REMOVAL));

        // Next frame picks up where this one stopped.
        removal(&mut coordinator, &Budget::unlimited()).unwrap();
        assert!(statuses
            .iter()
            .all(|s| s.phase() == LifecyclePhase::NeedsTextureSync));
        assert!(!coordinator.to_be_removed_range.is_defined());
        assert_eq!(coordinator.needs_texture_sync_range.bounds(), Some((0, 4)));
    }
}
