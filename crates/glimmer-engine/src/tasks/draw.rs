use glimmer_core::GlimmerResult;

use crate::coordinator::Coordinator;
use crate::scheduler::Budget;

/// Issue the draw command, and keep drawing every frame until the latest
/// arrival time has passed.
pub fn draw(coordinator: &mut Coordinator, _budget: &Budget<'_>) -> GlimmerResult<bool> {
    coordinator.task_runs.draw += 1;

    let elapsed = coordinator.elapsed_time_ms();
    coordinator.gpu.draw(coordinator.instance_count, elapsed)?;

    match coordinator.to_draw_ts_range.high_bound() {
        Some(until) if until > elapsed => coordinator.queue_draw(),
        _ => coordinator.to_draw_ts_range.clear(),
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::tests::coordinator;
    use crate::tasks;

    #[test]
    fn test_redraws_until_watermark_passes() {
        let (timing, mut coordinator) = coordinator(4);
        coordinator.to_draw_ts_range.expand_to_include(50.0);

        draw(&mut coordinator, &Budget::unlimited()).unwrap();
        assert!(coordinator.scheduler().is_scheduled_id(tasks::DRAW));

        coordinator.scheduler().unschedule_task(tasks::DRAW);
        timing.advance(60.0);
        draw(&mut coordinator, &Budget::unlimited()).unwrap();
        assert!(!coordinator.scheduler().is_scheduled_id(tasks::DRAW));
        assert!(!coordinator.to_draw_ts_range.is_defined());
        assert_eq!(coordinator.task_runs.draw, 2);
    }
}
