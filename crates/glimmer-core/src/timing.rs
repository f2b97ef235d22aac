use std::cell::Cell;
use std::time::Instant;

/// Opaque handle for a pending frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// Host clock capability injected into the scheduler.
///
/// `request_frame` asks the host to call back into the scene once on its next
/// display refresh; the host is responsible for invoking `Scene::tick` then.
pub trait TimingSource {
    /// Monotonic time in milliseconds.
    fn now(&self) -> f64;

    fn request_frame(&self) -> FrameHandle;

    fn cancel_frame(&self, handle: FrameHandle);
}

/// Deterministic clock driven by hand. Used by tests and headless simulation.
#[derive(Debug, Default)]
pub struct ManualTiming {
    now_ms: Cell<f64>,
    next_handle: Cell<u64>,
    pending: Cell<Option<FrameHandle>>,
    requests: Cell<u64>,
    cancels: Cell<u64>,
}

impl ManualTiming {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the clock forward by `ms` milliseconds.
    pub fn advance(&self, ms: f64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }

    pub fn set_now(&self, ms: f64) {
        self.now_ms.set(ms);
    }

    /// The frame request currently outstanding, if any.
    pub fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending.get()
    }

    /// Consume the outstanding frame request, as a host does right before ticking.
    pub fn take_frame(&self) -> Option<FrameHandle> {
        self.pending.take()
    }

    pub fn request_count(&self) -> u64 {
        self.requests.get()
    }

    pub fn cancel_count(&self) -> u64 {
        self.cancels.get()
    }
}

impl TimingSource for ManualTiming {
    fn now(&self) -> f64 {
        self.now_ms.get()
    }

    fn request_frame(&self) -> FrameHandle {
        let handle = FrameHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.requests.set(self.requests.get() + 1);
        self.pending.set(Some(handle));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        self.cancels.set(self.cancels.get() + 1);
        if self.pending.get() == Some(handle) {
            self.pending.set(None);
        }
    }
}

/// Wall clock for native hosts that poll `frame_requested` from their own loop.
#[derive(Debug)]
pub struct InstantTiming {
    origin: Instant,
    next_handle: Cell<u64>,
    pending: Cell<Option<FrameHandle>>,
}

impl InstantTiming {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            next_handle: Cell::new(0),
            pending: Cell::new(None),
        }
    }

    pub fn frame_requested(&self) -> bool {
        self.pending.get().is_some()
    }

    pub fn take_frame(&self) -> Option<FrameHandle> {
        self.pending.take()
    }
}

impl Default for InstantTiming {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingSource for InstantTiming {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn request_frame(&self) -> FrameHandle {
        let handle = FrameHandle(self.next_handle.get());
        self.next_handle.set(handle.0 + 1);
        self.pending.set(Some(handle));
        handle
    }

    fn cancel_frame(&self, handle: FrameHandle) {
        if self.pending.get() == Some(handle) {
            self.pending.set(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_timing_advances() {
        let timing = ManualTiming::new();
        assert_eq!(timing.now(), 0.0);
        timing.advance(16.5);
        timing.advance(3.5);
        assert!((timing.now() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_manual_timing_frame_requests() {
        let timing = ManualTiming::new();
        let first = timing.request_frame();
        assert_eq!(timing.pending_frame(), Some(first));
        timing.cancel_frame(first);
        assert_eq!(timing.pending_frame(), None);

        let second = timing.request_frame();
        assert_ne!(first, second);
        assert_eq!(timing.take_frame(), Some(second));
        assert_eq!(timing.request_count(), 2);
        assert_eq!(timing.cancel_count(), 1);
    }

    #[test]
    fn test_instant_timing_is_monotonic() {
        let timing = InstantTiming::new();
        let a = timing.now();
        let b = timing.now();
        assert!(b >= a);
        timing.request_frame();
        assert!(timing.frame_requested());
        assert!(timing.take_frame().is_some());
        assert!(!timing.frame_requested());
    }
}
