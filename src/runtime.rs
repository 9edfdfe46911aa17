//! Host runtime abstraction
//!
//! The engine never sleeps or spawns anything itself. It asks the host to
//! deliver an [`AlarmMessage`] back to the session after a delay, and to tell
//! it what time it is. A host typically backs this with its async runtime and
//! routes fired alarms to [`Session::receive_alarm`](crate::game::Session::receive_alarm)
//! through the same queue it uses for chat commands.

use web_time::{Duration, Instant};

use crate::timer::AlarmMessage;

/// Scheduling and clock primitives provided by the host
///
/// Implementations must eventually hand every scheduled alarm that was not
/// cancelled back to the session that scheduled it, on the same queue as
/// player commands so that the two never interleave. A host that cannot
/// cancel reliably may still deliver a cancelled alarm: the session
/// recognises and drops it.
pub trait Runtime {
    /// Cancellation handle for a scheduled alarm
    type Handle;

    /// Current monotonic time
    fn now(&self) -> Instant;

    /// Delivers `alarm` back to the session after `after` has elapsed
    fn schedule(&mut self, alarm: AlarmMessage, after: Duration) -> Self::Handle;

    /// Cancels a scheduled alarm
    ///
    /// Cancelling an alarm that already fired must be harmless.
    fn cancel(&mut self, handle: Self::Handle);
}

/// A deterministic runtime driven by hand
///
/// Time only moves when [`advance`](Self::advance) is called, which returns
/// the alarms that came due in the order they are due. Useful for tests and
/// for simulating whole games without waiting.
#[derive(Debug)]
pub struct ManualRuntime {
    now: Instant,
    next_handle: u64,
    pending: Vec<(u64, Instant, AlarmMessage)>,
}

impl Default for ManualRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualRuntime {
    /// Creates a runtime whose clock starts at the current instant
    pub fn new() -> Self {
        Self {
            now: Instant::now(),
            next_handle: 0,
            pending: Vec::new(),
        }
    }

    /// Moves the clock forward and returns the alarms that came due
    pub fn advance(&mut self, by: Duration) -> Vec<AlarmMessage> {
        self.now += by;
        let now = self.now;

        let (mut due, pending): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|(_, at, _)| *at <= now);
        self.pending = pending;

        due.sort_by_key(|(handle, at, _)| (*at, *handle));
        due.into_iter().map(|(_, _, alarm)| alarm).collect()
    }

    /// Number of alarms still waiting to fire
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

impl Runtime for ManualRuntime {
    type Handle = u64;

    fn now(&self) -> Instant {
        self.now
    }

    fn schedule(&mut self, alarm: AlarmMessage, after: Duration) -> Self::Handle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.pending.push((handle, self.now + after, alarm));
        handle
    }

    fn cancel(&mut self, handle: Self::Handle) {
        self.pending.retain(|(h, _, _)| *h != handle);
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::timer::TimerClass;

    fn alarm(class: TimerClass, ticket: u64) -> AlarmMessage {
        AlarmMessage { class, ticket }
    }

    #[test]
    fn test_alarms_fire_in_due_order() {
        let mut runtime = ManualRuntime::new();
        runtime.schedule(alarm(TimerClass::Round, 1), Duration::from_secs(20));
        runtime.schedule(alarm(TimerClass::Voting, 2), Duration::from_secs(10));
        runtime.schedule(alarm(TimerClass::Idle, 3), Duration::from_secs(90));

        let fired = runtime.advance(Duration::from_secs(30));

        assert_eq!(
            fired,
            vec![alarm(TimerClass::Voting, 2), alarm(TimerClass::Round, 1)]
        );
        assert_eq!(runtime.pending(), 1);
    }

    #[test]
    fn test_cancelled_alarm_never_fires() {
        let mut runtime = ManualRuntime::new();
        let handle = runtime.schedule(alarm(TimerClass::Autostart, 1), Duration::from_secs(5));
        runtime.cancel(handle);
        runtime.cancel(handle);

        assert!(runtime.advance(Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn test_clock_moves_only_on_advance() {
        let mut runtime = ManualRuntime::new();
        let start = runtime.now();

        runtime.advance(Duration::from_millis(1500));

        assert_eq!(runtime.now() - start, Duration::from_millis(1500));
    }
}
