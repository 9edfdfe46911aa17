//! Timer slots of a session
//!
//! Each [`TimerClass`] has exactly one slot. Arming a class cancels whatever
//! was armed in it before, and every alarm carries the ticket it was armed
//! with, so an alarm that fires after being superseded is recognised as stale
//! and dropped even if the host could not cancel it in time.

use enum_map::{Enum, EnumMap};
use serde::{Deserialize, Serialize};
use web_time::{Duration, Instant};

use crate::runtime::Runtime;

/// The independent timers a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Enum, Serialize, Deserialize)]
pub enum TimerClass {
    /// Countdown from a full enough lobby to the round start
    Autostart,
    /// Length of the running round
    Round,
    /// Voting window after a nomination
    Voting,
    /// Lifetime of a lobby that lacks players
    Idle,
    /// Warning shortly before the idle lobby expires
    IdleWarning,
}

/// Message delivered back to the session when a timer fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmMessage {
    /// Which timer fired
    pub class: TimerClass,
    /// The arming this alarm belongs to
    pub ticket: u64,
}

#[derive(Debug)]
struct Armed<H> {
    handle: H,
    ticket: u64,
    deadline: Instant,
}

/// One cancellable slot per timer class
///
/// Each slot remembers the host handle, the ticket and the deadline of its
/// current arming. The handle is used to cancel through the [`Runtime`], the
/// ticket to recognise stale alarms in [`claim`](Self::claim), and the
/// deadline to report the time left.
#[derive(Debug)]
pub struct Timers<H> {
    slots: EnumMap<TimerClass, Option<Armed<H>>>,
    next_ticket: u64,
}

impl<H> Default for Timers<H> {
    fn default() -> Self {
        Self {
            slots: EnumMap::from_fn(|_| None),
            next_ticket: 0,
        }
    }
}

impl<H> Timers<H> {
    /// Arms a timer, cancelling the previous one of the same class
    pub fn arm<R: Runtime<Handle = H>>(&mut self, class: TimerClass, after: Duration, runtime: &mut R) {
        self.cancel(class, runtime);

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let handle = runtime.schedule(AlarmMessage { class, ticket }, after);

        self.slots[class] = Some(Armed {
            handle,
            ticket,
            deadline: runtime.now() + after,
        });
    }

    /// Cancels the timer of a class, if armed
    pub fn cancel<R: Runtime<Handle = H>>(&mut self, class: TimerClass, runtime: &mut R) {
        if let Some(armed) = self.slots[class].take() {
            runtime.cancel(armed.handle);
        }
    }

    /// Cancels every armed timer
    pub fn cancel_all<R: Runtime<Handle = H>>(&mut self, runtime: &mut R) {
        for armed in self.slots.values_mut().filter_map(Option::take) {
            runtime.cancel(armed.handle);
        }
    }

    /// Consumes the slot an alarm belongs to
    ///
    /// # Returns
    ///
    /// `true` if the alarm matches the currently armed ticket of its class,
    /// `false` if it is stale.
    pub fn claim(&mut self, alarm: &AlarmMessage) -> bool {
        match &self.slots[alarm.class] {
            Some(armed) if armed.ticket == alarm.ticket => {
                self.slots[alarm.class] = None;
                true
            }
            _ => false,
        }
    }

    /// Whether a timer of the class is armed
    pub fn is_armed(&self, class: TimerClass) -> bool {
        self.slots[class].is_some()
    }

    /// Time left on a timer, if armed
    pub fn remaining(&self, class: TimerClass, now: Instant) -> Option<Duration> {
        self.slots[class]
            .as_ref()
            .map(|armed| armed.deadline.saturating_duration_since(now))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::runtime::ManualRuntime;

    #[test]
    fn test_rearming_supersedes_previous_alarm() {
        let mut runtime = ManualRuntime::new();
        let mut timers = Timers::default();

        timers.arm(TimerClass::Autostart, Duration::from_secs(10), &mut runtime);
        timers.arm(TimerClass::Autostart, Duration::from_secs(20), &mut runtime);

        assert_eq!(runtime.pending(), 1);
        assert!(runtime.advance(Duration::from_secs(15)).is_empty());

        let fired = runtime.advance(Duration::from_secs(5));
        assert_eq!(fired.len(), 1);
        assert!(timers.claim(&fired[0]));
        assert!(!timers.is_armed(TimerClass::Autostart));
    }

    #[test]
    fn test_stale_ticket_is_not_claimed() {
        let mut runtime = ManualRuntime::new();
        let mut timers = Timers::default();

        timers.arm(TimerClass::Voting, Duration::from_secs(30), &mut runtime);
        let stale = AlarmMessage {
            class: TimerClass::Voting,
            ticket: 0,
        };

        assert!(!timers.claim(&stale));
        assert!(timers.is_armed(TimerClass::Voting));
    }

    #[test]
    fn test_classes_are_independent() {
        let mut runtime = ManualRuntime::new();
        let mut timers = Timers::default();

        timers.arm(TimerClass::Round, Duration::from_secs(480), &mut runtime);
        timers.arm(TimerClass::Voting, Duration::from_secs(30), &mut runtime);
        timers.cancel(TimerClass::Voting, &mut runtime);

        assert!(timers.is_armed(TimerClass::Round));
        assert_eq!(runtime.pending(), 1);

        runtime.advance(Duration::from_secs(80));
        assert_eq!(
            timers.remaining(TimerClass::Round, runtime.now()),
            Some(Duration::from_secs(400))
        );
        assert_eq!(timers.remaining(TimerClass::Voting, runtime.now()), None);
    }

    #[test]
    fn test_cancel_all() {
        let mut runtime = ManualRuntime::new();
        let mut timers = Timers::default();

        timers.arm(TimerClass::Idle, Duration::from_secs(120), &mut runtime);
        timers.arm(TimerClass::IdleWarning, Duration::from_secs(60), &mut runtime);
        timers.cancel_all(&mut runtime);

        assert_eq!(runtime.pending(), 0);
        assert!(!timers.is_armed(TimerClass::Idle));
    }
}
