//! Restartable single-shot deadlines.
//!
//! Every debounce in the crate (output churn, geometry validation, hide and
//! show delays, sensor settling) is a [`CoalescingTrigger`]. Triggers never
//! sleep on their own: owners report the earliest pending deadline to their
//! actor loop and call [`CoalescingTrigger::poll`] when woken, which keeps the
//! state machines deterministic under test.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoalescingTrigger {
    interval: Duration,
    deadline: Option<Instant>,
}

impl CoalescingTrigger {
    pub fn new(interval: Duration) -> Self { Self { interval, deadline: None } }

    pub fn interval(&self) -> Duration { self.interval }

    /// Changes the interval. An armed deadline keeps its old value.
    pub fn set_interval(&mut self, interval: Duration) { self.interval = interval; }

    /// Arms the trigger, pushing back any deadline already pending.
    pub fn schedule(&mut self, now: Instant) { self.deadline = Some(now + self.interval); }

    /// Arms the trigger unless it is already pending. Returns whether it was armed.
    pub fn start_if_idle(&mut self, now: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.schedule(now);
        true
    }

    pub fn stop(&mut self) { self.deadline = None; }

    pub fn is_active(&self) -> bool { self.deadline.is_some() }

    pub fn deadline(&self) -> Option<Instant> { self.deadline }

    /// Fires at most once per arming: returns true and disarms when the
    /// deadline has passed.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// The soonest of a set of optional deadlines.
pub fn earliest(deadlines: impl IntoIterator<Item = Option<Instant>>) -> Option<Instant> {
    deadlines.into_iter().flatten().min()
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn rescheduling_pushes_the_deadline_back() {
        let start = Instant::now();
        let mut trigger = CoalescingTrigger::new(Duration::from_millis(100));

        trigger.schedule(start);
        trigger.schedule(start + Duration::from_millis(80));

        assert!(!trigger.poll(start + Duration::from_millis(120)));
        assert!(trigger.poll(start + Duration::from_millis(180)));
        assert!(!trigger.poll(start + Duration::from_millis(500)));
        assert!(!trigger.is_active());
    }

    #[test]
    fn start_if_idle_keeps_the_first_deadline() {
        let start = Instant::now();
        let mut trigger = CoalescingTrigger::new(Duration::from_millis(100));

        assert!(trigger.start_if_idle(start));
        assert!(!trigger.start_if_idle(start + Duration::from_millis(90)));
        assert_eq!(trigger.deadline(), Some(start + Duration::from_millis(100)));
    }

    #[test]
    fn zero_interval_fires_on_the_same_instant() {
        let now = Instant::now();
        let mut trigger = CoalescingTrigger::new(Duration::ZERO);
        trigger.schedule(now);
        assert!(trigger.poll(now));
    }

    #[test]
    fn stopped_trigger_never_fires() {
        let now = Instant::now();
        let mut trigger = CoalescingTrigger::new(Duration::from_millis(10));
        trigger.schedule(now);
        trigger.stop();
        assert!(!trigger.poll(now + Duration::from_secs(1)));
    }

    #[test]
    fn earliest_ignores_idle_triggers() {
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        assert_eq!(earliest([None, Some(later), Some(now), None]), Some(now));
        assert_eq!(earliest([None, None]), None);
    }
}
