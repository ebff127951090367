//! Named one-shot timers
//!
//! A cooperative, single-threaded timer registry keyed by name. Instead of
//! running callbacks, an expired timer yields the event value it was armed
//! with; the caller handles it and may re-arm a timer of the same name.
//! Time only moves when [`TimerScheduler::tick`] is called, which keeps
//! the scheduler deterministic under test.

use bleshock_core::{Error, Result};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::trace;

#[derive(Debug)]
struct Timer<E> {
    deadline: Instant,
    delay: Duration,
    seq: u64,
    event: E,
}

/// Registry of named one-shot timers
#[derive(Debug)]
pub struct TimerScheduler<E> {
    timers: HashMap<String, Timer<E>>,
    now: Instant,
    next_seq: u64,
}

impl<E> Default for TimerScheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> TimerScheduler<E> {
    /// Create a scheduler whose clock starts now
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Create a scheduler whose clock starts at `now`
    pub fn starting_at(now: Instant) -> Self {
        Self {
            timers: HashMap::new(),
            now,
            next_seq: 0,
        }
    }

    /// Time of the last tick
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Arm a one-shot timer firing `delay` after the current time
    ///
    /// Fails with [`Error::DuplicateTimer`] if `name` is already active.
    pub fn start(&mut self, name: &str, delay: Duration, event: E) -> Result<()> {
        if self.timers.contains_key(name) {
            return Err(Error::DuplicateTimer(name.to_string()));
        }
        self.arm(name, delay, event);
        Ok(())
    }

    /// Cancel `name` if active, then arm it again
    pub fn restart(&mut self, name: &str, delay: Duration, event: E) {
        self.cancel(name);
        self.arm(name, delay, event);
    }

    fn arm(&mut self, name: &str, delay: Duration, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.timers.insert(
            name.to_string(),
            Timer {
                deadline: self.now + delay,
                delay,
                seq,
                event,
            },
        );
        trace!(timer = name, ?delay, "Timer armed");
    }

    /// Push the deadline of `name` to now plus its original delay
    ///
    /// Fails with [`Error::UnknownTimer`] if `name` is not active; the
    /// registry is left untouched in that case.
    pub fn refresh(&mut self, name: &str) -> Result<()> {
        let now = self.now;
        let timer = self
            .timers
            .get_mut(name)
            .ok_or_else(|| Error::UnknownTimer(name.to_string()))?;
        timer.deadline = now + timer.delay;
        trace!(timer = name, "Timer refreshed");
        Ok(())
    }

    /// Remove `name` if present. Returns whether a timer was removed.
    pub fn cancel(&mut self, name: &str) -> bool {
        let removed = self.timers.remove(name).is_some();
        if removed {
            trace!(timer = name, "Timer cancelled");
        }
        removed
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.timers.contains_key(name)
    }

    pub fn deadline(&self, name: &str) -> Option<Instant> {
        self.timers.get(name).map(|t| t.deadline)
    }

    /// Number of active timers
    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    /// Advance the clock to `now` and collect every expired timer
    ///
    /// Expired timers are removed before anything is returned, so each armed
    /// deadline yields its event exactly once. Events come back in deadline
    /// order (ties in arming order). A clock that goes backwards is ignored.
    pub fn tick(&mut self, now: Instant) -> Vec<(String, E)> {
        if now > self.now {
            self.now = now;
        }

        let expired: Vec<String> = self
            .timers
            .iter()
            .filter(|(_, t)| t.deadline <= self.now)
            .map(|(name, _)| name.clone())
            .collect();

        let mut fired: Vec<(String, Timer<E>)> = expired
            .into_iter()
            .filter_map(|name| self.timers.remove(&name).map(|t| (name, t)))
            .collect();
        fired.sort_by_key(|(_, t)| (t.deadline, t.seq));

        fired
            .into_iter()
            .map(|(name, t)| {
                trace!(timer = %name, "Timer fired");
                (name, t.event)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_fires_once_at_deadline() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::starting_at(t0);
        timers.start("scan_timeout", secs(2), "scan").unwrap();

        assert!(timers.tick(t0 + Duration::from_millis(1999)).is_empty());
        assert_eq!(
            timers.tick(t0 + secs(2)),
            vec![("scan_timeout".to_string(), "scan")]
        );
        assert!(timers.tick(t0 + secs(10)).is_empty());
        assert!(!timers.is_active("scan_timeout"));
    }

    #[test]
    fn test_duplicate_start_rejected() {
        let mut timers = TimerScheduler::starting_at(Instant::now());
        timers.start("crash_timeout", secs(7), 1).unwrap();
        let err = timers.start("crash_timeout", secs(1), 2).unwrap_err();
        assert!(matches!(err, Error::DuplicateTimer(ref n) if n == "crash_timeout"));
        assert_eq!(timers.len(), 1);
    }

    #[test]
    fn test_refresh_unknown_is_noop() {
        let t0 = Instant::now();
        let mut timers: TimerScheduler<u8> = TimerScheduler::starting_at(t0);
        timers.start("a", secs(1), 1).unwrap();

        let err = timers.refresh("missing").unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(timers.len(), 1);
        assert_eq!(timers.deadline("a"), Some(t0 + secs(1)));
    }

    #[test]
    fn test_refresh_pushes_deadline() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::starting_at(t0);
        timers.start("scan_timeout", secs(2), ()).unwrap();

        assert!(timers.tick(t0 + secs(1)).is_empty());
        timers.refresh("scan_timeout").unwrap();
        assert_eq!(timers.deadline("scan_timeout"), Some(t0 + secs(3)));

        assert!(timers.tick(t0 + Duration::from_millis(2500)).is_empty());
        assert_eq!(timers.tick(t0 + secs(3)).len(), 1);
    }

    #[test]
    fn test_cancel_prevents_fire() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::starting_at(t0);
        timers.start("crash_timeout", secs(7), ()).unwrap();

        assert!(timers.cancel("crash_timeout"));
        assert!(!timers.cancel("crash_timeout"));
        assert!(timers.tick(t0 + secs(60)).is_empty());
    }

    #[test]
    fn test_deadline_order() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::starting_at(t0);
        timers.start("late", secs(3), 3).unwrap();
        timers.start("early", secs(1), 1).unwrap();
        timers.start("tie", secs(3), 4).unwrap();

        let fired: Vec<i32> = timers.tick(t0 + secs(5)).into_iter().map(|(_, e)| e).collect();
        assert_eq!(fired, vec![1, 3, 4]);
    }

    #[test]
    fn test_rearm_from_handler_does_not_double_fire() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::starting_at(t0);
        timers.start("scan_timeout", secs(2), ()).unwrap();

        let mut fires = 0;
        for step in 1..=10u64 {
            for (name, ()) in timers.tick(t0 + secs(step)) {
                fires += 1;
                timers.start(&name, secs(2), ()).unwrap();
            }
        }
        // Deadlines at 2, 4, 6, 8, 10
        assert_eq!(fires, 5);
        assert!(timers.is_active("scan_timeout"));
    }

    #[test]
    fn test_restart_replaces() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::starting_at(t0);
        timers.start("crash_timeout", secs(1), 1).unwrap();
        timers.restart("crash_timeout", secs(7), 2);

        assert!(timers.tick(t0 + secs(2)).is_empty());
        assert_eq!(timers.tick(t0 + secs(7)), vec![("crash_timeout".to_string(), 2)]);
    }

    #[test]
    fn test_restart_arms_inactive_timer() {
        let t0 = Instant::now();
        let mut timers = TimerScheduler::starting_at(t0);
        timers.restart("scan_timeout", secs(2), "scan");

        assert!(timers.is_active("scan_timeout"));
        assert!(matches!(
            timers.start("scan_timeout", secs(1), "again"),
            Err(Error::DuplicateTimer(_))
        ));
        assert_eq!(timers.tick(t0 + secs(2)), vec![("scan_timeout".to_string(), "scan")]);
        assert!(!timers.is_active("scan_timeout"));
    }

    #[test]
    fn test_clock_never_goes_back() {
        let t0 = Instant::now();
        let mut timers: TimerScheduler<()> = TimerScheduler::starting_at(t0 + secs(5));
        timers.tick(t0);
        assert_eq!(timers.now(), t0 + secs(5));
    }

    #[test]
    fn test_random_interleavings_fire_at_most_once_per_arm() {
        use rand::{Rng, SeedableRng};

        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED);
        let names = ["a", "b", "c"];
        let t0 = Instant::now();
        let mut timers = TimerScheduler::starting_at(t0);
        let mut armed = [0u32; 3];
        let mut fired = [0u32; 3];
        let mut cancelled_since_arm = [false; 3];

        for step in 0..2000u64 {
            let i = rng.gen_range(0..3);
            match rng.gen_range(0..4) {
                0 => {
                    if timers.start(names[i], Duration::from_millis(rng.gen_range(1..50)), i).is_ok() {
                        armed[i] += 1;
                        cancelled_since_arm[i] = false;
                    }
                }
                1 => {
                    if timers.cancel(names[i]) {
                        cancelled_since_arm[i] = true;
                    }
                }
                2 => {
                    let _ = timers.refresh(names[i]);
                }
                _ => {
                    for (_, idx) in timers.tick(t0 + Duration::from_millis(step * 5)) {
                        assert!(!cancelled_since_arm[idx]);
                        fired[idx] += 1;
                    }
                }
            }
        }

        for i in 0..3 {
            assert!(fired[i] <= armed[i]);
        }
    }
}
