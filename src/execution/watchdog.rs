//! Timeout watchdog.
//!
//! State machine: `Armed -> {Expired, Cancelled}`. Both outcomes are
//! terminal. The kill happens under the state lock, so once a caller has
//! observed `Cancelled` no kill can follow.

use std::io;
use std::process::Child;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{Scope, ScopedJoinHandle};
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::error::ExecError;
use crate::Result;

/// Lifecycle of a watchdog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchdogState {
    /// Timer running.
    #[default]
    Armed,
    /// Timer elapsed and the process was killed.
    Expired,
    /// Cancelled before the timer elapsed.
    Cancelled,
}

impl WatchdogState {
    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WatchdogState::Armed)
    }
}

/// Something the watchdog can forcibly stop.
pub trait Terminate {
    /// Forcibly stop the target. Stopping an already-exited target is not an error.
    fn terminate(&self) -> io::Result<()>;
}

impl Terminate for Mutex<Child> {
    fn terminate(&self) -> io::Result<()> {
        // std refuses to signal a child it has already reaped.
        lock(self).kill()
    }
}

struct Shared {
    state: Mutex<WatchdogState>,
    wake: Condvar,
}

/// Kills a process that outlives its timeout.
pub struct Watchdog<'scope> {
    shared: Arc<Shared>,
    handle: Option<ScopedJoinHandle<'scope, ()>>,
    timeout: Duration,
}

impl<'scope> Watchdog<'scope> {
    /// Arm the watchdog: start a timer thread in `scope` for `timeout`.
    pub fn start<'env, T>(
        scope: &'scope Scope<'scope, 'env>,
        target: &'scope T,
        timeout: Duration,
    ) -> Result<Self>
    where
        T: Terminate + Sync,
    {
        let shared = Arc::new(Shared {
            state: Mutex::new(WatchdogState::Armed),
            wake: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);

        let handle = std::thread::Builder::new()
            .name("pipe-exec-watchdog".into())
            .spawn_scoped(scope, move || run_timer(&thread_shared, target, timeout))
            .map_err(ExecError::Thread)?;

        debug!(timeout_ms = timeout.as_millis() as u64, "watchdog: armed");
        Ok(Self {
            shared,
            handle: Some(handle),
            timeout,
        })
    }

    /// The configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current state.
    pub fn state(&self) -> WatchdogState {
        *lock(&self.shared.state)
    }

    /// True iff the timer elapsed and the target was killed.
    pub fn timed_out(&self) -> bool {
        self.state() == WatchdogState::Expired
    }

    /// Stop the timer if still armed and wait for its thread to finish.
    ///
    /// No-op on the state once expired. Returns the final state.
    pub fn cancel(&mut self) -> Result<WatchdogState> {
        let state = {
            let mut state = lock(&self.shared.state);
            if !state.is_terminal() {
                *state = WatchdogState::Cancelled;
                debug!("watchdog: cancelled");
            }
            *state
        };
        self.shared.wake.notify_all();

        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| ExecError::Interrupted("watchdog thread panicked".into()))?;
        }
        Ok(state)
    }
}

impl Drop for Watchdog<'_> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.cancel();
        }
    }
}

fn run_timer<T: Terminate>(shared: &Shared, target: &T, timeout: Duration) {
    let guard = lock(&shared.state);
    let (mut state, _) = shared
        .wake
        .wait_timeout_while(guard, timeout, |state| *state == WatchdogState::Armed)
        .unwrap_or_else(PoisonError::into_inner);

    if state.is_terminal() {
        return;
    }

    warn!(timeout_ms = timeout.as_millis() as u64, "watchdog: timeout elapsed, killing process");
    if let Err(e) = target.terminate() {
        error!(error = %e, "watchdog: kill failed");
    }
    *state = WatchdogState::Expired;
}

pub(super) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    struct CountingTarget {
        kills: AtomicUsize,
    }

    impl Terminate for CountingTarget {
        fn terminate(&self) -> io::Result<()> {
            self.kills.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_default_state() {
        assert_eq!(WatchdogState::default(), WatchdogState::Armed);
        assert!(!WatchdogState::Armed.is_terminal());
        assert!(WatchdogState::Expired.is_terminal());
        assert!(WatchdogState::Cancelled.is_terminal());
    }

    #[test]
    fn test_expires_and_kills() {
        let target = CountingTarget::default();
        let state = std::thread::scope(|scope| {
            let mut watchdog = Watchdog::start(scope, &target, Duration::from_millis(20)).unwrap();
            std::thread::sleep(Duration::from_millis(200));
            assert!(watchdog.timed_out());
            watchdog.cancel().unwrap()
        });

        assert_eq!(state, WatchdogState::Expired);
        assert_eq!(target.kills.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_before_expiry() {
        let target = CountingTarget::default();
        let started = Instant::now();
        let state = std::thread::scope(|scope| {
            let mut watchdog = Watchdog::start(scope, &target, Duration::from_secs(30)).unwrap();
            assert_eq!(watchdog.state(), WatchdogState::Armed);
            watchdog.cancel().unwrap()
        });

        assert_eq!(state, WatchdogState::Cancelled);
        assert_eq!(target.kills.load(Ordering::SeqCst), 0);
        // Cancel wakes the timer thread instead of waiting out the timeout.
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let target = CountingTarget::default();
        std::thread::scope(|scope| {
            let mut watchdog = Watchdog::start(scope, &target, Duration::from_secs(30)).unwrap();
            assert_eq!(watchdog.cancel().unwrap(), WatchdogState::Cancelled);
            assert_eq!(watchdog.cancel().unwrap(), WatchdogState::Cancelled);
            assert!(!watchdog.timed_out());
        });
    }

    #[test]
    fn test_drop_cancels() {
        let target = CountingTarget::default();
        std::thread::scope(|scope| {
            let watchdog = Watchdog::start(scope, &target, Duration::from_secs(30)).unwrap();
            assert_eq!(watchdog.timeout(), Duration::from_secs(30));
            drop(watchdog);
        });
        assert_eq!(target.kills.load(Ordering::SeqCst), 0);
    }
}
