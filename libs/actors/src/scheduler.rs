//! Tick Scheduler
//!
//! Drives a synchronous tick callback from a tokio task. A zero interval ticks
//! as fast as the runtime allows, yielding between ticks; any other interval
//! uses a tokio interval timer that delays (never bursts) missed ticks.
//!
//! `start` and `stop` are idempotent and may be called from inside the tick
//! callback itself: stopping from a tick aborts the running task at its next
//! yield point.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

type Tick = Arc<dyn Fn() + Send + Sync>;

pub struct Scheduler {
    interval: Duration,
    tick: Tick,
    trigger: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new<F>(interval: Duration, tick: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            interval,
            tick: Arc::new(tick),
            trigger: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Start ticking; returns false if already running or no runtime is
    /// available to run the ticks on
    pub fn start(&self) -> bool {
        let mut trigger = self.trigger.lock();
        if trigger.as_ref().is_some_and(|task| !task.is_finished()) {
            return false;
        }

        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime available, scheduler stays stopped");
            return false;
        };

        let tick = Arc::clone(&self.tick);
        let interval = self.interval;
        *trigger = Some(runtime.spawn(run(interval, tick)));
        debug!(interval_ms = interval.as_millis() as u64, "Scheduler started");
        true
    }

    /// Stop ticking; returns false if it was not running
    pub fn stop(&self) -> bool {
        match self.trigger.lock().take() {
            Some(task) => {
                task.abort();
                debug!("Scheduler stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.trigger
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

async fn run(interval: Duration, tick: Tick) {
    if interval.is_zero() {
        loop {
            tick();
            tokio::task::yield_now().await;
        }
    }

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        tick();
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(task) = self.trigger.get_mut().take() {
            task.abort();
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(interval: Duration) -> (Scheduler, Arc<AtomicUsize>) {
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let scheduler = Scheduler::new(interval, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (scheduler, ticks)
    }

    #[tokio::test]
    async fn test_zero_interval_ticks_between_yields() {
        let (scheduler, ticks) = counting(Duration::ZERO);

        assert!(scheduler.start());
        assert!(!scheduler.start());
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert!(ticks.load(Ordering::SeqCst) > 0);
        assert!(scheduler.stop());
        assert!(!scheduler.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_ticks() {
        let (scheduler, ticks) = counting(Duration::from_millis(10));
        scheduler.start();

        tokio::time::sleep(Duration::from_millis(35)).await;
        scheduler.stop();
        let seen = ticks.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(seen >= 3);
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[test]
    fn test_start_without_runtime() {
        let (scheduler, ticks) = counting(Duration::ZERO);

        assert!(!scheduler.start());
        assert!(!scheduler.is_running());
        assert!(!scheduler.stop());
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
    }
}
