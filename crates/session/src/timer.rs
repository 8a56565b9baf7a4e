//! Drift-corrected countdown.
//!
//! The remaining time is recomputed on every tick as `deadline - now` from
//! the injected clock. A throttled or suspended host therefore sees the
//! countdown jump forward on its next tick instead of falling behind, and
//! dropped ticks can delay expiry but never skip it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use vigil_common::clock::{remaining_until, to_chrono, Clock, DriftMeasurement};
use vigil_common::config::TimerConfig;
use vigil_common::error::{VigilError, VigilResult};

enum TimerState {
    Idle,
    Running {
        deadline: DateTime<Utc>,
        task: JoinHandle<()>,
    },
    Stopped,
}

/// A single-use countdown. Construct a new timer for every session.
pub struct CountdownTimer {
    clock: Arc<dyn Clock>,
    config: TimerConfig,
    state: TimerState,
    remaining: watch::Sender<u64>,
    fired: Arc<AtomicBool>,
}

impl CountdownTimer {
    pub fn new(clock: Arc<dyn Clock>, config: TimerConfig) -> Self {
        let (remaining, _) = watch::channel(0);
        Self {
            clock,
            config,
            state: TimerState::Idle,
            remaining,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start counting down `duration_seconds` from now.
    ///
    /// `on_expire` runs exactly once, on the first tick at or after the
    /// deadline. A timer can only be started once.
    pub fn start<F>(&mut self, duration_seconds: u64, on_expire: F) -> VigilResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if !matches!(self.state, TimerState::Idle) {
            return Err(VigilError::invalid_transition(
                "countdown already started; create a new timer",
            ));
        }

        let deadline = self
            .clock
            .now()
            .checked_add_signed(to_chrono(Duration::from_secs(duration_seconds)))
            .ok_or_else(|| {
                VigilError::invalid_input(format!(
                    "exam duration of {duration_seconds}s is out of range"
                ))
            })?;
        self.remaining.send_replace(duration_seconds);

        let task = tokio::spawn(run_countdown(
            Arc::clone(&self.clock),
            self.config.clone(),
            deadline,
            self.remaining.clone(),
            Arc::clone(&self.fired),
            on_expire,
        ));
        tracing::info!(duration_seconds, %deadline, "Countdown started");

        self.state = TimerState::Running { deadline, task };
        Ok(())
    }

    /// Stop the countdown without firing. Idempotent.
    pub fn cancel(&mut self) {
        match std::mem::replace(&mut self.state, TimerState::Stopped) {
            TimerState::Running { task, .. } => {
                task.abort();
                tracing::info!(
                    remaining_seconds = *self.remaining.borrow(),
                    fired = self.has_fired(),
                    "Countdown cancelled"
                );
            }
            TimerState::Idle | TimerState::Stopped => {}
        }
    }

    /// Seconds left as of the latest tick (rounded up).
    pub fn remaining_seconds(&self) -> u64 {
        *self.remaining.borrow()
    }

    /// Observe the remaining seconds as ticks update them.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.remaining.subscribe()
    }

    pub fn deadline(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            TimerState::Running { deadline, .. } => Some(*deadline),
            TimerState::Idle | TimerState::Stopped => None,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(&self.state, TimerState::Running { task, .. } if !task.is_finished())
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn whole_seconds_up(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

async fn run_countdown<F>(
    clock: Arc<dyn Clock>,
    config: TimerConfig,
    deadline: DateTime<Utc>,
    remaining: watch::Sender<u64>,
    fired: Arc<AtomicBool>,
    on_expire: F,
) where
    F: FnOnce(),
{
    let tick = config.tick_interval();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut on_expire = Some(on_expire);
    let mut last_tick: Option<Instant> = None;

    loop {
        ticker.tick().await;
        let at = Instant::now();

        if let Some(prev) = last_tick {
            let drift = DriftMeasurement {
                expected: tick,
                observed: at.saturating_duration_since(prev),
            };
            if drift.exceeds_threshold_ms(config.drift_warn_ms as f64) {
                tracing::warn!(
                    drift_ms = drift.drift_ms(),
                    "Countdown tick late; host appears throttled"
                );
            }
        }
        last_tick = Some(at);

        let left = remaining_until(deadline, clock.now());
        remaining.send_replace(whole_seconds_up(left));

        if left.is_zero() {
            if !fired.swap(true, Ordering::SeqCst) {
                tracing::info!("Countdown expired");
                if let Some(on_expire) = on_expire.take() {
                    on_expire();
                }
            }
            return;
        }
    }
}
