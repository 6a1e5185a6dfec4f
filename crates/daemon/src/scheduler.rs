// Recurring auto-commit timer.
//
// One timer task per scheduler. Each tick spawns the handler only if the
// previous tick has finished; otherwise the tick is dropped (never queued).
// The in-flight flag is held by a guard that resets it on every exit path,
// including a panicking handler.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Work performed on every tick.
///
/// Returns a `Send` future so cycles can run on a multi-threaded runtime.
pub trait TickHandler: Send + Sync + 'static {
    fn tick(&self) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

#[derive(Debug, Default)]
struct TickStats {
    started: AtomicU64,
    skipped: AtomicU64,
}

struct RunningLoop {
    task: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

pub struct Scheduler<H: TickHandler> {
    handler: Arc<H>,
    in_flight: Arc<AtomicBool>,
    stats: Arc<TickStats>,
    running: Mutex<Option<RunningLoop>>,
}

impl<H: TickHandler> Scheduler<H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler: Arc::new(handler),
            in_flight: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(TickStats::default()),
            running: Mutex::new(None),
        }
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Arm the timer; the first tick fires one `interval` from now.
    ///
    /// Returns `false` (and arms nothing) if the timer is already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            debug!("scheduler already running, start ignored");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(timer_loop(
            self.handler.clone(),
            self.in_flight.clone(),
            self.stats.clone(),
            interval,
            shutdown_rx,
        ));
        *running = Some(RunningLoop { task, shutdown_tx });
        info!(interval_secs = interval.as_secs(), "auto-commit timer armed");
        true
    }

    pub fn state(&self) -> SchedulerState {
        match *self.running.lock().unwrap_or_else(PoisonError::into_inner) {
            Some(_) => SchedulerState::Running,
            None => SchedulerState::Idle,
        }
    }

    /// Whether a tick's capture→sync sequence is executing right now.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn ticks_started(&self) -> u64 {
        self.stats.started.load(Ordering::SeqCst)
    }

    pub fn ticks_skipped(&self) -> u64 {
        self.stats.skipped.load(Ordering::SeqCst)
    }

    /// Disarm the timer and wait for an in-flight tick to finish.
    pub async fn shutdown(&self) {
        let running = self.running.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(running) = running else {
            return;
        };

        let _ = running.shutdown_tx.send(true);
        let _ = running.task.await;
        info!("auto-commit timer stopped");
    }
}

/// Aborts the timer and, with it, any in-flight cycle.
impl<H: TickHandler> Drop for Scheduler<H> {
    fn drop(&mut self) {
        let running = self.running.get_mut().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(running) = running {
            running.task.abort();
        }
    }
}

/// Holds the in-flight flag for the lifetime of one tick.
struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl InFlightGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

async fn timer_loop<H: TickHandler>(
    handler: Arc<H>,
    in_flight: Arc<AtomicBool>,
    stats: Arc<TickStats>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut current = CycleHandle(None);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let Some(guard) = InFlightGuard::acquire(&in_flight) else {
                    stats.skipped.fetch_add(1, Ordering::SeqCst);
                    debug!("previous tick still in flight, skipping");
                    continue;
                };
                stats.started.fetch_add(1, Ordering::SeqCst);
                let handler = handler.clone();
                current.0 = Some(tokio::spawn(async move {
                    let _guard = guard;
                    handler.tick().await;
                }));
            }
            _ = shutdown_rx.changed() => {
                debug!("timer loop shutting down");
                break;
            }
        }
    }

    if let Some(task) = current.0.take() {
        let _ = task.await;
    }
}

/// The spawned cycle, aborted if the timer task is dropped mid-cycle.
struct CycleHandle(Option<JoinHandle<()>>);

impl Drop for CycleHandle {
    fn drop(&mut self) {
        if let Some(task) = self.0.take() {
            task.abort();
        }
    }
}
