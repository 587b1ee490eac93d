//! Fixed-size pool of engine instances.
//!
//! Requests lease an instance exclusively for the length of one session, in
//! arrival order. Instances that fail are retired and replaced from a
//! background thread; the request that hit the failure gets the error.

use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::config::{AnalysisConfig, EngineConfig, PoolConfig, Timeouts};
use crate::error::{AnalysisError, EngineId, Result};
use crate::process::{EngineProcess, EngineState, Launcher};
use crate::session::{self, CancelToken, SearchJob, SessionOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub idle: usize,
    pub leased: usize,
    pub restarting: usize,
    pub waiting: usize,
}

/// Session output together with the instance that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub engine: EngineId,
    pub outcome: SessionOutcome,
}

#[derive(Clone)]
pub struct Supervisor {
    shared: Arc<Shared>,
}

struct Shared {
    launcher: Arc<dyn Launcher>,
    engine: EngineConfig,
    pool: PoolConfig,
    timeouts: Timeouts,
    next_id: AtomicUsize,
    state: Mutex<PoolState>,
    available: Condvar,
}

#[derive(Default)]
struct PoolState {
    idle: VecDeque<EngineProcess>,
    /// Tickets of blocked acquirers, oldest first.
    waiting: VecDeque<u64>,
    next_ticket: u64,
    leased: usize,
    restarting: usize,
    shutdown: bool,
}

impl Supervisor {
    /// Starts every pool member. Fails if any of them does not come up.
    pub fn start(config: &AnalysisConfig, launcher: Arc<dyn Launcher>) -> Result<Self> {
        config.validate()?;

        let size = config.pool.size;
        let options = &config.engine.options;
        let timeouts = &config.timeouts;

        let started: Vec<Result<EngineProcess>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..size)
                .map(|id| {
                    let launcher = Arc::clone(&launcher);
                    scope.spawn(move || EngineProcess::start(id, &*launcher, options, timeouts))
                })
                .collect();

            handles
                .into_iter()
                .enumerate()
                .map(|(id, handle)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(AnalysisError::StartupError {
                            engine: id,
                            reason: "startup thread panicked".to_string(),
                        })
                    })
                })
                .collect()
        });

        // Dropping the started ones on failure terminates them.
        let idle = started.into_iter().collect::<Result<VecDeque<_>>>()?;
        info!("Engine pool started with {} instance(s)", idle.len());

        Ok(Self {
            shared: Arc::new(Shared {
                launcher,
                engine: config.engine.clone(),
                pool: config.pool.clone(),
                timeouts: config.timeouts,
                next_id: AtomicUsize::new(size),
                state: Mutex::new(PoolState {
                    idle,
                    ..Default::default()
                }),
                available: Condvar::new(),
            }),
        })
    }

    /// Runs one search on the next free instance.
    pub fn submit(&self, job: &SearchJob, cancel: &CancelToken) -> Result<SessionReport> {
        let mut lease = self.acquire()?;
        let engine = lease.id();
        debug!("Engine {} leased for depth {} x{}", engine, job.depth, job.lines);

        let outcome = session::run(&mut lease, job, &self.shared.timeouts, cancel)?;
        Ok(SessionReport { engine, outcome })
    }

    /// Waits for exclusive use of a ready instance, in arrival order.
    pub fn acquire(&self) -> Result<Lease> {
        let timeout = self.shared.pool.acquire_timeout;
        let deadline = Instant::now() + timeout;

        let mut state = self.shared.lock();
        if state.shutdown {
            return Err(AnalysisError::ShuttingDown);
        }

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.waiting.push_back(ticket);

        loop {
            if state.shutdown {
                state.waiting.retain(|&t| t != ticket);
                self.shared.available.notify_all();
                return Err(AnalysisError::ShuttingDown);
            }

            if state.waiting.front() == Some(&ticket) {
                while let Some(mut process) = state.idle.pop_front() {
                    if !process.is_alive() {
                        warn!("Engine {} died while idle", process.id());
                        process.mark_crashed();
                        self.shared.spawn_replacement(&mut state, process);
                        continue;
                    }

                    state.waiting.pop_front();
                    state.leased += 1;
                    // The next waiter may find another idle instance.
                    self.shared.available.notify_all();
                    return Ok(Lease {
                        process: Some(process),
                        shared: Arc::clone(&self.shared),
                    });
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                state.waiting.retain(|&t| t != ticket);
                self.shared.available.notify_all();
                warn!("No engine available within {:?}", timeout);
                return Err(AnalysisError::PoolExhausted(timeout));
            }

            state = self
                .shared
                .available
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    pub fn status(&self) -> PoolStatus {
        let state = self.shared.lock();
        PoolStatus {
            idle: state.idle.len(),
            leased: state.leased,
            restarting: state.restarting,
            waiting: state.waiting.len(),
        }
    }

    /// Blocks until at least `count` instances are idle. Returns false on timeout.
    pub fn wait_for_idle(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.shared.lock();

        while state.idle.len() < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || state.shutdown {
                return false;
            }
            state = self
                .shared
                .available
                .wait_timeout(state, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// Terminates idle instances and refuses new work. Leased instances are
    /// terminated when their lease ends.
    pub fn shutdown(&self) {
        let idle: Vec<EngineProcess> = {
            let mut state = self.shared.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
            self.shared.available.notify_all();
            state.idle.drain(..).collect()
        };

        info!("Shutting down engine pool");
        for mut process in idle {
            process.terminate();
        }
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(self: &Arc<Self>, mut process: EngineProcess) {
        let mut state = self.lock();
        state.leased -= 1;

        if state.shutdown {
            drop(state);
            process.terminate();
            return;
        }

        if process.state() == EngineState::Ready {
            state.idle.push_back(process);
            self.available.notify_all();
            return;
        }

        warn!(
            "Retiring engine {} in state {:?}",
            process.id(),
            process.state()
        );
        process.mark_crashed();
        self.spawn_replacement(&mut state, process);
    }

    /// Terminates `retired` and starts its replacement off the caller's thread.
    fn spawn_replacement(self: &Arc<Self>, state: &mut PoolState, retired: EngineProcess) {
        let shared = Arc::clone(self);
        let retired_id = retired.id();
        state.restarting += 1;

        let spawned = thread::Builder::new()
            .name(format!("engine-restart-{}", retired_id))
            .spawn(move || {
                let mut retired = retired;
                retired.terminate();
                drop(retired);
                shared.restart(retired_id);
            });

        if let Err(e) = spawned {
            error!("Could not spawn restart thread for engine {}: {}", retired_id, e);
            state.restarting -= 1;
        }
    }

    fn restart(&self, retired_id: EngineId) {
        let mut backoff = self.pool.restart_backoff;

        for attempt in 1..=self.pool.restart_attempts {
            {
                let mut state = self.lock();
                if state.shutdown {
                    state.restarting -= 1;
                    self.available.notify_all();
                    debug!("Pool shut down, not replacing engine {}", retired_id);
                    return;
                }
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed);
            match EngineProcess::start(id, &*self.launcher, &self.engine.options, &self.timeouts) {
                Ok(mut process) => {
                    let mut state = self.lock();
                    state.restarting -= 1;
                    if state.shutdown {
                        drop(state);
                        process.terminate();
                        return;
                    }

                    info!("Engine {} replaced by engine {}", retired_id, id);
                    state.idle.push_back(process);
                    self.available.notify_all();
                    return;
                }
                Err(e) => {
                    warn!(
                        "Restart attempt {}/{} for engine {} failed: {}",
                        attempt, self.pool.restart_attempts, retired_id, e
                    );
                    if attempt < self.pool.restart_attempts {
                        thread::sleep(backoff);
                        backoff *= 2;
                    }
                }
            }
        }

        let mut state = self.lock();
        state.restarting -= 1;
        self.available.notify_all();
        error!("Giving up on replacing engine {}", retired_id);
    }
}

/// Exclusive use of one instance. Dropping it hands the instance back to the
/// pool, or retires it if it is no longer ready.
pub struct Lease {
    process: Option<EngineProcess>,
    shared: Arc<Shared>,
}

impl Deref for Lease {
    type Target = EngineProcess;

    fn deref(&self) -> &EngineProcess {
        self.process.as_ref().expect("lease holds a process until dropped")
    }
}

impl DerefMut for Lease {
    fn deref_mut(&mut self) -> &mut EngineProcess {
        self.process.as_mut().expect("lease holds a process until dropped")
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(process) = self.process.take() {
            self.shared.release(process);
        }
    }
}
