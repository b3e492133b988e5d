use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cadence_core::Surface;
use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::identity::{OsThreads, ThreadIdentity, ThreadTag};
use crate::queue::{InputQueue, SerialQueue};
use crate::{Handle, Scheduler, SchedulerConfig, SchedulerError};

/// Everything producers may touch, guarded by the one lock.
#[derive(Default)]
pub(crate) struct State {
    pub input: InputQueue,
    pub serial: SerialQueue,
    pub owner: Option<ThreadTag>,
    pub running: bool,
    /// Bumped on every init so waiters can tell a torn-down scheduler from
    /// a fresh one.
    pub generation: u64,
}

impl State {
    /// Producer-side gate: initialized and not shutting down.
    pub fn accepting(&self) -> Result<(), SchedulerError> {
        if self.owner.is_none() {
            Err(SchedulerError::NotInitialized)
        } else if !self.running {
            Err(SchedulerError::ShutDown)
        } else {
            Ok(())
        }
    }
}

pub(crate) struct Shared {
    state: Mutex<State>,
    wake: Condvar,
    identity: Box<dyn ThreadIdentity>,
    pub config: SchedulerConfig,
}

impl Shared {
    pub fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock()
    }

    /// Mutates state under the lock and wakes every waiter.
    pub fn signal<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let r = {
            let mut st = self.state.lock();
            f(&mut st)
        };
        self.wake.notify_all();
        r
    }

    /// Blocks on the shared condvar. Returns `true` on timeout.
    pub fn wait(&self, guard: &mut MutexGuard<'_, State>, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(t) => self.wake.wait_for(guard, t).timed_out(),
            None => {
                self.wake.wait(guard);
                false
            }
        }
    }

    /// Blocks until `done` holds, without servicing anything.
    pub fn wait_until(&self, done: impl Fn(&State) -> bool) {
        let mut st = self.state.lock();
        while !done(&st) {
            self.wake.wait(&mut st);
        }
    }

    pub fn current_thread(&self) -> ThreadTag {
        self.identity.current()
    }

    pub fn is_scheduler_thread(&self) -> bool {
        let me = self.identity.current();
        self.state.lock().owner == Some(me)
    }
}

/// The scheduler context. Construct one at startup, hand [`Handle`]s to
/// producers, and call [`Runtime::init`] on the thread that should run the
/// loop (or [`Runtime::spawn`] to get a fresh one).
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_identity(config, OsThreads)
    }

    pub fn with_identity(config: SchedulerConfig, identity: impl ThreadIdentity) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                wake: Condvar::new(),
                identity: Box::new(identity),
                config,
            }),
        }
    }

    pub fn handle(&self) -> Handle {
        Handle::new(self.shared.clone())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.lock().owner.is_some()
    }

    /// Claims the calling thread as the scheduler thread.
    ///
    /// Fails with `AlreadyInitialized` while a previous `Scheduler` is still
    /// alive; dropping it (or letting `run` return) releases the claim.
    pub fn init<S: Surface + 'static>(&self, surface: S) -> Result<Scheduler, SchedulerError> {
        let me = self.shared.current_thread();
        {
            let mut st = self.shared.lock();
            if st.owner.is_some() {
                return Err(SchedulerError::AlreadyInitialized);
            }
            st.owner = Some(me);
            st.running = true;
            st.generation += 1;
        }
        log::debug!("scheduler initialized on {me:?}");
        Ok(Scheduler::new(self.shared.clone(), Box::new(surface)))
    }

    /// Starts a dedicated scheduler thread, runs `setup` on it, then enters
    /// the loop. Returns once `setup` has finished, so producers can post
    /// right away.
    pub fn spawn<S, F>(&self, surface: S, setup: F) -> Result<JoinHandle<()>, SchedulerError>
    where
        S: Surface + Send + 'static,
        F: FnOnce(&mut Scheduler) + Send + 'static,
    {
        let runtime = self.clone();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), SchedulerError>>(1);
        let join = thread::Builder::new()
            .name("cadence-scheduler".into())
            .spawn(move || {
                let mut sched = match runtime.init(surface) {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                setup(&mut sched);
                let _ = ready_tx.send(Ok(()));
                sched.run();
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(join),
            Ok(Err(e)) => {
                let _ = join.join();
                Err(e)
            }
            // setup panicked and took the sender with it
            Err(_) => {
                let _ = join.join();
                Err(SchedulerError::ShutDown)
            }
        }
    }
}
