//! Blocking rendezvous: waiting for work while the loop keeps running.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread;

use crate::error::panic_message;
use crate::queue::Completion;
use crate::{Scheduler, SchedulerError};

pub(crate) fn run_in_place<R>(work: impl FnOnce() -> anyhow::Result<R>) -> anyhow::Result<R> {
    catch_unwind(AssertUnwindSafe(work))
        .unwrap_or_else(|p| Err(SchedulerError::WorkPanicked(panic_message(&*p)).into()))
}

impl Scheduler {
    /// Runs ordinary iterations until `done` holds.
    ///
    /// `done` is checked under the shared lock before every sleep, so it must
    /// only read state that is flipped through that lock (completion flags,
    /// modal sessions). Fails with `NestingTooDeep` past
    /// `max_nesting_depth`, or `ShutDown` if the loop stops first.
    pub fn pump_until(&mut self, done: impl Fn() -> bool) -> Result<(), SchedulerError> {
        self.ensure_depth()?;
        self.depth += 1;
        log::trace!("pump depth {}", self.depth);
        let result = loop {
            if done() {
                break Ok(());
            }
            if !self.is_running() {
                break Err(SchedulerError::ShutDown);
            }
            self.iterate(true, &done);
        };
        self.depth -= 1;
        result
    }

    pub(crate) fn ensure_depth(&self) -> Result<(), SchedulerError> {
        if self.depth >= self.config.max_nesting_depth {
            log::warn!("refusing to nest past depth {}", self.depth);
            return Err(SchedulerError::NestingTooDeep(self.config.max_nesting_depth));
        }
        Ok(())
    }

    /// Blocks the caller until `work` completes.
    ///
    /// On the scheduler thread `work` moves to a helper thread and this
    /// thread keeps running loop iterations (input, paint, animation, serial
    /// calls) until the helper is done. Elsewhere `work` just runs in place.
    /// Errors from `work` come back unchanged; panics become
    /// [`SchedulerError::WorkPanicked`].
    pub fn invoke_and_block<R, F>(&mut self, work: F) -> anyhow::Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> anyhow::Result<R> + Send + 'static,
    {
        if !self.shared.is_scheduler_thread() {
            return run_in_place(work);
        }
        self.ensure_depth()?;

        let completion = Arc::new(Completion::<anyhow::Result<R>>::new());
        let helper = {
            let completion = completion.clone();
            let shared = self.shared.clone();
            thread::Builder::new()
                .name("cadence-invoke".into())
                .spawn(move || {
                    let result = run_in_place(work);
                    completion.complete(&shared, result);
                })
                .map_err(SchedulerError::Spawn)?
        };

        if let Err(e) = self.pump_until(|| completion.is_done()) {
            // loop is going away; still wait for the helper, just without
            // servicing the UI
            log::debug!("invoke_and_block: {e}; waiting for helper without pumping");
            self.shared.wait_until(|_| completion.is_done());
        }
        if helper.join().is_err() {
            log::warn!("invoke_and_block helper thread panicked after completing");
        }
        completion
            .take()
            .unwrap_or_else(|| Err(SchedulerError::ShutDown.into()))
    }
}
