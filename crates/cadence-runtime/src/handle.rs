use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::sync::Arc;

use cadence_core::{InputEvent, KeyCode, points};

use crate::error::panic_message;
use crate::queue::Completion;
use crate::shared::Shared;
use crate::{Scheduler, SchedulerError};

/// Producer-side entry points. Cheap to clone, usable from any thread.
///
/// Everything here only touches the shared queues; widget state stays with
/// the [`Scheduler`].
#[derive(Clone)]
pub struct Handle {
    shared: Arc<Shared>,
}

impl Handle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn key_pressed(&self, code: KeyCode) -> Result<(), SchedulerError> {
        self.post(InputEvent::KeyDown(code))
    }

    pub fn key_released(&self, code: KeyCode) -> Result<(), SchedulerError> {
        self.post(InputEvent::KeyUp(code))
    }

    pub fn pointer_pressed(&self, xs: &[i32], ys: &[i32]) -> Result<(), SchedulerError> {
        self.post(InputEvent::PointerDown(points(xs, ys)))
    }

    pub fn pointer_dragged(&self, xs: &[i32], ys: &[i32]) -> Result<(), SchedulerError> {
        self.post(InputEvent::PointerDrag(points(xs, ys)))
    }

    pub fn pointer_released(&self, xs: &[i32], ys: &[i32]) -> Result<(), SchedulerError> {
        self.post(InputEvent::PointerUp(points(xs, ys)))
    }

    pub fn pointer_hover(&self, xs: &[i32], ys: &[i32]) -> Result<(), SchedulerError> {
        self.post(InputEvent::PointerHover(points(xs, ys)))
    }

    pub fn pointer_hover_released(&self, xs: &[i32], ys: &[i32]) -> Result<(), SchedulerError> {
        self.post(InputEvent::PointerHoverUp(points(xs, ys)))
    }

    pub fn size_changed(&self, width: u32, height: u32) -> Result<(), SchedulerError> {
        self.post(InputEvent::Resize { width, height })
    }

    pub fn show_notify(&self) -> Result<(), SchedulerError> {
        self.post(InputEvent::ShowNotify)
    }

    pub fn hide_notify(&self) -> Result<(), SchedulerError> {
        self.post(InputEvent::HideNotify)
    }

    /// Appends an input event and wakes the scheduler.
    pub fn post(&self, event: InputEvent) -> Result<(), SchedulerError> {
        self.shared.signal(|st| {
            st.accepting()?;
            log::trace!("queued {}", event.name());
            st.input.push(event);
            Ok(())
        })
    }

    /// Queues `work` for the scheduler thread and returns immediately.
    pub fn call_serially(
        &self,
        work: impl FnOnce(&mut Scheduler) + Send + 'static,
    ) -> Result<(), SchedulerError> {
        self.shared.signal(|st| {
            st.accepting()?;
            st.serial.push(Box::new(work));
            Ok(())
        })
    }

    /// Runs `work` on the scheduler thread and waits for its result.
    ///
    /// Calling this from the scheduler thread is an error: the loop would be
    /// waiting on itself.
    pub fn call_serially_and_wait<R, F>(&self, work: F) -> Result<R, SchedulerError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Scheduler) -> R + Send + 'static,
    {
        if self.shared.is_scheduler_thread() {
            return Err(SchedulerError::IllegalUsage(
                "call_serially_and_wait on the scheduler thread",
            ));
        }

        let completion = Arc::new(Completion::<Result<R, SchedulerError>>::new());
        let slot = completion.clone();
        let wrapper = move |ui: &mut Scheduler| {
            match catch_unwind(AssertUnwindSafe(|| work(ui))) {
                Ok(v) => slot.complete(&ui.shared, Ok(v)),
                Err(payload) => {
                    let msg = panic_message(&*payload);
                    slot.complete(&ui.shared, Err(SchedulerError::WorkPanicked(msg)));
                    // still a dispatch fault as far as the loop is concerned
                    resume_unwind(payload);
                }
            }
        };

        let generation = self.shared.signal(|st| {
            st.accepting()?;
            st.serial.push(Box::new(wrapper));
            Ok::<_, SchedulerError>(st.generation)
        })?;

        {
            let mut st = self.shared.lock();
            while !completion.is_done() {
                if st.owner.is_none() || st.generation != generation {
                    return Err(SchedulerError::ShutDown);
                }
                self.shared.wait(&mut st, None);
            }
        }
        completion.take().unwrap_or(Err(SchedulerError::ShutDown))
    }

    /// Blocking rendezvous for threads other than the scheduler thread: the
    /// loop is not affected, so `work` simply runs here.
    ///
    /// On the scheduler thread use [`Scheduler::invoke_and_block`], which
    /// keeps the UI serviced while it waits.
    pub fn invoke_and_block<R>(
        &self,
        work: impl FnOnce() -> anyhow::Result<R>,
    ) -> anyhow::Result<R> {
        {
            let st = self.shared.lock();
            if st.owner.is_none() {
                return Err(SchedulerError::NotInitialized.into());
            }
            if st.owner == Some(self.shared.current_thread()) {
                return Err(SchedulerError::IllegalUsage(
                    "Handle::invoke_and_block on the scheduler thread; use Scheduler::invoke_and_block",
                )
                .into());
            }
        }
        crate::rendezvous::run_in_place(work)
    }

    /// Asks the loop to exit after its current iteration.
    pub fn shutdown(&self) {
        self.shared.signal(|st| st.running = false);
        log::debug!("scheduler shutdown requested");
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    pub fn is_scheduler_thread(&self) -> bool {
        self.shared.is_scheduler_thread()
    }

    /// Serial calls queued and not yet picked up by a batch.
    pub fn pending_calls(&self) -> usize {
        self.shared.lock().serial.len()
    }
}
