use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use cadence_core::InputEvent;
use parking_lot::Mutex;

use crate::Scheduler;
use crate::shared::Shared;

/// Deferred work run on the scheduler thread.
pub(crate) type SerialCall = Box<dyn FnOnce(&mut Scheduler) + Send>;

#[derive(Default)]
pub(crate) struct InputQueue {
    events: VecDeque<InputEvent>,
}

impl InputQueue {
    pub fn push(&mut self, event: InputEvent) {
        self.events.push_back(event);
    }

    /// Everything queued so far, oldest first.
    pub fn drain_all(&mut self) -> Vec<InputEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[derive(Default)]
pub(crate) struct SerialQueue {
    calls: VecDeque<SerialCall>,
}

impl SerialQueue {
    pub fn push(&mut self, call: SerialCall) {
        self.calls.push_back(call);
    }

    /// Removes exactly the calls queued right now. Calls pushed while the
    /// batch runs stay for the next one.
    pub fn take_batch(&mut self) -> VecDeque<SerialCall> {
        let n = self.calls.len();
        self.calls.drain(..n).collect()
    }

    /// Puts an unfinished batch back in front, keeping its order.
    pub fn requeue_front(&mut self, rest: VecDeque<SerialCall>) {
        for call in rest.into_iter().rev() {
            self.calls.push_front(call);
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn take_all(&mut self) -> VecDeque<SerialCall> {
        std::mem::take(&mut self.calls)
    }
}

/// One-shot result slot with a done flag flipped under the shared lock, so
/// a waiter checking it under that lock can't miss the wakeup.
pub(crate) struct Completion<T> {
    done: AtomicBool,
    value: Mutex<Option<T>>,
}

impl<T> Completion<T> {
    pub fn new() -> Self {
        Self {
            done: AtomicBool::new(false),
            value: Mutex::new(None),
        }
    }

    pub fn complete(&self, shared: &Shared, value: T) {
        *self.value.lock() = Some(value);
        shared.signal(|_| self.done.store(true, Ordering::Release));
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn take(&self) -> Option<T> {
        self.value.lock().take()
    }
}
