//! Modal sessions: a screen shown on top of the current one, with the
//! caller blocked in a nested pump until it is disposed.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use cadence_core::{Color, KeyCode, Point, Rect, Surface, Vec2};
use parking_lot::Mutex;
use web_time::Instant;

use crate::shared::Shared;
use crate::transition::Transition;
use crate::{Fault, Scheduler, SchedulerError, Screen, ScreenHandler};

/// How a modal session ended.
pub enum ModalOutcome {
    /// Closed by [`ModalSession::dispose`] or one of its variants.
    Disposed(Option<Box<dyn Any + Send>>),
    TimedOut,
    /// The loop shut down, or nesting failed, before anyone disposed it.
    Aborted,
}

impl ModalOutcome {
    /// The value passed to [`ModalSession::dispose_with`], if it is a `T`.
    pub fn value<T: Any>(self) -> Option<T> {
        match self {
            ModalOutcome::Disposed(Some(v)) => v.downcast::<T>().ok().map(|b| *b),
            _ => None,
        }
    }

    pub fn is_timed_out(&self) -> bool {
        matches!(self, ModalOutcome::TimedOut)
    }
}

impl fmt::Debug for ModalOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModalOutcome::Disposed(v) => f
                .debug_tuple("Disposed")
                .field(&v.as_ref().map(|_| ".."))
                .finish(),
            ModalOutcome::TimedOut => f.write_str("TimedOut"),
            ModalOutcome::Aborted => f.write_str("Aborted"),
        }
    }
}

/// Disposer for one modal session. Clone it into handlers or hand it to
/// another thread; the first outcome wins.
#[derive(Clone)]
pub struct ModalSession {
    inner: Arc<ModalInner>,
}

struct ModalInner {
    shared: Arc<Shared>,
    disposed: AtomicBool,
    outcome: Mutex<Option<ModalOutcome>>,
    due: Option<Instant>,
}

impl ModalSession {
    fn new(shared: Arc<Shared>, timeout: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(ModalInner {
                shared,
                disposed: AtomicBool::new(false),
                outcome: Mutex::new(None),
                due: timeout.map(|t| Instant::now() + t),
            }),
        }
    }

    pub fn dispose(&self) {
        self.resolve(ModalOutcome::Disposed(None));
    }

    /// Disposes with a result for the blocked caller.
    pub fn dispose_with<T: Any + Send>(&self, value: T) {
        self.resolve(ModalOutcome::Disposed(Some(Box::new(value))));
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Auto-dispose deadline, if the session was shown with a timeout.
    pub fn due(&self) -> Option<Instant> {
        self.inner.due
    }

    pub fn ptr_eq(&self, other: &ModalSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn resolve(&self, outcome: ModalOutcome) {
        {
            let mut slot = self.inner.outcome.lock();
            if slot.is_some() {
                return;
            }
            *slot = Some(outcome);
        }
        self.inner
            .shared
            .signal(|_| self.inner.disposed.store(true, Ordering::Release));
    }

    fn take_outcome(&self) -> ModalOutcome {
        self.inner
            .outcome
            .lock()
            .take()
            .unwrap_or(ModalOutcome::Aborted)
    }
}

impl fmt::Debug for ModalSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModalSession")
            .field("disposed", &self.is_disposed())
            .field("due", &self.inner.due)
            .finish()
    }
}

impl Scheduler {
    /// Shows `screen` and keeps the loop running underneath until the
    /// session is disposed or `timeout` passes. The screen that was showing
    /// before comes back afterwards.
    ///
    /// Sessions nest: a handler of the modal screen may open another one,
    /// and the inner call returns first.
    pub fn show_modal(
        &mut self,
        screen: Screen,
        transition: Option<Box<dyn Transition>>,
        timeout: Option<Duration>,
    ) -> Result<ModalOutcome, SchedulerError> {
        self.ensure_depth()?;
        let previous = self.showing();
        let session = ModalSession::new(self.shared.clone(), timeout);
        log::debug!(
            "modal session on screen {} (depth {})",
            screen.id(),
            self.depth + 1
        );
        self.modals.push(session.clone());
        self.show(screen.clone(), transition);

        let pumped = self.pump_until(|| session.is_disposed());
        self.modals.retain(|s| !s.ptr_eq(&session));
        if let Err(e) = &pumped {
            log::debug!("modal session aborted: {e}");
            session.resolve(ModalOutcome::Aborted);
        }

        if let Some(prev) = previous
            && self.showing().is_some_and(|s| s.ptr_eq(&screen))
        {
            self.show(prev, None);
        }

        Ok(session.take_outcome())
    }

    /// Disposes the innermost open session.
    pub fn dispose_modal(&mut self) {
        if let Some(session) = self.modal_session() {
            session.dispose();
        }
    }

    /// The innermost session not yet disposed.
    pub fn modal_session(&self) -> Option<ModalSession> {
        self.modals.iter().rev().find(|s| !s.is_disposed()).cloned()
    }

    pub(crate) fn check_modal_timeouts(&mut self, now: Instant) {
        for session in &self.modals {
            if !session.is_disposed() && session.due().is_some_and(|d| d <= now) {
                log::debug!("modal session timed out");
                session.resolve(ModalOutcome::TimedOut);
            }
        }
    }

    pub(crate) fn modal_due(&self, now: Instant) -> bool {
        self.next_modal_due().is_some_and(|d| d <= now)
    }

    pub(crate) fn next_modal_due(&self) -> Option<Instant> {
        self.modals
            .iter()
            .filter(|s| !s.is_disposed())
            .filter_map(|s| s.due())
            .min()
    }

    /// Built-in fallback when no error listener is set: a modal notice
    /// naming the fault, dismissed by any key or tap.
    pub(crate) fn show_error_notice(&mut self, fault: &Fault) {
        if self.showing_error_notice
            || self.current().is_none()
            || self.depth >= self.config.max_nesting_depth
        {
            return;
        }
        self.showing_error_notice = true;
        let notice = Screen::new(ErrorNotice::new(fault.to_string()));
        let timeout = self.config.error_notice_timeout;
        if let Err(e) = self.show_modal(notice, None, timeout) {
            log::warn!("could not show error notice: {e}");
        }
        self.showing_error_notice = false;
    }
}

/// Screen shown for a dispatch fault when no error listener is installed.
pub struct ErrorNotice {
    message: String,
}

impl ErrorNotice {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl ScreenHandler for ErrorNotice {
    fn key_released(&self, ui: &mut Scheduler, _code: KeyCode) {
        ui.dispose_modal();
    }

    fn pointer_released(&self, ui: &mut Scheduler, _points: &[Point]) {
        ui.dispose_modal();
    }

    fn paint(&self, surface: &mut dyn Surface, region: Rect) {
        surface.fill_rect(region, Color::from_hex("#202020"));
        surface.draw_text(Vec2 { x: 16.0, y: 24.0 }, "Error", Color::from_hex("#FF5252"));
        surface.draw_text(Vec2 { x: 16.0, y: 48.0 }, &self.message, Color::WHITE);
    }
}
