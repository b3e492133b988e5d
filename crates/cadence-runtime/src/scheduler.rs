use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind, resume_unwind};
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

use cadence_core::{Animated, InputEvent, Surface};
use smallvec::SmallVec;
use web_time::Instant;

use crate::error::panic_message;
use crate::modal::ModalSession;
use crate::queue::SerialCall;
use crate::shared::Shared;
use crate::stats::FrameStats;
use crate::timers::{TimerEvent, Timers};
use crate::transition::{Cut, StepOutcome, Transition, TransitionPhase, TransitionQueue};
use crate::{Fault, FaultStage, Handle, Screen, SchedulerConfig};

type ErrorListener = Box<dyn FnMut(&Fault)>;

/// The scheduler-thread side of a [`crate::Runtime`].
///
/// Owns the current screen, the transition FIFO, timers and the paint
/// surface. It is `!Send`: everything that touches widget state goes through
/// here, on the thread that called [`crate::Runtime::init`].
pub struct Scheduler {
    pub(crate) shared: Arc<Shared>,
    pub(crate) config: SchedulerConfig,
    surface: Option<Box<dyn Surface>>,
    current: Option<Screen>,
    transitions: TransitionQueue,
    timers: Timers,
    pub(crate) modals: Vec<ModalSession>,
    pub(crate) depth: usize,
    error_listener: Option<ErrorListener>,
    pub(crate) showing_error_notice: bool,
    stage: FaultStage,
    stats: FrameStats,
    last_tick: Instant,
    size: (u32, u32),
    visible: bool,
}

impl Scheduler {
    pub(crate) fn new(shared: Arc<Shared>, surface: Box<dyn Surface>) -> Self {
        let size = surface.size();
        Self {
            config: shared.config.clone(),
            shared,
            surface: Some(surface),
            current: None,
            transitions: TransitionQueue::default(),
            timers: Timers::default(),
            modals: Vec::new(),
            depth: 0,
            error_listener: None,
            showing_error_notice: false,
            stage: FaultStage::Serial,
            stats: FrameStats::default(),
            last_tick: Instant::now(),
            size: (size.width as u32, size.height as u32),
            visible: true,
        }
    }

    pub fn handle(&self) -> Handle {
        Handle::new(self.shared.clone())
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Last size reported by the surface or a resize event.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn current(&self) -> Option<Screen> {
        self.current.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    pub fn is_scheduler_thread(&self) -> bool {
        self.shared.is_scheduler_thread()
    }

    /// Transitions queued or playing.
    pub fn pending_transitions(&self) -> usize {
        self.transitions.len()
    }

    pub fn transition_phase(&self) -> Option<TransitionPhase> {
        self.transitions.head_phase()
    }

    /// Dispatch faults go here instead of the built-in error notice.
    pub fn set_error_listener(&mut self, listener: impl FnMut(&Fault) + 'static) {
        self.error_listener = Some(Box::new(listener));
    }

    pub fn clear_error_listener(&mut self) {
        self.error_listener = None;
    }

    /// Queues work behind everything already submitted.
    pub fn call_serially(&self, work: impl FnOnce(&mut Scheduler) + Send + 'static) {
        self.shared.signal(|st| st.serial.push(Box::new(work)));
    }

    /// Makes `screen` current. Without a transition, and with nothing else
    /// queued, the switch happens immediately; otherwise it waits its turn
    /// in the transition FIFO.
    pub fn show(&mut self, screen: Screen, transition: Option<Box<dyn Transition>>) {
        let source = self.showing();
        match transition {
            None if !self.transitions.is_active() => self.commit(screen),
            None => self.transitions.push(source, screen, Box::new(Cut::default())),
            Some(t) => {
                log::debug!(
                    "queued transition to screen {} ({} ahead)",
                    screen.id(),
                    self.transitions.len()
                );
                self.transitions.push(source, screen, t);
            }
        }
    }

    /// The screen that is, or will be once transitions drain, current.
    pub(crate) fn showing(&self) -> Option<Screen> {
        self.transitions
            .pending_destination()
            .cloned()
            .or_else(|| self.current.clone())
    }

    fn commit(&mut self, screen: Screen) {
        log::debug!("screen {} is now current", screen.id());
        self.current = Some(screen.clone());
        self.timers.clear();
        screen.repaint();
        screen.handler().shown(self);
    }

    /// Runs the loop until [`Handle::shutdown`]. Dropping the scheduler on
    /// return releases the scheduler thread and the surface.
    pub fn run(mut self) {
        log::debug!("scheduler loop started");
        while self.is_running() {
            self.iterate(true, &|| false);
        }
        log::debug!(
            "scheduler loop exited after {} iterations",
            self.stats.iterations
        );
    }

    /// One iteration without sleeping first.
    pub fn poll(&mut self) {
        self.iterate(false, &|| false);
    }

    pub(crate) fn iterate(&mut self, block: bool, until: &dyn Fn() -> bool) {
        if block {
            self.wait_for_work(until);
            if until() {
                return;
            }
        }

        let outer_stage = self.stage;
        self.stats.iterations += 1;
        let now = Instant::now();
        self.check_modal_timeouts(now);

        if self.transitions.is_active() {
            self.stage = FaultStage::Transition;
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.step_transition())) {
                self.recover_transition(payload);
            }
            if let Some(pause) = self.config.transition_yield {
                thread::sleep(pause);
            }
        } else if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.service(now))) {
            self.report_fault(payload);
        }

        self.stage = outer_stage;
    }

    fn step_transition(&mut self) {
        let surface = match self.surface.as_deref_mut() {
            Some(s) if self.visible => Some(s as &mut dyn Surface),
            _ => None,
        };
        match self.transitions.step(surface) {
            StepOutcome::Running => self.stats.transition_frames += 1,
            StepOutcome::Finished {
                committed: Some(dest),
            } => self.commit(dest),
            StepOutcome::Finished { committed: None } | StepOutcome::Idle => {}
        }
    }

    /// Drops the faulted head and commits its destination when that empties
    /// the FIFO. Faults from its cleanup or from the commit are reported
    /// after the original one.
    fn recover_transition(&mut self, payload: Box<dyn Any + Send>) {
        let aborted = self.transitions.abort_head();
        let mut faults: SmallVec<[Box<dyn Any + Send>; 3]> = SmallVec::new();
        faults.push(payload);
        faults.extend(aborted.cleanup_fault);
        if let Some(dest) = aborted.committed
            && let Err(p) = catch_unwind(AssertUnwindSafe(|| self.commit(dest)))
        {
            faults.push(p);
        }
        for fault in faults {
            self.report_fault(fault);
        }
    }

    /// Ordinary iteration body. Before the first screen exists only serial
    /// calls are serviced.
    fn service(&mut self, now: Instant) {
        if self.current.is_some() {
            self.dispatch_input(now);
            self.paint_pass(now);
            self.fire_timers(now);
        }
        self.run_serial_batch();
    }

    fn dispatch_input(&mut self, now: Instant) {
        let events = self.shared.lock().input.drain_all();
        for event in events {
            self.stage = FaultStage::Input;
            self.stats.input_events += 1;
            self.dispatch(event, now);
        }
    }

    fn dispatch(&mut self, event: InputEvent, now: Instant) {
        let Some(screen) = self.current.clone() else {
            return;
        };
        let handler = screen.handler();
        log::trace!("dispatching {} to screen {}", event.name(), screen.id());
        match event {
            InputEvent::KeyDown(code) => {
                self.timers.key_down(code, now, &self.config);
                handler.key_pressed(self, code);
            }
            InputEvent::KeyUp(code) => {
                self.timers.key_up(code);
                handler.key_released(self, code);
            }
            InputEvent::PointerDown(points) => {
                if let Some(p) = points.first() {
                    self.timers.pointer_down(*p, now, &self.config);
                }
                handler.pointer_pressed(self, &points);
            }
            InputEvent::PointerDrag(points) => {
                if let Some(p) = points.first() {
                    self.timers.pointer_drag(*p, &self.config);
                }
                handler.pointer_dragged(self, &points);
            }
            InputEvent::PointerUp(points) => {
                self.timers.pointer_up();
                handler.pointer_released(self, &points);
            }
            InputEvent::PointerHover(points) => handler.pointer_hover(self, &points),
            InputEvent::PointerHoverUp(points) => handler.pointer_hover_released(self, &points),
            InputEvent::Resize { width, height } => {
                self.size = (width, height);
                handler.size_changed(self, width, height);
                screen.repaint();
            }
            InputEvent::ShowNotify => {
                self.visible = true;
                handler.show_notify(self);
                screen.repaint();
            }
            InputEvent::HideNotify => {
                self.visible = false;
                self.timers.clear();
                handler.hide_notify(self);
            }
        }
    }

    fn frame_due(&self, now: Instant) -> bool {
        self.config.no_sleep
            || now.saturating_duration_since(self.last_tick) >= self.config.frame_interval()
    }

    /// Ticks animated members when a frame is due, then repaints dirty
    /// regions plus every member that reported a change.
    fn paint_pass(&mut self, now: Instant) {
        let Some(screen) = self.current.clone() else {
            return;
        };

        let mut changed: SmallVec<[Rc<dyn Animated>; 4]> = SmallVec::new();
        if screen.has_animations() && self.frame_due(now) {
            self.stage = FaultStage::Animation;
            self.last_tick = now;
            self.stats.record_frame(now);
            for member in screen.animated_members() {
                if member.animate() {
                    changed.push(member);
                }
            }
        }

        if !self.visible {
            return;
        }
        self.stage = FaultStage::Paint;
        let Some(surface) = self.surface.as_deref_mut() else {
            return;
        };
        let regions = screen.take_dirty(surface.size().to_rect());
        if regions.is_empty() && changed.is_empty() {
            return;
        }
        for region in regions {
            surface.reset();
            surface.set_clip(Some(region));
            screen.paint(surface, region);
        }
        surface.reset();
        for member in &changed {
            member.paint(surface);
        }
        surface.reset();
        surface.flush();
        self.stats.paints += 1;
    }

    fn fire_timers(&mut self, now: Instant) {
        self.stage = FaultStage::Timer;
        for fired in self.timers.fire_due(now, &self.config) {
            let Some(screen) = self.current.clone() else {
                return;
            };
            match fired {
                TimerEvent::KeyRepeat(code) => screen.handler().key_repeated(self, code),
                TimerEvent::LongPress(point) => screen.handler().long_pointer_press(self, point),
            }
        }
    }

    /// Runs the calls queued at the start of the batch. If one panics, the
    /// rest of the batch goes back to the front of the queue before the
    /// panic continues up to the iteration boundary.
    fn run_serial_batch(&mut self) {
        let mut batch = self.shared.lock().serial.take_batch();
        while let Some(call) = batch.pop_front() {
            self.stage = FaultStage::Serial;
            self.stats.serial_calls += 1;
            if let Err(payload) = self.run_call(call) {
                if !batch.is_empty() {
                    log::debug!("requeueing {} serial calls after fault", batch.len());
                    self.shared.lock().serial.requeue_front(batch);
                }
                resume_unwind(payload);
            }
        }
    }

    fn run_call(&mut self, call: SerialCall) -> Result<(), Box<dyn Any + Send>> {
        catch_unwind(AssertUnwindSafe(|| call(self)))
    }

    /// Sleeps on the shared condvar until there is something to do, a
    /// deadline passes, or `until` holds.
    fn wait_for_work(&mut self, until: &dyn Fn() -> bool) {
        if self.config.no_sleep || self.transitions.is_active() {
            return;
        }
        let now = Instant::now();
        if self.timers.is_due(now) || self.modal_due(now) {
            return;
        }
        let has_screen = self.current.is_some();
        if let Some(screen) = &self.current
            && self.visible
            && self.surface.is_some()
            && screen.is_dirty()
        {
            return;
        }

        let mut deadline: Option<Instant> = None;
        let mut earliest = |d: Instant| {
            deadline = Some(deadline.map_or(d, |cur| cur.min(d)));
        };
        if self
            .current
            .as_ref()
            .is_some_and(|s| s.has_animations())
        {
            // frame deadline counts from the last tick, so the work done
            // since then comes out of this sleep
            earliest(self.last_tick + self.config.frame_interval());
        }
        if has_screen && let Some(d) = self.timers.next_due() {
            earliest(d);
        }
        if let Some(d) = self.next_modal_due() {
            earliest(d);
        }

        let shared = self.shared.clone();
        let mut st = shared.lock();
        loop {
            if !st.running
                || until()
                || !st.serial.is_empty()
                || (has_screen && !st.input.is_empty())
            {
                return;
            }
            let timeout = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if d <= now {
                        return;
                    }
                    Some(d - now)
                }
                None => None,
            };
            if shared.wait(&mut st, timeout) {
                return;
            }
        }
    }

    fn report_fault(&mut self, payload: Box<dyn Any + Send>) {
        let fault = Fault {
            stage: self.stage,
            message: panic_message(&*payload),
        };
        log::error!("{fault}");
        self.stats.faults += 1;
        if let Some(listener) = self.error_listener.as_mut() {
            if let Err(p) = catch_unwind(AssertUnwindSafe(|| listener(&fault))) {
                log::error!("error listener panicked: {}", panic_message(&*p));
            }
            return;
        }

        let (depth, modals) = (self.depth, self.modals.len());
        if let Err(p) = catch_unwind(AssertUnwindSafe(|| self.show_error_notice(&fault))) {
            log::error!("error notice panicked: {}", panic_message(&*p));
            self.depth = depth;
            self.modals.truncate(modals);
            self.showing_error_notice = false;
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let dropped = self.shared.signal(|st| {
            st.owner = None;
            st.running = false;
            st.input.clear();
            st.serial.take_all()
        });
        if !dropped.is_empty() {
            log::warn!("dropping {} serial calls at teardown", dropped.len());
        }
        drop(dropped);
        self.surface = None;
        log::debug!("scheduler released");
    }
}
