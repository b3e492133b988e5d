//! Screen transitions and the FIFO that plays them one at a time.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};

use cadence_core::{AnimatedValue, AnimationSpec, Surface, Vec2};

use crate::Screen;

/// Lifecycle of a queued transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransitionPhase {
    Pending,
    Initializing,
    Stepping,
    Finished,
}

/// Animated hand-off from one screen to another.
///
/// `step` is called once per loop iteration until `is_finished` holds;
/// `paint` draws the in-between frame after each unfinished step.
pub trait Transition {
    fn init(&mut self, _source: Option<&Screen>, _destination: &Screen) {}
    fn step(&mut self);
    fn is_finished(&self) -> bool;
    fn paint(&self, surface: &mut dyn Surface, source: Option<&Screen>, destination: &Screen);
    fn cleanup(&mut self) {}
}

struct Entry {
    transition: Box<dyn Transition>,
    source: Option<Screen>,
    destination: Screen,
    phase: TransitionPhase,
}

pub(crate) enum StepOutcome {
    Idle,
    Running,
    /// Head finished. `committed` is its destination when nothing else was
    /// queued behind it.
    Finished { committed: Option<Screen> },
}

#[derive(Default)]
pub(crate) struct TransitionQueue {
    entries: VecDeque<Entry>,
}

impl TransitionQueue {
    pub fn push(
        &mut self,
        source: Option<Screen>,
        destination: Screen,
        transition: Box<dyn Transition>,
    ) {
        self.entries.push_back(Entry {
            transition,
            source,
            destination,
            phase: TransitionPhase::Pending,
        });
    }

    pub fn is_active(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The screen that will be current once the queue drains.
    pub fn pending_destination(&self) -> Option<&Screen> {
        self.entries.back().map(|e| &e.destination)
    }

    pub fn head_phase(&self) -> Option<TransitionPhase> {
        self.entries.front().map(|e| e.phase)
    }

    /// Steps only the head. A head still `Pending` is initialized first.
    pub fn step(&mut self, surface: Option<&mut dyn Surface>) -> StepOutcome {
        let Some(head) = self.entries.front_mut() else {
            return StepOutcome::Idle;
        };

        if head.phase == TransitionPhase::Pending {
            head.phase = TransitionPhase::Initializing;
            head.transition
                .init(head.source.as_ref(), &head.destination);
            head.phase = TransitionPhase::Stepping;
        }

        head.transition.step();
        if !head.transition.is_finished() {
            if let Some(surface) = surface {
                surface.reset();
                head.transition
                    .paint(surface, head.source.as_ref(), &head.destination);
                surface.reset();
                surface.flush();
            }
            return StepOutcome::Running;
        }

        let committed = self.finish_head();
        StepOutcome::Finished { committed }
    }

    /// Drops the head without finishing its animation, e.g. after it
    /// panicked. Same commit rule as a normal finish. A head that already
    /// reached `Finished` is not cleaned up twice.
    pub fn abort_head(&mut self) -> AbortedHead {
        let Some(mut head) = self.entries.pop_front() else {
            return AbortedHead::default();
        };
        let fault = if head.phase == TransitionPhase::Finished {
            None
        } else {
            head.phase = TransitionPhase::Finished;
            catch_unwind(AssertUnwindSafe(|| head.transition.cleanup())).err()
        };
        log::debug!(
            "aborted transition to screen {}, {} queued",
            head.destination.id(),
            self.entries.len()
        );
        AbortedHead {
            committed: self.entries.is_empty().then_some(head.destination),
            cleanup_fault: fault,
        }
    }

    /// Cleans up the head while it is still queued, then pops it. If
    /// `cleanup` unwinds, the head stays in front marked `Finished`.
    fn finish_head(&mut self) -> Option<Screen> {
        let head = self.entries.front_mut()?;
        head.phase = TransitionPhase::Finished;
        head.transition.cleanup();
        let done = self.entries.pop_front()?;
        log::trace!(
            "transition to screen {} finished, {} queued",
            done.destination.id(),
            self.entries.len()
        );
        self.entries.is_empty().then_some(done.destination)
    }
}

/// Result of [`TransitionQueue::abort_head`].
#[derive(Default)]
pub(crate) struct AbortedHead {
    pub committed: Option<Screen>,
    pub cleanup_fault: Option<Box<dyn Any + Send>>,
}

/// Finishes on its first step. Queued in place of a plain screen switch
/// when other transitions are still playing, to keep their order.
#[derive(Default)]
pub struct Cut {
    done: bool,
}

impl Transition for Cut {
    fn step(&mut self) {
        self.done = true;
    }
    fn is_finished(&self) -> bool {
        self.done
    }
    fn paint(&self, surface: &mut dyn Surface, _source: Option<&Screen>, destination: &Screen) {
        let full = surface.size().to_rect();
        destination.paint(surface, full);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlideDirection {
    /// Destination enters from the right edge.
    Left,
    /// Destination enters from the left edge.
    Right,
    /// Destination enters from the bottom edge.
    Up,
    /// Destination enters from the top edge.
    Down,
}

/// Pushes the source out while the destination slides in.
pub struct Slide {
    direction: SlideDirection,
    progress: AnimatedValue<f32>,
    started: bool,
}

impl Slide {
    pub fn new(direction: SlideDirection, spec: AnimationSpec) -> Self {
        Self {
            direction,
            progress: AnimatedValue::new(0.0, spec),
            started: false,
        }
    }

    fn unit(&self) -> (f32, f32) {
        match self.direction {
            SlideDirection::Left => (-1.0, 0.0),
            SlideDirection::Right => (1.0, 0.0),
            SlideDirection::Up => (0.0, -1.0),
            SlideDirection::Down => (0.0, 1.0),
        }
    }
}

impl Transition for Slide {
    fn init(&mut self, _source: Option<&Screen>, _destination: &Screen) {
        self.progress.set_target(1.0);
        self.started = true;
    }

    fn step(&mut self) {
        self.progress.update();
    }

    fn is_finished(&self) -> bool {
        self.started && !self.progress.is_animating()
    }

    fn paint(&self, surface: &mut dyn Surface, source: Option<&Screen>, destination: &Screen) {
        let full = surface.size().to_rect();
        let t = *self.progress.get();
        let (ux, uy) = self.unit();
        let travel = Vec2 {
            x: ux * full.w,
            y: uy * full.h,
        };

        if let Some(src) = source {
            surface.set_translate(Vec2 {
                x: travel.x * t,
                y: travel.y * t,
            });
            src.paint(surface, full);
        }
        surface.set_translate(Vec2 {
            x: -travel.x * (1.0 - t),
            y: -travel.y * (1.0 - t),
        });
        destination.paint(surface, full);
    }
}

/// Cross-fades from source to destination.
pub struct Fade {
    progress: AnimatedValue<f32>,
    started: bool,
}

impl Fade {
    pub fn new(spec: AnimationSpec) -> Self {
        Self {
            progress: AnimatedValue::new(0.0, spec),
            started: false,
        }
    }
}

impl Transition for Fade {
    fn init(&mut self, _source: Option<&Screen>, _destination: &Screen) {
        self.progress.set_target(1.0);
        self.started = true;
    }

    fn step(&mut self) {
        self.progress.update();
    }

    fn is_finished(&self) -> bool {
        self.started && !self.progress.is_animating()
    }

    fn paint(&self, surface: &mut dyn Surface, source: Option<&Screen>, destination: &Screen) {
        let full = surface.size().to_rect();
        if let Some(src) = source {
            surface.set_alpha(1.0);
            src.paint(surface, full);
        }
        surface.set_alpha(*self.progress.get());
        destination.paint(surface, full);
    }
}
