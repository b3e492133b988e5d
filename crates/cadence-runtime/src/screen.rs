use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use cadence_core::{Animated, KeyCode, Point, Rect, Surface};
use smallvec::SmallVec;

use crate::Scheduler;

/// Event and paint callbacks implemented by the widget layer.
///
/// Every method runs on the scheduler thread and receives the scheduler, so
/// handlers can switch screens, open modal sessions or queue work.
#[allow(unused_variables)]
pub trait ScreenHandler {
    fn key_pressed(&self, ui: &mut Scheduler, code: KeyCode) {}
    fn key_released(&self, ui: &mut Scheduler, code: KeyCode) {}
    fn key_repeated(&self, ui: &mut Scheduler, code: KeyCode) {}

    fn pointer_pressed(&self, ui: &mut Scheduler, points: &[Point]) {}
    fn pointer_dragged(&self, ui: &mut Scheduler, points: &[Point]) {}
    fn pointer_released(&self, ui: &mut Scheduler, points: &[Point]) {}
    fn pointer_hover(&self, ui: &mut Scheduler, points: &[Point]) {}
    fn pointer_hover_released(&self, ui: &mut Scheduler, points: &[Point]) {}
    fn long_pointer_press(&self, ui: &mut Scheduler, point: Point) {}

    fn size_changed(&self, ui: &mut Scheduler, width: u32, height: u32) {}
    /// App brought to the foreground.
    fn show_notify(&self, ui: &mut Scheduler) {}
    /// App sent to the background.
    fn hide_notify(&self, ui: &mut Scheduler) {}
    /// This screen just became the current one.
    fn shown(&self, ui: &mut Scheduler) {}

    /// Repaints `region`; the surface is already clipped to it.
    fn paint(&self, surface: &mut dyn Surface, region: Rect);
}

const MAX_DIRTY_REGIONS: usize = 4;

/// A top-level screen: its handler, the animated members ticked while it is
/// current, and the regions waiting for a repaint.
///
/// Cloning shares the same screen. Screens are scheduler-thread only.
#[derive(Clone)]
pub struct Screen {
    inner: Rc<ScreenInner>,
}

struct ScreenInner {
    id: u64,
    handler: Box<dyn ScreenHandler>,
    animated: RefCell<Vec<Rc<dyn Animated>>>,
    dirty: RefCell<SmallVec<[Rect; MAX_DIRTY_REGIONS]>>,
    full_repaint: Cell<bool>,
}

impl Screen {
    pub fn new(handler: impl ScreenHandler + 'static) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            inner: Rc::new(ScreenInner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                handler: Box::new(handler),
                animated: RefCell::new(Vec::new()),
                dirty: RefCell::new(SmallVec::new()),
                full_repaint: Cell::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn handler(&self) -> &dyn ScreenHandler {
        &*self.inner.handler
    }

    pub fn ptr_eq(&self, other: &Screen) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Adds a member to the per-frame tick set. Registering twice is a no-op.
    pub fn register_animated(&self, member: Rc<dyn Animated>) {
        let mut set = self.inner.animated.borrow_mut();
        if !set.iter().any(|m| same_member(m, &member)) {
            set.push(member);
        }
    }

    pub fn deregister_animated(&self, member: &Rc<dyn Animated>) {
        self.inner
            .animated
            .borrow_mut()
            .retain(|m| !same_member(m, member));
    }

    pub fn has_animations(&self) -> bool {
        !self.inner.animated.borrow().is_empty()
    }

    /// Snapshot of the tick set, so members can deregister mid-tick.
    pub fn animated_members(&self) -> Vec<Rc<dyn Animated>> {
        self.inner.animated.borrow().clone()
    }

    /// Marks the whole screen dirty.
    pub fn repaint(&self) {
        self.inner.full_repaint.set(true);
        self.inner.dirty.borrow_mut().clear();
    }

    pub fn repaint_region(&self, region: Rect) {
        if self.inner.full_repaint.get() || region.is_empty() {
            return;
        }
        let mut dirty = self.inner.dirty.borrow_mut();
        if dirty.len() == MAX_DIRTY_REGIONS {
            // too fragmented, collapse into one
            let merged = dirty.iter().fold(region, |acc, r| acc.union(r));
            dirty.clear();
            dirty.push(merged);
        } else {
            dirty.push(region);
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.full_repaint.get() || !self.inner.dirty.borrow().is_empty()
    }

    pub(crate) fn take_dirty(&self, full: Rect) -> SmallVec<[Rect; MAX_DIRTY_REGIONS]> {
        if self.inner.full_repaint.replace(false) {
            self.inner.dirty.borrow_mut().clear();
            let mut all = SmallVec::new();
            all.push(full);
            return all;
        }
        std::mem::take(&mut *self.inner.dirty.borrow_mut())
    }

    pub fn paint(&self, surface: &mut dyn Surface, region: Rect) {
        self.inner.handler.paint(surface, region);
    }
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen").field("id", &self.inner.id).finish()
    }
}

fn same_member(a: &Rc<dyn Animated>, b: &Rc<dyn Animated>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}
