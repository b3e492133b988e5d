use cadence_core::{KeyCode, Point};
use smallvec::SmallVec;
use web_time::Instant;

use crate::SchedulerConfig;

pub(crate) enum TimerEvent {
    KeyRepeat(KeyCode),
    LongPress(Point),
}

struct KeyRepeat {
    code: KeyCode,
    due: Instant,
}

struct LongPress {
    origin: Point,
    due: Instant,
}

/// Key-repeat and long-press deadlines, armed by input dispatch.
#[derive(Default)]
pub(crate) struct Timers {
    key_repeat: Option<KeyRepeat>,
    long_press: Option<LongPress>,
}

impl Timers {
    pub fn key_down(&mut self, code: KeyCode, now: Instant, config: &SchedulerConfig) {
        self.key_repeat = Some(KeyRepeat {
            code,
            due: now + config.key_repeat_delay,
        });
    }

    pub fn key_up(&mut self, code: KeyCode) {
        if self.key_repeat.as_ref().is_some_and(|r| r.code == code) {
            self.key_repeat = None;
        }
    }

    pub fn pointer_down(&mut self, origin: Point, now: Instant, config: &SchedulerConfig) {
        self.long_press = Some(LongPress {
            origin,
            due: now + config.long_press_delay,
        });
    }

    pub fn pointer_drag(&mut self, to: Point, config: &SchedulerConfig) {
        let limit = i64::from(config.drag_threshold) * i64::from(config.drag_threshold);
        if self
            .long_press
            .as_ref()
            .is_some_and(|lp| lp.origin.distance_sq(to) > limit)
        {
            self.long_press = None;
        }
    }

    pub fn pointer_up(&mut self) {
        self.long_press = None;
    }

    pub fn clear(&mut self) {
        self.key_repeat = None;
        self.long_press = None;
    }

    pub fn next_due(&self) -> Option<Instant> {
        let kr = self.key_repeat.as_ref().map(|r| r.due);
        let lp = self.long_press.as_ref().map(|l| l.due);
        match (kr, lp) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn is_due(&self, now: Instant) -> bool {
        self.next_due().is_some_and(|d| d <= now)
    }

    /// Pops expired deadlines. Key repeat re-arms itself; long press fires
    /// once per press.
    pub fn fire_due(
        &mut self,
        now: Instant,
        config: &SchedulerConfig,
    ) -> SmallVec<[TimerEvent; 2]> {
        let mut fired = SmallVec::new();
        if let Some(r) = self.key_repeat.as_mut()
            && r.due <= now
        {
            fired.push(TimerEvent::KeyRepeat(r.code));
            r.due = now + config.key_repeat_interval;
        }
        if self.long_press.as_ref().is_some_and(|lp| lp.due <= now)
            && let Some(lp) = self.long_press.take()
        {
            fired.push(TimerEvent::LongPress(lp.origin));
        }
        fired
    }
}
