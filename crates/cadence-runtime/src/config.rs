use std::time::Duration;

/// Scheduler tuning. Fixed for the lifetime of a [`crate::Runtime`].
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct SchedulerConfig {
    /// Target frames per second for animation ticks.
    pub framerate: u32,

    /// Never sleep between iterations. Animations tick on every iteration;
    /// useful for benchmarks and tests, burns a core otherwise.
    pub no_sleep: bool,

    /// Pause after each transition frame, for paint backends that need to
    /// catch up. Transitions are otherwise not throttled.
    pub transition_yield: Option<Duration>,

    pub key_repeat_delay: Duration,
    pub key_repeat_interval: Duration,
    pub long_press_delay: Duration,

    /// Pixels a pressed pointer may travel before a long press is cancelled.
    pub drag_threshold: i32,

    /// Limit on nested pumps (modal sessions plus blocking rendezvous).
    pub max_nesting_depth: usize,

    /// Auto-dismiss delay for the built-in error notice. `None` waits for
    /// the user.
    pub error_notice_timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            framerate: 60,
            no_sleep: false,
            transition_yield: None,
            key_repeat_delay: Duration::from_millis(800),
            key_repeat_interval: Duration::from_millis(100),
            long_press_delay: Duration::from_millis(800),
            drag_threshold: 10,
            max_nesting_depth: 32,
            error_notice_timeout: Some(Duration::from_secs(3)),
        }
    }
}

impl SchedulerConfig {
    /// Millisecond interval between animation ticks.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.framerate.max(1)))
    }

    pub fn with_framerate(mut self, fps: u32) -> Self {
        self.framerate = fps;
        self
    }
    pub fn with_no_sleep(mut self, no_sleep: bool) -> Self {
        self.no_sleep = no_sleep;
        self
    }
    pub fn with_transition_yield(mut self, pause: Option<Duration>) -> Self {
        self.transition_yield = pause;
        self
    }
    pub fn with_key_repeat(mut self, delay: Duration, interval: Duration) -> Self {
        self.key_repeat_delay = delay;
        self.key_repeat_interval = interval;
        self
    }
    pub fn with_long_press_delay(mut self, delay: Duration) -> Self {
        self.long_press_delay = delay;
        self
    }
    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
    pub fn with_error_notice_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.error_notice_timeout = timeout;
        self
    }
}
