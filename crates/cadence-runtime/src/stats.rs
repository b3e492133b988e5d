use web_time::Instant;

/// Counters maintained by the loop, readable through
/// [`crate::Scheduler::stats`].
#[derive(Clone, Debug, Default)]
pub struct FrameStats {
    pub iterations: u64,
    /// Animation ticks.
    pub frames: u64,
    pub transition_frames: u64,
    /// Paint passes that reached `Surface::flush`.
    pub paints: u64,
    pub input_events: u64,
    pub serial_calls: u64,
    pub faults: u64,
    fps_smooth: f32,
    last_frame: Option<Instant>,
}

impl FrameStats {
    /// Smoothed animation tick rate.
    pub fn fps(&self) -> f32 {
        self.fps_smooth
    }

    pub(crate) fn record_frame(&mut self, now: Instant) {
        self.frames += 1;
        if let Some(prev) = self.last_frame.replace(now) {
            let dt = now.saturating_duration_since(prev).as_secs_f32();
            if dt > 0.0 {
                let fps = 1.0 / dt;
                // simple EMA
                let a = 0.2;
                self.fps_smooth = if self.fps_smooth == 0.0 {
                    fps
                } else {
                    (1.0 - a) * self.fps_smooth + a * fps
                };
            }
        }
    }
}
