//! Paint contract between the scheduler and the native binding.
//!
//! The scheduler never rasterizes anything itself. It hands a `Surface` to
//! screens, transitions and animated members, and calls [`Surface::flush`]
//! once a paint pass produced output.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{Color, Rect, Size, Vec2};

pub trait Surface {
    fn size(&self) -> Size;
    /// Restricts subsequent drawing; `None` clears the clip.
    fn set_clip(&mut self, clip: Option<Rect>);
    /// Sets the origin offset applied to subsequent drawing.
    fn set_translate(&mut self, offset: Vec2);
    /// Global opacity for subsequent drawing, 0..=1.
    fn set_alpha(&mut self, alpha: f32);
    fn fill_rect(&mut self, rect: Rect, color: Color);
    fn draw_text(&mut self, origin: Vec2, text: &str, color: Color);
    /// Pushes everything drawn since the last flush to the screen.
    fn flush(&mut self);

    /// Restores clip, translation and alpha.
    fn reset(&mut self) {
        self.set_clip(None);
        self.set_translate(Vec2::default());
        self.set_alpha(1.0);
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Clip(Option<Rect>),
    Translate(Vec2),
    Alpha(f32),
    FillRect { rect: Rect, color: Color },
    Text { origin: Vec2, text: String, color: Color },
    Flush,
}

/// Surface that records every call. Used by headless runs and tests.
///
/// Clones share the same recording, so a test can keep one handle while the
/// scheduler owns the other.
#[derive(Clone, Default)]
pub struct RecordingSurface {
    inner: Arc<Mutex<Recording>>,
}

#[derive(Default)]
struct Recording {
    size: Size,
    ops: Vec<DrawOp>,
    flushes: usize,
}

impl RecordingSurface {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recording {
                size: Size::new(width, height),
                ..Default::default()
            })),
        }
    }

    pub fn flushes(&self) -> usize {
        self.inner.lock().flushes
    }

    /// Drains recorded ops, keeping the flush counter.
    pub fn take_ops(&self) -> Vec<DrawOp> {
        std::mem::take(&mut self.inner.lock().ops)
    }

    /// Text of every `draw_text` recorded so far, in order.
    pub fn texts(&self) -> Vec<String> {
        self.inner
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn push(&self, op: DrawOp) {
        self.inner.lock().ops.push(op);
    }
}

impl Surface for RecordingSurface {
    fn size(&self) -> Size {
        self.inner.lock().size
    }
    fn set_clip(&mut self, clip: Option<Rect>) {
        self.push(DrawOp::Clip(clip));
    }
    fn set_translate(&mut self, offset: Vec2) {
        self.push(DrawOp::Translate(offset));
    }
    fn set_alpha(&mut self, alpha: f32) {
        self.push(DrawOp::Alpha(alpha));
    }
    fn fill_rect(&mut self, rect: Rect, color: Color) {
        self.push(DrawOp::FillRect { rect, color });
    }
    fn draw_text(&mut self, origin: Vec2, text: &str, color: Color) {
        self.push(DrawOp::Text {
            origin,
            text: text.to_string(),
            color,
        });
    }
    fn flush(&mut self) {
        let mut rec = self.inner.lock();
        rec.flushes += 1;
        rec.ops.push(DrawOp::Flush);
    }
}
