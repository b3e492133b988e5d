pub use crate::animation::{Animated, AnimatedValue, AnimationSpec, Easing, Interpolate};
pub use crate::color::Color;
pub use crate::geometry::{Rect, Size, Vec2};
pub use crate::input::{InputEvent, KeyCode, Point, Points, points};
pub use crate::surface::{DrawOp, RecordingSurface, Surface};
