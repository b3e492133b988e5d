use smallvec::SmallVec;

/// Raw key code as reported by the native binding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KeyCode(pub i32);

/// Pointer coordinate in surface pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Squared distance, avoids the sqrt for threshold checks.
    pub fn distance_sq(&self, other: Point) -> i64 {
        let dx = i64::from(self.x) - i64::from(other.x);
        let dy = i64::from(self.y) - i64::from(other.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

/// Coordinates of one pointer event; more than one entry means multi-touch.
pub type Points = SmallVec<[Point; 2]>;

/// Zips parallel x/y arrays the way native touch callbacks deliver them.
/// Extra entries in the longer slice are ignored.
pub fn points(xs: &[i32], ys: &[i32]) -> Points {
    xs.iter()
        .zip(ys.iter())
        .map(|(&x, &y)| Point { x, y })
        .collect()
}

/// One normalized input or lifecycle occurrence.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InputEvent {
    KeyDown(KeyCode),
    KeyUp(KeyCode),
    PointerDown(Points),
    PointerUp(Points),
    PointerDrag(Points),
    PointerHover(Points),
    PointerHoverUp(Points),
    Resize { width: u32, height: u32 },
    ShowNotify,
    HideNotify,
}

impl InputEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InputEvent::KeyDown(_) => "key-down",
            InputEvent::KeyUp(_) => "key-up",
            InputEvent::PointerDown(_) => "pointer-down",
            InputEvent::PointerUp(_) => "pointer-up",
            InputEvent::PointerDrag(_) => "pointer-drag",
            InputEvent::PointerHover(_) => "pointer-hover",
            InputEvent::PointerHoverUp(_) => "pointer-hover-up",
            InputEvent::Resize { .. } => "resize",
            InputEvent::ShowNotify => "show-notify",
            InputEvent::HideNotify => "hide-notify",
        }
    }

    /// First coordinate of a pointer event.
    pub fn primary_point(&self) -> Option<Point> {
        match self {
            InputEvent::PointerDown(p)
            | InputEvent::PointerUp(p)
            | InputEvent::PointerDrag(p)
            | InputEvent::PointerHover(p)
            | InputEvent::PointerHoverUp(p) => p.first().copied(),
            _ => None,
        }
    }
}
