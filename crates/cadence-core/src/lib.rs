//! # Cadence core types
//!
//! Everything the scheduler and the widget layer need to agree on, and
//! nothing else:
//!
//! - `geometry` / `color`: plain value types used by paint calls.
//! - `input`: normalized input and lifecycle events (`InputEvent`), as the
//!   native binding reports them.
//! - `surface`: the `Surface` paint contract plus `RecordingSurface` for
//!   headless runs.
//! - `animation`: the `Animated` tick contract and tweening helpers.
//!
//! ```rust
//! use cadence_core::*;
//!
//! let evt = InputEvent::PointerDown(points(&[10], &[20]));
//! assert_eq!(evt.primary_point(), Some(Point::new(10, 20)));
//! ```

pub mod animation;
pub mod color;
pub mod geometry;
pub mod input;
pub mod prelude;
pub mod surface;

pub use animation::*;
pub use color::*;
pub use geometry::*;
pub use input::*;
pub use surface::*;
