//! # Cadence runtime
//!
//! A single-threaded UI event loop with thread-safe producers.
//!
//! - [`Runtime`] is the context. [`Runtime::init`] claims the calling thread
//!   as the scheduler thread and returns the [`Scheduler`];
//!   [`Runtime::spawn`] starts a fresh thread for it instead.
//! - [`Handle`] is what native input callbacks and background threads hold:
//!   post input, queue serial calls, wait for results, request shutdown.
//! - [`Scheduler`] owns widget state. Each iteration either advances the
//!   head of the transition FIFO, or dispatches input, ticks and paints the
//!   current [`Screen`], fires timers and drains one batch of serial calls.
//! - Modal sessions ([`Scheduler::show_modal`]) and blocking rendezvous
//!   ([`Scheduler::invoke_and_block`]) nest the loop instead of stalling it.
//!
//! ```rust
//! use cadence_core::{RecordingSurface, Rect, Surface};
//! use cadence_runtime::*;
//!
//! struct Blank;
//! impl ScreenHandler for Blank {
//!     fn paint(&self, _surface: &mut dyn Surface, _region: Rect) {}
//! }
//!
//! let runtime = Runtime::new(SchedulerConfig::default());
//! let mut ui = runtime.init(RecordingSurface::new(320.0, 240.0)).unwrap();
//! ui.show(Screen::new(Blank), None);
//!
//! let handle = runtime.handle();
//! handle.call_serially(|ui| ui.handle().shutdown()).unwrap();
//! ui.run();
//! assert!(!runtime.is_initialized());
//! ```

pub mod config;
pub mod error;
pub mod handle;
pub mod identity;
pub mod modal;
mod queue;
mod rendezvous;
pub mod scheduler;
pub mod screen;
mod shared;
pub mod stats;
mod timers;
pub mod transition;

mod tests;

pub use config::SchedulerConfig;
pub use error::{Fault, FaultStage, SchedulerError};
pub use handle::Handle;
pub use identity::{ManualThreads, OsThreads, ThreadIdentity, ThreadTag};
pub use modal::{ErrorNotice, ModalOutcome, ModalSession};
pub use scheduler::Scheduler;
pub use screen::{Screen, ScreenHandler};
pub use shared::Runtime;
pub use stats::FrameStats;
pub use transition::{Cut, Fade, Slide, SlideDirection, Transition, TransitionPhase};
