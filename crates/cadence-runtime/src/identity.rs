use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identity of a thread as seen by a [`ThreadIdentity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ThreadTag(pub u64);

/// Answers "which thread is this?" for the scheduler-thread check.
pub trait ThreadIdentity: Send + Sync + 'static {
    fn current(&self) -> ThreadTag;
}

/// Real OS threads, each tagged on first use.
pub struct OsThreads;

impl ThreadIdentity for OsThreads {
    fn current(&self) -> ThreadTag {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        thread_local! {
            static TAG: u64 = NEXT.fetch_add(1, Ordering::Relaxed);
        }
        ThreadTag(TAG.with(|t| *t))
    }
}

/// Identity switched by hand. Every OS thread sees the same tag, so this is
/// for single-threaded tests that want to play both sides.
#[derive(Clone)]
pub struct ManualThreads {
    current: Arc<AtomicU64>,
}

impl ManualThreads {
    pub fn new(tag: ThreadTag) -> Self {
        Self {
            current: Arc::new(AtomicU64::new(tag.0)),
        }
    }

    pub fn enter(&self, tag: ThreadTag) {
        self.current.store(tag.0, Ordering::SeqCst);
    }
}

impl ThreadIdentity for ManualThreads {
    fn current(&self) -> ThreadTag {
        ThreadTag(self.current.load(Ordering::SeqCst))
    }
}
