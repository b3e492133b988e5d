use std::any::Any;
use std::fmt;

/// Usage and rendezvous failures returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler is not initialized")]
    NotInitialized,
    #[error("scheduler is already initialized on another thread")]
    AlreadyInitialized,
    #[error("illegal usage: {0}")]
    IllegalUsage(&'static str),
    #[error("scheduler shut down before the work completed")]
    ShutDown,
    #[error("work panicked: {0}")]
    WorkPanicked(String),
    #[error("nested pump depth limit ({0}) exceeded")]
    NestingTooDeep(usize),
    #[error("failed to spawn thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Where in the loop a dispatch fault happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultStage {
    Input,
    Animation,
    Paint,
    Timer,
    Serial,
    Transition,
}

impl fmt::Display for FaultStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FaultStage::Input => "input",
            FaultStage::Animation => "animation",
            FaultStage::Paint => "paint",
            FaultStage::Timer => "timer",
            FaultStage::Serial => "serial",
            FaultStage::Transition => "transition",
        };
        f.write_str(name)
    }
}

/// A panic caught at the iteration boundary.
#[derive(Clone, Debug)]
pub struct Fault {
    pub stage: FaultStage,
    pub message: String,
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fault: {}", self.stage, self.message)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
