use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
};

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// How far external termination requests have escalated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ShutdownLevel {
    Running = 0,
    /// Take no new jobs; let the current one finish.
    Draining = 1,
    /// Terminate the current job now.
    ForceTerminate = 2,
    /// Exit the process immediately.
    Exit = 3,
}

impl ShutdownLevel {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ShutdownLevel::Running,
            1 => ShutdownLevel::Draining,
            2 => ShutdownLevel::ForceTerminate,
            _ => ShutdownLevel::Exit,
        }
    }

    /// Next step of the escalation; `Exit` is terminal.
    pub fn next(self) -> Self {
        Self::from_u8((self as u8).saturating_add(1))
    }
}

impl fmt::Display for ShutdownLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShutdownLevel::Running => "running",
            ShutdownLevel::Draining => "draining",
            ShutdownLevel::ForceTerminate => "force-terminate",
            ShutdownLevel::Exit => "exit",
        })
    }
}

#[derive(Debug)]
struct ControlState {
    level: AtomicU8,
    drain: CancellationToken,
    terminate_job: AtomicBool,
    reload: AtomicBool,
}

/// Cloneable remote control of a [`Manager`](crate::manager::Manager).
///
/// Signal handlers and tests drive the manager through this; the manager consumes the
/// edge-triggered flags between ticks.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    inner: Arc<ControlState>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ControlState {
                level: AtomicU8::new(ShutdownLevel::Running as u8),
                drain: CancellationToken::new(),
                terminate_job: AtomicBool::new(false),
                reload: AtomicBool::new(false),
            }),
        }
    }

    pub fn level(&self) -> ShutdownLevel {
        ShutdownLevel::from_u8(self.inner.level.load(Ordering::SeqCst))
    }

    /// Escalate one step and return the new level.
    ///
    /// `Draining` stops intake and wakes a blocked queue poll, `ForceTerminate` raises the
    /// per-job termination edge. Acting on `Exit` is up to the caller.
    pub fn request_termination(&self) -> ShutdownLevel {
        let prev = self
            .inner
            .level
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| {
                Some(ShutdownLevel::from_u8(v).next() as u8)
            })
            .map(ShutdownLevel::from_u8)
            .unwrap_or_else(ShutdownLevel::from_u8);
        let level = prev.next();

        match level {
            ShutdownLevel::Running => {}
            ShutdownLevel::Draining => {
                info!("termination requested; draining (no new jobs)");
                self.inner.drain.cancel();
            }
            ShutdownLevel::ForceTerminate => {
                warn!("termination requested again; terminating the current job");
                self.inner.drain.cancel();
                self.inner.terminate_job.store(true, Ordering::SeqCst);
            }
            ShutdownLevel::Exit => warn!("termination requested a third time; exiting"),
        }
        level
    }

    /// Ask for the current job to be terminated without changing the shutdown level.
    ///
    /// Only the job in flight is affected; a request made while no job runs is dropped
    /// when the next job is dispatched.
    pub fn terminate_job(&self) {
        self.inner.terminate_job.store(true, Ordering::SeqCst);
    }

    /// Ask for a configuration reload at the next check.
    pub fn request_reload(&self) {
        self.inner.reload.store(true, Ordering::SeqCst);
    }

    /// Cancelled once the level reaches `Draining`.
    pub fn drain_token(&self) -> CancellationToken {
        self.inner.drain.clone()
    }

    pub(crate) fn take_job_termination(&self) -> bool {
        self.inner.terminate_job.swap(false, Ordering::SeqCst)
    }

    pub(crate) fn take_reload(&self) -> bool {
        self.inner.reload.swap(false, Ordering::SeqCst)
    }
}

impl Default for ControlHandle {
    fn default() -> Self {
        Self::new()
    }
}
