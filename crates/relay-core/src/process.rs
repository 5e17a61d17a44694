//! Process-group handle used to signal a job's whole subprocess tree at once.
use std::{
    io,
    sync::{
        Arc,
        atomic::{AtomicI32, Ordering},
    },
};

use tokio::process::{Child, Command};
use tracing::debug;

/// Shared, cloneable record of the process group a job spawned.
///
/// The runner keeps one clone to deliver the hard kill; the job keeps another to spawn
/// into it and to forward its own termination request.
#[derive(Debug, Clone, Default)]
pub struct ProcessGroup {
    pgid: Arc<AtomicI32>,
}

impl ProcessGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `cmd` as the leader of a new process group and remember the group id.
    pub fn spawn(&self, cmd: &mut Command) -> io::Result<Child> {
        cmd.process_group(0);
        let child = cmd.spawn()?;
        if let Some(pid) = child.id() {
            self.pgid.store(pid as i32, Ordering::SeqCst);
            debug!(pgid = pid, "spawned process group");
        }
        Ok(child)
    }

    /// Group id, `None` until something was spawned.
    pub fn id(&self) -> Option<i32> {
        match self.pgid.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    /// Deliver `signal` to every process in the group.
    ///
    /// Returns `Ok(false)` when there is no group to signal (nothing spawned yet, or the
    /// group already exited).
    pub fn signal(&self, signal: i32) -> io::Result<bool> {
        let Some(pgid) = self.id() else {
            return Ok(false);
        };
        // SAFETY: kill(2) has no memory-safety preconditions; a negative pid addresses the group.
        let rc = unsafe { libc::kill(-pgid, signal) };
        if rc == 0 {
            return Ok(true);
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            Ok(false)
        } else {
            Err(err)
        }
    }

    pub fn terminate(&self) -> io::Result<bool> {
        self.signal(libc::SIGTERM)
    }

    pub fn kill(&self) -> io::Result<bool> {
        self.signal(libc::SIGKILL)
    }
}
