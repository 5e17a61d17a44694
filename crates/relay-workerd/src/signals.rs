//! Operator signals.
//!
//! SIGTERM and SIGINT advance the shutdown level one step each
//! (drain, then terminate the running job, then exit immediately); SIGHUP asks for a
//! configuration reload.
use std::io;

use relay_core::manager::{ControlHandle, ShutdownLevel};
use tokio::{
    signal::unix::{SignalKind, signal},
    task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::EXIT_FORCED;

enum Request {
    Terminate(&'static str),
    Reload,
}

/// Start listening; the returned task runs until aborted.
///
/// Must be called from within a tokio runtime.
pub fn install(control: ControlHandle) -> io::Result<JoinHandle<()>> {
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    let mut hup = signal(SignalKind::hangup())?;

    Ok(tokio::spawn(async move {
        loop {
            let request = tokio::select! {
                Some(()) = term.recv() => Request::Terminate("SIGTERM"),
                Some(()) = int.recv() => Request::Terminate("SIGINT"),
                Some(()) = hup.recv() => Request::Reload,
                else => break,
            };

            match request {
                Request::Reload => {
                    info!("SIGHUP received; configuration reload requested");
                    control.request_reload();
                }
                Request::Terminate(name) => {
                    let level = control.request_termination();
                    warn!(signal = name, %level, "termination requested");
                    if level == ShutdownLevel::Exit {
                        error!(signal = name, "repeated termination request; exiting without unregistering");
                        std::process::exit(i32::from(EXIT_FORCED));
                    }
                }
            }
        }
    }))
}
