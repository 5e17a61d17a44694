//! POSIX resource limits for job subprocesses.
//!
//! Limits are installed by a `pre_exec` hook, so they are in force before the program's
//! first instruction. The soft limit is set to the requested value; the hard limit is
//! kept unless it is below the request.
use std::io;

use relay_model::JobLimits;
use tokio::process::Command;

use crate::ExecError;
use crate::raw_log::{write_errno, write_stderr};

#[cfg(any(target_os = "linux", target_os = "android"))]
type Resource = libc::__rlimit_resource_t;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
type Resource = libc::c_int;

/// Reject limits that would make every job fail.
pub(crate) fn validate(limits: &JobLimits) -> Result<(), ExecError> {
    if limits.max_open_files == Some(0) {
        return Err(ExecError::InvalidLimits("max_open_files cannot be zero".into()));
    }
    if limits.max_file_size_bytes == Some(0) {
        return Err(ExecError::InvalidLimits(
            "max_file_size_bytes cannot be zero".into(),
        ));
    }
    Ok(())
}

/// Attach `limits` to `cmd`. Empty limits leave the command untouched.
pub fn attach_limits(cmd: &mut Command, limits: &JobLimits) {
    if limits.is_empty() {
        return;
    }

    let mut wanted: Vec<(Resource, u64, &'static [u8])> = Vec::with_capacity(3);
    if let Some(n) = limits.max_open_files {
        wanted.push((libc::RLIMIT_NOFILE as Resource, n, b"relay-exec: RLIMIT_NOFILE: "));
    }
    if let Some(n) = limits.max_file_size_bytes {
        wanted.push((libc::RLIMIT_FSIZE as Resource, n, b"relay-exec: RLIMIT_FSIZE: "));
    }
    if limits.disable_core_dumps {
        wanted.push((libc::RLIMIT_CORE as Resource, 0, b"relay-exec: RLIMIT_CORE: "));
    }

    // SAFETY: the hook only calls getrlimit/setrlimit/write and touches no heap memory;
    // `wanted` was built before the fork.
    unsafe {
        cmd.pre_exec(move || {
            for &(resource, value, label) in &wanted {
                if let Err(e) = set_soft_limit(resource, value) {
                    write_errno(label, e.raw_os_error().unwrap_or(0));
                    return Err(e);
                }
            }
            Ok(())
        });
    }
}

fn set_soft_limit(resource: Resource, value: u64) -> io::Result<()> {
    let Ok(soft) = libc::rlim_t::try_from(value) else {
        write_stderr(b"relay-exec: rlimit value out of range\n");
        return Err(io::Error::from(io::ErrorKind::InvalidInput));
    };

    let mut current = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `current` is a valid, writable rlimit.
    if unsafe { libc::getrlimit(resource, &mut current) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let hard = if current.rlim_max == libc::RLIM_INFINITY || current.rlim_max > soft {
        current.rlim_max
    } else {
        soft
    };
    let next = libc::rlimit {
        rlim_cur: soft,
        rlim_max: hard,
    };
    // SAFETY: `next` is a valid rlimit.
    if unsafe { libc::setrlimit(resource, &next) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}
