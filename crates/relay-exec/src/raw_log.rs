//! Stderr writes that are safe between `fork()` and `execve()`.
//!
//! No allocation, no locks: only `write(2)` on stack buffers.

pub(crate) fn write_stderr(msg: &[u8]) {
    // SAFETY: `msg` is a valid slice for its whole length.
    unsafe {
        libc::write(libc::STDERR_FILENO, msg.as_ptr().cast(), msg.len());
    }
}

/// Write `<prefix>errno=<n>\n`.
pub(crate) fn write_errno(prefix: &[u8], errno: i32) {
    let mut digits = [0u8; 12];
    let mut at = digits.len();
    let mut n = errno.unsigned_abs();
    loop {
        at -= 1;
        digits[at] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    if errno < 0 {
        at -= 1;
        digits[at] = b'-';
    }

    write_stderr(prefix);
    write_stderr(b"errno=");
    write_stderr(&digits[at..]);
    write_stderr(b"\n");
}
