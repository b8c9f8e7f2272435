//! Deadline-bounded readiness waits
//!
//! Sockets stay in blocking mode. Before a blocking call with a deadline,
//! the descriptor is polled for the remaining time so the caller is
//! released with [`Error::Timeout`] instead of blocking past it. A timeout
//! never changes the descriptor.

use std::io;
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

use libc::{poll, pollfd, POLLIN, POLLOUT};

use super::{Error, Result};

/// Wait until `fd` is readable or `deadline` passes.
pub fn wait_readable<F: AsRawFd>(fd: &F, deadline: Option<Instant>) -> Result<()> {
    wait(fd.as_raw_fd(), POLLIN, deadline)
}

/// Wait until `fd` is writable or `deadline` passes.
pub fn wait_writable<F: AsRawFd>(fd: &F, deadline: Option<Instant>) -> Result<()> {
    wait(fd.as_raw_fd(), POLLOUT, deadline)
}

/// Time left until `deadline`, or `None` if it has passed.
pub fn remaining(deadline: Instant) -> Option<Duration> {
    deadline
        .checked_duration_since(Instant::now())
        .filter(|left| !left.is_zero())
}

fn wait(fd: RawFd, events: libc::c_short, deadline: Option<Instant>) -> Result<()> {
    let Some(deadline) = deadline else {
        return Ok(());
    };

    loop {
        let left = remaining(deadline).ok_or(Error::Timeout)?;
        let mut pfd = pollfd {
            fd,
            events,
            revents: 0,
        };

        // Round up so a sub-millisecond remainder still waits.
        let timeout_ms = left
            .as_millis()
            .saturating_add(1)
            .min(libc::c_int::MAX as u128) as libc::c_int;
        tracing::trace!(fd, timeout_ms, "waiting for readiness");

        let ret = unsafe { poll(&mut pfd, 1, timeout_ms) };

        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(Error::Io(err));
        }

        if ret == 0 {
            // poll may wake slightly early; re-check against the clock.
            if remaining(deadline).is_none() {
                return Err(Error::Timeout);
            }
            continue;
        }

        // Errors and hangups are reported by the following syscall.
        return Ok(());
    }
}
