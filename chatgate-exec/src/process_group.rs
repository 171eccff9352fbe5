//! Process-group cleanup for finished and timed-out children.
//!
//! Children are spawned as leaders of their own group, so signalling the
//! negative pid reaches any grandchildren they started.

use std::io;

/// Put the calling process into its own process group. Runs in `pre_exec`.
#[cfg(unix)]
pub fn set_process_group() -> io::Result<()> {
    // SAFETY: setpgid(2) has no memory-safety preconditions.
    let result = unsafe { libc::setpgid(0, 0) };
    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

#[cfg(unix)]
pub fn kill_process_group(pid: u32) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(pid)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) has no memory-safety preconditions.
    let result = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn kill_process_group(_pid: u32) -> io::Result<()> {
    Ok(())
}
