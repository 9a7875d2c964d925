//! Process liveness checks.

/// Check if a process with the given PID exists.
///
/// On Unix this sends the null signal with `libc::kill(pid, 0)`, elsewhere it
/// asks `sysinfo` for the process table entry.
///
/// # Returns
/// * `true` - Process exists
/// * `false` - Process does not exist or permission denied
pub fn is_process_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        let Ok(pid) = i32::try_from(pid) else {
            return false;
        };
        // pid 0 and negative values address process groups
        if pid <= 0 {
            return false;
        }
        unsafe { libc::kill(pid, 0) == 0 }
    }

    #[cfg(not(unix))]
    {
        use sysinfo::{Pid, System};

        let mut sys = System::new();
        let pid = Pid::from_u32(pid);
        sys.refresh_process(pid) && sys.process(pid).is_some()
    }
}
