use std::io;
use std::process::Command;

/// Prepare the execution environment for a worker process
///
/// On Linux the worker receives SIGTERM when the dispatching parent dies,
/// so an aborted dispatch does not leave orphaned workers behind.
pub fn prepare_command(cmd: &mut Command) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::process::CommandExt;

        unsafe {
            cmd.pre_exec(|| {
                if set_parent_death_signal() != 0 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }
    }

    #[cfg(not(target_os = "linux"))]
    let _ = cmd;

    Ok(())
}

/// Ask a process to shut down with SIGTERM
pub fn request_terminate(pid: u32) -> io::Result<()> {
    send_signal(pid as libc::pid_t, libc::SIGTERM)
}

#[cfg(target_os = "linux")]
unsafe fn set_parent_death_signal() -> libc::c_int {
    unsafe { libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) }
}

fn send_signal(pid: libc::pid_t, signal: libc::c_int) -> io::Result<()> {
    let result = unsafe { libc::kill(pid, signal) };
    if result == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
