// Process liveness probe
// reason: kill(pid, 0) via nix on unix, sysinfo elsewhere
use autocoder_core::port::ProcessProbe;

/// OS-backed liveness check for ledger entry owners
///
/// Fails closed: a process that exists but cannot be signalled (EPERM)
/// counts as alive, so its reservation is kept.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcessProbe;

impl SystemProcessProbe {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessProbe for SystemProcessProbe {
    fn is_alive(&self, pid: u32) -> bool {
        if pid == 0 {
            return false;
        }
        let Ok(raw_pid) = i32::try_from(pid) else {
            return false;
        };

        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::kill;
            use nix::unistd::Pid;

            match kill(Pid::from_raw(raw_pid), None) {
                Ok(()) => true,
                Err(Errno::EPERM) => true,
                Err(_) => false,
            }
        }

        #[cfg(not(unix))]
        {
            use sysinfo::{Pid, System};

            let _ = raw_pid;
            let mut system = System::new();
            system.refresh_process(Pid::from_u32(pid))
        }
    }
}
