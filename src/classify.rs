//! Wait/Stop Classifier (§4.2): turns a raw `waitpid` status into a typed
//! stop. `nix::sys::wait::WaitStatus` already does most of the decoding
//! (syscall-stop vs. ptrace-event vs. plain signal-stop all fall out of the
//! `PTRACE_O_TRACESYSGOOD` bit plus the event bits in the upper status
//! word); this module adds the one further distinction nix doesn't make:
//! group-stop vs. ordinary signal-delivery-stop.

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;
use nix::unistd::Pid;

#[derive(Debug, Copy, Clone)]
pub enum RawStop {
    /// A syscall-enter or syscall-exit stop; which one it is depends on the
    /// per-tracee `in_syscall` flag (§4.3), not on anything in the raw
    /// status, so the caller resolves that.
    SyscallTrap(Pid),
    PtraceEvent(Pid, i32),
    SignalDelivery(Pid, Signal),
    GroupStop(Pid, Signal),
    Exited(Pid, i32),
    Signaled(Pid, Signal),
}

/// Stop-class signals that can produce a group-stop (§4.2, §GLOSSARY).
fn is_group_stop_signal(sig: Signal) -> bool {
    matches!(
        sig,
        Signal::SIGSTOP | Signal::SIGTSTP | Signal::SIGTTIN | Signal::SIGTTOU
    )
}

/// Classifies one `waitpid` result. Panics on `Continued`/`StillAlive`: the
/// driver never requests `WCONTINUED` or `WNOHANG`, so seeing either is a
/// protocol violation rather than a case to handle (§7).
pub fn classify(status: WaitStatus) -> RawStop {
    match status {
        WaitStatus::Exited(pid, code) => RawStop::Exited(pid, code),
        WaitStatus::Signaled(pid, sig, _core_dumped) => RawStop::Signaled(pid, sig),
        WaitStatus::PtraceSyscall(pid) => RawStop::SyscallTrap(pid),
        WaitStatus::PtraceEvent(pid, _sig, event) => RawStop::PtraceEvent(pid, event),
        WaitStatus::Stopped(pid, sig) if is_group_stop_signal(sig) => RawStop::GroupStop(pid, sig),
        WaitStatus::Stopped(pid, sig) => RawStop::SignalDelivery(pid, sig),
        WaitStatus::Continued(_) => unreachable!("WCONTINUED was never requested"),
        WaitStatus::StillAlive => unreachable!("WNOHANG was never requested"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exited_classifies_as_exited() {
        let pid = Pid::from_raw(42);
        match classify(WaitStatus::Exited(pid, 7)) {
            RawStop::Exited(p, code) => {
                assert_eq!(p, pid);
                assert_eq!(code, 7);
            }
            other => panic!("wrong classification: {other:?}"),
        }
    }

    #[test]
    fn syscall_trap_classifies_as_syscall_trap() {
        let pid = Pid::from_raw(42);
        assert!(matches!(classify(WaitStatus::PtraceSyscall(pid)), RawStop::SyscallTrap(p) if p == pid));
    }

    #[test]
    fn sigstop_is_group_stop() {
        let pid = Pid::from_raw(42);
        assert!(matches!(
            classify(WaitStatus::Stopped(pid, Signal::SIGSTOP)),
            RawStop::GroupStop(p, Signal::SIGSTOP) if p == pid
        ));
    }

    #[test]
    fn sigusr1_is_signal_delivery() {
        let pid = Pid::from_raw(42);
        assert!(matches!(
            classify(WaitStatus::Stopped(pid, Signal::SIGUSR1)),
            RawStop::SignalDelivery(p, Signal::SIGUSR1) if p == pid
        ));
    }

    #[test]
    fn signaled_classifies_as_signaled() {
        let pid = Pid::from_raw(42);
        assert!(matches!(
            classify(WaitStatus::Signaled(pid, Signal::SIGSEGV, false)),
            RawStop::Signaled(p, Signal::SIGSEGV) if p == pid
        ));
    }
}

impl std::fmt::Display for RawStop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
