//! The event stream's element type (§3).

use crate::syscall_table::SyscallKind;
use nix::sys::signal::Signal;
use nix::unistd::Pid;

/// Argument-dependent materialized detail captured at syscall-exit. Exit
/// details are additive: a new known syscall can start in `Generic` and
/// grow its own variant later without touching existing ones.
#[derive(Debug, Clone)]
pub enum ExitDetail {
    /// No syscall-specific detail was materialized, just the raw return
    /// value.
    Generic { retval: i64 },
    Read {
        fd: i32,
        requested: u64,
        buf: Vec<u8>,
    },
    Write {
        fd: i32,
        len: u64,
    },
    Open {
        path: String,
        fd: Option<i32>,
    },
    Rename {
        from: String,
        to: String,
    },
}

/// Enter-time syscall information: kind plus raw argument registers.
#[derive(Debug, Clone)]
pub struct EnterInfo {
    pub kind: SyscallKind,
    pub args: [u64; 6],
}

/// Exit-time syscall information: the remembered enter-time kind/args plus
/// the materialized detail.
#[derive(Debug, Clone)]
pub struct ExitInfo {
    pub kind: SyscallKind,
    pub args: [u64; 6],
    pub detail: ExitDetail,
}

#[derive(Debug, Clone)]
pub enum SyscallStop {
    Enter(EnterInfo),
    Exit(ExitInfo),
}

/// Kernel-reported lifecycle events requested via `PTRACE_O_TRACE*` (§3,
/// §4.5).
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PtraceEventKind {
    Fork { child: Pid },
    Vfork { child: Pid },
    Clone { child: Pid },
    Exec,
    Exit,
}

/// Terminal status for a tracee. `VanishedSignal` covers the "tracee
/// disappeared mid-operation" case from §5/§7: the process is gone but the
/// kernel never gave us a clean `WIFEXITED`/`WIFSIGNALED` report for it.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(Signal),
    Vanished,
}

impl ExitStatus {
    /// 128+signal convention for process-level exit codes (§6).
    pub fn to_process_code(self) -> i32 {
        match self {
            ExitStatus::Exited(code) => code,
            ExitStatus::Signaled(sig) => 128 + sig as i32,
            ExitStatus::Vanished => 128,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Event {
    SyscallStop(Pid, SyscallStop),
    SignalDelivery(Pid, Signal),
    GroupStop(Pid, Signal),
    PTraceEvent(Pid, PtraceEventKind),
    ProcessExit(Pid, ExitStatus),
}

impl Event {
    pub fn pid(&self) -> Pid {
        match *self {
            Event::SyscallStop(pid, _) => pid,
            Event::SignalDelivery(pid, _) => pid,
            Event::GroupStop(pid, _) => pid,
            Event::PTraceEvent(pid, _) => pid,
            Event::ProcessExit(pid, _) => pid,
        }
    }
}
