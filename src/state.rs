//! Per-tracee state machine (§4.3).
//!
//! The kernel reports syscall-enter and syscall-exit stops with identical
//! signatures; only our memory of "was the last stop for this pid an
//! enter?" tells them apart. That memory, plus a couple of housekeeping
//! bits, is all a [`TraceeState`] holds.

use crate::abi::AbiMode;
use crate::event::EnterInfo;
use crate::util::MapExt;
use nix::unistd::Pid;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct TraceeState {
    /// `true` between a reported syscall-enter and its matching exit.
    pub in_syscall: bool,
    /// The enter-time info remembered until the matching exit arrives.
    /// `None` exactly when `in_syscall` is false.
    pub pending_enter: Option<EnterInfo>,
    pub abi_mode: AbiMode,
    pub options_set: bool,
}

impl TraceeState {
    pub fn new() -> Self {
        TraceeState {
            in_syscall: false,
            pending_enter: None,
            // Corrected on the first observed syscall-stop; x86_64 is the
            // overwhelmingly common case and a safe default until then.
            abi_mode: AbiMode::X86_64,
            options_set: false,
        }
    }

    /// Whether `PTRACE_SETOPTIONS` has already been applied to this pid.
    /// Option-setting is idempotent per the kernel but the driver only
    /// needs to issue it once per pid (§4.5).
    pub fn options_set(&self) -> bool {
        self.options_set
    }

    pub fn mark_options_set(&mut self) {
        self.options_set = true;
    }

    /// Toggles the enter/exit flag and stashes (or takes) the enter info.
    /// Called by the Classifier/Decoder only.
    pub fn enter_syscall(&mut self, info: EnterInfo) {
        assert!(
            !self.in_syscall,
            "syscall-enter observed while already in a syscall (alternation invariant violated)"
        );
        self.in_syscall = true;
        self.pending_enter = Some(info);
    }

    pub fn exit_syscall(&mut self) -> EnterInfo {
        assert!(
            self.in_syscall,
            "syscall-exit observed without a matching enter (alternation invariant violated)"
        );
        self.in_syscall = false;
        self.pending_enter
            .take()
            .expect("in_syscall was true but pending_enter was empty")
    }

    /// Clears a pending syscall-enter without requiring a matching exit
    /// stop. `PTRACE_EVENT_EXEC`/`PTRACE_EVENT_EXIT` stand in for the
    /// syscall-exit-stop the kernel never delivers for a successful
    /// `execve` or for `_exit`, so the driver calls this instead of
    /// `exit_syscall` when one of those events arrives mid-syscall.
    pub fn clear_pending_syscall(&mut self) {
        self.in_syscall = false;
        self.pending_enter = None;
    }
}

/// The tracking table: PID -> per-tracee state, owned exclusively by the
/// driver (§9 "Global state"). No synchronization needed since the driver
/// is single-threaded (§5).
#[derive(Debug, Default)]
pub struct Tracees {
    table: HashMap<Pid, TraceeState>,
}

impl Tracees {
    pub fn new() -> Self {
        Tracees { table: HashMap::new() }
    }

    pub fn insert_new(&mut self, pid: Pid) {
        self.table.insert_first(pid, TraceeState::new());
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut TraceeState> {
        self.table.get_mut(&pid)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.table.contains_key(&pid)
    }

    pub fn remove(&mut self, pid: Pid) {
        self.table.remove(&pid);
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn pids(&self) -> Vec<Pid> {
        self.table.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::syscall_table::SyscallKind;

    fn enter(kind: SyscallKind) -> EnterInfo {
        EnterInfo { kind, args: [0; 6] }
    }

    #[test]
    fn enter_then_exit_round_trips() {
        let mut s = TraceeState::new();
        assert!(!s.in_syscall);
        s.enter_syscall(enter(SyscallKind::Write));
        assert!(s.in_syscall);
        let info = s.exit_syscall();
        assert_eq!(info.kind, SyscallKind::Write);
        assert!(!s.in_syscall);
    }

    #[test]
    #[should_panic(expected = "alternation invariant violated")]
    fn double_enter_panics() {
        let mut s = TraceeState::new();
        s.enter_syscall(enter(SyscallKind::Read));
        s.enter_syscall(enter(SyscallKind::Read));
    }

    #[test]
    #[should_panic(expected = "alternation invariant violated")]
    fn exit_without_enter_panics() {
        let mut s = TraceeState::new();
        s.exit_syscall();
    }

    #[test]
    fn tracking_table_lifecycle() {
        let mut tracees = Tracees::new();
        let pid = Pid::from_raw(1234);
        assert!(!tracees.contains(pid));
        tracees.insert_new(pid);
        assert!(tracees.contains(pid));
        assert_eq!(tracees.len(), 1);
        tracees.remove(pid);
        assert!(!tracees.contains(pid));
        assert!(tracees.is_empty());
    }
}
