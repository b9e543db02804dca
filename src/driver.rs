//! Event Stream Driver (§4.5): the outer loop that multiplexes every live
//! tracee, decides how to resume whichever one last stopped, and exposes
//! the whole thing as a pull-driven iterator.

use crate::abi;
use crate::classify::{self, RawStop};
use crate::decoder;
use crate::error::SpawnError;
use crate::event::{Event, ExitDetail, ExitInfo, ExitStatus, PtraceEventKind, SyscallStop};
use crate::spawn;
use crate::state::Tracees;
use log::{debug, warn};
use nix::errno::Errno;
use nix::libc;
use nix::sys::ptrace;
use nix::sys::signal::Signal;
use nix::sys::wait::{self, WaitPidFlag};
use nix::unistd::Pid;
use std::ffi::CString;

fn trace_options() -> ptrace::Options {
    ptrace::Options::PTRACE_O_TRACESYSGOOD
        | ptrace::Options::PTRACE_O_TRACEFORK
        | ptrace::Options::PTRACE_O_TRACEVFORK
        | ptrace::Options::PTRACE_O_TRACECLONE
        | ptrace::Options::PTRACE_O_TRACEEXEC
        | ptrace::Options::PTRACE_O_TRACEEXIT
        | ptrace::Options::PTRACE_O_EXITKILL
}

#[derive(Debug, Copy, Clone)]
enum ResumeAction {
    Syscall(Option<Signal>),
    Listen,
}

/// `PTRACE_LISTEN` isn't exposed as a safe wrapper by the vendored `nix`
/// API surface this crate builds against, so it goes through a raw call,
/// the same way the teacher repo drops to raw `libc::ptrace` for
/// `PTRACE_GET_SYSCALL_INFO`.
fn ptrace_listen(pid: Pid) -> nix::Result<()> {
    let res = unsafe {
        libc::ptrace(
            libc::PTRACE_LISTEN as libc::c_uint,
            libc::pid_t::from(pid),
            std::ptr::null_mut::<libc::c_void>(),
            std::ptr::null_mut::<libc::c_void>(),
        )
    };
    Errno::result(res).map(|_| ())
}

/// The lazy, cancellable, consumer-driven event sequence (§4.5, §9).
pub struct EventStream {
    tracees: Tracees,
    root_pid: Pid,
    pending_resume: Option<(Pid, ResumeAction)>,
}

impl EventStream {
    pub fn new(argv: &[CString]) -> Result<Self, SpawnError> {
        let root_pid = unsafe { spawn::spawn_traced(argv)? };

        let mut tracees = Tracees::new();
        tracees.insert_new(root_pid);
        ptrace::setoptions(root_pid, trace_options()).map_err(SpawnError::SetOptions)?;
        tracees.get_mut(root_pid).expect("just inserted").mark_options_set();

        // resume past the initial traceme/SIGSTOP handshake
        ptrace::syscall(root_pid, None).map_err(SpawnError::SetOptions)?;

        Ok(EventStream {
            tracees,
            root_pid,
            pending_resume: None,
        })
    }

    pub fn root_pid(&self) -> Pid {
        self.root_pid
    }

    /// Registers a pid seen for the first time and applies tracing
    /// options. This covers both legitimate new children (whose identity
    /// was already announced via a `PTraceEvent`, per §3's ordering
    /// invariant) and, defensively, any other never-before-seen pid.
    fn bootstrap(&mut self, pid: Pid) {
        debug!("bootstrapping new tracee {pid}");
        self.tracees.insert_new(pid);
        self.apply_options_once(pid);
    }

    /// Sets tracing options on `pid` unless already done (§4.3/§4.5:
    /// option-setting is idempotent per pid).
    fn apply_options_once(&mut self, pid: Pid) {
        let Some(state) = self.tracees.get_mut(pid) else {
            return;
        };
        if state.options_set() {
            return;
        }
        match ptrace::setoptions(pid, trace_options()) {
            Ok(()) => self.tracees.get_mut(pid).expect("just checked").mark_options_set(),
            Err(e) => warn!("failed to set ptrace options on {pid}: {e}"),
        }
    }

    fn resume(&mut self, pid: Pid, action: ResumeAction) {
        let result = match action {
            ResumeAction::Syscall(sig) => ptrace::syscall(pid, sig),
            ResumeAction::Listen => ptrace_listen(pid),
        };
        if let Err(e) = result {
            if e == Errno::ESRCH {
                warn!("tracee {pid} vanished while resuming, dropping it");
                self.tracees.remove(pid);
            } else {
                panic!("failed to resume tracee {pid}: {e}");
            }
        }
    }

    fn handle_syscall_trap(&mut self, pid: Pid) -> Option<Event> {
        let in_syscall = self.tracees.get_mut(pid)?.in_syscall;

        if !in_syscall {
            let regs = match ptrace::getregs(pid) {
                Ok(r) => r,
                Err(Errno::ESRCH) => return self.drop_vanished(pid),
                Err(e) => panic!("getregs failed on {pid}: {e}"),
            };
            let abi = abi::detect_abi(pid, regs.rip);
            let enter = decoder::decode_entry(pid, abi).unwrap_or_else(|e| {
                panic!("failed to decode syscall entry for {pid}: {e}");
            });

            let state = self.tracees.get_mut(pid).expect("just checked");
            state.abi_mode = abi;
            state.enter_syscall(enter.clone());
            Some(Event::SyscallStop(pid, SyscallStop::Enter(enter)))
        } else {
            let enter = self.tracees.get_mut(pid).expect("just checked").exit_syscall();
            let exit = match decoder::decode_exit(pid, &enter) {
                Ok(exit) => exit,
                Err(Errno::ESRCH) => return self.drop_vanished(pid),
                Err(_) => ExitInfo {
                    kind: enter.kind,
                    args: enter.args,
                    detail: ExitDetail::Generic { retval: -1 },
                },
            };
            Some(Event::SyscallStop(pid, SyscallStop::Exit(exit)))
        }
    }

    /// `PTRACE_EVENT_EXEC` and `PTRACE_EVENT_EXIT` are delivered *in place
    /// of* the syscall-exit-stop for a successful `execve`/`_exit`: the
    /// kernel never reports that exit separately. Left alone, the
    /// `in_syscall` flag those syscalls' enter stops set would never
    /// clear, and the next real syscall-enter for the pid would be
    /// misread as its exit (§3's alternation invariant). Both events are
    /// treated as implicitly closing any pending syscall.
    fn handle_ptrace_event(&mut self, pid: Pid, raw_event: i32) -> PtraceEventKind {
        match raw_event {
            libc::PTRACE_EVENT_FORK | libc::PTRACE_EVENT_VFORK | libc::PTRACE_EVENT_CLONE => {
                let child_raw = ptrace::getevent(pid).expect("getevent failed after clone-family stop") as libc::pid_t;
                let child = Pid::from_raw(child_raw);
                match raw_event {
                    libc::PTRACE_EVENT_FORK => PtraceEventKind::Fork { child },
                    libc::PTRACE_EVENT_VFORK => PtraceEventKind::Vfork { child },
                    _ => PtraceEventKind::Clone { child },
                }
            }
            libc::PTRACE_EVENT_EXEC => {
                if let Some(state) = self.tracees.get_mut(pid) {
                    state.clear_pending_syscall();
                }
                PtraceEventKind::Exec
            }
            libc::PTRACE_EVENT_EXIT => {
                if let Some(state) = self.tracees.get_mut(pid) {
                    state.clear_pending_syscall();
                }
                PtraceEventKind::Exit
            }
            other => panic!("unrecognized ptrace event code {other}"),
        }
    }

    fn drop_vanished(&mut self, pid: Pid) -> Option<Event> {
        warn!("tracee {pid} vanished mid-operation");
        self.tracees.remove(pid);
        None
    }

    /// Detaches every remaining tracked tracee, letting them run free. Used
    /// when the consumer terminates early (§4.5 step 4, §5 cancellation):
    /// we must not leave anything stopped indefinitely or leak zombies.
    pub fn detach_all(&mut self) {
        let pids: Vec<Pid> = self.tracee_pids();
        for pid in pids {
            let _ = ptrace::detach(pid, None);
        }
        while !self.tracees.is_empty() {
            match wait::waitpid(None, Some(WaitPidFlag::WNOHANG)) {
                Ok(wait::WaitStatus::StillAlive) | Err(Errno::ECHILD) => break,
                Ok(status) => {
                    if let RawStop::Exited(pid, _) | RawStop::Signaled(pid, _) = classify::classify(status) {
                        self.tracees.remove(pid);
                    }
                }
                Err(_) => break,
            }
        }
    }

    fn tracee_pids(&self) -> Vec<Pid> {
        // Tracees doesn't expose an iterator since nothing else needs one;
        // detaching is the one place we have to walk the whole table.
        self.tracees.pids()
    }
}

impl Iterator for EventStream {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        loop {
            if self.tracees.is_empty() {
                return None;
            }

            if let Some((pid, action)) = self.pending_resume.take() {
                self.resume(pid, action);
            }

            let status = match wait::waitpid(None, None) {
                Ok(s) => s,
                Err(Errno::ECHILD) => return None,
                Err(e) => panic!("waitpid failed: {e}"),
            };

            let raw = classify::classify(status);
            debug!("raw stop: {raw}");

            match raw {
                RawStop::Exited(pid, code) => {
                    self.tracees.remove(pid);
                    return Some(Event::ProcessExit(pid, ExitStatus::Exited(code)));
                }
                RawStop::Signaled(pid, sig) => {
                    self.tracees.remove(pid);
                    return Some(Event::ProcessExit(pid, ExitStatus::Signaled(sig)));
                }
                RawStop::SyscallTrap(pid) => {
                    if !self.tracees.contains(pid) {
                        self.bootstrap(pid);
                        self.pending_resume = Some((pid, ResumeAction::Syscall(None)));
                        continue;
                    }
                    self.pending_resume = Some((pid, ResumeAction::Syscall(None)));
                    if let Some(event) = self.handle_syscall_trap(pid) {
                        return Some(event);
                    }
                    // tracee vanished mid-decode; dropped already, keep going
                }
                RawStop::PtraceEvent(pid, raw_event) => {
                    self.pending_resume = Some((pid, ResumeAction::Syscall(None)));
                    let kind = self.handle_ptrace_event(pid, raw_event);
                    return Some(Event::PTraceEvent(pid, kind));
                }
                RawStop::SignalDelivery(pid, sig) => {
                    if !self.tracees.contains(pid) {
                        self.bootstrap(pid);
                        self.pending_resume = Some((pid, ResumeAction::Syscall(None)));
                        continue;
                    }
                    self.pending_resume = Some((pid, ResumeAction::Syscall(Some(sig))));
                    return Some(Event::SignalDelivery(pid, sig));
                }
                RawStop::GroupStop(pid, sig) => {
                    if !self.tracees.contains(pid) {
                        self.bootstrap(pid);
                        self.pending_resume = Some((pid, ResumeAction::Syscall(None)));
                        continue;
                    }
                    self.pending_resume = Some((pid, ResumeAction::Listen));
                    return Some(Event::GroupStop(pid, sig));
                }
            }
        }
    }
}

/// Injects a signal into a tracked tracee (§4.5 step 5, §6). This is how a
/// consumer kills or interrupts a tracee in response to an observed
/// syscall; it is independent of the resume machinery above and forwards
/// straight to the kernel.
#[derive(Debug, Copy, Clone, Default)]
pub struct Injector;

impl Injector {
    pub fn send_signal(&self, pid: Pid, signal: Signal) -> Result<(), Errno> {
        nix::sys::signal::kill(pid, signal)
    }
}
