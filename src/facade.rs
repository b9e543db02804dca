//! Public Facade (§4.6): wires the engine together into the two operations
//! external callers actually use.

use crate::driver::{EventStream, Injector};
use crate::error::SpawnError;
use crate::event::{Event, ExitDetail, ExitStatus, PtraceEventKind, SyscallStop};
use crate::spawn;
use log::info;
use nix::unistd::Pid;
use std::ffi::CString;
use std::ops::ControlFlow;

pub use crate::driver::Injector as SignalInjector;

/// Spawns `argv` under tracing and returns once it has stopped and is
/// ready to be driven (§6 `spawn-traced`). Exposed directly for callers
/// that want to build their own driver loop instead of using
/// [`stream_trace`].
pub fn spawn_traced(argv: &[CString]) -> Result<Pid, SpawnError> {
    unsafe { spawn::spawn_traced(argv) }
}

/// Full run with programmatic consumption (§6 `stream-trace`). `sink` is
/// pulled once per event; returning `ControlFlow::Break(r)` stops the
/// stream early (the engine still drains the remaining tracees to a safe
/// state, per §5). The second element of the result is `Some(r)` if the
/// sink terminated early, `None` if the trace ran to completion.
pub fn stream_trace<F, R>(argv: &[CString], mut sink: F) -> Result<(ExitStatus, Option<R>), SpawnError>
where
    F: FnMut(Event, &Injector) -> ControlFlow<R>,
{
    let mut stream = EventStream::new(argv)?;
    let root_pid = stream.root_pid();
    let injector = Injector;
    let mut root_exit = None;

    while let Some(event) = stream.next() {
        if let Event::ProcessExit(pid, status) = &event {
            if *pid == root_pid {
                root_exit = Some(*status);
            }
        }

        match sink(event, &injector) {
            ControlFlow::Continue(()) => {}
            ControlFlow::Break(r) => {
                stream.detach_all();
                return Ok((root_exit.unwrap_or(ExitStatus::Vanished), Some(r)));
            }
        }
    }

    Ok((root_exit.unwrap_or(ExitStatus::Vanished), None))
}

/// Full run, printing a one-line summary of each event (§6 `trace-to-exit`).
pub fn trace_to_exit(argv: &[CString]) -> Result<ExitStatus, SpawnError> {
    let (exit, _never_breaks) = stream_trace(argv, |event, _injector| {
        println!("{}", summarize(&event));
        ControlFlow::<()>::Continue(())
    })?;
    info!("tracee exited with {exit:?}");
    Ok(exit)
}

fn summarize(event: &Event) -> String {
    match event {
        Event::SyscallStop(pid, SyscallStop::Enter(enter)) => {
            format!("[{pid}] {}(...) = ?", enter.kind.name())
        }
        Event::SyscallStop(pid, SyscallStop::Exit(exit)) => match &exit.detail {
            ExitDetail::Generic { retval } => format!("[{pid}] {}(...) = {retval}", exit.kind.name()),
            ExitDetail::Read { fd, buf, .. } => {
                format!("[{pid}] read(fd={fd}, ...) = {} bytes", buf.len())
            }
            ExitDetail::Write { fd, len } => format!("[{pid}] write(fd={fd}, ...) = {len}"),
            ExitDetail::Open { path, fd } => format!("[{pid}] open({path:?}) = {fd:?}"),
            ExitDetail::Rename { from, to } => format!("[{pid}] rename({from:?}, {to:?})"),
        },
        Event::SignalDelivery(pid, sig) => format!("[{pid}] --- {sig} ---"),
        Event::GroupStop(pid, sig) => format!("[{pid}] *** group-stop {sig} ***"),
        Event::PTraceEvent(pid, PtraceEventKind::Fork { child }) => {
            format!("[{pid}] fork() -> {child}")
        }
        Event::PTraceEvent(pid, PtraceEventKind::Vfork { child }) => {
            format!("[{pid}] vfork() -> {child}")
        }
        Event::PTraceEvent(pid, PtraceEventKind::Clone { child }) => {
            format!("[{pid}] clone() -> {child}")
        }
        Event::PTraceEvent(pid, PtraceEventKind::Exec) => format!("[{pid}] execve() completed"),
        Event::PTraceEvent(pid, PtraceEventKind::Exit) => format!("[{pid}] exiting"),
        Event::ProcessExit(pid, status) => format!("[{pid}] +++ exited with {status:?} +++"),
    }
}
