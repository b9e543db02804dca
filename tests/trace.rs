//! End-to-end scenarios against real binaries, modeled on §8's worked
//! examples. These exercise the live kernel ptrace protocol and therefore
//! need `CAP_SYS_PTRACE` (or an unprivileged ptrace scope that allows
//! tracing one's own children, the default on most distributions).

use std::ffi::CString;
use std::ops::ControlFlow;
use tracekit::event::{PtraceEventKind, SyscallStop};
use tracekit::{stream_trace, Event, ExitStatus, SyscallKind};

fn argv(parts: &[&str]) -> Vec<CString> {
    parts.iter().map(|s| CString::new(*s).unwrap()).collect()
}

fn enter_kinds(events: &[Event]) -> Vec<SyscallKind> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::SyscallStop(_, SyscallStop::Enter(enter)) => Some(enter.kind),
            _ => None,
        })
        .collect()
}

fn collect_all(command: Vec<CString>) -> (ExitStatus, Vec<Event>) {
    let mut events = Vec::new();
    let (exit, broke) = stream_trace(&command, |event, _injector| {
        events.push(event);
        ControlFlow::<()>::Continue(())
    })
    .expect("trace should start");
    assert!(broke.is_none(), "sink never requested early termination");
    (exit, events)
}

#[test]
fn true_runs_to_completion_and_execs_once() {
    let (exit, events) = collect_all(argv(&["/bin/true"]));
    assert_eq!(exit, ExitStatus::Exited(0));

    let kinds = enter_kinds(&events);
    assert!(kinds.contains(&SyscallKind::Execve), "expected an execve: {kinds:?}");
    assert!(
        kinds.iter().any(|k| matches!(k, SyscallKind::Exit | SyscallKind::ExitGroup)),
        "expected a terminating exit syscall: {kinds:?}"
    );
}

#[test]
fn echo_writes_its_argument() {
    let (exit, events) = collect_all(argv(&["/bin/echo", "hello"]));
    assert_eq!(exit, ExitStatus::Exited(0));

    let wrote_something = events.iter().any(|e| {
        matches!(
            e,
            Event::SyscallStop(_, SyscallStop::Exit(exit)) if exit.kind == SyscallKind::Write
        )
    });
    assert!(wrote_something, "expected at least one write() from echo");
}

#[test]
fn shell_subprocess_is_followed_via_clone_event() {
    let (exit, events) = collect_all(argv(&["/bin/sh", "-c", "true && echo hi"]));
    assert_eq!(exit, ExitStatus::Exited(0));

    let saw_new_child = events.iter().any(|e| {
        matches!(
            e,
            Event::PTraceEvent(_, PtraceEventKind::Fork { .. })
                | Event::PTraceEvent(_, PtraceEventKind::Vfork { .. })
                | Event::PTraceEvent(_, PtraceEventKind::Clone { .. })
        )
    });
    assert!(saw_new_child, "expected the shell to fork/clone a child for `true`");

    let pids: std::collections::HashSet<_> = events.iter().map(|e| e.pid()).collect();
    assert!(pids.len() > 1, "expected events from more than one pid: {pids:?}");
}

#[test]
fn rename_is_decoded_with_both_paths() {
    let dir = tempfile::tempdir().expect("tempdir");
    let from = dir.path().join("a");
    let to = dir.path().join("b");
    std::fs::write(&from, b"x").expect("seed file");

    let script = format!("mv {} {}", from.display(), to.display());
    let (exit, events) = collect_all(argv(&["/bin/sh", "-c", &script]));
    assert_eq!(exit, ExitStatus::Exited(0));
    assert!(to.is_file());
    assert!(!from.exists());

    let saw_rename = events.iter().any(|e| {
        matches!(
            e,
            Event::SyscallStop(_, SyscallStop::Enter(enter))
                if matches!(
                    enter.kind,
                    SyscallKind::Rename | SyscallKind::Renameat | SyscallKind::Renameat2
                )
        )
    });
    assert!(saw_rename, "expected mv to issue a rename-family syscall");
}

#[test]
fn early_termination_detaches_without_hanging() {
    let command = argv(&["/bin/sh", "-c", "sleep 5"]);
    let mut seen = 0;
    let (_, broke) = stream_trace(&command, |_event, _injector| {
        seen += 1;
        if seen >= 3 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })
    .expect("trace should start");
    assert_eq!(broke, Some(()));
}
