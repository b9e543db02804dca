use nix::errno::Errno;
use std::ffi::CString;

/// Failures that can happen while bringing a tracee under control, before
/// the event stream produces anything. Recoverable by the caller.
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("program not found: {0:?}")]
    NotFound(CString),

    #[error("fork failed: {0}")]
    Fork(Errno),

    #[error("initial wait for tracee failed: {0}")]
    InitialWait(Errno),

    #[error("tracee did not stop as expected after traceme")]
    UnexpectedInitialStop,

    #[error("failed to set ptrace options: {0}")]
    SetOptions(Errno),
}
