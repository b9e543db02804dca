#![allow(clippy::missing_safety_doc)]

pub mod abi;
pub mod classify;
pub mod decoder;
pub mod driver;
pub mod error;
pub mod event;
pub mod facade;
pub mod spawn;
pub mod state;
pub mod syscall_table;
pub mod util;

pub use error::SpawnError;
pub use event::{EnterInfo, Event, ExitDetail, ExitInfo, ExitStatus, PtraceEventKind, SyscallStop};
pub use facade::{spawn_traced, stream_trace, trace_to_exit, SignalInjector};
pub use syscall_table::SyscallKind;
