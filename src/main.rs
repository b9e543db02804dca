#![cfg(unix)]

use clap::Parser;
use std::ffi::CString;
use std::process::ExitCode;
use tracekit::trace_to_exit;

/// Runs a command under syscall tracing and prints a line per observed
/// event, the way `strace -f` would (§6 `trace-to-exit`).
#[derive(Debug, Parser)]
#[command(name = "tracekit", about = "Trace the syscalls of a command and its descendants")]
struct Args {
    #[arg(trailing_var_arg = true, required = true, num_args = 1..)]
    command: Vec<CString>,
}

fn main() -> ExitCode {
    env_logger::init();

    let args = Args::parse();
    assert!(!args.command.is_empty());

    match trace_to_exit(&args.command) {
        Ok(status) => ExitCode::from(status.to_process_code() as u8),
        Err(e) => {
            eprintln!("tracekit: {e}");
            ExitCode::FAILURE
        }
    }
}
