//! Syscall Decoder (§4.4): reads registers at syscall-enter, re-reads them
//! (plus tracee memory) at syscall-exit to materialize a detailed event.

use crate::abi::AbiMode;
use crate::event::{EnterInfo, ExitDetail, ExitInfo};
use crate::syscall_table::SyscallKind;
use nix::libc;
use nix::sys::ptrace;
use nix::unistd::Pid;
use nix::Result;

/// Reads exactly `len` bytes from the tracee's address space, one word at a
/// time. `ptrace::read` (`PTRACE_PEEKDATA`) is word-granular and the kernel
/// handles page-crossing internally, so this never needs to retry; it just
/// has to stop precisely at `len` when that isn't a multiple of the word
/// size.
pub fn read_bytes(pid: Pid, addr: u64, len: usize) -> Result<Vec<u8>> {
    const WORD: usize = size_of::<libc::c_long>();
    let mut out = Vec::with_capacity(len);
    let mut cursor = addr;

    while out.len() < len {
        let word = ptrace::read(pid, cursor as *mut libc::c_void)?;
        let bytes = word.to_ne_bytes();
        let take = (len - out.len()).min(WORD);
        out.extend_from_slice(&bytes[..take]);
        cursor += WORD as u64;
    }

    Ok(out)
}

/// Reads a NUL-terminated string from the tracee's address space.
pub fn read_cstring(pid: Pid, addr: u64) -> Result<Vec<u8>> {
    const WORD: usize = size_of::<libc::c_long>();
    let mut out = Vec::new();
    let mut cursor = addr;

    loop {
        let word = ptrace::read(pid, cursor as *mut libc::c_void)?;
        for b in word.to_ne_bytes() {
            if b == 0 {
                return Ok(out);
            }
            out.push(b);
        }
        cursor += WORD as u64;
    }
}

/// Decodes the syscall number and six argument registers at syscall-enter.
///
/// The argument-register mapping depends on the ABI: a native x86_64
/// `syscall` instruction passes arguments in `rdi, rsi, rdx, r10, r8, r9`,
/// while a 32-bit `int 0x80` entry (even traced from a 64-bit kernel) uses
/// the i386 convention `ebx, ecx, edx, esi, edi, ebp`. Getting this wrong
/// silently misreads every argument of every i386 tracee.
pub fn decode_entry(pid: Pid, abi: AbiMode) -> Result<EnterInfo> {
    let regs = ptrace::getregs(pid)?;
    let nr = regs.orig_rax;

    let (kind, args) = match abi {
        AbiMode::X86_64 => (
            SyscallKind::from_x86_64(nr),
            [regs.rdi, regs.rsi, regs.rdx, regs.r10, regs.r8, regs.r9],
        ),
        AbiMode::I386 => (
            SyscallKind::from_i386(nr),
            [regs.rbx, regs.rcx, regs.rdx, regs.rsi, regs.rdi, regs.rbp],
        ),
    };

    Ok(EnterInfo { kind, args })
}

/// Decodes syscall-exit: re-reads the return value and, for syscalls the
/// engine has dedicated handling for, materializes the argument-dependent
/// detail.
pub fn decode_exit(pid: Pid, enter: &EnterInfo) -> Result<ExitInfo> {
    let regs = ptrace::getregs(pid)?;
    let retval = regs.rax as i64;

    let detail = materialize_detail(pid, enter, retval);

    Ok(ExitInfo {
        kind: enter.kind,
        args: enter.args,
        detail,
    })
}

fn materialize_detail(pid: Pid, enter: &EnterInfo, retval: i64) -> ExitDetail {
    match enter.kind {
        SyscallKind::Read if retval >= 0 => {
            let fd = enter.args[0] as i32;
            let buf_ptr = enter.args[1];
            let requested = enter.args[2];
            match read_bytes(pid, buf_ptr, retval as usize) {
                Ok(buf) => ExitDetail::Read { fd, requested, buf },
                Err(_) => ExitDetail::Generic { retval },
            }
        }
        SyscallKind::Write if retval >= 0 => ExitDetail::Write {
            fd: enter.args[0] as i32,
            len: retval as u64,
        },
        SyscallKind::Open => {
            let path = read_cstring(pid, enter.args[0]);
            finish_open(path, retval)
        }
        SyscallKind::Openat => {
            let path = read_cstring(pid, enter.args[1]);
            finish_open(path, retval)
        }
        SyscallKind::Rename | SyscallKind::Renameat | SyscallKind::Renameat2 => {
            let (from_ptr, to_ptr) = match enter.kind {
                SyscallKind::Rename => (enter.args[0], enter.args[1]),
                // renameat(olddirfd, oldpath, newdirfd, newpath), renameat2 adds a flags arg
                // after newpath but keeps the same path argument positions.
                _ => (enter.args[1], enter.args[3]),
            };
            match (read_cstring(pid, from_ptr), read_cstring(pid, to_ptr)) {
                (Ok(from), Ok(to)) => ExitDetail::Rename {
                    from: String::from_utf8_lossy(&from).into_owned(),
                    to: String::from_utf8_lossy(&to).into_owned(),
                },
                _ => ExitDetail::Generic { retval },
            }
        }
        _ => ExitDetail::Generic { retval },
    }
}

fn finish_open(path: Result<Vec<u8>>, retval: i64) -> ExitDetail {
    match path {
        Ok(path) => ExitDetail::Open {
            path: String::from_utf8_lossy(&path).into_owned(),
            fd: if retval >= 0 { Some(retval as i32) } else { None },
        },
        Err(_) => ExitDetail::Generic { retval },
    }
}
