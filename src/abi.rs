//! Per-entry ABI detection.
//!
//! A syscall entry on x86_64 can come from either the native `syscall`
//! instruction or a 32-bit `int 0x80` trap (e.g. a statically linked i386
//! binary, or glibc's vsyscall compatibility shims). The two bytes just
//! before the instruction pointer at the moment of the trap disambiguate
//! them; see §4.4.

use nix::libc;
use nix::sys::ptrace;
use nix::unistd::Pid;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AbiMode {
    I386,
    X86_64,
}

const OPCODE_SYSCALL: [u8; 2] = [0x0f, 0x05];
const OPCODE_INT80: [u8; 2] = [0xcd, 0x80];

/// Reads the two bytes preceding `rip` and classifies the invocation mode.
///
/// Panics (an engine bug, per §7) if the bytes don't match either known
/// syscall entry opcode.
pub fn detect_abi(pid: Pid, instruction_pointer: u64) -> AbiMode {
    let addr = (instruction_pointer - 2) as *mut libc::c_void;
    let word = ptrace::read(pid, addr).expect("failed to read syscall entry opcode");
    let bytes = word.to_ne_bytes();

    if bytes[0..2] == OPCODE_SYSCALL {
        AbiMode::X86_64
    } else if bytes[0..2] == OPCODE_INT80 {
        AbiMode::I386
    } else {
        panic!(
            "unrecognized syscall entry opcode {:02x} {:02x} at rip-2 (not `syscall` or `int 0x80`)",
            bytes[0], bytes[1]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mode_from_bytes(bytes: [u8; 2]) -> AbiMode {
        if bytes == OPCODE_SYSCALL {
            AbiMode::X86_64
        } else if bytes == OPCODE_INT80 {
            AbiMode::I386
        } else {
            panic!("bad opcode")
        }
    }

    #[test]
    fn recognizes_syscall_opcode() {
        assert_eq!(mode_from_bytes([0x0f, 0x05]), AbiMode::X86_64);
    }

    #[test]
    fn recognizes_int80_opcode() {
        assert_eq!(mode_from_bytes([0xcd, 0x80]), AbiMode::I386);
    }

    #[test]
    #[should_panic]
    fn rejects_unknown_opcode() {
        mode_from_bytes([0x90, 0x90]);
    }
}
