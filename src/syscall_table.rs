//! Syscall number -> symbolic kind lookup, one function per supported ABI.
//!
//! The two tables disagree by design (the i386 and x86_64 syscall number
//! spaces are unrelated); both resolve into the same closed [`SyscallKind`]
//! enum so the rest of the engine never has to care which ABI a given
//! tracee entered through.

use syscalls::Sysno;

/// A closed set of syscalls the engine has dedicated handling for, plus a
/// catch-all for everything else. Adding a new known syscall means adding a
/// variant here and a case in both `from_x86_64` and `from_i386` (additive,
/// per §9).
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum SyscallKind {
    Read,
    Write,
    Open,
    Openat,
    Close,
    Execve,
    Execveat,
    Exit,
    ExitGroup,
    Rename,
    Renameat,
    Renameat2,
    Clone,
    Clone3,
    Fork,
    Vfork,
    Stat,
    Fstat,
    Lstat,
    Mmap,
    Munmap,
    Brk,
    Access,
    Pipe,
    Pipe2,
    Dup,
    Dup2,
    Dup3,
    Ioctl,
    Fcntl,
    Lseek,
    Unlink,
    Unlinkat,
    Mkdir,
    Rmdir,
    Wait4,
    Kill,
    Unknown(u64),
}

impl SyscallKind {
    /// Name used for display and for the `Unknown(n)` fallback's sibling
    /// naming scheme. Known variants get their lowercase syscall name.
    pub fn name(self) -> String {
        match self {
            SyscallKind::Read => "read".into(),
            SyscallKind::Write => "write".into(),
            SyscallKind::Open => "open".into(),
            SyscallKind::Openat => "openat".into(),
            SyscallKind::Close => "close".into(),
            SyscallKind::Execve => "execve".into(),
            SyscallKind::Execveat => "execveat".into(),
            SyscallKind::Exit => "exit".into(),
            SyscallKind::ExitGroup => "exit_group".into(),
            SyscallKind::Rename => "rename".into(),
            SyscallKind::Renameat => "renameat".into(),
            SyscallKind::Renameat2 => "renameat2".into(),
            SyscallKind::Clone => "clone".into(),
            SyscallKind::Clone3 => "clone3".into(),
            SyscallKind::Fork => "fork".into(),
            SyscallKind::Vfork => "vfork".into(),
            SyscallKind::Stat => "stat".into(),
            SyscallKind::Fstat => "fstat".into(),
            SyscallKind::Lstat => "lstat".into(),
            SyscallKind::Mmap => "mmap".into(),
            SyscallKind::Munmap => "munmap".into(),
            SyscallKind::Brk => "brk".into(),
            SyscallKind::Access => "access".into(),
            SyscallKind::Pipe => "pipe".into(),
            SyscallKind::Pipe2 => "pipe2".into(),
            SyscallKind::Dup => "dup".into(),
            SyscallKind::Dup2 => "dup2".into(),
            SyscallKind::Dup3 => "dup3".into(),
            SyscallKind::Ioctl => "ioctl".into(),
            SyscallKind::Fcntl => "fcntl".into(),
            SyscallKind::Lseek => "lseek".into(),
            SyscallKind::Unlink => "unlink".into(),
            SyscallKind::Unlinkat => "unlinkat".into(),
            SyscallKind::Mkdir => "mkdir".into(),
            SyscallKind::Rmdir => "rmdir".into(),
            SyscallKind::Wait4 => "wait4".into(),
            SyscallKind::Kill => "kill".into(),
            SyscallKind::Unknown(nr) => format!("unknown({nr})"),
        }
    }

    /// Looks up a 64-bit-ABI syscall number using the `syscalls` crate's
    /// native table.
    pub fn from_x86_64(nr: u64) -> SyscallKind {
        let Some(sysno) = Sysno::new(nr as usize) else {
            return SyscallKind::Unknown(nr);
        };
        match sysno {
            Sysno::read => SyscallKind::Read,
            Sysno::write => SyscallKind::Write,
            Sysno::open => SyscallKind::Open,
            Sysno::openat => SyscallKind::Openat,
            Sysno::close => SyscallKind::Close,
            Sysno::execve => SyscallKind::Execve,
            Sysno::execveat => SyscallKind::Execveat,
            Sysno::exit => SyscallKind::Exit,
            Sysno::exit_group => SyscallKind::ExitGroup,
            Sysno::rename => SyscallKind::Rename,
            Sysno::renameat => SyscallKind::Renameat,
            Sysno::renameat2 => SyscallKind::Renameat2,
            Sysno::clone => SyscallKind::Clone,
            Sysno::clone3 => SyscallKind::Clone3,
            Sysno::fork => SyscallKind::Fork,
            Sysno::vfork => SyscallKind::Vfork,
            Sysno::stat => SyscallKind::Stat,
            Sysno::fstat => SyscallKind::Fstat,
            Sysno::lstat => SyscallKind::Lstat,
            Sysno::mmap => SyscallKind::Mmap,
            Sysno::munmap => SyscallKind::Munmap,
            Sysno::brk => SyscallKind::Brk,
            Sysno::access => SyscallKind::Access,
            Sysno::pipe => SyscallKind::Pipe,
            Sysno::pipe2 => SyscallKind::Pipe2,
            Sysno::dup => SyscallKind::Dup,
            Sysno::dup2 => SyscallKind::Dup2,
            Sysno::dup3 => SyscallKind::Dup3,
            Sysno::ioctl => SyscallKind::Ioctl,
            Sysno::fcntl => SyscallKind::Fcntl,
            Sysno::lseek => SyscallKind::Lseek,
            Sysno::unlink => SyscallKind::Unlink,
            Sysno::unlinkat => SyscallKind::Unlinkat,
            Sysno::mkdir => SyscallKind::Mkdir,
            Sysno::rmdir => SyscallKind::Rmdir,
            Sysno::wait4 => SyscallKind::Wait4,
            Sysno::kill => SyscallKind::Kill,
            _ => SyscallKind::Unknown(nr),
        }
    }

    /// Looks up a 32-bit-ABI (`int 0x80`) syscall number. These numbers come
    /// from the i386 syscall table (`asm/unistd_32.h`) and share nothing
    /// with the x86_64 numbering above.
    pub fn from_i386(nr: u64) -> SyscallKind {
        match nr {
            1 => SyscallKind::Exit,
            2 => SyscallKind::Fork,
            3 => SyscallKind::Read,
            4 => SyscallKind::Write,
            5 => SyscallKind::Open,
            6 => SyscallKind::Close,
            10 => SyscallKind::Unlink,
            11 => SyscallKind::Execve,
            33 => SyscallKind::Access,
            37 => SyscallKind::Kill,
            38 => SyscallKind::Rename,
            39 => SyscallKind::Mkdir,
            40 => SyscallKind::Rmdir,
            41 => SyscallKind::Dup,
            42 => SyscallKind::Pipe,
            45 => SyscallKind::Brk,
            54 => SyscallKind::Ioctl,
            55 => SyscallKind::Fcntl,
            63 => SyscallKind::Dup2,
            90 => SyscallKind::Mmap,
            91 => SyscallKind::Munmap,
            106 => SyscallKind::Stat,
            107 => SyscallKind::Lstat,
            108 => SyscallKind::Fstat,
            114 => SyscallKind::Wait4,
            120 => SyscallKind::Clone,
            190 => SyscallKind::Vfork,
            192 => SyscallKind::Mmap,
            252 => SyscallKind::ExitGroup,
            295 => SyscallKind::Openat,
            301 => SyscallKind::Unlinkat,
            302 => SyscallKind::Renameat,
            330 => SyscallKind::Dup3,
            331 => SyscallKind::Pipe2,
            353 => SyscallKind::Renameat2,
            358 => SyscallKind::Execveat,
            435 => SyscallKind::Clone3,
            other => SyscallKind::Unknown(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn x86_64_known_numbers_round_trip() {
        assert_eq!(SyscallKind::from_x86_64(Sysno::read as u64), SyscallKind::Read);
        assert_eq!(SyscallKind::from_x86_64(Sysno::write as u64), SyscallKind::Write);
        assert_eq!(SyscallKind::from_x86_64(Sysno::execve as u64), SyscallKind::Execve);
        assert_eq!(SyscallKind::from_x86_64(Sysno::exit as u64), SyscallKind::Exit);
        assert_eq!(SyscallKind::from_x86_64(Sysno::rename as u64), SyscallKind::Rename);
        assert_eq!(SyscallKind::from_x86_64(Sysno::clone as u64), SyscallKind::Clone);
    }

    #[test]
    fn i386_known_numbers_round_trip() {
        assert_eq!(SyscallKind::from_i386(3), SyscallKind::Read);
        assert_eq!(SyscallKind::from_i386(4), SyscallKind::Write);
        assert_eq!(SyscallKind::from_i386(11), SyscallKind::Execve);
        assert_eq!(SyscallKind::from_i386(1), SyscallKind::Exit);
        assert_eq!(SyscallKind::from_i386(38), SyscallKind::Rename);
        assert_eq!(SyscallKind::from_i386(120), SyscallKind::Clone);
    }

    #[test]
    fn tables_disagree_on_shared_numbers() {
        // number 1 means different things on each ABI; the tables must not
        // secretly share a backing lookup.
        assert_ne!(
            SyscallKind::from_x86_64(1).name(),
            SyscallKind::from_i386(1).name()
        );
    }

    #[test]
    fn unrecognized_number_is_unknown() {
        assert_eq!(SyscallKind::from_i386(999_999), SyscallKind::Unknown(999_999));
        assert_eq!(SyscallKind::from_x86_64(999_999), SyscallKind::Unknown(999_999));
    }
}
