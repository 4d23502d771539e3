//! Host syscall bridge for ECALL-forwarded system calls.
//!
//! The guest convention puts the syscall number in a7 and up to seven word
//! arguments in a0-a6. Failures (bad descriptor, bad guest pointer, host
//! I/O error) are returned to the guest as -1/0 per POSIX convention and
//! never halt the VM.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};

use tracing::debug;

use crate::memory::GuestMemory;

pub const SYS_WRITE: u32 = 64;
pub const SYS_EXIT: u32 = 93;
pub const SYS_ACCESS: u32 = 100;
pub const SYS_FOPEN: u32 = 101;
pub const SYS_FSCANF: u32 = 102;
pub const SYS_FEOF: u32 = 103;
pub const SYS_FCLOSE: u32 = 104;
pub const SYS_OPEN: u32 = 105;
pub const SYS_FSTAT: u32 = 106;
pub const SYS_READ: u32 = 107;
pub const SYS_CLOSE: u32 = 108;
pub const SYS_LSEEK: u32 = 109;

/// Capacity of the guest-visible open-file table.
const MAX_FILES: usize = 128;

/// C EOF, as the guest sees it.
const EOF: u32 = -1i32 as u32;

/// Maps a guest system call to host-side effects.
///
/// `memory` gives checked access to guest buffers; `console` is the
/// engine's byte sink standing in for the guest's stdout.
pub trait SyscallHandler {
    fn syscall(
        &mut self,
        number: u32,
        args: [u32; 7],
        memory: &mut GuestMemory,
        console: &mut dyn Write,
    ) -> u32;
}

/// A bridge that ignores every forwarded syscall.
pub struct NoSyscalls;

impl SyscallHandler for NoSyscalls {
    fn syscall(
        &mut self,
        number: u32,
        _args: [u32; 7],
        _memory: &mut GuestMemory,
        _console: &mut dyn Write,
    ) -> u32 {
        debug!(number, "syscall ignored (no bridge)");
        0
    }
}

/// One entry of the open-file table, created by guest `fopen`.
struct OpenFile {
    reader: BufReader<File>,
    eof: bool,
}

impl OpenFile {
    /// Look at the next byte without consuming it. Sets the EOF flag when
    /// the underlying file is exhausted, matching C stdio's indicator.
    fn peek(&mut self) -> Option<u8> {
        match self.reader.fill_buf() {
            Ok(buf) if !buf.is_empty() => Some(buf[0]),
            _ => {
                self.eof = true;
                None
            }
        }
    }

    fn bump(&mut self) {
        self.reader.consume(1);
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }
}

/// The default bridge: POSIX-equivalent translation to host calls, plus a
/// small stdio family backed by a bounded file table.
///
/// Table slots 0-2 are never allocated (the guest thinks of them as
/// stdio); `fopen` scans for a free slot from 3 and returns 0 when all
/// slots are taken.
pub struct HostSyscalls {
    files: [Option<OpenFile>; MAX_FILES],
}

impl HostSyscalls {
    pub fn new() -> Self {
        Self {
            files: std::array::from_fn(|_| None),
        }
    }

    fn sys_write(
        &mut self,
        args: [u32; 7],
        memory: &GuestMemory,
        console: &mut dyn Write,
    ) -> u32 {
        let (fd, ptr, len) = (args[0], args[1], args[2]);
        let Ok(buf) = memory.slice(ptr, len) else {
            return EOF;
        };
        let res = match fd {
            1 => console.write_all(buf).and_then(|_| console.flush()),
            2 => {
                let mut err = std::io::stderr().lock();
                err.write_all(buf).and_then(|_| err.flush())
            }
            _ => return 0,
        };
        match res {
            Ok(()) => len,
            Err(_) => EOF,
        }
    }

    fn sys_access(&self, args: [u32; 7], memory: &GuestMemory) -> u32 {
        let Some(path) = guest_path(memory, args[0]) else {
            return EOF;
        };
        let res = unsafe { libc::access(path.as_ptr(), args[1] as i32) };
        debug!(path = ?path, mode = args[1], res, "access");
        res as u32
    }

    fn sys_fopen(&mut self, args: [u32; 7], memory: &GuestMemory) -> u32 {
        let (Ok(path), Ok(mode)) = (memory.read_cstr(args[0]), memory.read_cstr(args[1])) else {
            return 0;
        };
        let path = String::from_utf8_lossy(path).into_owned();
        let mut options = OpenOptions::new();
        match mode.first() {
            Some(b'r') => options.read(true),
            Some(b'w') => options.write(true).create(true).truncate(true),
            Some(b'a') => options.append(true).create(true),
            _ => return 0,
        };
        if mode.contains(&b'+') {
            options.read(true).write(true);
        }
        let file = match options.open(&path) {
            Ok(f) => f,
            Err(_) => {
                debug!(path, "fopen failed");
                return 0;
            }
        };
        // Slots 0-2 are reserved for the guest's idea of stdio.
        let Some(slot) = (3..MAX_FILES).find(|&i| self.files[i].is_none()) else {
            debug!(path, "open-file table exhausted");
            return 0;
        };
        self.files[slot] = Some(OpenFile {
            reader: BufReader::new(file),
            eof: false,
        });
        slot as u32
    }

    fn sys_fscanf(&mut self, args: [u32; 7], memory: &mut GuestMemory) -> u32 {
        let Some(file) = self.files.get_mut(args[0] as usize).and_then(Option::as_mut) else {
            debug!(fd = args[0], "fscanf on closed descriptor");
            return EOF;
        };
        let fmt = match memory.read_cstr(args[1]) {
            Ok(f) => f.to_vec(),
            Err(_) => return EOF,
        };
        scan(file, &fmt, [args[2], args[3]], memory)
    }

    fn sys_feof(&mut self, args: [u32; 7]) -> u32 {
        match self.files.get(args[0] as usize).and_then(Option::as_ref) {
            Some(file) => file.eof as u32,
            None => EOF,
        }
    }

    fn sys_fclose(&mut self, args: [u32; 7]) -> u32 {
        match self.files.get_mut(args[0] as usize) {
            Some(slot) if slot.is_some() => {
                *slot = None;
                0
            }
            _ => EOF,
        }
    }

    fn sys_open(&self, args: [u32; 7], memory: &GuestMemory) -> u32 {
        let Some(path) = guest_path(memory, args[0]) else {
            return EOF;
        };
        let res = unsafe { libc::open(path.as_ptr(), args[1] as i32, args[2] as libc::c_int) };
        debug!(path = ?path, flags = args[1], res, "open");
        res as u32
    }

    fn sys_fstat(&self, args: [u32; 7], memory: &mut GuestMemory) -> u32 {
        let mut stat = unsafe { std::mem::zeroed::<libc::stat>() };
        let res = unsafe { libc::fstat(args[0] as i32, &mut stat) };
        if res != 0 {
            return res as u32;
        }
        // The guest-visible stat structure carries only st_size, at
        // offset 0.
        match memory.write_u32(args[1], stat.st_size as u32) {
            Ok(()) => 0,
            Err(_) => EOF,
        }
    }

    fn sys_read(&self, args: [u32; 7], memory: &mut GuestMemory) -> u32 {
        let Ok(buf) = memory.slice_mut(args[1], args[2]) else {
            return EOF;
        };
        let res = unsafe {
            libc::read(
                args[0] as i32,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
            )
        };
        res as i32 as u32
    }

    fn sys_close(&self, args: [u32; 7]) -> u32 {
        unsafe { libc::close(args[0] as i32) as u32 }
    }

    fn sys_lseek(&self, args: [u32; 7]) -> u32 {
        let res =
            unsafe { libc::lseek(args[0] as i32, args[1] as i32 as libc::off_t, args[2] as i32) };
        res as i32 as u32
    }
}

impl Default for HostSyscalls {
    fn default() -> Self {
        Self::new()
    }
}

impl SyscallHandler for HostSyscalls {
    fn syscall(
        &mut self,
        number: u32,
        args: [u32; 7],
        memory: &mut GuestMemory,
        console: &mut dyn Write,
    ) -> u32 {
        debug!(number, a0 = args[0], a1 = args[1], a2 = args[2], "syscall");
        match number {
            SYS_WRITE => self.sys_write(args, memory, console),
            SYS_ACCESS => self.sys_access(args, memory),
            SYS_FOPEN => self.sys_fopen(args, memory),
            SYS_FSCANF => self.sys_fscanf(args, memory),
            SYS_FEOF => self.sys_feof(args),
            SYS_FCLOSE => self.sys_fclose(args),
            SYS_OPEN => self.sys_open(args, memory),
            SYS_FSTAT => self.sys_fstat(args, memory),
            SYS_READ => self.sys_read(args, memory),
            SYS_CLOSE => self.sys_close(args),
            SYS_LSEEK => self.sys_lseek(args),
            _ => {
                debug!(number, "syscall with no defined behavior");
                0
            }
        }
    }
}

/// Read a NUL-terminated guest path into a host `CString`.
fn guest_path(memory: &GuestMemory, addr: u32) -> Option<CString> {
    CString::new(memory.read_cstr(addr).ok()?).ok()
}

/// The fscanf conversion subset: `%d`, `%u`, `%x`, `%c`, `%s`, `%%`,
/// literal and whitespace matching, up to two output pointers. Returns the
/// number of conversions performed, EOF when input fails before the first
/// one.
fn scan(file: &mut OpenFile, fmt: &[u8], outs: [u32; 2], memory: &mut GuestMemory) -> u32 {
    let mut converted: u32 = 0;
    let mut out_idx = 0usize;
    let fail = |converted: u32| if converted == 0 { EOF } else { converted };

    let mut i = 0;
    while i < fmt.len() {
        let c = fmt[i];
        if c.is_ascii_whitespace() {
            file.skip_whitespace();
            i += 1;
            continue;
        }
        if c != b'%' {
            // Literal match.
            match file.peek() {
                Some(b) if b == c => file.bump(),
                Some(_) => return converted,
                None => return fail(converted),
            }
            i += 1;
            continue;
        }
        let Some(&conv) = fmt.get(i + 1) else {
            return converted;
        };
        i += 2;
        if conv == b'%' {
            match file.peek() {
                Some(b'%') => file.bump(),
                Some(_) => return converted,
                None => return fail(converted),
            }
            continue;
        }
        let Some(&out) = outs.get(out_idx) else {
            return converted;
        };
        match conv {
            b'd' => {
                file.skip_whitespace();
                let mut text = Vec::new();
                if file.peek() == Some(b'-') {
                    text.push(b'-');
                    file.bump();
                }
                while let Some(b) = file.peek() {
                    if b.is_ascii_digit() {
                        text.push(b);
                        file.bump();
                    } else {
                        break;
                    }
                }
                let Some(value) = parse_i32(&text, 10) else {
                    return fail(converted);
                };
                if memory.write_u32(out, value as u32).is_err() {
                    return EOF;
                }
            }
            b'u' => {
                file.skip_whitespace();
                let text = read_digits(file, |b| b.is_ascii_digit());
                let Some(value) = parse_u32(&text, 10) else {
                    return fail(converted);
                };
                if memory.write_u32(out, value).is_err() {
                    return EOF;
                }
            }
            b'x' => {
                file.skip_whitespace();
                let text = read_digits(file, |b| b.is_ascii_hexdigit());
                let Some(value) = parse_u32(&text, 16) else {
                    return fail(converted);
                };
                if memory.write_u32(out, value).is_err() {
                    return EOF;
                }
            }
            b'c' => {
                let Some(b) = file.peek() else {
                    return fail(converted);
                };
                file.bump();
                if memory.write_u8(out, b).is_err() {
                    return EOF;
                }
            }
            b's' => {
                file.skip_whitespace();
                let token = read_digits(file, |b| !b.is_ascii_whitespace());
                if token.is_empty() {
                    return fail(converted);
                }
                let Ok(dest) = memory.slice_mut(out, token.len() as u32 + 1) else {
                    return EOF;
                };
                dest[..token.len()].copy_from_slice(&token);
                dest[token.len()] = 0;
            }
            _ => return converted,
        }
        converted += 1;
        out_idx += 1;
    }
    converted
}

fn read_digits(file: &mut OpenFile, keep: impl Fn(u8) -> bool) -> Vec<u8> {
    let mut text = Vec::new();
    while let Some(b) = file.peek() {
        if keep(b) {
            text.push(b);
            file.bump();
        } else {
            break;
        }
    }
    text
}

fn parse_i32(text: &[u8], radix: u32) -> Option<i32> {
    let s = std::str::from_utf8(text).ok()?;
    i64::from_str_radix(s, radix).ok().map(|v| v as i32)
}

fn parse_u32(text: &[u8], radix: u32) -> Option<u32> {
    let s = std::str::from_utf8(text).ok()?;
    u64::from_str_radix(s, radix).ok().map(|v| v as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use std::path::PathBuf;

    fn scratch_file(name: &str, contents: &[u8]) -> PathBuf {
        let path = std::env::temp_dir().join(format!("rv32-vm-{}-{}", std::process::id(), name));
        let mut f = File::create(&path).unwrap();
        f.write_all(contents).unwrap();
        path
    }

    fn put_cstr(memory: &mut GuestMemory, addr: u32, s: &str) {
        let bytes = s.as_bytes();
        memory
            .slice_mut(addr, bytes.len() as u32 + 1)
            .unwrap()
            .copy_from_slice(&[bytes, &[0]].concat());
    }

    #[test]
    fn test_write_to_console() {
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(1024);
        memory.slice_mut(64, 5).unwrap().copy_from_slice(b"hello");
        let mut console = Vec::new();
        let res = bridge.syscall(SYS_WRITE, [1, 64, 5, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, 5);
        assert_eq!(console, b"hello");
    }

    #[test]
    fn test_write_bad_pointer() {
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(64);
        let mut console = Vec::new();
        let res = bridge.syscall(SYS_WRITE, [1, 60, 8, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, EOF);
        assert!(console.is_empty());
    }

    #[test]
    fn test_write_unknown_fd() {
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(64);
        let mut console = Vec::new();
        let res = bridge.syscall(SYS_WRITE, [9, 0, 4, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, 0);
    }

    #[test]
    fn test_unknown_syscall_returns_zero() {
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(64);
        let mut console = Vec::new();
        let res = bridge.syscall(999, [0; 7], &mut memory, &mut console);
        assert_eq!(res, 0);
    }

    #[test]
    fn test_fopen_fscanf_feof_fclose() {
        let path = scratch_file("scanf.txt", b"42 -7\n");
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(4096);
        let mut console = Vec::new();
        put_cstr(&mut memory, 0, path.to_str().unwrap());
        put_cstr(&mut memory, 256, "r");
        put_cstr(&mut memory, 300, "%d %d");

        let fd = bridge.syscall(SYS_FOPEN, [0, 256, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert!(fd >= 3, "fopen returned {}", fd);

        let res = bridge.syscall(
            SYS_FSCANF,
            [fd, 300, 1024, 1028, 0, 0, 0],
            &mut memory,
            &mut console,
        );
        assert_eq!(res, 2);
        assert_eq!(memory.read_u32(1024).unwrap(), 42);
        assert_eq!(memory.read_u32(1028).unwrap() as i32, -7);

        // Further read attempts have hit end of input.
        let res = bridge.syscall(
            SYS_FSCANF,
            [fd, 300, 1024, 1028, 0, 0, 0],
            &mut memory,
            &mut console,
        );
        assert_eq!(res, EOF);
        let res = bridge.syscall(SYS_FEOF, [fd, 0, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert_ne!(res, 0);

        let res = bridge.syscall(SYS_FCLOSE, [fd, 0, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, 0);
        // Slot is free again; fopen reuses it.
        let fd2 = bridge.syscall(SYS_FOPEN, [0, 256, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(fd2, fd);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_fscanf_bad_descriptor() {
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(64);
        let mut console = Vec::new();
        let res = bridge.syscall(SYS_FSCANF, [5, 0, 8, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, EOF);
        let res = bridge.syscall(SYS_FCLOSE, [5, 0, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, EOF);
    }

    #[test]
    fn test_file_table_exhaustion_returns_zero() {
        let path = scratch_file("exhaust.txt", b"x");
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(1024);
        let mut console = Vec::new();
        put_cstr(&mut memory, 0, path.to_str().unwrap());
        put_cstr(&mut memory, 256, "r");
        for expected in 3..MAX_FILES as u32 {
            let fd = bridge.syscall(SYS_FOPEN, [0, 256, 0, 0, 0, 0, 0], &mut memory, &mut console);
            assert_eq!(fd, expected);
        }
        let fd = bridge.syscall(SYS_FOPEN, [0, 256, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(fd, 0);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_fopen_missing_file_returns_zero() {
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(1024);
        let mut console = Vec::new();
        put_cstr(&mut memory, 0, "/nonexistent/rv32-vm-test");
        put_cstr(&mut memory, 256, "r");
        let res = bridge.syscall(SYS_FOPEN, [0, 256, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, 0);
    }

    #[test]
    fn test_open_read_close_roundtrip() {
        let path = scratch_file("read.bin", b"payload!");
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(4096);
        let mut console = Vec::new();
        put_cstr(&mut memory, 0, path.to_str().unwrap());

        let fd = bridge.syscall(
            SYS_OPEN,
            [0, libc::O_RDONLY as u32, 0, 0, 0, 0, 0],
            &mut memory,
            &mut console,
        );
        assert!((fd as i32) >= 0);

        let res = bridge.syscall(SYS_READ, [fd, 1024, 8, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, 8);
        assert_eq!(memory.slice(1024, 8).unwrap(), b"payload!");

        // fstat reports the size into the guest structure.
        let res = bridge.syscall(SYS_FSTAT, [fd, 2048, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, 0);
        assert_eq!(memory.read_u32(2048).unwrap(), 8);

        // Seek back and re-read half.
        let res = bridge.syscall(SYS_LSEEK, [fd, 4, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, 4);
        let res = bridge.syscall(SYS_READ, [fd, 3072, 4, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, 4);
        assert_eq!(memory.slice(3072, 4).unwrap(), b"oad!");

        let res = bridge.syscall(SYS_CLOSE, [fd, 0, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert_eq!(res, 0);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_scan_literals_and_classes() {
        let path = scratch_file("classes.txt", b"id=ff token x");
        let mut bridge = HostSyscalls::new();
        let mut memory = GuestMemory::new(4096);
        let mut console = Vec::new();
        put_cstr(&mut memory, 0, path.to_str().unwrap());
        put_cstr(&mut memory, 256, "r");
        let fd = bridge.syscall(SYS_FOPEN, [0, 256, 0, 0, 0, 0, 0], &mut memory, &mut console);
        assert!(fd >= 3);

        put_cstr(&mut memory, 300, "id=%x %s");
        let res = bridge.syscall(
            SYS_FSCANF,
            [fd, 300, 1024, 1100, 0, 0, 0],
            &mut memory,
            &mut console,
        );
        assert_eq!(res, 2);
        assert_eq!(memory.read_u32(1024).unwrap(), 0xFF);
        assert_eq!(memory.read_cstr(1100).unwrap(), b"token");

        put_cstr(&mut memory, 300, " %c");
        let res = bridge.syscall(
            SYS_FSCANF,
            [fd, 300, 1024, 0, 0, 0, 0],
            &mut memory,
            &mut console,
        );
        assert_eq!(res, 1);
        assert_eq!(memory.read_u8(1024).unwrap(), b'x');

        std::fs::remove_file(path).unwrap();
    }
}
