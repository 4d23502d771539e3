//! Minimal ELF32 reader: just enough of the program-header walk to hand
//! the interpreter a contiguous `(bytes, length)` image.
//!
//! The image starts at the first PT_LOAD segment's file offset and
//! extends to the end of the last PT_LOAD segment's file extent, so the
//! text/data layout the linker produced is preserved and execution begins
//! at offset 0 of the blob.

use thiserror::Error;

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2LSB: u8 = 1;
const EM_RISCV: u16 = 243;
const PT_LOAD: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("file of {0} bytes is too short to be an ELF image")]
    Truncated(usize),
    #[error("not an ELF file (bad magic)")]
    BadMagic,
    #[error("not a 32-bit little-endian ELF")]
    UnsupportedFormat,
    #[error("not a RISC-V image (machine type {0})")]
    WrongMachine(u16),
    #[error("program header {0} lies outside the file")]
    BadProgramHeader(usize),
    #[error("no PT_LOAD segments")]
    NoLoadableSegments,
}

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

/// Extract the loadable image from an ELF32 file.
pub fn load_image(file: &[u8]) -> Result<Vec<u8>, LoadError> {
    if file.len() < 0x34 {
        return Err(LoadError::Truncated(file.len()));
    }
    if file[..4] != ELF_MAGIC {
        return Err(LoadError::BadMagic);
    }
    if file[4] != ELFCLASS32 || file[5] != ELFDATA2LSB {
        return Err(LoadError::UnsupportedFormat);
    }
    let machine = read_u16(file, 0x12);
    if machine != EM_RISCV {
        return Err(LoadError::WrongMachine(machine));
    }

    let phoff = read_u32(file, 0x1C) as usize;
    let phentsize = read_u16(file, 0x2A) as usize;
    let phnum = read_u16(file, 0x2C) as usize;

    // The image spans from the first PT_LOAD's offset to the end of the
    // last PT_LOAD's file extent.
    let mut start: Option<usize> = None;
    let mut end = 0usize;
    for index in 0..phnum {
        let at = phoff + index * phentsize;
        if at + 20 > file.len() {
            return Err(LoadError::BadProgramHeader(index));
        }
        if read_u32(file, at) != PT_LOAD {
            continue;
        }
        let offset = read_u32(file, at + 4) as usize;
        let filesz = read_u32(file, at + 16) as usize;
        if offset + filesz > file.len() {
            return Err(LoadError::BadProgramHeader(index));
        }
        if start.is_none() {
            start = Some(offset);
        }
        end = offset + filesz;
    }

    match start {
        Some(start) if end > start => Ok(file[start..end].to_vec()),
        Some(start) => Ok(file[start..start].to_vec()),
        None => Err(LoadError::NoLoadableSegments),
    }
}
