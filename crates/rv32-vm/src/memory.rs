//! Guest memory: a flat, zero-initialized byte buffer with uniform
//! masking and bounds policy.

use crate::error::{MemoryAccessKind, VmError};

/// Default guest memory capacity: 16 MiB.
pub const DEFAULT_CAPACITY: usize = 16 * 1024 * 1024;

/// The guest's flat address space.
///
/// Every access first clears bit 31 of the address (see
/// [`GuestMemory::mask_address`]), then must satisfy
/// `masked + width <= capacity`. Natural-alignment checking for 2- and
/// 4-byte accesses is optional and off by default, matching guest
/// toolchains that already align.
///
/// Errors produced here carry placeholder pc/register context; the engine
/// backfills both via `VmError::with_context`.
pub struct GuestMemory {
    bytes: Vec<u8>,
    check_alignment: bool,
}

impl GuestMemory {
    /// Allocate a zero-filled guest address space.
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: vec![0; capacity],
            check_alignment: false,
        }
    }

    /// Enable or disable natural-alignment faults for 2/4-byte accesses.
    pub fn with_alignment_checking(mut self, enabled: bool) -> Self {
        self.check_alignment = enabled;
        self
    }

    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// The high-address aliasing policy: bit 31 of every guest address is
    /// cleared before bounds checking, so images linked at high virtual
    /// addresses such as 0x8000_0000 alias into the low physical range.
    /// A compatibility accommodation for certain toolchains and test
    /// suites, not virtual memory.
    #[inline(always)]
    pub fn mask_address(addr: u32) -> u32 {
        addr & 0x7FFF_FFFF
    }

    /// Copy the program image to offset 0. Fails before execution starts
    /// if the image does not fit.
    pub fn load_image(&mut self, image: &[u8]) -> Result<(), VmError> {
        if image.len() > self.bytes.len() {
            return Err(VmError::ProgramTooLarge {
                size: image.len(),
                capacity: self.bytes.len(),
            });
        }
        self.bytes[..image.len()].copy_from_slice(image);
        Ok(())
    }

    /// Mask and bounds-check a byte range (no alignment requirement).
    /// Returns the masked address usable as a buffer offset.
    #[inline(always)]
    fn check_range(&self, addr: u32, len: u32, kind: MemoryAccessKind) -> Result<u32, VmError> {
        let masked = Self::mask_address(addr);
        if masked as usize + len as usize > self.bytes.len() {
            return Err(VmError::InvalidMemoryAccess {
                address: masked,
                width: len,
                kind,
                pc: 0,
                regs: [0; 32],
            });
        }
        Ok(masked)
    }

    /// Mask, bounds-check, and (optionally) alignment-check one typed
    /// access of 1, 2, or 4 bytes.
    #[inline(always)]
    fn check(&self, addr: u32, width: u32, kind: MemoryAccessKind) -> Result<u32, VmError> {
        let masked = self.check_range(addr, width, kind)?;
        if self.check_alignment && width > 1 && masked % width != 0 {
            return Err(VmError::MisalignedAccess {
                address: masked,
                required: width,
                kind,
                pc: 0,
                regs: [0; 32],
            });
        }
        Ok(masked)
    }

    pub fn read_u8(&self, addr: u32) -> Result<u8, VmError> {
        let at = self.check(addr, 1, MemoryAccessKind::Read)? as usize;
        Ok(self.bytes[at])
    }

    pub fn read_u16(&self, addr: u32) -> Result<u16, VmError> {
        let at = self.check(addr, 2, MemoryAccessKind::Read)? as usize;
        Ok(u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]))
    }

    pub fn read_u32(&self, addr: u32) -> Result<u32, VmError> {
        let at = self.check(addr, 4, MemoryAccessKind::Read)? as usize;
        Ok(u32::from_le_bytes([
            self.bytes[at],
            self.bytes[at + 1],
            self.bytes[at + 2],
            self.bytes[at + 3],
        ]))
    }

    pub fn write_u8(&mut self, addr: u32, value: u8) -> Result<(), VmError> {
        let at = self.check(addr, 1, MemoryAccessKind::Write)? as usize;
        self.bytes[at] = value;
        Ok(())
    }

    pub fn write_u16(&mut self, addr: u32, value: u16) -> Result<(), VmError> {
        let at = self.check(addr, 2, MemoryAccessKind::Write)? as usize;
        self.bytes[at..at + 2].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn write_u32(&mut self, addr: u32, value: u32) -> Result<(), VmError> {
        let at = self.check(addr, 4, MemoryAccessKind::Write)? as usize;
        self.bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    /// Read one instruction word. Same masking and bounds policy as data
    /// reads, reported as a fetch fault.
    pub fn fetch(&self, addr: u32) -> Result<u32, VmError> {
        let at = self.check(addr, 4, MemoryAccessKind::Fetch)? as usize;
        Ok(u32::from_le_bytes([
            self.bytes[at],
            self.bytes[at + 1],
            self.bytes[at + 2],
            self.bytes[at + 3],
        ]))
    }

    /// Checked byte-slice view for the syscall bridge (guest buffers
    /// handed to host I/O).
    pub fn slice(&self, addr: u32, len: u32) -> Result<&[u8], VmError> {
        let at = self.check_range(addr, len.max(1), MemoryAccessKind::Read)? as usize;
        Ok(&self.bytes[at..at + len as usize])
    }

    /// Mutable counterpart of [`GuestMemory::slice`].
    pub fn slice_mut(&mut self, addr: u32, len: u32) -> Result<&mut [u8], VmError> {
        let at = self.check_range(addr, len.max(1), MemoryAccessKind::Write)? as usize;
        Ok(&mut self.bytes[at..at + len as usize])
    }

    /// Read a NUL-terminated guest string (path or format argument),
    /// excluding the terminator. A string running off the end of memory
    /// is an out-of-bounds read.
    pub fn read_cstr(&self, addr: u32) -> Result<&[u8], VmError> {
        let start = self.check(addr, 1, MemoryAccessKind::Read)? as usize;
        match self.bytes[start..].iter().position(|&b| b == 0) {
            Some(len) => Ok(&self.bytes[start..start + len]),
            None => Err(VmError::InvalidMemoryAccess {
                address: GuestMemory::mask_address(addr),
                width: 1,
                kind: MemoryAccessKind::Read,
                pc: 0,
                regs: [0; 32],
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_zeroed() {
        let mem = GuestMemory::new(64);
        for addr in 0..64 {
            assert_eq!(mem.read_u8(addr).unwrap(), 0);
        }
    }

    #[test]
    fn test_roundtrip_widths() {
        let mut mem = GuestMemory::new(64);
        mem.write_u8(0, 0xAB).unwrap();
        assert_eq!(mem.read_u8(0).unwrap(), 0xAB);
        mem.write_u16(8, 0xBEEF).unwrap();
        assert_eq!(mem.read_u16(8).unwrap(), 0xBEEF);
        mem.write_u32(16, 0xDEADBEEF).unwrap();
        assert_eq!(mem.read_u32(16).unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_little_endian_layout() {
        let mut mem = GuestMemory::new(16);
        mem.write_u32(0, 0x0403_0201).unwrap();
        assert_eq!(mem.read_u8(0).unwrap(), 1);
        assert_eq!(mem.read_u8(3).unwrap(), 4);
        assert_eq!(mem.read_u16(2).unwrap(), 0x0403);
    }

    #[test]
    fn test_bounds_are_width_aware() {
        let mut mem = GuestMemory::new(16);
        assert!(mem.write_u32(12, 1).is_ok());
        assert!(matches!(
            mem.write_u32(13, 1),
            Err(VmError::InvalidMemoryAccess { address: 13, width: 4, .. })
        ));
        assert!(matches!(
            mem.read_u8(16),
            Err(VmError::InvalidMemoryAccess { address: 16, width: 1, .. })
        ));
    }

    #[test]
    fn test_failed_write_leaves_buffer_untouched() {
        let mut mem = GuestMemory::new(16);
        mem.write_u32(12, 0x11223344).unwrap();
        assert!(mem.write_u32(14, 0xFFFFFFFF).is_err());
        assert_eq!(mem.read_u32(12).unwrap(), 0x11223344);
    }

    #[test]
    fn test_high_address_aliasing() {
        let mut mem = GuestMemory::new(64);
        mem.write_u32(0x8000_0010, 99).unwrap();
        assert_eq!(mem.read_u32(0x10).unwrap(), 99);
        assert_eq!(GuestMemory::mask_address(0x8000_0000), 0);
    }

    #[test]
    fn test_alignment_off_by_default() {
        let mut mem = GuestMemory::new(16);
        mem.write_u32(1, 5).unwrap();
        assert_eq!(mem.read_u32(1).unwrap(), 5);
    }

    #[test]
    fn test_alignment_checked_when_enabled() {
        let mut mem = GuestMemory::new(16).with_alignment_checking(true);
        assert!(matches!(
            mem.read_u32(2),
            Err(VmError::MisalignedAccess { address: 2, required: 4, .. })
        ));
        assert!(matches!(
            mem.write_u16(1, 0),
            Err(VmError::MisalignedAccess { address: 1, required: 2, .. })
        ));
        // Byte accesses are always aligned
        assert!(mem.write_u8(3, 1).is_ok());
    }

    #[test]
    fn test_load_image() {
        let mut mem = GuestMemory::new(8);
        mem.load_image(&[1, 2, 3, 4]).unwrap();
        assert_eq!(mem.read_u32(0).unwrap(), 0x0403_0201);
        assert!(matches!(
            mem.load_image(&[0; 9]),
            Err(VmError::ProgramTooLarge { size: 9, capacity: 8 })
        ));
    }

    #[test]
    fn test_read_cstr() {
        let mut mem = GuestMemory::new(32);
        let s = b"hello\0";
        mem.slice_mut(4, s.len() as u32).unwrap().copy_from_slice(s);
        assert_eq!(mem.read_cstr(4).unwrap(), b"hello");
    }

    #[test]
    fn test_read_cstr_unterminated_faults() {
        let mut mem = GuestMemory::new(8);
        for addr in 0..8 {
            mem.write_u8(addr, b'x').unwrap();
        }
        assert!(mem.read_cstr(0).is_err());
    }

    #[test]
    fn test_slice_bounds() {
        let mem = GuestMemory::new(16);
        assert_eq!(mem.slice(0, 16).unwrap().len(), 16);
        assert!(mem.slice(1, 16).is_err());
    }
}
