//! HTIF and UART memory-mapped port conventions.
//!
//! The host/target interface is a mailbox convention used by the RISC-V
//! conformance suites: a store to `tohost` either terminates the guest or
//! points at an 8-word syscall descriptor in guest memory, and the engine
//! acknowledges handled descriptors by writing 1 to `fromhost`. The UART
//! port is a store-only byte sink.

/// Guest address of the HTIF `tohost` mailbox (compared after the
/// high-address mask, so images linked at 0x80001000 still hit it).
pub const TOHOST: u32 = 0x1000;

/// Guest address of the HTIF `fromhost` mailbox.
pub const FROMHOST: u32 = 0x1040;

/// UART-style output port (compared against the raw, unmasked address).
pub const UART_OUT: u32 = 0x1000_0000;

/// Syscall number carried by a `write` magic descriptor.
pub const MAGIC_SYS_WRITE: u32 = 64;

/// Byte offset of the buffer pointer within a magic descriptor.
pub const MAGIC_PTR_OFFSET: u32 = 16;

/// Byte offset of the buffer length within a magic descriptor.
pub const MAGIC_LEN_OFFSET: u32 = 24;

/// Classification of a value stored to `tohost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtifPacket {
    /// Bit 0 set: terminate with the remaining bits as exit code.
    Exit { code: u32 },
    /// Bit 0 clear: the value is a guest pointer to a magic descriptor.
    Descriptor { addr: u32 },
}

impl HtifPacket {
    pub fn classify(value: u32) -> Self {
        if value & 1 != 0 {
            HtifPacket::Exit { code: value >> 1 }
        } else {
            HtifPacket::Descriptor { addr: value }
        }
    }
}
