//! RISC-V 32-bit general-purpose registers.

use core::fmt;

/// RISC-V 32-bit general-purpose register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gpr(u8);

impl Gpr {
    /// Create a new GPR from register number (0-31).
    ///
    /// # Panics
    ///
    /// Panics if the register number is >= 32.
    pub fn new(num: u8) -> Self {
        assert!(num < 32, "Register number must be < 32");
        Self(num)
    }

    /// Get the register number (0-31).
    pub fn num(&self) -> u8 {
        self.0
    }
}

// Named registers, in x-number order
impl Gpr {
    // x0: hardwired zero
    pub const ZERO: Gpr = Gpr(0);
    // x1: return address
    pub const RA: Gpr = Gpr(1);
    // x2: stack pointer
    pub const SP: Gpr = Gpr(2);
    // x3: global pointer
    pub const GP: Gpr = Gpr(3);
    // x4: thread pointer
    pub const TP: Gpr = Gpr(4);
    // x5-x7: temporaries
    pub const T0: Gpr = Gpr(5);
    pub const T1: Gpr = Gpr(6);
    pub const T2: Gpr = Gpr(7);
    // x8: saved register / frame pointer
    pub const S0: Gpr = Gpr(8);
    // x9: saved register
    pub const S1: Gpr = Gpr(9);
    // x10-x17: arguments / return values
    pub const A0: Gpr = Gpr(10);
    pub const A1: Gpr = Gpr(11);
    pub const A2: Gpr = Gpr(12);
    pub const A3: Gpr = Gpr(13);
    pub const A4: Gpr = Gpr(14);
    pub const A5: Gpr = Gpr(15);
    pub const A6: Gpr = Gpr(16);
    pub const A7: Gpr = Gpr(17);
    // x18-x27: saved registers
    pub const S2: Gpr = Gpr(18);
    pub const S3: Gpr = Gpr(19);
    pub const S4: Gpr = Gpr(20);
    pub const S5: Gpr = Gpr(21);
    pub const S6: Gpr = Gpr(22);
    pub const S7: Gpr = Gpr(23);
    pub const S8: Gpr = Gpr(24);
    pub const S9: Gpr = Gpr(25);
    pub const S10: Gpr = Gpr(26);
    pub const S11: Gpr = Gpr(27);
    // x28-x31: temporaries
    pub const T3: Gpr = Gpr(28);
    pub const T4: Gpr = Gpr(29);
    pub const T5: Gpr = Gpr(30);
    pub const T6: Gpr = Gpr(31);

    /// Parse a register name into a Gpr.
    ///
    /// Supports both ABI names (zero, ra, sp, a0-a7, s0-s11, t0-t6, fp)
    /// and numeric names (x0-x31). Returns `None` for anything else.
    pub fn from_name(name: &str) -> Option<Self> {
        let reg = match name {
            "zero" => Gpr::ZERO,
            "ra" => Gpr::RA,
            "sp" => Gpr::SP,
            "gp" => Gpr::GP,
            "tp" => Gpr::TP,
            "t0" => Gpr::T0,
            "t1" => Gpr::T1,
            "t2" => Gpr::T2,
            "s0" | "fp" => Gpr::S0,
            "s1" => Gpr::S1,
            "a0" => Gpr::A0,
            "a1" => Gpr::A1,
            "a2" => Gpr::A2,
            "a3" => Gpr::A3,
            "a4" => Gpr::A4,
            "a5" => Gpr::A5,
            "a6" => Gpr::A6,
            "a7" => Gpr::A7,
            "s2" => Gpr::S2,
            "s3" => Gpr::S3,
            "s4" => Gpr::S4,
            "s5" => Gpr::S5,
            "s6" => Gpr::S6,
            "s7" => Gpr::S7,
            "s8" => Gpr::S8,
            "s9" => Gpr::S9,
            "s10" => Gpr::S10,
            "s11" => Gpr::S11,
            "t3" => Gpr::T3,
            "t4" => Gpr::T4,
            "t5" => Gpr::T5,
            "t6" => Gpr::T6,
            _ => {
                let num = name.strip_prefix('x')?.parse::<u8>().ok()?;
                if num < 32 {
                    Gpr(num)
                } else {
                    return None;
                }
            }
        };
        Some(reg)
    }
}

impl fmt::Display for Gpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::disasm::gpr_name(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gpr_creation() {
        let reg = Gpr::new(5);
        assert_eq!(reg.num(), 5);
    }

    #[test]
    #[should_panic(expected = "Register number must be < 32")]
    fn test_gpr_invalid() {
        Gpr::new(32);
    }

    #[test]
    fn test_named_registers() {
        assert_eq!(Gpr::ZERO.num(), 0);
        assert_eq!(Gpr::RA.num(), 1);
        assert_eq!(Gpr::SP.num(), 2);
        assert_eq!(Gpr::A0.num(), 10);
        assert_eq!(Gpr::A7.num(), 17);
        assert_eq!(Gpr::T6.num(), 31);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Gpr::from_name("a0"), Some(Gpr::A0));
        assert_eq!(Gpr::from_name("fp"), Some(Gpr::S0));
        assert_eq!(Gpr::from_name("x17"), Some(Gpr::A7));
        assert_eq!(Gpr::from_name("x31"), Some(Gpr::T6));
        assert_eq!(Gpr::from_name("x32"), None);
        assert_eq!(Gpr::from_name("q0"), None);
        assert_eq!(Gpr::from_name(""), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Gpr::ZERO), "zero");
        assert_eq!(format!("{}", Gpr::RA), "ra");
        assert_eq!(format!("{}", Gpr::SP), "sp");
        assert_eq!(format!("{}", Gpr::S0), "s0");
        assert_eq!(format!("{}", Gpr::A0), "a0");
        assert_eq!(format!("{}", Gpr::T6), "t6");
    }
}
