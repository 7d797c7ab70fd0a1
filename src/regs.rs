//! FPCR/FPSR bitfields and the FPU register file.

use arpfloat::Float;
use proc_bitfield::bitfield;
use serde::{Deserialize, Serialize};

use crate::semantics::SEMANTICS_EXTENDED;
use crate::types::{Address, Long};

bitfield! {
    /// Exception enable / exception status byte, shared shape between FPCR
    /// bits 15:8 (enables) and FPSR bits 15:8 (current status).
    #[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct FpuExceptions(pub u8): Debug, FromStorage, IntoStorage, DerefStorage {
        pub inex1: bool @ 0,
        pub inex2: bool @ 1,
        pub dz: bool @ 2,
        pub unfl: bool @ 3,
        pub ovfl: bool @ 4,
        pub operr: bool @ 5,
        pub snan: bool @ 6,
        pub bsun: bool @ 7,
    }
}

bitfield! {
    /// Accrued exception byte, FPSR bits 7:0.
    #[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct FpuAccruedExceptions(pub u8): Debug, FromStorage, IntoStorage, DerefStorage {
        pub inex: bool @ 3,
        pub dz: bool @ 4,
        pub unfl: bool @ 5,
        pub ovfl: bool @ 6,
        pub iop: bool @ 7,
    }
}

bitfield! {
    /// Floating Point Control Register.
    #[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct RegisterFPCR(pub Long): Debug, FromStorage, IntoStorage, DerefStorage {
        /// Bits 15:0 (bits 3:0 reserved zero).
        pub raw: u16 [set_fn(|v| v & 0xFFF0)] @ 0..=15,

        /// Rounding precision: 0=extended, 1=single, 2|3=double.
        pub prec: u8 @ 6..=7,

        /// Rounding mode: 0=nearest, 1=zero, 2=-inf, 3=+inf.
        pub rnd: u8 @ 4..=5,

        /// Exception-enable byte.
        pub exc: nested FpuExceptions @ 8..=15,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingMode {
    Nearest,
    Zero,
    MinusInf,
    PlusInf,
}

impl From<u8> for RoundingMode {
    fn from(v: u8) -> Self {
        match v & 0b11 {
            0 => Self::Nearest,
            1 => Self::Zero,
            2 => Self::MinusInf,
            _ => Self::PlusInf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundingPrecision {
    Extended,
    Single,
    Double,
}

impl From<u8> for RoundingPrecision {
    fn from(v: u8) -> Self {
        match v & 0b11 {
            0 => Self::Extended,
            1 => Self::Single,
            _ => Self::Double,
        }
    }
}

bitfield! {
    /// Floating Point Status Register.
    #[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub struct RegisterFPSR(pub Long): Debug, FromStorage, IntoStorage, DerefStorage {
        pub fpcc_n: bool @ 27,
        pub fpcc_z: bool @ 26,
        pub fpcc_i: bool @ 25,
        pub fpcc_nan: bool @ 24,

        pub quotient_sign: bool @ 23,
        pub quotient: u8 @ 16..=22,

        /// Current exception-status byte.
        pub exs: nested FpuExceptions @ 8..=15,

        /// Accrued exception byte.
        pub aexc: nested FpuAccruedExceptions @ 0..=7,
    }
}

/// Operand classification tag, used by `get_ftag` / FSAVE scratch.
///
/// Classification looks at the *encoded* extended-precision bit pattern
/// (biased exponent and explicit integer bit), not the decoded [`Float`]:
/// denormal (biased exponent zero, nonzero mantissa) and unnormal (nonzero
/// biased exponent with a clear explicit integer bit) are encoding-level
/// concepts that a normalized [`Float`] value doesn't preserve. See
/// [`crate::codec::BitsExtReal::tag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandTag {
    Normal = 0,
    Zero = 1,
    Inf = 2,
    Nan = 3,
    ExtDenormalOrUnnormal = 4,
    SglDblDenormal = 5,
    PackedUndocumented = 7,
}

#[derive(Debug, Clone)]
pub struct FpuRegisterFile {
    pub fp: [Float; 8],
    pub fpcr: RegisterFPCR,
    pub fpsr: RegisterFPSR,
    pub fpiar: Address,
}

/// Canonical NaN bit pattern emitted by reset: `xhex_nan`.
pub const RESET_NAN_HIGH: Long = 0x7FFF_0000;
pub const RESET_NAN_MID: Long = 0xFFFF_FFFF;
pub const RESET_NAN_LOW: Long = 0xFFFF_FFFF;

impl Default for FpuRegisterFile {
    fn default() -> Self {
        Self {
            fp: core::array::from_fn(|_| Float::nan(SEMANTICS_EXTENDED, false)),
            fpcr: RegisterFPCR(0),
            fpsr: RegisterFPSR(0),
            fpiar: 0,
        }
    }
}
