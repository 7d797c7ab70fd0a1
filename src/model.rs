//! Per-chip strategy selection.
//!
//! A scattering of branches on `currprefs.fpu_model`/`cpu_model` at every
//! FSAVE/exception/datatype decision point collapses here into one
//! [`FpuModel`] value, set once at reset, that the rest of the core reads
//! instead of re-deriving chip identity from scattered globals.

use serde::{Deserialize, Serialize};

/// 68040 ROM revision, which changes the UNIMP frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mc68040Revision {
    /// Rev $40: 44-byte UNIMP frame.
    Rev40,
    /// Rev $41: 52-byte UNIMP frame.
    Rev41,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FpuModel {
    Mc68881,
    Mc68882,
    Mc68040(Mc68040Revision),
    Mc68060,
}

impl FpuModel {
    /// Whether denormal/unnormal/packed operands are tolerated as values
    /// (68881/68882) or trap to unimplemented-datatype (68040/68060).
    pub fn tolerates_denormals(self) -> bool {
        matches!(self, Self::Mc68881 | Self::Mc68882)
    }

    /// Whether OVFL/UNFL are nonmaskable (always interrupt computation,
    /// enabled or not).
    pub fn nonmaskable_ovfl_unfl(self) -> bool {
        matches!(self, Self::Mc68040(_) | Self::Mc68060)
    }

    /// 68882 retains `fp_exp_pend` across dispatch to allow overlapped
    /// exception reporting; every other model clears it.
    pub fn retains_pending_on_dispatch(self) -> bool {
        matches!(self, Self::Mc68882)
    }

    /// Version byte reported in FSAVE ID longs / FPU version field.
    pub fn version_byte(self) -> u8 {
        match self {
            Self::Mc68881 => 0x00,
            Self::Mc68882 => 0x1F,
            Self::Mc68040(Mc68040Revision::Rev40) => 0x40,
            Self::Mc68040(Mc68040Revision::Rev41) => 0x41,
            Self::Mc68060 => 0x60,
        }
    }

    /// Packed-decimal and extended immediates are an unimplemented-EA fault
    /// only on the 68060.
    pub fn immediate_packed_extended_is_unimplemented_ea(self) -> bool {
        matches!(self, Self::Mc68060)
    }
}
