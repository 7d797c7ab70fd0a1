//! Effective-address mode field decode (shared by the codec and dispatcher).
//!
//! Mode+register decode is FPU-owned (it's pure bit twiddling on the extra
//! word); the actual address *arithmetic* — predecrement/postincrement,
//! displacement/index extension word fetch, PC-relative bases — is a host
//! capability ([`crate::bus::CpuBus::resolve_ea`]), since that is where the
//! register file and the A7-alignment exception live.

use anyhow::{bail, Result};

use crate::bus::{CpuBus, EaTarget};
use crate::types::Address;

/// Decoded addressing mode, from the standard 6-bit `mode:3, reg:3` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EaMode {
    DataRegister(usize),
    AddressRegister(usize),
    Indirect(usize),
    PostInc(usize),
    PreDec(usize),
    Displacement(usize),
    Index(usize),
    AbsShort,
    AbsLong,
    PcDisplacement,
    PcIndex,
    Immediate,
}

impl EaMode {
    /// Decodes the 6-bit mode+register extension word field (bits 5:3 mode,
    /// bits 2:0 register for mode 0-6; bits 2:0 sub-select the mode-7 variant).
    pub fn decode(mode_reg: u8) -> Result<Self> {
        let mode = (mode_reg >> 3) & 0b111;
        let reg = usize::from(mode_reg & 0b111);
        Ok(match mode {
            0b000 => Self::DataRegister(reg),
            0b001 => Self::AddressRegister(reg),
            0b010 => Self::Indirect(reg),
            0b011 => Self::PostInc(reg),
            0b100 => Self::PreDec(reg),
            0b101 => Self::Displacement(reg),
            0b110 => Self::Index(reg),
            0b111 => match reg {
                0b000 => Self::AbsShort,
                0b001 => Self::AbsLong,
                0b010 => Self::PcDisplacement,
                0b011 => Self::PcIndex,
                0b100 => Self::Immediate,
                _ => bail!("reserved EA mode 111/{:03b}", reg),
            },
            _ => unreachable!(),
        })
    }

    /// Resolves to a concrete memory address via the host, for every mode
    /// except data-register-direct and immediate (those are handled inline
    /// by the codec, which knows the operand size being fetched).
    pub fn resolve(self, host: &mut impl CpuBus, size_bytes: u8) -> Result<EaTarget> {
        let (mode, reg) = match self {
            Self::DataRegister(r) => return Ok(EaTarget::DataRegister(r)),
            Self::Immediate => return Ok(EaTarget::Immediate),
            Self::AddressRegister(r) => (0b001, r),
            Self::Indirect(r) => (0b010, r),
            Self::PostInc(r) => (0b011, r),
            Self::PreDec(r) => (0b100, r),
            Self::Displacement(r) => (0b101, r),
            Self::Index(r) => (0b110, r),
            Self::AbsShort => (0b111, 0),
            Self::AbsLong => (0b111, 1),
            Self::PcDisplacement => (0b111, 2),
            Self::PcIndex => (0b111, 3),
        };
        host.resolve_ea(mode, reg, size_bytes)
    }
}

/// Convenience: resolve straight to an [`Address`], bailing if the mode
/// turned out to be a register or immediate (caller's responsibility to
/// have excluded those first).
pub fn resolve_memory(mode: EaMode, host: &mut impl CpuBus, size_bytes: u8) -> Result<Address> {
    match mode.resolve(host, size_bytes)? {
        EaTarget::Memory(addr) => Ok(addr),
        other => bail!("expected memory EA target, got {other:?}"),
    }
}
