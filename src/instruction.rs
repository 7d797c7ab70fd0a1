//! F-line extra-word decode structures, shared by the dispatcher.

use num_derive::FromPrimitive;
use proc_bitfield::bitfield;

use crate::types::Word;

bitfield! {
    /// The 16-bit extra word that follows every F-line opcode.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct FpuExtWord(pub Word): Debug, FromStorage, IntoStorage, DerefStorage {
        /// Top 3 bits select the instruction class.
        pub opclass: u8 @ 13..=15,

        /// (class 000/010) source specifier: register number for
        /// register-to-register, or the size code for memory-to-register.
        pub src_spec: u8 @ 10..=12,

        /// (class 000/010) destination FP register.
        pub dst_reg: usize @ 7..=9,

        /// (class 000/010) opmode: dyadic/monadic arithmetic selector, or
        /// FMOVECR's constant-ROM selector when `src_spec` reads as a
        /// register-direct source with bit 6 (0x40) set.
        pub opmode: u8 @ 0..=6,

        /// (class 100/101) control-register select bitmask: FPCR=0b100,
        /// FPSR=0b010, FPIAR=0b001 (any combination for FMOVEM-control).
        pub control_select: u8 @ 10..=12,

        /// (class 110/111) FMOVEM direction: 0=register to EA, 1=EA to register.
        pub movem_dir: bool @ 13,

        /// (class 110/111) FMOVEM register-list mode: 0=static list,
        /// 1=dynamic (register), 2=static predecrement list, 3=dynamic predecrement.
        pub movem_mode: u8 @ 11..=12,

        /// (class 110/111) static register-list mask, or dynamic register number.
        pub movem_list: u8 @ 0..=7,
    }
}

/// Top-level F-line extra-word class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum OpClass {
    GeneralArithmetic = 0b000,
    ConstantOrMem = 0b010,
    MemoryStore = 0b011,
    ControlRegisterMove = 0b100,
    ControlRegisterMove2 = 0b101,
    RegisterListMove = 0b110,
    RegisterListMove2 = 0b111,
}

impl OpClass {
    pub fn decode(bits: u8) -> Self {
        match bits & 0b111 {
            0b000 => Self::GeneralArithmetic,
            0b010 => Self::ConstantOrMem,
            0b011 => Self::MemoryStore,
            0b100 => Self::ControlRegisterMove,
            0b101 => Self::ControlRegisterMove2,
            0b110 => Self::RegisterListMove,
            _ => Self::RegisterListMove2,
        }
    }

    /// Whether this class uses `(src_spec, dst_reg, opmode)`, rather than
    /// a memory-store or control-register-move layout.
    pub fn is_arithmetic_class(self) -> bool {
        matches!(self, Self::GeneralArithmetic | Self::ConstantOrMem)
    }

    pub fn is_register_list_class(self) -> bool {
        matches!(self, Self::RegisterListMove | Self::RegisterListMove2)
    }

    pub fn is_control_register_class(self) -> bool {
        matches!(self, Self::ControlRegisterMove | Self::ControlRegisterMove2)
    }
}

/// FMOVECR selection: the instruction is FMOVECR rather than ordinary
/// arithmetic when the field `0x5C00` matches with the reserved bit clear —
/// bits 15:10 read `010111` (class `010`, `src_spec` `111`) and `opmode`'s
/// bit 6 (the reserved bit, part of the `0xFC00` match) is clear, leaving
/// the low 6 bits of `opmode` as the constant-ROM selector.
pub fn is_fmovecr(ext: FpuExtWord) -> bool {
    ext.opclass() == 0b010 && ext.src_spec() == 0b111 && ext.opmode() & 0x40 == 0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum ControlReg {
    Fpcr = 0b100,
    Fpsr = 0b010,
    Fpiar = 0b001,
}

impl ControlReg {
    /// Iterates the control registers selected by a bitmask, in the
    /// mandated streaming order: FPCR, FPSR, FPIAR.
    pub fn iter_selected(mask: u8) -> impl Iterator<Item = Self> {
        [Self::Fpcr, Self::Fpsr, Self::Fpiar].into_iter().filter(move |r| mask & (*r as u8) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opclass_decodes_all_eight_values() {
        assert_eq!(OpClass::decode(0b000), OpClass::GeneralArithmetic);
        assert_eq!(OpClass::decode(0b011), OpClass::MemoryStore);
        assert_eq!(OpClass::decode(0b110), OpClass::RegisterListMove);
    }

    #[test]
    fn control_reg_streaming_order_is_fpcr_fpsr_fpiar() {
        let order: Vec<_> = ControlReg::iter_selected(0b111).collect();
        assert_eq!(order, vec![ControlReg::Fpcr, ControlReg::Fpsr, ControlReg::Fpiar]);
    }

    #[test]
    fn control_reg_mask_skips_unselected() {
        let order: Vec<_> = ControlReg::iter_selected(0b101).collect();
        assert_eq!(order, vec![ControlReg::Fpcr, ControlReg::Fpiar]);
    }
}
