//! Status Engine: FPSR condition-code/quotient/exception-status derivation.

use arpfloat::Float;

use crate::regs::{FpuAccruedExceptions, FpuExceptions, RegisterFPSR};

/// Clears the current exception-status byte (FPSR bits 15:8), leaving the
/// accrued-exception byte (bits 7:0) and condition codes untouched. Mirrors
/// `fpsr_clear_status` — accrued bits are sticky until the host writes FPSR
/// directly.
pub fn clear_status(fpsr: &mut RegisterFPSR) {
    *fpsr = fpsr.with_exs(FpuExceptions(0));
}

/// Derives the accrued-exception byte from the current exception-status
/// byte:
/// - IOP ← BSUN ∨ SNAN ∨ OPERR
/// - OVFL ← OVFL
/// - UNFL ← UNFL ∧ INEX2
/// - DZ ← DZ
/// - INEX ← OVFL ∨ INEX2 ∨ INEX1
///
/// Accrued bits already set are preserved (property 2: monotonic until the
/// host clears them explicitly).
pub fn make_status(fpsr: &mut RegisterFPSR) {
    let exs = fpsr.exs();
    let derived = FpuAccruedExceptions(0)
        .with_iop(exs.bsun() || exs.snan() || exs.operr())
        .with_ovfl(exs.ovfl())
        .with_unfl(exs.unfl() && exs.inex2())
        .with_dz(exs.dz())
        .with_inex(exs.ovfl() || exs.inex2() || exs.inex1());

    let prior = fpsr.aexc();
    let merged = FpuAccruedExceptions(prior.0 | derived.0);
    *fpsr = fpsr.with_aexc(merged);
}

/// Sets the condition-code nibble (FPSR bits 27:24) from an arithmetic
/// result, per property 3. N is set from sign unconditionally; NaN/Z/I are
/// mutually exclusive result classes.
pub fn set_result(fpsr: &mut RegisterFPSR, result: &Float) {
    *fpsr = fpsr
        .with_fpcc_n(result.is_negative())
        .with_fpcc_z(result.is_zero())
        .with_fpcc_i(result.is_inf())
        .with_fpcc_nan(result.is_nan());
}

/// Sets the quotient byte (FPSR bits 23:16) after FMOD/FREM, from the
/// low 7 bits of the quotient and its sign.
pub fn set_quotient(fpsr: &mut RegisterFPSR, sign: bool, low7: u8) {
    *fpsr = fpsr.with_quotient_sign(sign).with_quotient(low7 & 0x7F);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::semantics::SEMANTICS_EXTENDED;

    #[test]
    fn make_status_derives_iop_from_operr() {
        let mut fpsr = RegisterFPSR(0);
        fpsr = fpsr.with_exs(FpuExceptions(0).with_operr(true));
        make_status(&mut fpsr);
        assert!(fpsr.aexc().iop());
    }

    #[test]
    fn accrued_bits_are_sticky() {
        let mut fpsr = RegisterFPSR(0);
        fpsr = fpsr.with_exs(FpuExceptions(0).with_dz(true));
        make_status(&mut fpsr);
        assert!(fpsr.aexc().dz());

        clear_status(&mut fpsr);
        make_status(&mut fpsr);
        assert!(fpsr.aexc().dz(), "accrued DZ must survive a status-only clear");
    }

    #[test]
    fn condition_codes_track_result_class() {
        let mut fpsr = RegisterFPSR(0);
        set_result(&mut fpsr, &Float::nan(SEMANTICS_EXTENDED, false));
        assert!(fpsr.fpcc_nan());
        assert!(!fpsr.fpcc_z());

        set_result(&mut fpsr, &Float::zero(SEMANTICS_EXTENDED, false));
        assert!(fpsr.fpcc_z());
        assert!(!fpsr.fpcc_nan());
    }
}
