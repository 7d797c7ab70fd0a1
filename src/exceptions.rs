//! Exception Controller: pending-exception latches, the priority-encoded
//! vector lookup, and the two-level dispatch gate.

use crate::bus::{CpuBus, ExceptionVector};
use crate::frame::FsaveScratch;
use crate::model::FpuModel;
use crate::regs::{FpuExceptions, RegisterFPCR, RegisterFPSR};

/// 8-entry priority-encode table, highest-priority bit first: BSUN, SNAN,
/// OPERR, OVFL, UNFL, DZ, INEX2, INEX1 each map to their own vector, except
/// INEX1/INEX2 which share vector 49. Mirrors `fpsr_get_vector`'s vtable
/// indexed by the highest set bit of the exception byte.
const VECTOR_BY_BIT: [u8; 8] = [49, 49, 50, 51, 53, 52, 54, 48];

/// Encodes the highest-priority set bit of an exception-status byte (bits
/// 7:0 = BSUN..INEX1) to its vector number, or `None` if no bit is set.
pub fn vector_for_exceptions(exs: FpuExceptions) -> Option<u8> {
    for bit in (0..8).rev() {
        if exs.0 & (1 << bit) != 0 {
            return Some(VECTOR_BY_BIT[bit]);
        }
    }
    None
}

/// Latched exception state a live FPU core carries between instructions,
/// separate from the architectural FPSR: two independent pending slots
/// (arithmetic, unimplemented-datatype/instruction) that `dispatch_pending`
/// drains in priority order.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExceptionController {
    /// Arithmetic exception vector pending dispatch (48-55), if any.
    pub arithmetic_pending: Option<u8>,
    /// Unimplemented-datatype exception (denormal/unnormal/packed operand
    /// on a model that doesn't tolerate them) pending dispatch.
    pub unimplemented_datatype_pending: bool,
    /// Unimplemented F-line instruction pending dispatch, tracked
    /// separately so it can be drained on its own by
    /// [`ExceptionController::drain_unimplemented_instruction`].
    pub unimplemented_instruction_pending: bool,
    /// Runtime gate standing in for a compile-time `#if ARITHMETIC_EXCEPTIONS`
    /// switch: when false, `fpsr_make_status`'s OVFL/UNFL propagation into a
    /// raised exception is suppressed.
    pub arithmetic_exceptions_enabled: bool,
    /// Per-chip FSAVE frame interior, populated as a pending exception is
    /// latched so a subsequent FSAVE reflects the actual faulting operand
    /// tags and vector rather than an all-zero placeholder.
    pub scratch: FsaveScratch,
}

impl ExceptionController {
    pub fn new() -> Self {
        Self { arithmetic_exceptions_enabled: true, ..Default::default() }
    }

    /// Latches an arithmetic exception vector, matching `fpsr_set_bsun`-style
    /// callers: only the first pending exception in a batch sticks, later
    /// ones are dropped (the hardware reports one vector per pending cycle).
    pub fn latch_arithmetic(&mut self, vector: u8) {
        if self.arithmetic_pending.is_none() {
            self.arithmetic_pending = Some(vector);
        }
    }

    pub fn latch_unimplemented_datatype(&mut self) {
        self.unimplemented_datatype_pending = true;
    }

    pub fn latch_unimplemented_instruction(&mut self) {
        self.unimplemented_instruction_pending = true;
    }

    /// BSUN signalling (`fpsr_set_bsun`): if FPCR's BSUN enable bit is set,
    /// latches vector 48 and reports `true` so the caller aborts the
    /// conditional instruction rather than completing it; otherwise BSUN is
    /// merely recorded in FPSR (by the caller) and `false` is returned.
    pub fn set_bsun(&mut self, fpcr: RegisterFPCR) -> bool {
        if fpcr.exc().bsun() {
            self.latch_arithmetic(48);
            true
        } else {
            false
        }
    }

    /// The two-level dispatch gate (`fp_exception_pending`): an arithmetic
    /// exception takes priority over an unimplemented-datatype one. `pre`
    /// distinguishes the pre-instruction poll (used by FSAVE/trap entry)
    /// from the post-instruction poll; both drain the same latches, only
    /// the 68882 keeps `arithmetic_pending` alive afterwards so an
    /// overlapping instruction can still observe it.
    pub fn dispatch_pending(&mut self, host: &mut impl CpuBus, model: FpuModel, pre: bool) -> bool {
        if let Some(vector) = self.arithmetic_pending {
            log::trace!("fp exception pending: vector {vector} (pre={pre})");
            host.exception(ExceptionVector::Arithmetic(vector));
            if !model.retains_pending_on_dispatch() {
                self.arithmetic_pending = None;
            }
            return true;
        }
        if self.unimplemented_datatype_pending {
            log::trace!("fp unimplemented-datatype exception pending (pre={pre})");
            host.exception(ExceptionVector::Arithmetic(55));
            self.unimplemented_datatype_pending = false;
            return true;
        }
        false
    }

    /// Separate drain for the unimplemented F-line instruction latch
    /// (`fp_unimp_instruction_exception_pending`): always fires vector 11
    /// and clears both the instruction and datatype unimplemented latches
    /// together, mirroring `fp_unimp_ins` and `fp_unimp_pend` clearing in
    /// the same call.
    pub fn drain_unimplemented_instruction(&mut self, host: &mut impl CpuBus) -> bool {
        if self.unimplemented_instruction_pending {
            log::trace!("fp unimplemented-instruction exception pending");
            host.exception(ExceptionVector::Fline);
            self.unimplemented_instruction_pending = false;
            self.unimplemented_datatype_pending = false;
            true
        } else {
            false
        }
    }
}

/// Derives the exception-status byte that should be latched after an
/// arithmetic operation, masking `raised` (the raw IEEE flags the operation
/// produced) against `fpcr`'s enable byte and `model`'s nonmaskable-OVFL/UNFL
/// behaviour: on 68040/68060, OVFL/UNFL propagate into a raised exception
/// even when the corresponding FPCR enable bit is clear, as long as
/// `arithmetic_exceptions_enabled` is set.
pub fn check_arithmetic_exception(
    controller: &mut ExceptionController,
    fpsr: &mut RegisterFPSR,
    fpcr: RegisterFPCR,
    model: FpuModel,
    raised: FpuExceptions,
) -> Option<u8> {
    *fpsr = fpsr.with_exs(FpuExceptions(fpsr.exs().0 | raised.0));

    let enabled = fpcr.exc();
    let mut maskable = FpuExceptions(raised.0 & enabled.0 & 0b0111_0100); // SNAN|OPERR|DZ

    if controller.arithmetic_exceptions_enabled && model.nonmaskable_ovfl_unfl() {
        maskable = FpuExceptions(maskable.0 | (raised.0 & 0b0001_1000)); // OVFL|UNFL
    } else {
        maskable = FpuExceptions(maskable.0 | (raised.0 & enabled.0 & 0b0001_1000));
    }

    let vector = vector_for_exceptions(maskable);
    if let Some(v) = vector {
        log::debug!("arithmetic exception raised: vector {v} (raised={raised:?}, enabled={enabled:?})");
        controller.scratch.v = u32::from(v);
        controller.latch_arithmetic(v);
    }
    vector
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::TestBus;
    use crate::model::Mc68040Revision;

    #[test]
    fn vector_priority_prefers_bsun_over_inex() {
        let exs = FpuExceptions(0).with_bsun(true).with_inex1(true);
        assert_eq!(vector_for_exceptions(exs), Some(48));
    }

    #[test]
    fn inex1_and_inex2_share_vector_49() {
        assert_eq!(vector_for_exceptions(FpuExceptions(0).with_inex1(true)), Some(49));
        assert_eq!(vector_for_exceptions(FpuExceptions(0).with_inex2(true)), Some(49));
    }

    #[test]
    fn no_bits_set_has_no_vector() {
        assert_eq!(vector_for_exceptions(FpuExceptions(0)), None);
    }

    #[test]
    fn dispatch_clears_arithmetic_pending_by_default() {
        let mut bus = TestBus::new();
        let mut controller = ExceptionController::new();
        controller.latch_arithmetic(52);
        assert!(controller.dispatch_pending(&mut bus, FpuModel::Mc68881, true));
        assert!(controller.arithmetic_pending.is_none());
        assert_eq!(bus.last_exception(), Some(ExceptionVector::Arithmetic(52)));
    }

    #[test]
    fn mc68882_retains_pending_across_dispatch() {
        let mut bus = TestBus::new();
        let mut controller = ExceptionController::new();
        controller.latch_arithmetic(52);
        controller.dispatch_pending(&mut bus, FpuModel::Mc68882, true);
        assert_eq!(controller.arithmetic_pending, Some(52));
    }

    #[test]
    fn bsun_enable_bit_gates_whether_bsun_aborts() {
        let mut controller = ExceptionController::new();
        let fpcr = RegisterFPCR(0).with_exc(FpuExceptions(0).with_bsun(true));
        assert!(controller.set_bsun(fpcr));
        assert_eq!(controller.arithmetic_pending, Some(48));

        let mut controller = ExceptionController::new();
        assert!(!controller.set_bsun(RegisterFPCR(0)));
        assert!(controller.arithmetic_pending.is_none());
    }

    #[test]
    fn nonmaskable_ovfl_propagates_on_68040_even_when_disabled() {
        let mut controller = ExceptionController::new();
        let mut fpsr = RegisterFPSR(0);
        let fpcr = RegisterFPCR(0);
        let raised = FpuExceptions(0).with_ovfl(true);
        let vector = check_arithmetic_exception(
            &mut controller,
            &mut fpsr,
            fpcr,
            FpuModel::Mc68040(Mc68040Revision::Rev41),
            raised,
        );
        assert_eq!(vector, Some(53));
    }

    #[test]
    fn maskable_ovfl_suppressed_on_68881_when_disabled() {
        let mut controller = ExceptionController::new();
        let mut fpsr = RegisterFPSR(0);
        let fpcr = RegisterFPCR(0);
        let raised = FpuExceptions(0).with_ovfl(true);
        let vector = check_arithmetic_exception(&mut controller, &mut fpsr, fpcr, FpuModel::Mc68881, raised);
        assert_eq!(vector, None);
    }
}
