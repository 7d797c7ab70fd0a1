//! Instruction Dispatcher: top-level decode/execute for every F-line
//! opcode class, wiring the codec, arithmetic kernel, status engine,
//! constant ROM, condition evaluator and exception controller together.

use anyhow::{bail, Result};
use arpfloat::Float;

use crate::bus::{CpuBus, EaTarget, ExceptionVector};
use crate::codec::{self, BitsExtReal, SizeCode};
use crate::condition::{self, ConditionResult};
use crate::constants::{self, ConditionOverride};
use crate::ea::EaMode;
use crate::exceptions::ExceptionController;
use crate::instruction::{ControlReg, FpuExtWord, OpClass};
use crate::math;
use crate::model::FpuModel;
use crate::regs::{FpuExceptions, FpuRegisterFile, OperandTag, RoundingMode, RoundingPrecision};
use crate::semantics::SEMANTICS_EXTENDED;
use crate::status;

/// Class 000/010: register-to-register or memory-to-register arithmetic,
/// and FMOVECR.
pub fn dispatch_arithmetic(
    host: &mut impl CpuBus,
    regs: &mut FpuRegisterFile,
    controller: &mut ExceptionController,
    model: FpuModel,
    ea_mode: u8,
    ea_reg: usize,
    ext: FpuExtWord,
) -> Result<()> {
    let class = OpClass::decode(ext.opclass());

    if matches!(class, OpClass::ConstantOrMem) && crate::instruction::is_fmovecr(ext) {
        let selector = ext.opmode() & 0x7F;
        let precision = RoundingPrecision::from(regs.fpcr.prec());
        let rounding = RoundingMode::from(regs.fpcr.rnd());
        let loaded = constants::load(selector, precision, rounding);
        regs.fp[ext.dst_reg()] = loaded.value.clone();

        status::set_result(&mut regs.fpsr, &loaded.value);
        match loaded.cc_override {
            Some(ConditionOverride::Infinity) => {
                regs.fpsr = regs.fpsr.with_fpcc_i(true).with_fpcc_nan(false);
            }
            Some(ConditionOverride::Nan) => {
                regs.fpsr = regs.fpsr.with_fpcc_nan(true);
            }
            None => {}
        }
        let raised = FpuExceptions(0).with_inex2(loaded.inexact);
        let _ = status::make_status(&mut regs.fpsr);
        let _ = crate::exceptions::check_arithmetic_exception(controller, &mut regs.fpsr, regs.fpcr, model, raised);
        return Ok(());
    }

    let source = match class {
        OpClass::GeneralArithmetic => regs.fp[ext.src_spec() as usize].clone(),
        OpClass::ConstantOrMem => {
            let size = SizeCode::decode(ext.src_spec());
            load_operand(host, regs, controller, model, ea_mode, ea_reg, size, ext.dst_reg())?
        }
        _ => bail!("dispatch_arithmetic called with non-arithmetic opclass {class:?}"),
    };

    if controller.unimplemented_datatype_pending {
        controller.dispatch_pending(host, model, false);
        return Ok(());
    }

    let dest = regs.fp[ext.dst_reg()].clone();
    let opmode = ext.opmode();
    let precision = RoundingPrecision::from(regs.fpcr.prec());
    let result = math::apply(opmode, &source, &dest, precision);

    // FCMP/FTST (opmode 0x38/0x3A) evaluate condition codes from a
    // throwaway comparison and never write the destination register.
    let is_compare = opmode & 0x7F == 0x38 || opmode & 0x7F == 0x3A;
    if !is_compare {
        regs.fp[ext.dst_reg()] = result.value.clone();
    }

    status::set_result(&mut regs.fpsr, &result.value);
    let raised = result.raised;
    regs.fpsr = regs.fpsr.with_exs(FpuExceptions(regs.fpsr.exs().0 | raised.0));
    status::make_status(&mut regs.fpsr);
    crate::exceptions::check_arithmetic_exception(controller, &mut regs.fpsr, regs.fpcr, model, raised);
    controller.dispatch_pending(host, model, false);
    Ok(())
}

/// Loads an operand, honouring the register-direct sign-extension/decode
/// special case for mode `000 Dn` and resolving everything else through
/// the host bus. On 68040/68060 a denormal/unnormal/packed operand routes
/// through [`trap_unimplemented_datatype`] instead of completing the load;
/// callers must check `controller.unimplemented_datatype_pending` before
/// using the returned value.
#[allow(clippy::too_many_arguments)]
fn load_operand(
    host: &mut impl CpuBus,
    regs: &FpuRegisterFile,
    controller: &mut ExceptionController,
    model: FpuModel,
    ea_mode: u8,
    ea_reg: usize,
    size: SizeCode,
    dst_reg: usize,
) -> Result<Float> {
    if ea_mode == 0b000 {
        let raw = host.dreg(ea_reg);
        return Ok(match size {
            SizeCode::LongInt => codec::integer_from_bits(raw as i32 as i64),
            SizeCode::WordInt => codec::integer_from_bits(raw as i16 as i64),
            SizeCode::ByteInt => codec::integer_from_bits(raw as i8 as i64),
            SizeCode::Single => load_single(regs, controller, model, dst_reg, raw),
            _ => bail!("mode 000 Dn only supports long/word/byte/single operand sizes"),
        });
    }

    let mode = EaMode::decode((ea_mode << 3) | (ea_reg as u8 & 0b111))?;
    let step = size.step_bytes(ea_reg == 7);
    let target = mode.resolve(host, step)?;

    let addr = match target {
        EaTarget::DataRegister(reg) => {
            let raw = host.dreg(reg);
            return Ok(match size {
                SizeCode::LongInt => codec::integer_from_bits(raw as i32 as i64),
                SizeCode::WordInt => codec::integer_from_bits(raw as i16 as i64),
                SizeCode::ByteInt => codec::integer_from_bits(raw as i8 as i64),
                SizeCode::Single => load_single(regs, controller, model, dst_reg, raw),
                _ => bail!("data-register operand only supports long/word/byte/single"),
            });
        }
        EaTarget::Immediate => {
            return load_immediate(host, size);
        }
        EaTarget::Memory(addr) => addr,
    };

    match size {
        SizeCode::Extended => {
            let hi = host.read_long(addr)?;
            let mid = host.read_long(addr.wrapping_add(4))?;
            let lo = host.read_long(addr.wrapping_add(8))?;
            let bits = BitsExtReal::default().with_high(hi).with_mid(mid).with_low(lo);
            if trap_if_unimplemented(regs, controller, model, dst_reg, bits.tag(None), [hi, mid, lo]) {
                return Ok(Float::zero(SEMANTICS_EXTENDED, false));
            }
            Ok(codec::extended_from_longs(hi, mid, lo))
        }
        SizeCode::Double => {
            let hi = host.read_long(addr)?;
            let lo = host.read_long(addr.wrapping_add(4))?;
            Ok(load_double(regs, controller, model, dst_reg, hi, lo))
        }
        SizeCode::Single => Ok(load_single(regs, controller, model, dst_reg, host.read_long(addr)?)),
        SizeCode::LongInt => Ok(codec::integer_from_bits(host.read_long(addr)? as i32 as i64)),
        SizeCode::WordInt => Ok(codec::integer_from_bits(host.read_word(addr)? as i16 as i64)),
        SizeCode::ByteInt => Ok(codec::integer_from_bits(host.read_byte(addr)? as i8 as i64)),
        SizeCode::PackedStaticK | SizeCode::PackedDynamicK => {
            let mut bytes = [0u8; 12];
            for (i, b) in bytes.iter_mut().enumerate() {
                *b = host.read_byte(addr.wrapping_add(i as u32))?;
            }
            if model.tolerates_denormals() {
                codec::Packed { bytes }.decode()
            } else {
                let hi = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
                let mid = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
                let lo = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
                trap_if_unimplemented(regs, controller, model, dst_reg, OperandTag::PackedUndocumented, [hi, mid, lo]);
                Ok(Float::zero(SEMANTICS_EXTENDED, false))
            }
        }
    }
}

fn load_single(regs: &FpuRegisterFile, controller: &mut ExceptionController, model: FpuModel, dst_reg: usize, raw: u32) -> Float {
    let tag = codec::single_tag(raw);
    let value = codec::single_from_bits(raw);
    let (hi, mid, lo) = codec::extended_to_longs(&value);
    if trap_if_unimplemented(regs, controller, model, dst_reg, tag, [hi, mid, lo]) {
        return Float::zero(SEMANTICS_EXTENDED, false);
    }
    value
}

fn load_double(regs: &FpuRegisterFile, controller: &mut ExceptionController, model: FpuModel, dst_reg: usize, hi: u32, lo: u32) -> Float {
    let bits = (u64::from(hi) << 32) | u64::from(lo);
    let tag = codec::double_tag(bits);
    let value = codec::double_from_bits(bits);
    let (ehi, emid, elo) = codec::extended_to_longs(&value);
    if trap_if_unimplemented(regs, controller, model, dst_reg, tag, [ehi, emid, elo]) {
        return Float::zero(SEMANTICS_EXTENDED, false);
    }
    value
}

/// Routes a denormal/unnormal/packed-undocumented operand to the
/// unimplemented-datatype pending latch on a model that doesn't tolerate
/// it, first recording the scratch fields an FSAVE taken before the next
/// instruction would need: the source tag, the destination register's own
/// tag, and the 96-bit extended-format bit pattern of the offending
/// operand (`et[0..2]`).
fn trap_if_unimplemented(
    regs: &FpuRegisterFile,
    controller: &mut ExceptionController,
    model: FpuModel,
    dst_reg: usize,
    tag: OperandTag,
    et: [u32; 3],
) -> bool {
    if model.tolerates_denormals() || !matches!(tag, OperandTag::SglDblDenormal | OperandTag::ExtDenormalOrUnnormal | OperandTag::PackedUndocumented) {
        return false;
    }
    let dtag = BitsExtReal::from(&regs.fp[dst_reg]).tag(None);
    controller.scratch.stag = tag as u32;
    controller.scratch.dtag = dtag as u32;
    controller.scratch.et = et;
    controller.latch_unimplemented_datatype();
    true
}

fn load_immediate(host: &mut impl CpuBus, size: SizeCode) -> Result<Float> {
    Ok(match size {
        SizeCode::ByteInt => codec::integer_from_bits(host.next_iword()? as i8 as i64),
        SizeCode::WordInt => codec::integer_from_bits(host.next_iword()? as i16 as i64),
        SizeCode::LongInt => codec::integer_from_bits(host.next_ilong()? as i32 as i64),
        SizeCode::Single => codec::single_from_bits(host.next_ilong()?),
        SizeCode::Double => {
            let hi = host.next_ilong()?;
            let lo = host.next_ilong()?;
            codec::double_from_bits((u64::from(hi) << 32) | u64::from(lo))
        }
        SizeCode::Extended => {
            let hi = host.next_ilong()?;
            let _reserved = host.next_iword()?;
            let mid = host.next_ilong()?;
            let lo = host.next_ilong()?;
            codec::extended_from_longs(hi, mid, lo)
        }
        SizeCode::PackedStaticK | SizeCode::PackedDynamicK => {
            let mut bytes = [0u8; 12];
            for chunk in bytes.chunks_mut(4) {
                let word = host.next_ilong()?;
                chunk.copy_from_slice(&word.to_be_bytes());
            }
            codec::Packed { bytes }.decode()?
        }
    })
}

/// Class 011: register-to-memory store, including integer/packed stores
/// with rounding and the 68040 post-instruction nonmaskable integer-range
/// check.
pub fn dispatch_store(
    host: &mut impl CpuBus,
    regs: &mut FpuRegisterFile,
    controller: &mut ExceptionController,
    model: FpuModel,
    ea_mode: u8,
    ea_reg: usize,
    ext: FpuExtWord,
) -> Result<()> {
    let size = SizeCode::decode(ext.src_spec());
    let value = regs.fp[ext.dst_reg()].clone();
    let mode = EaMode::decode((ea_mode << 3) | (ea_reg as u8 & 0b111))?;
    let step = size.step_bytes(ea_reg == 7);
    let target = mode.resolve(host, step)?;
    let rounding = RoundingMode::from(regs.fpcr.rnd());

    let mut integer_store_failed = false;
    let mut integer_store_inexact = false;

    match target {
        EaTarget::DataRegister(reg) => {
            store_into_register(host, reg, size, &value, rounding, &mut integer_store_failed, &mut integer_store_inexact);
        }
        EaTarget::Immediate => bail!("store destination cannot be immediate"),
        EaTarget::Memory(addr) => match size {
            SizeCode::Extended => {
                let (hi, mid, lo) = codec::extended_to_longs(&value);
                host.write_long(addr, hi)?;
                host.write_long(addr.wrapping_add(4), mid)?;
                host.write_long(addr.wrapping_add(8), lo)?;
            }
            SizeCode::Double => {
                let bits = codec::double_to_bits(&value);
                host.write_long(addr, (bits >> 32) as u32)?;
                host.write_long(addr.wrapping_add(4), bits as u32)?;
            }
            SizeCode::Single => host.write_long(addr, codec::single_to_bits(&value))?,
            SizeCode::LongInt => {
                let bits = match codec::integer_to_bits(&value, 32, rounding) {
                    Some((v, inexact)) => {
                        integer_store_inexact = inexact;
                        v
                    }
                    None => {
                        integer_store_failed = true;
                        0
                    }
                };
                host.write_long(addr, bits as u32)?;
            }
            SizeCode::WordInt => {
                let bits = match codec::integer_to_bits(&value, 16, rounding) {
                    Some((v, inexact)) => {
                        integer_store_inexact = inexact;
                        v
                    }
                    None => {
                        integer_store_failed = true;
                        0
                    }
                };
                host.write_word(addr, bits as u16)?;
            }
            SizeCode::ByteInt => {
                let bits = match codec::integer_to_bits(&value, 8, rounding) {
                    Some((v, inexact)) => {
                        integer_store_inexact = inexact;
                        v
                    }
                    None => {
                        integer_store_failed = true;
                        0
                    }
                };
                host.write_byte(addr, bits as u8)?;
            }
            SizeCode::PackedStaticK | SizeCode::PackedDynamicK => {
                let k = decode_k_factor(host, ext, size);
                let packed = codec::Packed::encode(&value, k);
                for (i, b) in packed.bytes.iter().enumerate() {
                    host.write_byte(addr.wrapping_add(i as u32), *b)?;
                }
            }
        },
    }

    if matches!(size, SizeCode::LongInt | SizeCode::WordInt | SizeCode::ByteInt) {
        if integer_store_inexact && !integer_store_failed {
            raise_store_inexact(host, regs, controller, model);
        }
        fault_if_integer_nonmaskable(host, regs, controller, model, integer_store_failed);
    }

    Ok(())
}

fn store_into_register(
    host: &mut impl CpuBus,
    reg: usize,
    size: SizeCode,
    value: &Float,
    rounding: RoundingMode,
    failed: &mut bool,
    inexact: &mut bool,
) {
    let bits = match size {
        SizeCode::Single => codec::single_to_bits(value),
        SizeCode::LongInt => match codec::integer_to_bits(value, 32, rounding) {
            Some((v, inex)) => {
                *inexact = inex;
                v as u32
            }
            None => {
                *failed = true;
                0
            }
        },
        SizeCode::WordInt => {
            let existing = host.dreg(reg);
            let low = match codec::integer_to_bits(value, 16, rounding) {
                Some((v, inex)) => {
                    *inexact = inex;
                    v as u32 & 0xFFFF
                }
                None => {
                    *failed = true;
                    0
                }
            };
            (existing & 0xFFFF_0000) | low
        }
        SizeCode::ByteInt => {
            let existing = host.dreg(reg);
            let low = match codec::integer_to_bits(value, 8, rounding) {
                Some((v, inex)) => {
                    *inexact = inex;
                    v as u32 & 0xFF
                }
                None => {
                    *failed = true;
                    0
                }
            };
            (existing & 0xFFFF_FF00) | low
        }
        _ => 0,
    };
    if matches!(size, SizeCode::Single | SizeCode::LongInt | SizeCode::WordInt | SizeCode::ByteInt) {
        host.set_dreg(reg, bits);
    }
}

/// Raises INEX2 (and, via `make_status`, the accrued INEX bit) on an
/// integer store whose rounded value didn't equal the exact extended
/// source — the rounding step that real hardware performs on the way to
/// memory/a data register, which `integer_to_bits` reports but which the
/// store path previously dropped on the floor.
fn raise_store_inexact(host: &mut impl CpuBus, regs: &mut FpuRegisterFile, controller: &mut ExceptionController, model: FpuModel) {
    let raised = FpuExceptions(0).with_inex2(true);
    regs.fpsr = regs.fpsr.with_exs(FpuExceptions(regs.fpsr.exs().0 | raised.0));
    status::make_status(&mut regs.fpsr);
    crate::exceptions::check_arithmetic_exception(controller, &mut regs.fpsr, regs.fpcr, model, raised);
    controller.dispatch_pending(host, model, false);
}

/// `fault_if_68040_integer_nonmaskable`: on a 68040/68060, an integer store
/// that couldn't represent the value (out of range, or the source was
/// SNaN/operr) raises an OPERR after the memory write has already happened,
/// gated by [`ExceptionController::arithmetic_exceptions_enabled`].
fn fault_if_integer_nonmaskable(
    host: &mut impl CpuBus,
    regs: &mut FpuRegisterFile,
    controller: &mut ExceptionController,
    model: FpuModel,
    failed: bool,
) {
    if !failed || !model.nonmaskable_ovfl_unfl() || !controller.arithmetic_exceptions_enabled {
        return;
    }
    let raised = FpuExceptions(0).with_operr(true);
    regs.fpsr = regs.fpsr.with_exs(FpuExceptions(regs.fpsr.exs().0 | raised.0));
    status::make_status(&mut regs.fpsr);
    if let Some(vector) = crate::exceptions::vector_for_exceptions(raised) {
        controller.latch_arithmetic(vector);
        controller.dispatch_pending(host, model, false);
    }
}

/// Packed-decimal k-factor decode (GLOSSARY): static from the extra word's
/// low 7 bits, or dynamic from a data register, sign-extended from 7 bits.
fn decode_k_factor(host: &impl CpuBus, ext: FpuExtWord, size: SizeCode) -> i8 {
    match size {
        SizeCode::PackedDynamicK => {
            let dreg = usize::from((ext.0 >> 4) & 0b111);
            let raw = (host.dreg(dreg) & 0x7F) as u8;
            sign_extend_7(raw)
        }
        _ => sign_extend_7((ext.0 & 0x7F) as u8),
    }
}

fn sign_extend_7(raw: u8) -> i8 {
    if raw & 0x40 != 0 {
        (raw | 0x80) as i8
    } else {
        raw as i8
    }
}

/// Class 100/101: move to/from {FPCR, FPSR, FPIAR}, streaming order
/// FPCR → FPSR → FPIAR.
pub fn dispatch_control_register_move(
    host: &mut impl CpuBus,
    regs: &mut FpuRegisterFile,
    model: FpuModel,
    ea_mode: u8,
    ea_reg: usize,
    ext: FpuExtWord,
    direction_to_fpu: bool,
) -> Result<()> {
    let selected: Vec<ControlReg> = ControlReg::iter_selected(ext.control_select()).collect();

    // Multi-register immediate-style move: reject outright on 68060 rather
    // than silently writing past a single register.
    if selected.len() > 1 && ea_mode == 0b111 && ea_reg == 0b100 && model.immediate_packed_extended_is_unimplemented_ea() {
        host.exception(ExceptionVector::Fline);
        return Ok(());
    }

    if ea_mode == 0b000 {
        for reg in selected {
            move_control_register(host, regs, reg, ea_reg, direction_to_fpu);
        }
        return Ok(());
    }

    let mode = EaMode::decode((ea_mode << 3) | (ea_reg as u8 & 0b111))?;
    let step = 4u8 * selected.len().max(1) as u8;
    let target = mode.resolve(host, step)?;
    let mut addr = match target {
        EaTarget::Memory(addr) => addr,
        EaTarget::Immediate if direction_to_fpu => {
            for reg in selected {
                let word = host.next_ilong()?;
                set_control_register(regs, reg, word);
            }
            return Ok(());
        }
        _ => bail!("control-register move requires a memory or immediate source"),
    };

    for reg in selected {
        if direction_to_fpu {
            let word = host.read_long(addr)?;
            set_control_register(regs, reg, word);
        } else {
            host.write_long(addr, get_control_register(regs, reg))?;
        }
        addr = addr.wrapping_add(4);
    }
    Ok(())
}

fn move_control_register(host: &mut impl CpuBus, regs: &mut FpuRegisterFile, reg: ControlReg, dreg: usize, to_fpu: bool) {
    if to_fpu {
        let value = host.dreg(dreg);
        set_control_register(regs, reg, value);
    } else {
        host.set_dreg(dreg, get_control_register(regs, reg));
    }
}

fn get_control_register(regs: &FpuRegisterFile, reg: ControlReg) -> u32 {
    match reg {
        ControlReg::Fpcr => regs.fpcr.0,
        ControlReg::Fpsr => regs.fpsr.0,
        ControlReg::Fpiar => regs.fpiar,
    }
}

fn set_control_register(regs: &mut FpuRegisterFile, reg: ControlReg, value: u32) {
    match reg {
        ControlReg::Fpcr => regs.fpcr = crate::regs::RegisterFPCR(value),
        ControlReg::Fpsr => regs.fpsr = crate::regs::RegisterFPSR(value),
        ControlReg::Fpiar => regs.fpiar = value,
    }
}

/// Class 110/111: FMOVEM register-list to/from memory. Predecrement mode
/// stores the list in reverse register order.
pub fn dispatch_register_list_move(
    host: &mut impl CpuBus,
    regs: &mut FpuRegisterFile,
    ea_mode: u8,
    ea_reg: usize,
    ext: FpuExtWord,
) -> Result<()> {
    let list = if ext.movem_mode() & 0b01 != 0 {
        let dreg = usize::from((ext.movem_list() >> 4) & 0b111);
        let count = host.dreg(dreg) & 0xFF;
        (0..8u8).rev().filter(|i| count & (1 << i) != 0).collect::<Vec<_>>()
    } else {
        let mask = ext.movem_list();
        (0..8u8).rev().filter(|i| mask & (1 << (7 - i)) != 0).collect::<Vec<_>>()
    };

    let predecrement = ea_mode == 0b100;
    let ordered: Vec<u8> = if predecrement {
        list.into_iter().rev().collect()
    } else {
        list
    };

    let mode = EaMode::decode((ea_mode << 3) | (ea_reg as u8 & 0b111))?;
    let step = 12u8 * ordered.len().max(1) as u8;
    let target = mode.resolve(host, step)?;
    let mut addr = match target {
        EaTarget::Memory(addr) => addr,
        _ => bail!("FMOVEM requires a memory EA"),
    };

    let step_addr: i32 = if predecrement { -12 } else { 12 };
    for reg in ordered {
        if predecrement {
            addr = addr.wrapping_add_signed(step_addr);
        }
        if ext.movem_dir() {
            let hi = host.read_long(addr)?;
            let mid = host.read_long(addr.wrapping_add(4))?;
            let lo = host.read_long(addr.wrapping_add(8))?;
            regs.fp[reg as usize] = codec::extended_from_longs(hi, mid, lo);
        } else {
            let (hi, mid, lo) = codec::extended_to_longs(&regs.fp[reg as usize]);
            host.write_long(addr, hi)?;
            host.write_long(addr.wrapping_add(4), mid)?;
            host.write_long(addr.wrapping_add(8), lo)?;
        }
        if !predecrement {
            addr = addr.wrapping_add_signed(step_addr);
        }
    }
    Ok(())
}

/// Shared condition evaluation for the FBcc/FDBcc/FScc/FTRAPcc family:
/// evaluates the predicate, applies BSUN signalling, and reports whether
/// the caller should abort via the pending-exception path.
fn evaluate_predicate(regs: &mut FpuRegisterFile, controller: &mut ExceptionController, cc: u8) -> ConditionResult {
    let fpcc = regs.fpsr;
    let bsun_enabled = regs.fpcr.exc().bsun();
    let (result, bsun) = condition::evaluate(cc, fpcc.fpcc_nan(), fpcc.fpcc_z(), fpcc.fpcc_n(), bsun_enabled);
    log::trace!("condition {} -> {result:?} (bsun={bsun})", condition::mnemonic(cc));
    if bsun {
        regs.fpsr = regs.fpsr.with_exs(regs.fpsr.exs().with_bsun(true));
        status::make_status(&mut regs.fpsr);
        if matches!(result, ConditionResult::BsunTaken) {
            controller.set_bsun(regs.fpcr);
        }
    }
    result
}

/// FBcc: branches to `target` when the predicate is true.
pub fn dispatch_fbcc(
    host: &mut impl CpuBus,
    regs: &mut FpuRegisterFile,
    controller: &mut ExceptionController,
    model: FpuModel,
    cc: u8,
    target: u32,
) {
    match evaluate_predicate(regs, controller, cc) {
        ConditionResult::True => host.set_pc(target),
        ConditionResult::False => {}
        ConditionResult::BsunTaken => {
            controller.dispatch_pending(host, model, true);
        }
    }
}

/// FDBcc: on false, decrements the low word of `dreg` and branches to
/// `target` unless it underflows from 0 to -1.
pub fn dispatch_fdbcc(
    host: &mut impl CpuBus,
    regs: &mut FpuRegisterFile,
    controller: &mut ExceptionController,
    model: FpuModel,
    cc: u8,
    dreg: usize,
    target: u32,
) {
    match evaluate_predicate(regs, controller, cc) {
        ConditionResult::True => {}
        ConditionResult::BsunTaken => {
            controller.dispatch_pending(host, model, true);
        }
        ConditionResult::False => {
            let current = host.dreg(dreg) as u16;
            let next = current.wrapping_sub(1);
            let low = u32::from(next);
            host.set_dreg(dreg, (host.dreg(dreg) & 0xFFFF_0000) | low);
            if next != 0xFFFF {
                host.set_pc(target);
            }
        }
    }
}

/// FScc: sets every bit of the destination byte/long to the predicate result.
pub fn dispatch_fscc(
    host: &mut impl CpuBus,
    regs: &mut FpuRegisterFile,
    controller: &mut ExceptionController,
    model: FpuModel,
    cc: u8,
    ea_mode: u8,
    ea_reg: usize,
) -> Result<()> {
    let set = match evaluate_predicate(regs, controller, cc) {
        ConditionResult::True => true,
        ConditionResult::False => false,
        ConditionResult::BsunTaken => {
            controller.dispatch_pending(host, model, true);
            return Ok(());
        }
    };
    let byte = if set { 0xFF } else { 0x00 };
    let mode = EaMode::decode((ea_mode << 3) | (ea_reg as u8 & 0b111))?;
    match mode.resolve(host, 1)? {
        EaTarget::DataRegister(reg) => {
            let existing = host.dreg(reg);
            host.set_dreg(reg, (existing & 0xFFFF_FF00) | u32::from(byte));
        }
        EaTarget::Memory(addr) => host.write_byte(addr, byte)?,
        EaTarget::Immediate => bail!("FScc cannot target an immediate"),
    }
    Ok(())
}

/// FTRAPcc: raises vector 7 when the predicate is true.
pub fn dispatch_ftrapcc(
    host: &mut impl CpuBus,
    regs: &mut FpuRegisterFile,
    controller: &mut ExceptionController,
    model: FpuModel,
    cc: u8,
) {
    match evaluate_predicate(regs, controller, cc) {
        ConditionResult::True => host.exception(ExceptionVector::TrapccTaken),
        ConditionResult::False => {}
        ConditionResult::BsunTaken => {
            controller.dispatch_pending(host, model, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::TestBus;
    use crate::model::FpuModel;

    fn bus_with_regs() -> (TestBus, FpuRegisterFile, ExceptionController) {
        (TestBus::new(), FpuRegisterFile::default(), ExceptionController::new())
    }

    #[test]
    fn fmovecr_pi_writes_register_and_sets_inex2() {
        let (mut host, mut regs, mut controller) = bus_with_regs();
        let ext = FpuExtWord(0b010_111_000_0000000);
        dispatch_arithmetic(&mut host, &mut regs, &mut controller, FpuModel::Mc68881, 0, 0, ext).unwrap();
        let (hi, mid, lo) = codec::extended_to_longs(&regs.fp[0]);
        assert_eq!((hi, mid, lo), (0x4000_0000, 0xc90fdaa2, 0x2168c235));
        assert!(regs.fpsr.exs().inex2());
        assert!(regs.fpsr.aexc().inex());
    }

    #[test]
    fn fadd_register_to_register() {
        let (mut host, mut regs, mut controller) = bus_with_regs();
        regs.fp[0] = Float::from_f64(1.5).cast(SEMANTICS_EXTENDED);
        regs.fp[1] = Float::from_f64(2.5).cast(SEMANTICS_EXTENDED);
        let ext = FpuExtWord(0).with_opclass(0b000).with_src_spec(0).with_dst_reg(1).with_opmode(0x22);
        dispatch_arithmetic(&mut host, &mut regs, &mut controller, FpuModel::Mc68881, 0, 0, ext).unwrap();
        assert_eq!(regs.fp[1].as_f64(), 4.0);
    }

    #[test]
    fn fdbcc_decrements_and_branches_while_nonzero() {
        let (mut host, mut regs, mut controller) = bus_with_regs();
        host.set_dreg(0, 3);
        dispatch_fdbcc(&mut host, &mut regs, &mut controller, FpuModel::Mc68881, 0b000000, 0, 0x2000);
        assert_eq!(host.dreg(0), 2);
        assert_eq!(host.pc(), 0x2000);
    }

    #[test]
    fn fdiv_by_zero_raises_dz_and_accrued_dz() {
        let (mut host, mut regs, mut controller) = bus_with_regs();
        regs.fp[0] = Float::from_f64(0.0).cast(SEMANTICS_EXTENDED);
        regs.fp[1] = Float::from_f64(1.0).cast(SEMANTICS_EXTENDED);
        let ext = FpuExtWord(0).with_opclass(0b000).with_src_spec(0).with_dst_reg(1).with_opmode(0x20);
        dispatch_arithmetic(&mut host, &mut regs, &mut controller, FpuModel::Mc68881, 0, 0, ext).unwrap();
        assert!(regs.fp[1].is_inf());
        assert!(regs.fpsr.exs().dz());
        assert!(regs.fpsr.aexc().dz());
        assert!(regs.fpsr.fpcc_i());
        assert!(!regs.fpsr.fpcc_n());
    }

    #[test]
    fn fmove_l_round_to_zero_truncates_and_sets_inex2() {
        let (mut host, mut regs, mut controller) = bus_with_regs();
        regs.fp[0] = Float::from_f64(2.5).cast(SEMANTICS_EXTENDED);
        regs.fpcr = regs.fpcr.with_rnd(1); // round toward zero
        let ext = FpuExtWord(0).with_opclass(0b011).with_dst_reg(0).with_src_spec(SizeCode::LongInt as u8);
        dispatch_store(&mut host, &mut regs, &mut controller, FpuModel::Mc68881, 0b000, 3, ext).unwrap();
        assert_eq!(host.dreg(3), 2);
        assert!(regs.fpsr.exs().inex2());
        assert!(regs.fpsr.aexc().inex());
    }

    #[test]
    fn mc68040_denormal_single_load_traps_and_populates_scratch() {
        let (mut host, regs, mut controller) = bus_with_regs();
        let model = FpuModel::Mc68040(crate::model::Mc68040Revision::Rev41);
        host.write_long(0x1000, 0x0040_0000).unwrap();
        host.push_iwords([0x0000, 0x1000]); // absolute-long EA operand, 0x00001000
        let value = load_operand(&mut host, &regs, &mut controller, model, 0b111, 0b001, SizeCode::Single, 0).unwrap();
        assert!(controller.unimplemented_datatype_pending);
        assert!(value.is_zero());
        assert_eq!(controller.scratch.stag, OperandTag::SglDblDenormal as u32);
        assert_eq!(controller.scratch.et[0], 0x3F80_0000);
    }
}
