//! FSAVE/FRESTORE Marshaller: the NULL/IDLE/BUSY/UNIMP/EXCP frame byte
//! layouts for each of the four chip generations. Frame-ID longs and field
//! offsets are part of the user-visible ABI and must match real hardware
//! byte-for-byte.

use anyhow::Result;

use crate::bus::CpuBus;
use crate::errors::FrameError;
use crate::model::{FpuModel, Mc68040Revision};
use crate::types::{Address, Long};

/// FSAVE scratch record: the union of fields every chip generation can
/// populate into a frame. Unused fields for a given chip/state are left at
/// their default (zero).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FsaveScratch {
    pub ccr: Long,
    pub eo: [Long; 3],
    pub v: Long,
    pub fpiarcu: Address,
    pub cmdreg1b: Long,
    pub cmdreg3b: Long,
    pub stag: Long,
    pub dtag: Long,
    pub e1: Long,
    pub e3: Long,
    pub t: Long,
    pub fpt: [Long; 3],
    pub et: [Long; 3],
    pub wbt: [Long; 3],
    pub grs: Long,
    pub wbte15: Long,
    pub wbtm66: Long,
}

/// The coprocessor's exception-state slot (`fpu_exp_state`): none, or
/// carrying an idle/unimplemented-instruction frame, or a busy/exception
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpuExpState {
    None,
    IdleOrUnimp,
    BusyOrExcp,
}

/// Whether the coprocessor has any live state to save (`fpu_state`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FpuState {
    Null,
    Idle,
}

fn version_byte(model: FpuModel) -> u8 {
    model.version_byte()
}

/// Writes the FSAVE frame for the current `(model, fpu_state, exp_state)`
/// at `addr`, returning the frame size in bytes so the caller can apply
/// predecrement stepping. `scratch` supplies the per-chip interior fields
/// populated by the exception controller.
pub fn save(
    host: &mut impl CpuBus,
    addr: Address,
    model: FpuModel,
    fpu_state: FpuState,
    exp_state: FpuExpState,
    scratch: &FsaveScratch,
) -> Result<u8> {
    let ver = version_byte(model);
    match model {
        FpuModel::Mc68060 => {
            let frame_id: Long = match exp_state {
                FpuExpState::BusyOrExcp => 0x0000_E000 | (scratch.v & 7),
                FpuExpState::IdleOrUnimp | FpuExpState::None => {
                    if matches!(fpu_state, FpuState::Null) {
                        0x0000_0000
                    } else {
                        0x0000_6000
                    }
                }
            };
            host.write_long(addr, (scratch.eo[0] & 0xFFFF_0000) | frame_id)?;
            host.write_long(addr.wrapping_add(4), scratch.eo[1])?;
            host.write_long(addr.wrapping_add(8), scratch.eo[2])?;
            Ok(12)
        }
        FpuModel::Mc68040(rev) => {
            if matches!(exp_state, FpuExpState::None) {
                let frame_id: Long = if matches!(fpu_state, FpuState::Null) {
                    0
                } else {
                    Long::from(ver) << 24
                };
                host.write_long(addr, frame_id)?;
                Ok(4)
            } else if matches!(exp_state, FpuExpState::BusyOrExcp) {
                let frame_size: u8 = 0x60 + 4;
                host.write_long(addr, (Long::from(ver) << 24) | (0x60u32 << 16))?;
                let mut a = addr.wrapping_add(4);
                for word in [0u32, 0, 0, 0, 0, scratch.wbt[0], scratch.wbt[1], scratch.wbt[2], 0, scratch.fpiarcu, 0, 0] {
                    host.write_long(a, word)?;
                    a = a.wrapping_add(4);
                }
                host.write_long(a, scratch.cmdreg3b << 16)?;
                a = a.wrapping_add(4);
                host.write_long(a, 0)?;
                a = a.wrapping_add(4);
                write_68040_common(host, &mut a, scratch)?;
                Ok(frame_size)
            } else {
                let rev_size: u8 = if matches!(rev, Mc68040Revision::Rev41) { 0x30 } else { 0x28 };
                let frame_size = rev_size + 4;
                host.write_long(addr, (Long::from(ver) << 24) | (Long::from(rev_size) << 16))?;
                let mut a = addr.wrapping_add(4);
                if matches!(rev, Mc68040Revision::Rev41) {
                    host.write_long(a, scratch.cmdreg3b << 16)?;
                    a = a.wrapping_add(4);
                    host.write_long(a, 0)?;
                    a = a.wrapping_add(4);
                }
                write_68040_common(host, &mut a, scratch)?;
                Ok(frame_size)
            }
        }
        FpuModel::Mc68881 | FpuModel::Mc68882 => {
            let biu_base: Long = 0x540E_FFFF
                | if matches!(exp_state, FpuExpState::None) { 0x0800_0000 } else { 0x2000_0000 };
            if matches!(fpu_state, FpuState::Null) {
                host.write_long(addr, 0)?;
                return Ok(4);
            }
            let internal_size: u8 = if matches!(model, FpuModel::Mc68882) { 32 } else { 0 };
            let frame_size = 4 + 4 + internal_size + 12 + 4 + 4;
            host.write_long(addr, (Long::from(ver) << 24) | (Long::from(frame_size - 4) << 16))?;
            let mut a = addr.wrapping_add(4);
            host.write_long(a, scratch.ccr)?;
            a = a.wrapping_add(4);
            for _ in (0..internal_size).step_by(4) {
                host.write_long(a, 0)?;
                a = a.wrapping_add(4);
            }
            for eo in scratch.eo {
                host.write_long(a, eo)?;
                a = a.wrapping_add(4);
            }
            host.write_long(a, 0)?;
            a = a.wrapping_add(4);
            host.write_long(a, biu_base)?;
            Ok(frame_size)
        }
    }
}

fn write_68040_common(host: &mut impl CpuBus, a: &mut Address, scratch: &FsaveScratch) -> Result<()> {
    host.write_long(*a, (scratch.stag << 29) | (scratch.wbtm66 << 26) | (scratch.grs << 23))?;
    *a = a.wrapping_add(4);
    host.write_long(*a, scratch.cmdreg1b << 16)?;
    *a = a.wrapping_add(4);
    host.write_long(*a, (scratch.dtag << 29) | (scratch.wbte15 << 20))?;
    *a = a.wrapping_add(4);
    host.write_long(*a, (scratch.e1 << 26) | (scratch.e3 << 25) | (scratch.t << 20))?;
    *a = a.wrapping_add(4);
    for fpt in scratch.fpt {
        host.write_long(*a, fpt)?;
        *a = a.wrapping_add(4);
    }
    for et in scratch.et {
        host.write_long(*a, et)?;
        *a = a.wrapping_add(4);
    }
    Ok(())
}

/// Outcome of a FRESTORE: the restored `(fpu_state, exp_state)`
/// and, for a 68040 BUSY frame resumed via `CU_SAVEPC == 0xFE`, the
/// `(src, dst, cmdreg1b)` needed to re-dispatch the interrupted arithmetic.
pub struct RestoreOutcome {
    pub fpu_state: FpuState,
    pub exp_state: FpuExpState,
    pub pending_vector: Option<u8>,
    pub pending_unimplemented_datatype: bool,
    pub resume: Option<BusyResume>,
}

pub struct BusyResume {
    pub cmdreg1b: u16,
    pub src_bits: [Long; 3],
    pub dst_bits: [Long; 3],
}

/// Reads an FSAVE frame back from `addr`, dispatching on `(frame_version,
/// frame_size)`. Raises a coprocessor format error (vector 14, via the
/// returned `Err`) on an unrecognised version/size combination, the same
/// way real hardware calls `Exception(14)` on a malformed frame.
pub fn restore(host: &mut impl CpuBus, addr: Address, model: FpuModel) -> Result<(RestoreOutcome, u8)> {
    let first = host.read_long(addr)?;
    let frame_version = (first >> 24) as u8;

    match model {
        FpuModel::Mc68060 => {
            let ff = ((first >> 8) & 0xFF) as u8;
            let v = first & 0x7;
            let eo1 = host.read_long(addr.wrapping_add(4))?;
            let eo2 = host.read_long(addr.wrapping_add(8))?;
            let _ = eo1;
            let _ = eo2;
            let outcome = match ff {
                0x60 => RestoreOutcome {
                    fpu_state: FpuState::Idle,
                    exp_state: FpuExpState::None,
                    pending_vector: None,
                    pending_unimplemented_datatype: false,
                    resume: None,
                },
                0xE0 => RestoreOutcome {
                    fpu_state: FpuState::Idle,
                    exp_state: FpuExpState::BusyOrExcp,
                    pending_vector: if v == 7 { None } else { Some(48 + v as u8) },
                    pending_unimplemented_datatype: v == 7,
                    resume: None,
                },
                0x00 => RestoreOutcome {
                    fpu_state: FpuState::Null,
                    exp_state: FpuExpState::None,
                    pending_vector: None,
                    pending_unimplemented_datatype: false,
                    resume: None,
                },
                other => {
                    log::warn!("FRESTORE: unrecognised 68060 frame byte {other:#04x}");
                    return Err(FrameError::InvalidFrame { version: frame_version, size: other }.into());
                }
            };
            Ok((outcome, 12))
        }
        FpuModel::Mc68040(_) => {
            if frame_version == version_byte(model) {
                let frame_size = ((first >> 16) & 0xFF) as u8;
                if frame_size == 0x60 {
                    let resume_info = read_68040_busy(host, addr)?;
                    Ok((
                        RestoreOutcome {
                            fpu_state: FpuState::Idle,
                            exp_state: FpuExpState::BusyOrExcp,
                            pending_vector: None,
                            pending_unimplemented_datatype: false,
                            resume: resume_info,
                        },
                        0x64,
                    ))
                } else if frame_size == 0x30 || frame_size == 0x28 {
                    Ok((
                        RestoreOutcome {
                            fpu_state: FpuState::Idle,
                            exp_state: FpuExpState::None,
                            pending_vector: None,
                            pending_unimplemented_datatype: false,
                            resume: None,
                        },
                        frame_size + 4,
                    ))
                } else if frame_size == 0x00 {
                    Ok((
                        RestoreOutcome {
                            fpu_state: FpuState::Idle,
                            exp_state: FpuExpState::None,
                            pending_vector: None,
                            pending_unimplemented_datatype: false,
                            resume: None,
                        },
                        4,
                    ))
                } else {
                    log::warn!("FRESTORE: unrecognised 68040 frame size {frame_size:#04x}");
                    return Err(FrameError::InvalidFrame { version: frame_version, size: frame_size }.into())
                }
            } else if frame_version == 0 {
                Ok((
                    RestoreOutcome {
                        fpu_state: FpuState::Null,
                        exp_state: FpuExpState::None,
                        pending_vector: None,
                        pending_unimplemented_datatype: false,
                        resume: None,
                    },
                    4,
                ))
            } else {
                log::warn!("FRESTORE: unrecognised 68040 frame version {frame_version:#04x}");
                return Err(FrameError::InvalidVersion { version: frame_version }.into())
            }
        }
        FpuModel::Mc68881 | FpuModel::Mc68882 => {
            if frame_version == version_byte(model) {
                let frame_size = ((first >> 16) & 0xFF) as u8;
                if frame_size == 0x18 || frame_size == 0x38 {
                    let mut a = addr.wrapping_add(4 + 4);
                    a = a.wrapping_add(Address::from(frame_size) - 24);
                    let eo = [host.read_long(a)?, host.read_long(a.wrapping_add(4))?, host.read_long(a.wrapping_add(8))?];
                    let biu_flags = host.read_long(a.wrapping_add(16))?;
                    let _ = eo;
                    let (exp_state, pending) = if biu_flags & 0x0800_0000 == 0 {
                        (FpuExpState::BusyOrExcp, Some(0u8))
                    } else {
                        (FpuExpState::None, None)
                    };
                    Ok((
                        RestoreOutcome {
                            fpu_state: FpuState::Idle,
                            exp_state,
                            pending_vector: pending,
                            pending_unimplemented_datatype: false,
                            resume: None,
                        },
                        frame_size + 4,
                    ))
                } else if frame_size == 0xB4 || frame_size == 0xD4 {
                    Ok((
                        RestoreOutcome {
                            fpu_state: FpuState::Idle,
                            exp_state: FpuExpState::None,
                            pending_vector: None,
                            pending_unimplemented_datatype: false,
                            resume: None,
                        },
                        frame_size + 4,
                    ))
                } else {
                    log::warn!("FRESTORE: unrecognised 6888x frame size {frame_size:#04x}");
                    return Err(FrameError::InvalidFrame { version: frame_version, size: frame_size }.into())
                }
            } else if frame_version == 0 {
                Ok((
                    RestoreOutcome {
                        fpu_state: FpuState::Null,
                        exp_state: FpuExpState::None,
                        pending_vector: None,
                        pending_unimplemented_datatype: false,
                        resume: None,
                    },
                    4,
                ))
            } else {
                log::warn!("FRESTORE: unrecognised 6888x frame version {frame_version:#04x}");
                return Err(FrameError::InvalidVersion { version: frame_version }.into())
            }
        }
    }
}

fn read_68040_busy(host: &mut impl CpuBus, addr: Address) -> Result<Option<BusyResume>> {
    let cusavepc = (host.read_long(addr.wrapping_add(8))? >> 24) as u8;
    let cmdreg1b_raw = host.read_long(addr.wrapping_add(0x20 + 0x14 + 4))?;
    let cmdreg1b = (cmdreg1b_raw >> 16) as u16;
    let fpt = [
        host.read_long(addr.wrapping_add(0x38))?,
        host.read_long(addr.wrapping_add(0x3C))?,
        host.read_long(addr.wrapping_add(0x40))?,
    ];
    let et = [
        host.read_long(addr.wrapping_add(0x44))?,
        host.read_long(addr.wrapping_add(0x48))?,
        host.read_long(addr.wrapping_add(0x4C))?,
    ];

    if cusavepc != 0xFE {
        return Ok(None);
    }
    let opclass = (cmdreg1b >> 13) & 0x7;
    if opclass != 0 && opclass != 2 {
        return Ok(None);
    }
    Ok(Some(BusyResume { cmdreg1b, src_bits: et, dst_bits: fpt }))
}
