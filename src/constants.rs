//! Constant ROM: the 22-entry on-chip constant table plus the 11-entry
//! "undefined-slot" table, with per-(precision, rounding-mode) adjustments.
//!
//! Bit patterns and adjustment tables are taken verbatim from `fpp_cr`/
//! `fpp_cr_undef`/`fpu_get_constant`; only the selector dispatch is
//! re-expressed as data-driven Rust.

use arpfloat::Float;

use crate::codec::{extended_from_longs, extended_to_longs};
use crate::regs::{RoundingMode, RoundingPrecision};
use crate::semantics::{SEMANTICS_DOUBLE, SEMANTICS_EXTENDED, SEMANTICS_SINGLE};

struct CrEntry {
    val: [u32; 3],
    inexact: bool,
    /// Low-word rounding adjustment, indexed by [`RoundingMode`] as `0..=3`.
    rndoff: [i32; 4],
}

const FPP_CR: [CrEntry; 22] = [
    CrEntry { val: [0x40000000, 0xc90fdaa2, 0x2168c235], inexact: true, rndoff: [0, -1, -1, 0] }, // 0 pi
    CrEntry { val: [0x3ffd0000, 0x9a209a84, 0xfbcff798], inexact: true, rndoff: [0, 0, 0, 1] },    // 1 log10(2)
    CrEntry { val: [0x40000000, 0xadf85458, 0xa2bb4a9a], inexact: true, rndoff: [0, 0, 0, 1] },    // 2 e
    CrEntry { val: [0x3fff0000, 0xb8aa3b29, 0x5c17f0bc], inexact: true, rndoff: [0, -1, -1, 0] },  // 3 log2(e)
    CrEntry { val: [0x3ffd0000, 0xde5bd8a9, 0x37287195], inexact: false, rndoff: [0, 0, 0, 0] },   // 4 log10(e)
    CrEntry { val: [0x00000000, 0x00000000, 0x00000000], inexact: false, rndoff: [0, 0, 0, 0] },   // 5 0.0
    CrEntry { val: [0x3ffe0000, 0xb17217f7, 0xd1cf79ac], inexact: true, rndoff: [0, -1, -1, 0] },  // 6 ln(2)
    CrEntry { val: [0x40000000, 0x935d8ddd, 0xaaa8ac17], inexact: true, rndoff: [0, -1, -1, 0] },  // 7 ln(10)
    CrEntry { val: [0x3fff0000, 0x80000000, 0x00000000], inexact: false, rndoff: [0, 0, 0, 0] },   // 8 1e0
    CrEntry { val: [0x40020000, 0xa0000000, 0x00000000], inexact: false, rndoff: [0, 0, 0, 0] },   // 9 1e1
    CrEntry { val: [0x40050000, 0xc8000000, 0x00000000], inexact: false, rndoff: [0, 0, 0, 0] },   // 10 1e2
    CrEntry { val: [0x400c0000, 0x9c400000, 0x00000000], inexact: false, rndoff: [0, 0, 0, 0] },   // 11 1e4
    CrEntry { val: [0x40190000, 0xbebc2000, 0x00000000], inexact: false, rndoff: [0, 0, 0, 0] },   // 12 1e8
    CrEntry { val: [0x40340000, 0x8e1bc9bf, 0x04000000], inexact: false, rndoff: [0, 0, 0, 0] },   // 13 1e16
    CrEntry { val: [0x40690000, 0x9dc5ada8, 0x2b70b59e], inexact: true, rndoff: [0, -1, -1, 0] },  // 14 1e32
    CrEntry { val: [0x40d30000, 0xc2781f49, 0xffcfa6d5], inexact: true, rndoff: [0, 0, 0, 1] },    // 15 1e64
    CrEntry { val: [0x41a80000, 0x93ba47c9, 0x80e98ce0], inexact: true, rndoff: [0, -1, -1, 0] },  // 16 1e128
    CrEntry { val: [0x43510000, 0xaa7eebfb, 0x9df9de8e], inexact: true, rndoff: [0, -1, -1, 0] },  // 17 1e256
    CrEntry { val: [0x46a30000, 0xe319a0ae, 0xa60e91c7], inexact: true, rndoff: [0, -1, -1, 0] },  // 18 1e512
    CrEntry { val: [0x4d480000, 0xc9767586, 0x81750c17], inexact: true, rndoff: [0, 0, 0, 1] },    // 19 1e1024
    CrEntry { val: [0x5a920000, 0x9e8b3b5d, 0xc53d5de5], inexact: true, rndoff: [0, -1, -1, 0] },  // 20 1e2048
    CrEntry { val: [0x75250000, 0xc4605202, 0x8a20979b], inexact: true, rndoff: [0, -1, -1, 0] },  // 21 1e4096
];

const FPP_CR_UNDEF: [[u32; 3]; 11] = [
    [0x40000000, 0x00000000, 0x00000000],
    [0x40010000, 0xfe000682, 0x00000000],
    [0x40010000, 0xffc00503, 0x80000000],
    [0x20000000, 0x7fffffff, 0x00000000],
    [0x00000000, 0xffffffff, 0xffffffff],
    [0x3c000000, 0xffffffff, 0xfffff800],
    [0x3f800000, 0xffffff00, 0x00000000],
    [0x00010000, 0xf65d8d9c, 0x00000000],
    [0x7fff0000, 0x001e0000, 0x00000000],
    [0x43ff0000, 0x000e0000, 0x00000000],
    [0x407f0000, 0x00060000, 0x00000000],
];

/// Maps the 7-bit FMOVECR register-specifier field to a [`FPP_CR`] index,
/// per the `switch (cr)` in `fpu_get_constant`. Returns `None` for any
/// selector not among the 22 named constants (those fall through to the
/// undefined-slot table).
fn named_entry_index(selector: u8) -> Option<usize> {
    Some(match selector {
        0x00 => 0,  // pi
        0x0b => 1,  // log10(2)
        0x0c => 2,  // e
        0x0d => 3,  // log2(e)
        0x0e => 4,  // log10(e)
        0x0f => 5,  // 0.0
        0x30 => 6,  // ln(2)
        0x31 => 7,  // ln(10)
        0x32 => 8,  // 1e0
        0x33 => 9,  // 1e1
        0x34 => 10, // 1e2
        0x35 => 11, // 1e4
        0x36 => 12, // 1e8
        0x37 => 13, // 1e16
        0x38 => 14, // 1e32
        0x39 => 15, // 1e64
        0x3a => 16, // 1e128
        0x3b => 17, // 1e256
        0x3c => 18, // 1e512
        0x3d => 19, // 1e1024
        0x3e => 20, // 1e2048
        0x3f => 21, // 1e4096
        _ => return None,
    })
}

/// Outcome of an FMOVECR load.
pub struct LoadedConstant {
    pub value: Float,
    /// Whether INEX2 should be raised (recognised, inexact constants only;
    /// undefined-slot loads never raise it).
    pub inexact: bool,
    /// Condition-code override for undefined-slot entry 3 (sets I or NaN
    /// directly rather than deriving it from the loaded value).
    pub cc_override: Option<ConditionOverride>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOverride {
    Infinity,
    Nan,
}

pub(crate) fn round_to_precision(value: Float, precision: RoundingPrecision) -> Float {
    match precision {
        RoundingPrecision::Extended => value,
        RoundingPrecision::Single => value.cast(SEMANTICS_SINGLE).cast(SEMANTICS_EXTENDED),
        RoundingPrecision::Double => value.cast(SEMANTICS_DOUBLE).cast(SEMANTICS_EXTENDED),
    }
}

/// Loads ROM selector `cr` (the 7-bit FMOVECR register-specifier field),
/// applying the (precision, rounding) adjustment and precision rounding
/// that real FMOVECR hardware performs on the way out of the ROM table.
pub fn load(cr: u8, precision: RoundingPrecision, rounding: RoundingMode) -> LoadedConstant {
    if let Some(index) = named_entry_index(cr) {
        let entry = &FPP_CR[index];
        let mut words = entry.val;
        let mut inexact = false;
        if entry.inexact {
            inexact = true;
            words[2] = words[2].wrapping_add(entry.rndoff[rounding as usize] as u32);
        }
        let value = round_to_precision(extended_from_longs(words[0], words[1], words[2]), precision);
        return LoadedConstant { value, inexact, cc_override: None };
    }

    let slot = if (cr as usize) <= 10 { cr as usize } else { 0 };
    let mode = rounding as u8;
    let prec = precision as u8;

    let mut cc_override = None;
    let mut check_f1_adjust = false;
    let mut f1_adjust: i32 = 0;

    match slot {
        1 => check_f1_adjust = true,
        2 => {
            if prec == 1 && mode == 3 {
                f1_adjust = -1;
            }
        }
        3 => {
            cc_override = Some(if prec == 1 && (mode == 0 || mode == 3) {
                ConditionOverride::Infinity
            } else {
                ConditionOverride::Nan
            });
        }
        7 => {
            cc_override = Some(ConditionOverride::Nan);
            check_f1_adjust = true;
        }
        _ => {}
    }
    if check_f1_adjust && prec == 1 {
        f1_adjust = match mode {
            0 => -1,
            1 | 2 => 1,
            _ => 0,
        };
    }

    let mut value = round_to_precision(
        extended_from_longs(FPP_CR_UNDEF[slot][0], FPP_CR_UNDEF[slot][1], FPP_CR_UNDEF[slot][2]),
        precision,
    );
    if f1_adjust != 0 {
        let (h, m, l) = extended_to_longs(&value);
        let m = m.wrapping_add((f1_adjust * 0x80) as u32);
        value = extended_from_longs(h, m, l);
    }

    LoadedConstant { value, inexact: false, cc_override }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_zero_is_pi_extended_nearest() {
        let loaded = load(0x00, RoundingPrecision::Extended, RoundingMode::Nearest);
        let (h, m, l) = extended_to_longs(&loaded.value);
        assert_eq!((h, m, l), (0x4000_0000, 0xc90fdaa2, 0x2168c235));
        assert!(loaded.inexact);
        assert!(loaded.cc_override.is_none());
    }

    #[test]
    fn undefined_slot_falls_back_to_entry_zero() {
        let loaded = load(200, RoundingPrecision::Extended, RoundingMode::Nearest);
        let (h, m, l) = extended_to_longs(&loaded.value);
        assert_eq!((h, m, l), (0x40000000, 0x00000000, 0x00000000));
    }

    #[test]
    fn slot_three_sets_nan_override_outside_special_case() {
        let loaded = load(3, RoundingPrecision::Extended, RoundingMode::Nearest);
        assert_eq!(loaded.cc_override, Some(ConditionOverride::Nan));
    }
}
