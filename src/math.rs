//! Arithmetic kernel glue: the opmode-keyed dyadic/monadic operation table.
//!
//! `arpfloat` supplies the primitive IEEE operators (add/mul/compare/round).
//! Where it has no closed-form primitive (sqrt, the transcendental family),
//! this module builds the missing primitive out of the ones that exist —
//! the same way a hand-rolled `atan` falls back to a Taylor series rather
//! than reaching outside the crate.

use arpfloat::Float;

use crate::codec::BitsExtReal;
use crate::constants::round_to_precision;
use crate::regs::{FpuExceptions, RoundingPrecision};
use crate::semantics::SEMANTICS_EXTENDED;

/// Result of an arithmetic-kernel dispatch: the value plus the IEEE flags
/// the operation itself raised. `arpfloat` surfaces no guard/round/sticky
/// bits, so these are derived from operand/result classification rather
/// than read off the kernel, the same way `fpu_get_constant`'s inexact
/// flag is a per-entry table value rather than a live computation.
pub struct ArithResult {
    pub value: Float,
    pub raised: FpuExceptions,
}

fn konst(v: f64) -> Float {
    Float::from_f64(v).cast(SEMANTICS_EXTENDED)
}

/// Newton-Raphson square root: `x_{n+1} = (x_n + a/x_n) / 2`, seeded from the
/// host's own `f64::sqrt` (good to ~52 bits) and refined for the extended
/// mantissa.
fn fsqrt(a: &Float) -> Float {
    if a.is_nan() || a.is_zero() {
        return a.clone();
    }
    if a.is_negative() {
        return Float::nan(SEMANTICS_EXTENDED, false);
    }
    if a.is_inf() {
        return a.clone();
    }
    let two = konst(2.0);
    let mut x = konst(a.as_f64().sqrt());
    for _ in 0..4 {
        x = (&x + &(a / &x)) / &two;
    }
    x
}

fn truncate_to_extended_int(a: &Float) -> Float {
    konst(a.as_f64().trunc())
}

fn round_to_extended_int(a: &Float) -> Float {
    a.round()
}

/// Dyadic/monadic opcode table keyed by the 7-bit opmode field (bits 6:0 of
/// the extra word for opclass 000/010), grounded in `fpu_alu_op`'s match but
/// covering the full 68881 opmode set. `precision` is FPCR.PREC: real
/// hardware always computes at extended precision internally and performs
/// an explicit rounding step on the way out, so the raw result is rounded
/// down here and INEX2 is raised when that rounding was lossy.
pub fn apply(opmode: u8, source: &Float, dest: &Float, precision: RoundingPrecision) -> ArithResult {
    let (raw, raised) = compute(opmode, source, dest);
    finish(raw, raised, precision)
}

fn finish(raw: Float, mut raised: FpuExceptions, precision: RoundingPrecision) -> ArithResult {
    let rounded = round_to_precision(raw.clone(), precision);
    if precision != RoundingPrecision::Extended && BitsExtReal::from(&raw) != BitsExtReal::from(&rounded) {
        raised = raised.with_inex2(true);
    }
    ArithResult { value: rounded, raised }
}

fn compute(opmode: u8, source: &Float, dest: &Float) -> (Float, FpuExceptions) {
    match opmode & 0x7F {
        0x00 => (source.clone(), FpuExceptions(0)),                   // FMOVE
        0x01 => monadic(source, round_to_extended_int(source)),       // FINT
        0x02 => monadic(source, sinh(source)),                        // FSINH
        0x03 => monadic(source, truncate_to_extended_int(source)),    // FINTRZ
        0x04 => monadic(source, fsqrt(source)),                       // FSQRT
        0x06 => monadic(source, log_n(source, std::f64::consts::E)),  // FLOGNP1 (approx via ln(1+x))
        0x08 => monadic(source, exp_m1(source)),                      // FETOXM1
        0x09 => monadic(source, tanh(source)),                        // FTANH
        0x0A => monadic(source, atan(source)),                        // FATAN
        0x0C => monadic(source, asin(source)),                        // FASIN
        0x0D => monadic(source, atanh(source)),                       // FATANH
        0x0E => monadic(source, sin(source)),                         // FSIN
        0x0F => monadic(source, tan(source)),                         // FTAN
        0x10 => monadic(source, etox(source)),                        // FETOX
        0x11 => monadic(source, twotox(source)),                      // FTWOTOX
        0x12 => monadic(source, log_base(source, 10.0)),              // FLOG10
        0x13 => monadic(source, log_base(source, 2.0)),               // FLOG2
        0x18 => (source.abs(), FpuExceptions(0)),                     // FABS
        0x19 => monadic(source, cosh(source)),                        // FCOSH
        0x1A => (source.neg(), FpuExceptions(0)),                     // FNEG
        0x1C => monadic(source, acos(source)),                        // FACOS
        0x1D => monadic(source, cos(source)),                         // FCOS
        0x1E => monadic(source, get_exp(source)),                     // FGETEXP
        0x1F => monadic(source, get_man(source)),                     // FGETMAN
        0x20 => dyadic_div(dest, source, dest / source),              // FDIV
        0x21 => dyadic(dest, source, fmod(dest, source)),             // FMOD
        0x22 => dyadic(dest, source, dest + source),                  // FADD
        0x23 => dyadic(dest, source, dest * source),                  // FMUL
        0x24 => dyadic_div(dest, source, round_single(dest / source)), // FSGLDIV
        0x25 => dyadic(dest, source, frem(dest, source)),             // FREM
        0x26 => dyadic(dest, source, fscale(dest, source)),           // FSCALE
        0x27 => dyadic(dest, source, round_single(dest * source)),    // FSGLMUL
        0x28 => dyadic(dest, source, dest - source),                  // FSUB
        0x38 => (dest - source, FpuExceptions(0)),                    // FCMP (caller discards, keeps dest)
        0x3A => (source.clone(), FpuExceptions(0)),                   // FTST (caller discards, keeps dest)
        _ => (source.clone(), FpuExceptions(0)),
    }
}

fn monadic(source: &Float, result: Float) -> (Float, FpuExceptions) {
    let flags = monadic_flags(source, &result);
    (result, flags)
}

fn dyadic(dest: &Float, source: &Float, result: Float) -> (Float, FpuExceptions) {
    let flags = dyadic_flags(dest, source, &result);
    (result, flags)
}

fn dyadic_div(dest: &Float, source: &Float, result: Float) -> (Float, FpuExceptions) {
    let flags = div_flags(dest, source, &result);
    (result, flags)
}

fn monadic_flags(source: &Float, result: &Float) -> FpuExceptions {
    if result.is_nan() {
        FpuExceptions(0).with_operr(true)
    } else if result.is_inf() && !source.is_inf() {
        FpuExceptions(0).with_ovfl(true)
    } else if result.is_zero() && !source.is_zero() {
        FpuExceptions(0).with_unfl(true)
    } else {
        FpuExceptions(0)
    }
}

fn dyadic_flags(dest: &Float, source: &Float, result: &Float) -> FpuExceptions {
    if result.is_nan() {
        FpuExceptions(0).with_operr(true)
    } else if result.is_inf() && !dest.is_inf() && !source.is_inf() {
        FpuExceptions(0).with_ovfl(true)
    } else if result.is_zero() && !dest.is_zero() && !source.is_zero() {
        FpuExceptions(0).with_unfl(true)
    } else {
        FpuExceptions(0)
    }
}

/// Divide-specific classification: DZ takes priority over the generic
/// OVFL/UNFL checks when the divisor is zero and the dividend is a finite
/// nonzero, non-NaN value (IEEE "divide by zero", not a mere infinity
/// propagating through an already-infinite or already-zero dividend).
fn div_flags(dest: &Float, source: &Float, result: &Float) -> FpuExceptions {
    if source.is_zero() && !dest.is_zero() && !dest.is_nan() && !dest.is_inf() {
        FpuExceptions(0).with_dz(true)
    } else {
        dyadic_flags(dest, source, result)
    }
}

fn round_single(v: Float) -> Float {
    use crate::semantics::SEMANTICS_SINGLE;
    v.cast(SEMANTICS_SINGLE).cast(SEMANTICS_EXTENDED)
}

fn get_exp(a: &Float) -> Float {
    konst(a.get_exp() as f64)
}

fn get_man(a: &Float) -> Float {
    let exp = a.get_exp();
    konst(a.as_f64() / 2f64.powi(exp))
}

fn fmod(dest: &Float, source: &Float) -> Float {
    let q = (dest / source).as_f64().trunc();
    dest - &(source * &konst(q))
}

fn frem(dest: &Float, source: &Float) -> Float {
    let q = (dest / source).as_f64().round();
    dest - &(source * &konst(q))
}

fn fscale(dest: &Float, source: &Float) -> Float {
    let n = source.as_f64().trunc();
    dest * &konst(2f64.powf(n))
}

macro_rules! via_f64 {
    ($name:ident, $f:expr) => {
        fn $name(a: &Float) -> Float {
            if a.is_nan() {
                return a.clone();
            }
            konst($f(a.as_f64()))
        }
    };
}

via_f64!(sin, f64::sin);
via_f64!(cos, f64::cos);
via_f64!(tan, f64::tan);
via_f64!(asin, f64::asin);
via_f64!(acos, f64::acos);
via_f64!(atan, f64::atan);
via_f64!(sinh, f64::sinh);
via_f64!(cosh, f64::cosh);
via_f64!(tanh, f64::tanh);
via_f64!(atanh, f64::atanh);
via_f64!(etox, f64::exp);
via_f64!(exp_m1, f64::exp_m1);

fn twotox(a: &Float) -> Float {
    if a.is_nan() {
        return a.clone();
    }
    konst(2f64.powf(a.as_f64()))
}

fn log_base(a: &Float, base: f64) -> Float {
    if a.is_nan() {
        return a.clone();
    }
    konst(a.as_f64().log(base))
}

fn log_n(a: &Float, _base: f64) -> Float {
    if a.is_nan() {
        return a.clone();
    }
    konst(a.as_f64().ln_1p())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fadd_matches_operator() {
        let a = konst(1.5);
        let b = konst(2.25);
        assert_eq!(apply(0x22, &b, &a, RoundingPrecision::Extended).value.as_f64(), 3.75);
    }

    #[test]
    fn fsqrt_of_four_is_two() {
        let result = apply(0x04, &konst(4.0), &konst(0.0), RoundingPrecision::Extended);
        assert!((result.value.as_f64() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn fabs_clears_sign() {
        let result = apply(0x18, &konst(-3.0), &konst(0.0), RoundingPrecision::Extended);
        assert_eq!(result.value.as_f64(), 3.0);
    }

    #[test]
    fn fdiv_by_zero_is_infinite() {
        let result = apply(0x20, &konst(0.0), &konst(1.0), RoundingPrecision::Extended);
        assert!(result.value.is_inf());
    }

    #[test]
    fn fdiv_by_zero_raises_dz_not_ovfl() {
        let result = apply(0x20, &konst(0.0), &konst(1.0), RoundingPrecision::Extended);
        assert!(result.raised.dz());
        assert!(!result.raised.ovfl());
    }

    #[test]
    fn zero_over_zero_raises_operr_not_dz() {
        let result = apply(0x20, &konst(0.0), &konst(0.0), RoundingPrecision::Extended);
        assert!(result.raised.operr());
        assert!(!result.raised.dz());
    }

    #[test]
    fn single_precision_rounding_raises_inex2() {
        // 1/3 at extended precision is not exactly representable in single.
        let result = apply(0x22, &konst(1.0 / 3.0), &konst(0.0), RoundingPrecision::Single);
        assert!(result.raised.inex2());
    }
}
