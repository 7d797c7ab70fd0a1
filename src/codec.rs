//! FP Value Codec: conversions between the 80-bit extended working format
//! and the memory formats an FPU instruction can address.

use anyhow::{bail, Result};
use arpfloat::{BigInt, Float};
use proc_bitfield::bitfield;

use crate::regs::{OperandTag, RoundingMode};
use crate::semantics::SEMANTICS_EXTENDED;
use crate::types::Long;

const EXPONENT_BIAS: i64 = 16383;
const EXPONENT_MAX: u64 = 0x7FFF;

pub const EXTENDED_SIZE: u8 = 12;
pub const DOUBLE_SIZE: u8 = 8;
pub const SINGLE_SIZE: u8 = 4;
pub const LONG_SIZE: u8 = 4;
pub const WORD_SIZE: u8 = 2;
pub const BYTE_SIZE: u8 = 1;
pub const PACKED_SIZE: u8 = 12;

/// Size code carried in bits 12:10 of the arithmetic extra word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeCode {
    LongInt,
    Single,
    Extended,
    PackedStaticK,
    WordInt,
    Double,
    ByteInt,
    PackedDynamicK,
}

impl SizeCode {
    pub fn decode(bits: u8) -> Self {
        match bits & 0b111 {
            0 => Self::LongInt,
            1 => Self::Single,
            2 => Self::Extended,
            3 => Self::PackedStaticK,
            4 => Self::WordInt,
            5 => Self::Double,
            6 => Self::ByteInt,
            _ => Self::PackedDynamicK,
        }
    }

    /// Byte count stepped by predecrement/postincrement addressing.
    /// `a7` selects the word-aligned step used for byte-sized stack accesses.
    pub fn step_bytes(self, a7: bool) -> u8 {
        match self {
            Self::Extended | Self::PackedStaticK | Self::PackedDynamicK => EXTENDED_SIZE,
            Self::Double => DOUBLE_SIZE,
            Self::LongInt | Self::Single => LONG_SIZE,
            Self::WordInt => WORD_SIZE,
            Self::ByteInt => {
                if a7 {
                    WORD_SIZE
                } else {
                    BYTE_SIZE
                }
            }
        }
    }
}

bitfield! {
    /// Raw (storage) bit representation of the 80-bit extended-precision real format.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct BitsExtReal(pub u128): Debug, FromStorage, IntoStorage, DerefStorage {
        /// Mantissa fraction bits.
        pub f: u64 @ 0..=62,

        /// Explicit integer bit.
        pub i: bool @ 63,

        /// Raw 64-bit mantissa (explicit-integer format, no implicit bit).
        pub raw_mantissa: u64 @ 0..=63,

        pub z: u32 [read_only] @ 64..=79,

        /// Biased 15-bit exponent.
        pub e: u64 @ 80..=94,

        pub s: bool @ 95,

        pub low: Long @ 0..=31,
        pub mid: Long @ 32..=63,
        pub high: Long @ 64..=95,
    }
}

impl BitsExtReal {
    pub fn nan(s: bool) -> Self {
        Self::default().with_e(u64::MAX).with_f(u64::MAX).with_s(s).with_i(true)
    }

    pub fn is_nan(self) -> bool {
        self.e() == EXPONENT_MAX && self.f() != 0
    }

    pub fn inf(s: bool) -> Self {
        Self::default().with_e(u64::MAX).with_f(0).with_s(s).with_i(true)
    }

    pub fn is_inf(self) -> bool {
        self.e() == EXPONENT_MAX && self.f() == 0
    }

    pub fn zero(s: bool) -> Self {
        Self::default().with_e(0).with_f(0).with_s(s)
    }

    pub fn is_zero(self) -> bool {
        self.e() == 0 && self.raw_mantissa() == 0
    }

    /// Biased exponent nonzero but explicit-integer bit clear: an UNNORMAL.
    pub fn is_unnormal(self) -> bool {
        self.e() != 0 && self.e() != EXPONENT_MAX && !self.i()
    }

    /// Biased exponent zero with a nonzero mantissa: a DENORMAL.
    pub fn is_denormal(self) -> bool {
        self.e() == 0 && self.raw_mantissa() != 0
    }

    /// Operand tag, mirroring `get_ftag`. `size` is `None` for an
    /// extended-precision operand, `Some(SizeCode::Single | Double)` when the
    /// value was decoded from a narrower memory format (denormal routes to
    /// tag 5 rather than tag 4 in that case).
    pub fn tag(self, size: Option<SizeCode>) -> OperandTag {
        if self.is_zero() {
            OperandTag::Zero
        } else if self.is_unnormal() || self.is_denormal() {
            match size {
                Some(SizeCode::Single | SizeCode::Double) => OperandTag::SglDblDenormal,
                _ => OperandTag::ExtDenormalOrUnnormal,
            }
        } else if self.is_nan() {
            OperandTag::Nan
        } else if self.is_inf() {
            OperandTag::Inf
        } else {
            OperandTag::Normal
        }
    }
}

impl From<&Float> for BitsExtReal {
    fn from(value: &Float) -> Self {
        if value.is_nan() {
            Self::nan(value.is_negative())
        } else if value.is_inf() {
            Self::inf(value.is_negative())
        } else if value.is_zero() {
            Self::zero(value.is_negative())
        } else {
            let biased_exp = value.get_exp() + EXPONENT_BIAS;
            debug_assert!((0..(1 << 15)).contains(&biased_exp));
            Self::default()
                .with_s(value.is_negative())
                .with_raw_mantissa(value.get_mantissa().as_u64())
                .with_e(biased_exp as u64)
        }
    }
}

impl From<BitsExtReal> for Float {
    fn from(value: BitsExtReal) -> Self {
        if value.is_nan() {
            Self::nan(SEMANTICS_EXTENDED, value.s())
        } else if value.is_inf() {
            Self::inf(SEMANTICS_EXTENDED, value.s())
        } else if value.is_zero() {
            Self::zero(SEMANTICS_EXTENDED, value.s())
        } else {
            let unbiased_exp = value.e() as i64 - EXPONENT_BIAS;
            Self::from_parts(
                SEMANTICS_EXTENDED,
                value.s(),
                unbiased_exp,
                BigInt::from_u64(value.raw_mantissa()),
            )
        }
    }
}

/// Decodes a 96-bit extended value from its three memory longs (high, mid, low order).
pub fn extended_from_longs(high: Long, mid: Long, low: Long) -> Float {
    BitsExtReal::default().with_high(high).with_mid(mid).with_low(low).into()
}

/// Encodes an extended value to its three memory longs (high, mid, low order).
pub fn extended_to_longs(value: &Float) -> (Long, Long, Long) {
    let bits = BitsExtReal::from(value);
    (bits.high(), bits.mid(), bits.low())
}

pub fn single_from_bits(raw: Long) -> Float {
    Float::from_f32(f32::from_bits(raw)).cast(SEMANTICS_EXTENDED)
}

pub fn single_to_bits(value: &Float) -> Long {
    value.as_f32().to_bits()
}

pub fn double_from_bits(raw: u64) -> Float {
    Float::from_f64(f64::from_bits(raw)).cast(SEMANTICS_EXTENDED)
}

pub fn double_to_bits(value: &Float) -> u64 {
    value.as_f64().to_bits()
}

fn ieee_tag(exp_zero: bool, exp_max: bool, frac_zero: bool) -> OperandTag {
    if exp_zero && frac_zero {
        OperandTag::Zero
    } else if exp_zero {
        OperandTag::SglDblDenormal
    } else if exp_max && frac_zero {
        OperandTag::Inf
    } else if exp_max {
        OperandTag::Nan
    } else {
        OperandTag::Normal
    }
}

/// Operand tag of a raw single-precision bit pattern, read before it's
/// normalised into the extended working format (which would otherwise hide
/// a denormal behind a perfectly ordinary extended exponent).
pub fn single_tag(raw: Long) -> OperandTag {
    let exp = (raw >> 23) & 0xFF;
    let frac = raw & 0x007F_FFFF;
    ieee_tag(exp == 0, exp == 0xFF, frac == 0)
}

/// Operand tag of a raw double-precision bit pattern; see [`single_tag`].
pub fn double_tag(raw: u64) -> OperandTag {
    let exp = (raw >> 52) & 0x7FF;
    let frac = raw & 0x000F_FFFF_FFFF_FFFF;
    ieee_tag(exp == 0, exp == 0x7FF, frac == 0)
}

/// Sign-extends an 8/16/32-bit two's-complement integer into an extended value.
pub fn integer_from_bits(raw: i64) -> Float {
    if raw < 0 {
        Float::from_u64(SEMANTICS_EXTENDED, raw.unsigned_abs()).neg()
    } else {
        Float::from_u64(SEMANTICS_EXTENDED, raw as u64)
    }
}

/// Converts an extended value to a two's-complement integer, rounding per
/// `rounding` (FPCR.RND) the way the final step of FMOVE.{L,W,B} does.
/// Returns `None` (operand-error territory) if the value doesn't fit in
/// `bits`, otherwise the integer and whether rounding it was inexact
/// (INEX2 territory).
pub fn integer_to_bits(value: &Float, bits: u32, rounding: RoundingMode) -> Option<(i64, bool)> {
    let exact = value.as_f64();
    let rounded = match rounding {
        RoundingMode::Nearest => exact.round_ties_even(),
        RoundingMode::Zero => exact.trunc(),
        RoundingMode::MinusInf => exact.floor(),
        RoundingMode::PlusInf => exact.ceil(),
    };
    let inexact = rounded != exact;
    let v = rounded as i64;
    let (min, max) = match bits {
        8 => (i8::MIN as i64, i8::MAX as i64),
        16 => (i16::MIN as i64, i16::MAX as i64),
        _ => (i32::MIN as i64, i32::MAX as i64),
    };
    if v < min || v > max {
        None
    } else {
        Some((v, inexact))
    }
}

/// Packed-decimal operand: 12 bytes, `SEXP SM` sign/exponent nibbles followed
/// by 16 BCD mantissa digit nibbles (PRM 3.3.2). `arpfloat` has no decimal
/// codec, so this round-trips through `f64` formatting/parsing the way a
/// host that only has IEEE primitives available would.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packed {
    pub bytes: [u8; 12],
}

impl Packed {
    /// Decodes a packed-BCD operand into an extended value.
    pub fn decode(self) -> Result<Float> {
        let w0 = u32::from_be_bytes([self.bytes[0], self.bytes[1], self.bytes[2], self.bytes[3]]);
        let value_sign = w0 & 0x8000_0000 != 0;
        let exp_sign = w0 & 0x4000_0000 != 0;
        let mut exponent: i32 = 0;
        for nibble_shift in [16, 12, 8] {
            let digit = (w0 >> nibble_shift) & 0xF;
            if digit > 9 {
                bail!("invalid BCD exponent digit {digit:#x}");
            }
            exponent = exponent * 10 + digit as i32;
        }
        if exp_sign {
            exponent = -exponent;
        }

        let mut mantissa = String::with_capacity(17);
        let int_digit = (w0 >> 0) & 0xF;
        if int_digit > 9 {
            bail!("invalid BCD integer digit {int_digit:#x}");
        }
        mantissa.push((b'0' + int_digit as u8) as char);
        mantissa.push('.');
        for word in [
            u32::from_be_bytes([self.bytes[4], self.bytes[5], self.bytes[6], self.bytes[7]]),
            u32::from_be_bytes([self.bytes[8], self.bytes[9], self.bytes[10], self.bytes[11]]),
        ] {
            for nibble_shift in (0..32).step_by(4).rev() {
                let digit = (word >> nibble_shift) & 0xF;
                if digit > 9 {
                    bail!("invalid BCD mantissa digit {digit:#x}");
                }
                mantissa.push((b'0' + digit as u8) as char);
            }
        }

        let magnitude: f64 = format!("{mantissa}e{exponent}")
            .parse()
            .map_err(|_| anyhow::anyhow!("malformed packed decimal operand"))?;
        let magnitude = if value_sign { -magnitude } else { magnitude };
        Ok(Float::from_f64(magnitude).cast(SEMANTICS_EXTENDED))
    }

    /// Encodes an extended value to packed-BCD with the given k-factor
    /// (positive: significant digit count; negative, sign-extended from 7
    /// bits: requested decimal exponent digit count, PRM 3.3.2).
    pub fn encode(value: &Float, k_factor: i8) -> Self {
        let digits: i32 = if k_factor > 0 {
            i32::from(k_factor)
        } else {
            17
        };
        let formatted = format!("{:.*e}", (digits as usize).saturating_sub(1), value.as_f64());
        let (mantissa_part, exp_part) = formatted.split_once('e').unwrap_or((&formatted, "0"));
        let negative = mantissa_part.starts_with('-');
        let digits_only: String =
            mantissa_part.chars().filter(char::is_ascii_digit).collect();
        let exponent: i32 = exp_part.parse().unwrap_or(0);

        let mut chars = digits_only.chars();
        let int_digit = chars.next().and_then(|c| c.to_digit(10)).unwrap_or(0);
        let frac: Vec<u32> = chars.filter_map(|c| c.to_digit(10)).collect();

        let mut w0: u32 = if negative { 0x8000_0000 } else { 0 };
        let exp_mag = exponent.unsigned_abs();
        if exponent < 0 {
            w0 |= 0x4000_0000;
        }
        w0 |= (exp_mag / 100 % 10) << 16;
        w0 |= (exp_mag / 10 % 10) << 12;
        w0 |= (exp_mag % 10) << 8;
        w0 |= int_digit;

        let mut mantissa_words = [0u32; 2];
        for (i, digit) in frac.iter().take(16).enumerate() {
            let word_idx = i / 8;
            let nibble_shift = 28 - (i % 8) * 4;
            mantissa_words[word_idx] |= digit << nibble_shift;
        }

        let mut bytes = [0u8; 12];
        bytes[0..4].copy_from_slice(&w0.to_be_bytes());
        bytes[4..8].copy_from_slice(&mantissa_words[0].to_be_bytes());
        bytes[8..12].copy_from_slice(&mantissa_words[1].to_be_bytes());
        Self { bytes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extended_round_trip() {
        let v = Float::from_f64(1.5).cast(SEMANTICS_EXTENDED);
        let (h, m, l) = extended_to_longs(&v);
        let back = extended_from_longs(h, m, l);
        assert_eq!(v.as_f64(), back.as_f64());
    }

    #[test]
    fn single_round_trip() {
        let v = Float::from_f32(3.25).cast(SEMANTICS_EXTENDED);
        assert_eq!(single_from_bits(single_to_bits(&v)).as_f64(), 3.25);
    }

    #[test]
    fn double_round_trip() {
        let v = Float::from_f64(123.456).cast(SEMANTICS_EXTENDED);
        assert_eq!(double_from_bits(double_to_bits(&v)).as_f64(), 123.456);
    }

    #[test]
    fn zero_tag_is_zero() {
        let v = Float::zero(SEMANTICS_EXTENDED, false);
        let bits = BitsExtReal::from(&v);
        assert_eq!(bits.tag(None), OperandTag::Zero);
    }

    #[test]
    fn nan_tag_is_nan() {
        let v = Float::nan(SEMANTICS_EXTENDED, false);
        let bits = BitsExtReal::from(&v);
        assert_eq!(bits.tag(None), OperandTag::Nan);
    }

    #[test]
    fn packed_round_trip_integer() {
        let v = Float::from_f64(42.0).cast(SEMANTICS_EXTENDED);
        let packed = Packed::encode(&v, 3);
        let back = packed.decode().unwrap();
        assert!((back.as_f64() - 42.0).abs() < 1e-9);
    }
}
