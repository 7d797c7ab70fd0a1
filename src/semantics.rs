//! Arithmetic-kernel float semantics. The raw IEEE arithmetic itself is
//! provided by `arpfloat`, which this core treats as a library offering
//! primitive operations, round modes and NaN/denormal predicates over an
//! arbitrary-precision [`arpfloat::Float`].

use arpfloat::{RoundingMode, Semantics};

/// 6888x/68040/68060 single precision float semantics.
pub const SEMANTICS_SINGLE: Semantics = Semantics::new(8, 24, RoundingMode::NearestTiesToEven);

/// 6888x/68040/68060 double precision float semantics.
pub const SEMANTICS_DOUBLE: Semantics = Semantics::new(11, 53, RoundingMode::NearestTiesToEven);

/// 6888x/68040/68060 extended precision float semantics (80-bit working format).
pub const SEMANTICS_EXTENDED: Semantics = Semantics::new(15, 64, RoundingMode::NearestTiesToEven);
