//! fxpid - Q16.16 Fixed-Point Primitives
//!
//! A signed 32-bit two's-complement value whose low 16 bits are the
//! fraction. Representable range is `[-32768.0, 32767.99998]` with a
//! resolution of 2^-16.
//!
//! # Numeric Contract
//!
//! - Addition, subtraction and negation wrap at 32 bits.
//! - `mul` widens to 64 bits, multiplies, then shifts right by 16
//!   (arithmetic shift, so the result is floored). The narrowing cast wraps.
//! - `div` widens the dividend, shifts it left by 16, then performs integer
//!   division (truncating toward zero). The narrowing cast wraps.
//! - `from_f32`/`from_f64` round half away from zero.
//!
//! None of these saturate or report overflow.
//!
//! ```
//! use fxpid::Fixed32;
//!
//! let gain = Fixed32::from_f32(0.5);
//! let error = Fixed32::from_int(10);
//! assert_eq!(gain * error, Fixed32::from_int(5));
//! ```

use crate::types::{FRAC_BITS, FRAC_MASK};
use core::fmt;
use core::ops::{Add, AddAssign, Div, Mul, Neg, Sub, SubAssign};
use fixed::types::I16F16;

const SCALE_F64: f64 = (1i64 << FRAC_BITS) as f64;
const SCALE_F32: f32 = (1i64 << FRAC_BITS) as f32;

// ============================================================================
// Fixed32
// ============================================================================

/// Q16.16 fixed-point number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize), serde(transparent))]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct Fixed32(i32);

impl Fixed32 {
    /// 0.0
    pub const ZERO: Self = Self(0);
    /// 1.0
    pub const ONE: Self = Self(1 << FRAC_BITS);
    /// Smallest representable value (-32768.0)
    pub const MIN: Self = Self(i32::MIN);
    /// Largest representable value (~32767.99998)
    pub const MAX: Self = Self(i32::MAX);
    /// One unit in the last place (2^-16)
    pub const DELTA: Self = Self(1);

    /// Wrap raw Q16.16 bits
    #[inline]
    pub const fn from_bits(bits: i32) -> Self {
        Self(bits)
    }

    /// Raw Q16.16 bits
    #[inline]
    pub const fn to_bits(self) -> i32 {
        self.0
    }

    /// Integer to fixed-point (`n << 16`, no range check)
    #[inline]
    pub const fn from_int(n: i32) -> Self {
        Self(n.wrapping_shl(FRAC_BITS))
    }

    /// Integer part, floored (`bits >> 16`)
    #[inline]
    pub const fn to_int(self) -> i32 {
        self.0 >> FRAC_BITS
    }

    /// Float to fixed-point, rounding half away from zero
    ///
    /// Intended for configuration time. Values outside the Q16.16 range
    /// saturate and NaN becomes zero.
    #[inline]
    pub fn from_f32(f: f32) -> Self {
        Self::from_f64(f as f64)
    }

    /// Double to fixed-point, rounding half away from zero
    pub fn from_f64(f: f64) -> Self {
        let scaled = f * SCALE_F64;
        let rounded = if f >= 0.0 { scaled + 0.5 } else { scaled - 0.5 };
        Self(rounded as i32)
    }

    /// Approximate real value, for display and logging
    #[inline]
    pub fn to_f32(self) -> f32 {
        self.0 as f32 / SCALE_F32
    }

    /// Exact real value as `f64`
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE_F64
    }

    /// Fractional bit pattern (`bits & 0xFFFF`)
    #[inline]
    pub const fn frac(self) -> i32 {
        self.0 & FRAC_MASK
    }

    /// Wrapping addition
    #[inline]
    pub const fn wrapping_add(self, rhs: Self) -> Self {
        Self(self.0.wrapping_add(rhs.0))
    }

    /// Wrapping subtraction
    #[inline]
    pub const fn wrapping_sub(self, rhs: Self) -> Self {
        Self(self.0.wrapping_sub(rhs.0))
    }

    /// Wrapping negation
    #[inline]
    pub const fn wrapping_neg(self) -> Self {
        Self(self.0.wrapping_neg())
    }

    /// Rescaling multiply: `(a * b) >> 16` in 64-bit, truncated to 32 bits
    #[inline]
    pub const fn mul(self, rhs: Self) -> Self {
        Self(((self.0 as i64 * rhs.0 as i64) >> FRAC_BITS) as i32)
    }

    /// Rescaling divide: `(a << 16) / b` in 64-bit, truncated to 32 bits
    ///
    /// # Panics
    ///
    /// Panics if `rhs` is zero, like integer division. Use
    /// [`Fixed32::checked_div`] when the divisor is not known to be non-zero.
    #[inline]
    pub const fn div(self, rhs: Self) -> Self {
        Self((((self.0 as i64) << FRAC_BITS) / rhs.0 as i64) as i32)
    }

    /// Rescaling divide, `None` on a zero divisor
    #[inline]
    pub const fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.0 == 0 {
            None
        } else {
            Some(self.div(rhs))
        }
    }

    /// Check for exact zero
    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

// ============================================================================
// Operators
// ============================================================================

impl Add for Fixed32 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        self.wrapping_add(rhs)
    }
}

impl AddAssign for Fixed32 {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        *self = self.wrapping_add(rhs);
    }
}

impl Sub for Fixed32 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self {
        self.wrapping_sub(rhs)
    }
}

impl SubAssign for Fixed32 {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        *self = self.wrapping_sub(rhs);
    }
}

impl Neg for Fixed32 {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        self.wrapping_neg()
    }
}

impl Mul for Fixed32 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        Fixed32::mul(self, rhs)
    }
}

impl Div for Fixed32 {
    type Output = Self;

    #[inline]
    fn div(self, rhs: Self) -> Self {
        Fixed32::div(self, rhs)
    }
}

// ============================================================================
// Conversions
// ============================================================================

impl From<I16F16> for Fixed32 {
    #[inline]
    fn from(value: I16F16) -> Self {
        Self(value.to_bits())
    }
}

impl From<Fixed32> for I16F16 {
    #[inline]
    fn from(value: Fixed32) -> Self {
        I16F16::from_bits(value.0)
    }
}

impl fmt::Display for Fixed32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_f64(), f)
    }
}
