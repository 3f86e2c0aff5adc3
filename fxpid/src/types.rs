//! fxpid - Base types and configuration
//!
//! Shared constants, the error enum and the `Result` alias used by the
//! HAL, emulator and control-loop layers. The PID arithmetic itself has
//! no error channel.

// ============================================================================
// Configuration Constants
// ============================================================================

/// Fractional bits of the Q16.16 format
pub const FRAC_BITS: u32 = 16;

/// Mask selecting the fractional part of a Q16.16 value
pub const FRAC_MASK: i32 = (1 << FRAC_BITS) - 1;

/// Default emulated ADC resolution (bits)
pub const ADC_RESOLUTION: u8 = 14;

/// Default emulated ADC internal reference (millivolts)
pub const ADC_REF_INTERNAL_MV: i32 = 3300;

/// Capacity of the ADC sample buffer
pub const ADC_BUFFER_SIZE: usize = 6;

/// Sample buffer marker for "not yet converted"
pub const INVALID_ADC_VALUE: i16 = i16::MIN;

/// Default control loop period (milliseconds)
pub const CONTROL_PERIOD_MS: u32 = 10;

// ============================================================================
// Basic Types
// ============================================================================

/// Timestamp in microseconds
pub type TimeUs = u64;

/// Millivolt reading
pub type Millivolts = i32;

// ============================================================================
// Error Types
// ============================================================================

/// Result type for fxpid operations
pub type Result<T> = core::result::Result<T, Error>;

/// Error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub enum Error {
    /// Invalid argument provided
    InvalidArg,
    /// Sampling interval is zero
    ZeroInterval,
    /// Output limits have min > max
    InvertedLimits,
    /// Access outside device storage
    OutOfBounds,
    /// Peripheral used before setup
    NotReady,
    /// No stored record found
    NotFound,
    /// Stored record failed validation
    Corrupt,
    /// Measurement source failed
    Sensor,
    /// Actuator sink failed
    Actuator,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let msg = match self {
            Error::InvalidArg => "invalid argument",
            Error::ZeroInterval => "sampling interval is zero",
            Error::InvertedLimits => "output min is greater than max",
            Error::OutOfBounds => "access outside device storage",
            Error::NotReady => "peripheral not set up",
            Error::NotFound => "no stored record",
            Error::Corrupt => "stored record is corrupt",
            Error::Sensor => "sensor read failed",
            Error::Actuator => "actuator write failed",
        };
        f.write_str(msg)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
