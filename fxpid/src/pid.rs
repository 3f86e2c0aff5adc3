//! fxpid - Fixed-Point PID Controller
//!
//! Closed-loop control in Q16.16 arithmetic. Each call to
//! [`FixedPid::calculate`] runs the recurrence
//!
//! ```text
//! error      = setpoint - measured
//! integral  += error * dt
//! derivative = (error - prev_error) / dt
//! output     = clamp(kp*error + ki*integral + kd*derivative, min, max)
//! prev_error = error
//! ```
//!
//! There is no anti-windup by default: the integral accumulates
//! unconditionally, also while the output is saturated. An integral clamp
//! can be enabled through [`PidConfig::with_integral_limits`].
//!
//! A zero `dt` drops the derivative term instead of dividing by zero.
//!
//! # Example
//!
//! ```
//! use fxpid::{Fixed32, FixedPid, PidConfig};
//!
//! let config = PidConfig::new(
//!     Fixed32::from_f32(1.0),
//!     Fixed32::ZERO,
//!     Fixed32::ZERO,
//!     Fixed32::from_f32(0.1),
//! )
//! .with_output_limits(Fixed32::from_int(-100), Fixed32::from_int(100));
//!
//! let mut pid = FixedPid::with_config(&config);
//! let out = pid.calculate(Fixed32::from_int(10), Fixed32::ZERO);
//! assert_eq!(out, Fixed32::from_int(10));
//! ```

use crate::fixed32::Fixed32;
use crate::types::*;

// ============================================================================
// Limits
// ============================================================================

/// Inclusive `[min, max]` bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct Limits {
    /// Lower bound
    pub min: Fixed32,
    /// Upper bound
    pub max: Fixed32,
}

impl Limits {
    /// Whole Q16.16 range
    pub const FULL: Limits = Limits::new(Fixed32::MIN, Fixed32::MAX);

    /// Create new bounds
    pub const fn new(min: Fixed32, max: Fixed32) -> Self {
        Self { min, max }
    }

    /// Saturate `value`
    ///
    /// Checks `max` first, so inverted bounds never panic.
    #[inline]
    pub fn clamp(&self, value: Fixed32) -> Fixed32 {
        if value > self.max {
            self.max
        } else if value < self.min {
            self.min
        } else {
            value
        }
    }

    /// Check `min <= max`
    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self::FULL
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// First byte of an encoded config
pub const CONFIG_MAGIC: u8 = 0xF1;

/// Encoding version
pub const CONFIG_VERSION: u8 = 1;

/// Encoded config size in bytes
pub const CONFIG_BYTES: usize = 4 + 8 * 4;

const FLAG_INTEGRAL_LIMITS: u8 = 1 << 0;

/// Controller tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct PidConfig {
    /// Proportional gain
    pub kp: Fixed32,
    /// Integral gain
    pub ki: Fixed32,
    /// Derivative gain
    pub kd: Fixed32,
    /// Sampling interval in seconds
    pub dt: Fixed32,
    /// Output saturation
    pub output: Limits,
    /// Optional integrator clamp (None = reference behavior)
    #[cfg_attr(feature = "std", serde(default))]
    pub integral_limits: Option<Limits>,
}

impl PidConfig {
    /// Create a config with full-range output and no integral clamp
    pub const fn new(kp: Fixed32, ki: Fixed32, kd: Fixed32, dt: Fixed32) -> Self {
        Self {
            kp,
            ki,
            kd,
            dt,
            output: Limits::FULL,
            integral_limits: None,
        }
    }

    /// Tuning used by the ADC demo: 5 Hz loop, output within ±250
    pub fn demo() -> Self {
        Self::new(
            Fixed32::from_f32(0.1),
            Fixed32::from_f32(0.5),
            Fixed32::from_f32(0.01),
            Fixed32::from_f32(0.2),
        )
        .with_output_limits(Fixed32::from_int(-250), Fixed32::from_int(250))
    }

    /// Set output limits
    pub const fn with_output_limits(mut self, min: Fixed32, max: Fixed32) -> Self {
        self.output = Limits::new(min, max);
        self
    }

    /// Set integral limits (anti-windup)
    pub const fn with_integral_limits(mut self, min: Fixed32, max: Fixed32) -> Self {
        self.integral_limits = Some(Limits::new(min, max));
        self
    }

    /// Check the preconditions [`FixedPid::calculate`] relies on
    pub fn validate(&self) -> Result<()> {
        if self.dt.is_zero() {
            return Err(Error::ZeroInterval);
        }
        if !self.output.is_ordered() {
            return Err(Error::InvertedLimits);
        }
        if let Some(limits) = &self.integral_limits {
            if !limits.is_ordered() {
                return Err(Error::InvertedLimits);
            }
        }
        Ok(())
    }

    /// Serialize for non-volatile storage
    ///
    /// Layout: magic, version, flags, checksum, then eight little-endian
    /// words (kp, ki, kd, dt, out min, out max, int min, int max).
    /// The checksum is the XOR of the payload bytes.
    pub fn encode(&self) -> [u8; CONFIG_BYTES] {
        let mut buf = [0u8; CONFIG_BYTES];
        let integral = self.integral_limits.unwrap_or(Limits::FULL);
        let words = [
            self.kp,
            self.ki,
            self.kd,
            self.dt,
            self.output.min,
            self.output.max,
            integral.min,
            integral.max,
        ];
        for (chunk, word) in buf[4..].chunks_exact_mut(4).zip(words.iter()) {
            chunk.copy_from_slice(&word.to_bits().to_le_bytes());
        }

        buf[0] = CONFIG_MAGIC;
        buf[1] = CONFIG_VERSION;
        buf[2] = if self.integral_limits.is_some() { FLAG_INTEGRAL_LIMITS } else { 0 };
        buf[3] = checksum(&buf[4..]);
        buf
    }

    /// Deserialize and validate a stored config
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < CONFIG_BYTES {
            return Err(Error::InvalidArg);
        }
        let bytes = &bytes[..CONFIG_BYTES];

        // Erased EEPROM reads back as 0xFF
        if bytes[0] == 0xFF {
            return Err(Error::NotFound);
        }
        if bytes[0] != CONFIG_MAGIC || bytes[1] != CONFIG_VERSION {
            return Err(Error::Corrupt);
        }
        if bytes[3] != checksum(&bytes[4..]) {
            return Err(Error::Corrupt);
        }

        let mut words = [Fixed32::ZERO; 8];
        for (word, chunk) in words.iter_mut().zip(bytes[4..].chunks_exact(4)) {
            let raw = [chunk[0], chunk[1], chunk[2], chunk[3]];
            *word = Fixed32::from_bits(i32::from_le_bytes(raw));
        }

        let integral_limits = if bytes[2] & FLAG_INTEGRAL_LIMITS != 0 {
            Some(Limits::new(words[6], words[7]))
        } else {
            None
        };

        let config = Self {
            kp: words[0],
            ki: words[1],
            kd: words[2],
            dt: words[3],
            output: Limits::new(words[4], words[5]),
            integral_limits,
        };
        config.validate()?;
        Ok(config)
    }
}

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, b| acc ^ b)
}

// ============================================================================
// Step Result
// ============================================================================

/// Breakdown of one controller step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct PidTerms {
    /// Tracking error (setpoint - measured)
    pub error: Fixed32,
    /// Proportional contribution
    pub p: Fixed32,
    /// Integral contribution
    pub i: Fixed32,
    /// Derivative contribution
    pub d: Fixed32,
    /// Saturated output
    pub output: Fixed32,
    /// True if the clamp changed the output
    pub saturated: bool,
}

// ============================================================================
// Controller
// ============================================================================

/// Q16.16 PID controller state
///
/// Plain data owned by the caller. Calls to [`FixedPid::calculate`] on one
/// instance must be serialized, which `&mut self` already enforces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct FixedPid {
    kp: Fixed32,
    ki: Fixed32,
    kd: Fixed32,
    dt: Fixed32,
    integral: Fixed32,
    prev_error: Fixed32,
    max: Fixed32,
    min: Fixed32,
    integral_limits: Option<Limits>,
}

impl FixedPid {
    /// Create a controller with every field zeroed
    ///
    /// Until configured, gains and limits are zero, so the output is zero.
    pub const fn new() -> Self {
        Self {
            kp: Fixed32::ZERO,
            ki: Fixed32::ZERO,
            kd: Fixed32::ZERO,
            dt: Fixed32::ZERO,
            integral: Fixed32::ZERO,
            prev_error: Fixed32::ZERO,
            max: Fixed32::ZERO,
            min: Fixed32::ZERO,
            integral_limits: None,
        }
    }

    /// Create a configured controller with cleared state
    pub fn with_config(config: &PidConfig) -> Self {
        let mut pid = Self::new();
        pid.configure(config);
        pid
    }

    /// Zero every field, tuning included
    pub fn init(&mut self) {
        *self = Self::new();
    }

    /// Apply tuning; integrator and error history are kept
    pub fn configure(&mut self, config: &PidConfig) {
        self.kp = config.kp;
        self.ki = config.ki;
        self.kd = config.kd;
        self.dt = config.dt;
        self.min = config.output.min;
        self.max = config.output.max;
        self.integral_limits = config.integral_limits;
    }

    /// Current tuning
    pub fn config(&self) -> PidConfig {
        PidConfig {
            kp: self.kp,
            ki: self.ki,
            kd: self.kd,
            dt: self.dt,
            output: Limits::new(self.min, self.max),
            integral_limits: self.integral_limits,
        }
    }

    /// Clear integrator and error history, keep tuning
    pub fn reset(&mut self) {
        self.integral = Fixed32::ZERO;
        self.prev_error = Fixed32::ZERO;
    }

    /// Change gains
    pub fn retune(&mut self, kp: Fixed32, ki: Fixed32, kd: Fixed32) {
        self.kp = kp;
        self.ki = ki;
        self.kd = kd;
    }

    /// Change the sampling interval, e.g. from a measured loop period
    pub fn set_dt(&mut self, dt: Fixed32) {
        self.dt = dt;
    }

    /// Change output saturation bounds
    pub fn set_limits(&mut self, min: Fixed32, max: Fixed32) {
        self.min = min;
        self.max = max;
    }

    /// Enable or disable the integral clamp
    pub fn set_integral_limits(&mut self, limits: Option<Limits>) {
        self.integral_limits = limits;
    }

    /// Proportional gain
    pub fn kp(&self) -> Fixed32 {
        self.kp
    }

    /// Integral gain
    pub fn ki(&self) -> Fixed32 {
        self.ki
    }

    /// Derivative gain
    pub fn kd(&self) -> Fixed32 {
        self.kd
    }

    /// Sampling interval
    pub fn dt(&self) -> Fixed32 {
        self.dt
    }

    /// Accumulated `error * dt`
    pub fn integral(&self) -> Fixed32 {
        self.integral
    }

    /// Error seen by the previous call
    pub fn prev_error(&self) -> Fixed32 {
        self.prev_error
    }

    /// Upper output bound
    pub fn max(&self) -> Fixed32 {
        self.max
    }

    /// Lower output bound
    pub fn min(&self) -> Fixed32 {
        self.min
    }

    /// Run one control step and return the saturated output
    pub fn calculate(&mut self, setpoint: Fixed32, measured: Fixed32) -> Fixed32 {
        self.step(setpoint, measured).output
    }

    /// Run one control step and return every term
    pub fn step(&mut self, setpoint: Fixed32, measured: Fixed32) -> PidTerms {
        let error = setpoint - measured;

        let p = self.kp * error;

        self.integral += error * self.dt;
        if let Some(limits) = &self.integral_limits {
            self.integral = limits.clamp(self.integral);
        }
        let i = self.ki * self.integral;

        // dt == 0 contributes no derivative instead of trapping
        let derivative = (error - self.prev_error)
            .checked_div(self.dt)
            .unwrap_or(Fixed32::ZERO);
        let d = self.kd * derivative;

        let raw = p + i + d;
        let output = Limits::new(self.min, self.max).clamp(raw);

        // Unclamped error, so the next derivative sees the true tracking error
        self.prev_error = error;

        PidTerms {
            error,
            p,
            i,
            d,
            output,
            saturated: output != raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(f: f32) -> Fixed32 {
        Fixed32::from_f32(f)
    }

    fn bounded(kp: f32, ki: f32, kd: f32, dt: f32) -> PidConfig {
        PidConfig::new(fx(kp), fx(ki), fx(kd), fx(dt))
            .with_output_limits(Fixed32::from_int(-100), Fixed32::from_int(100))
    }

    #[test]
    fn test_new_is_zeroed() {
        let pid = FixedPid::new();
        assert_eq!(pid, FixedPid::default());
        assert_eq!(pid.integral(), Fixed32::ZERO);
        assert_eq!(pid.prev_error(), Fixed32::ZERO);
        assert_eq!(pid.max(), Fixed32::ZERO);
    }

    #[test]
    fn test_unconfigured_output_is_zero() {
        let mut pid = FixedPid::new();
        // dt is zero too, which must not trap
        let out = pid.calculate(Fixed32::from_int(50), Fixed32::ZERO);
        assert_eq!(out, Fixed32::ZERO);
    }

    #[test]
    fn test_init_clears_everything() {
        let mut pid = FixedPid::with_config(&bounded(1.0, 1.0, 1.0, 1.0));
        pid.calculate(Fixed32::from_int(5), Fixed32::ZERO);
        pid.init();
        assert_eq!(pid, FixedPid::new());
    }

    #[test]
    fn test_proportional_only() {
        let mut pid = FixedPid::with_config(&bounded(1.0, 0.0, 0.0, 0.1));
        let out = pid.calculate(Fixed32::from_int(10), Fixed32::from_int(0));
        assert_eq!(out, Fixed32::from_int(10));
    }

    #[test]
    fn test_integral_accumulation() {
        let mut pid = FixedPid::with_config(&bounded(0.0, 1.0, 0.0, 1.0));
        let mut out = Fixed32::ZERO;
        for _ in 0..20 {
            out = pid.calculate(Fixed32::from_int(1), Fixed32::ZERO);
        }
        assert_eq!(pid.integral(), Fixed32::from_int(20));
        assert_eq!(out, Fixed32::from_int(20));
    }

    #[test]
    fn test_integral_clamped_by_max() {
        let mut pid = FixedPid::with_config(&bounded(0.0, 1.0, 0.0, 1.0));
        let mut out = Fixed32::ZERO;
        for _ in 0..150 {
            out = pid.calculate(Fixed32::from_int(1), Fixed32::ZERO);
        }
        assert_eq!(out, Fixed32::from_int(100));
        // No anti-windup: the integrator kept going
        assert_eq!(pid.integral(), Fixed32::from_int(150));
    }

    #[test]
    fn test_derivative_zero_on_repeated_error() {
        let mut pid = FixedPid::with_config(&bounded(0.0, 0.0, 1.0, 1.0));
        let first = pid.calculate(Fixed32::from_int(7), Fixed32::from_int(4));
        assert_eq!(first, Fixed32::from_int(3));
        let second = pid.calculate(Fixed32::from_int(7), Fixed32::from_int(4));
        assert_eq!(second, Fixed32::ZERO);
    }

    #[test]
    fn test_derivative_scales_with_dt() {
        let mut pid = FixedPid::with_config(&bounded(0.0, 0.0, 1.0, 0.5));
        let out = pid.calculate(Fixed32::from_int(2), Fixed32::ZERO);
        // (2 - 0) / 0.5
        assert_eq!(out, Fixed32::from_int(4));
    }

    #[test]
    fn test_saturation_boundaries() {
        let mut pid = FixedPid::with_config(&bounded(10.0, 0.0, 0.0, 1.0));
        let high = pid.calculate(Fixed32::from_int(30), Fixed32::ZERO);
        assert_eq!(high, Fixed32::from_int(100));
        let low = pid.calculate(Fixed32::from_int(-30), Fixed32::ZERO);
        assert_eq!(low, Fixed32::from_int(-100));
    }

    #[test]
    fn test_prev_error_is_unclamped() {
        let mut pid = FixedPid::with_config(&bounded(10.0, 0.0, 0.0, 1.0));
        let terms = pid.step(Fixed32::from_int(500), Fixed32::ZERO);
        assert!(terms.saturated);
        assert_eq!(terms.output, Fixed32::from_int(100));
        assert_eq!(pid.prev_error(), Fixed32::from_int(500));
    }

    #[test]
    fn test_zero_dt_skips_derivative() {
        let mut pid = FixedPid::with_config(&bounded(1.0, 1.0, 1.0, 0.0));

        let terms = pid.step(Fixed32::from_int(5), Fixed32::ZERO);
        assert_eq!(terms.d, Fixed32::ZERO);
        assert_eq!(terms.i, Fixed32::ZERO);
        assert_eq!(terms.output, Fixed32::from_int(5));
        assert_eq!(pid.integral(), Fixed32::ZERO);
        assert_eq!(pid.prev_error(), Fixed32::from_int(5));
    }

    #[test]
    fn test_inverted_limits_prefer_max() {
        let mut pid = FixedPid::with_config(
            &PidConfig::new(fx(1.0), Fixed32::ZERO, Fixed32::ZERO, fx(1.0))
                .with_output_limits(Fixed32::from_int(10), Fixed32::from_int(-10)),
        );
        assert_eq!(pid.calculate(Fixed32::from_int(50), Fixed32::ZERO), Fixed32::from_int(-10));
        assert_eq!(pid.calculate(Fixed32::from_int(-10), Fixed32::ZERO), Fixed32::from_int(10));
    }

    #[test]
    fn test_error_subtraction_wraps() {
        let mut pid = FixedPid::with_config(&bounded(1.0, 0.0, 0.0, 1.0));
        let terms = pid.step(Fixed32::MAX, Fixed32::from_int(-1));
        assert_eq!(terms.error, Fixed32::MAX.wrapping_add(Fixed32::from_int(1)));
    }

    #[test]
    fn test_integral_limits_extension() {
        let config = bounded(0.0, 1.0, 0.0, 1.0)
            .with_integral_limits(Fixed32::from_int(-5), Fixed32::from_int(5));
        let mut pid = FixedPid::with_config(&config);
        for _ in 0..10 {
            pid.calculate(Fixed32::from_int(1), Fixed32::ZERO);
        }
        assert_eq!(pid.integral(), Fixed32::from_int(5));

        // Unwinds immediately once the error flips
        let out = pid.calculate(Fixed32::from_int(-1), Fixed32::ZERO);
        assert_eq!(out, Fixed32::from_int(4));
    }

    #[test]
    fn test_reset_keeps_tuning() {
        let config = bounded(0.5, 0.25, 0.125, 0.1);
        let mut pid = FixedPid::with_config(&config);
        pid.calculate(Fixed32::from_int(3), Fixed32::ZERO);
        pid.reset();
        assert_eq!(pid.integral(), Fixed32::ZERO);
        assert_eq!(pid.prev_error(), Fixed32::ZERO);
        assert_eq!(pid.config(), config);
    }

    #[test]
    fn test_setters_keep_state() {
        let mut pid = FixedPid::with_config(&bounded(0.0, 1.0, 0.0, 1.0));
        pid.calculate(Fixed32::from_int(3), Fixed32::ZERO);

        pid.retune(fx(2.0), fx(1.0), Fixed32::ZERO);
        pid.set_dt(fx(0.5));
        pid.set_limits(Fixed32::from_int(-4), Fixed32::from_int(4));
        assert_eq!(pid.kp(), fx(2.0));
        assert_eq!(pid.dt(), fx(0.5));
        assert_eq!(pid.min(), Fixed32::from_int(-4));
        assert_eq!(pid.integral(), Fixed32::from_int(3));

        // p = 2, integral = 3 + 0.5 = 3.5, sum clamped to 4
        let terms = pid.step(Fixed32::from_int(1), Fixed32::ZERO);
        assert_eq!(terms.p, Fixed32::from_int(2));
        assert_eq!(terms.i, fx(3.5));
        assert_eq!(terms.output, Fixed32::from_int(4));

        pid.set_integral_limits(Some(Limits::new(Fixed32::ZERO, Fixed32::ONE)));
        pid.calculate(Fixed32::from_int(1), Fixed32::ZERO);
        assert_eq!(pid.integral(), Fixed32::ONE);
    }

    #[test]
    fn test_configure_keeps_state() {
        let mut pid = FixedPid::with_config(&bounded(0.0, 1.0, 0.0, 1.0));
        pid.calculate(Fixed32::from_int(2), Fixed32::ZERO);
        pid.configure(&bounded(0.0, 2.0, 0.0, 1.0));
        assert_eq!(pid.integral(), Fixed32::from_int(2));
        assert_eq!(pid.ki(), fx(2.0));
    }

    #[test]
    fn test_validate() {
        assert_eq!(bounded(1.0, 0.0, 0.0, 0.1).validate(), Ok(()));

        let zero_dt = PidConfig::new(fx(1.0), Fixed32::ZERO, Fixed32::ZERO, Fixed32::ZERO);
        assert_eq!(zero_dt.validate(), Err(Error::ZeroInterval));

        let inverted = bounded(1.0, 0.0, 0.0, 0.1)
            .with_output_limits(Fixed32::from_int(1), Fixed32::from_int(-1));
        assert_eq!(inverted.validate(), Err(Error::InvertedLimits));

        let bad_integral = bounded(1.0, 0.0, 0.0, 0.1)
            .with_integral_limits(Fixed32::from_int(1), Fixed32::from_int(-1));
        assert_eq!(bad_integral.validate(), Err(Error::InvertedLimits));
    }

    #[test]
    fn test_demo_config() {
        let config = PidConfig::demo();
        assert_eq!(config.dt.to_bits(), 13107);
        assert_eq!(config.kp.to_bits(), 6554);
        assert_eq!(config.ki.to_bits(), 32768);
        assert_eq!(config.kd.to_bits(), 655);
        assert_eq!(config.output.max, Fixed32::from_int(250));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_encode_decode() {
        let config = PidConfig::demo()
            .with_integral_limits(Fixed32::from_int(-20), Fixed32::from_int(20));
        let bytes = config.encode();
        assert_eq!(bytes[0], CONFIG_MAGIC);
        assert_eq!(PidConfig::decode(&bytes), Ok(config));

        let plain = PidConfig::demo();
        assert_eq!(PidConfig::decode(&plain.encode()), Ok(plain));
    }

    #[test]
    fn test_decode_rejects_bad_records() {
        let erased = [0xFFu8; CONFIG_BYTES];
        assert_eq!(PidConfig::decode(&erased), Err(Error::NotFound));

        assert_eq!(PidConfig::decode(&[CONFIG_MAGIC; 4]), Err(Error::InvalidArg));

        let mut flipped = PidConfig::demo().encode();
        flipped[10] ^= 0x01;
        assert_eq!(PidConfig::decode(&flipped), Err(Error::Corrupt));

        let mut wrong_version = PidConfig::demo().encode();
        wrong_version[1] = CONFIG_VERSION + 1;
        assert_eq!(PidConfig::decode(&wrong_version), Err(Error::Corrupt));

        let zero_dt = PidConfig::new(fx(1.0), Fixed32::ZERO, Fixed32::ZERO, Fixed32::ZERO);
        assert_eq!(PidConfig::decode(&zero_dt.encode()), Err(Error::ZeroInterval));
    }
}
