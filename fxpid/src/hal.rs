//! fxpid - Hardware Abstraction Layer
//!
//! The controller only sees scalars. These traits are the seams between
//! the control loop and the board:
//! - Measurement source ([`Sensor`])
//! - Actuator sink ([`Actuator`])
//! - Non-volatile tuning storage ([`Eeprom`])
//! - Time base ([`Clock`])
//!
//! # Implementing a Sensor
//!
//! ```ignore
//! struct ThermocoupleAdc { /* peripheral handle */ }
//!
//! impl Sensor for ThermocoupleAdc {
//!     fn read(&mut self) -> Result<Fixed32> {
//!         let mv = self.convert()?;
//!         Ok(Fixed32::from_int(mv))
//!     }
//! }
//! ```

use crate::fixed32::Fixed32;
use crate::types::*;

// ============================================================================
// Peripheral Traits
// ============================================================================

/// Process variable source
pub trait Sensor {
    /// Sample the process variable, in the same scale as the setpoint
    fn read(&mut self) -> Result<Fixed32>;
}

/// Control output sink
pub trait Actuator {
    /// Apply a saturated controller output
    fn apply(&mut self, output: Fixed32) -> Result<()>;
}

/// Byte-addressed non-volatile memory
pub trait Eeprom {
    /// Capacity in bytes
    fn size(&self) -> usize;

    /// Read `buf.len()` bytes starting at `offset`
    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `offset`
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()>;
}

/// Monotonic time base
pub trait Clock {
    /// Get current time in microseconds
    ///
    /// Must be monotonically increasing.
    fn time_us(&self) -> TimeUs;

    /// Get current time in milliseconds
    fn time_ms(&self) -> u32 {
        (self.time_us() / 1000) as u32
    }

    /// Blocking delay
    fn delay_ms(&self, ms: u32);
}

impl<T: Sensor + ?Sized> Sensor for &mut T {
    fn read(&mut self) -> Result<Fixed32> {
        (**self).read()
    }
}

impl<T: Actuator + ?Sized> Actuator for &mut T {
    fn apply(&mut self, output: Fixed32) -> Result<()> {
        (**self).apply(output)
    }
}

/// Bounds check shared by EEPROM implementations
pub fn check_range(size: usize, offset: usize, len: usize) -> Result<()> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(()),
        _ => Err(Error::OutOfBounds),
    }
}

// ============================================================================
// No-op Clock (for testing)
// ============================================================================

/// Manually advanced clock for testing and simulation
#[cfg(any(test, feature = "std"))]
pub struct NoopClock {
    time: core::sync::atomic::AtomicU64,
}

#[cfg(any(test, feature = "std"))]
impl NoopClock {
    /// Create new clock at t = 0
    pub const fn new() -> Self {
        Self {
            time: core::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Advance time (for testing)
    pub fn advance_time(&self, us: u64) {
        self.time.fetch_add(us, core::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(any(test, feature = "std"))]
impl Default for NoopClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "std"))]
impl Clock for NoopClock {
    fn time_us(&self) -> TimeUs {
        self.time.load(core::sync::atomic::Ordering::SeqCst)
    }

    fn delay_ms(&self, ms: u32) {
        self.advance_time(ms as u64 * 1000);
    }
}

// ============================================================================
// POSIX Clock (for std environments)
// ============================================================================

/// Host time base
#[cfg(feature = "std")]
pub mod posix {
    use super::*;
    use std::time::Instant;

    /// Wall-clock time base for desktop runs
    pub struct SystemClock {
        start: Instant,
    }

    impl SystemClock {
        /// Start counting from now
        pub fn new() -> Self {
            Self {
                start: Instant::now(),
            }
        }
    }

    impl Default for SystemClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Clock for SystemClock {
        fn time_us(&self) -> TimeUs {
            self.start.elapsed().as_micros() as TimeUs
        }

        fn delay_ms(&self, ms: u32) {
            std::thread::sleep(std::time::Duration::from_millis(ms as u64));
        }
    }
}
