//! # fxpid: Q16.16 Fixed-Point PID Control
//!
//! Deterministic, allocation-free closed-loop control for cores without a
//! floating-point unit, or wherever float timing and rounding are
//! unwelcome.
//!
//! ## Layers
//!
//! ### 1. Fixed-point primitives
//!
//! [`Fixed32`] is a Q16.16 value with wrapping add/sub, rescaling
//! multiply/divide and half-away-from-zero float conversion.
//!
//! ### 2. PID core
//!
//! [`FixedPid`] holds gains, sampling interval, integrator, previous error
//! and output bounds. [`FixedPid::calculate`] runs one step.
//!
//! ```
//! use fxpid::prelude::*;
//!
//! let config = PidConfig::new(
//!     Fixed32::from_f32(0.1),
//!     Fixed32::from_f32(0.5),
//!     Fixed32::from_f32(0.01),
//!     Fixed32::from_f32(0.2),
//! )
//! .with_output_limits(Fixed32::from_int(-250), Fixed32::from_int(250));
//!
//! let mut pid = FixedPid::with_config(&config);
//! let bias = pid.calculate(Fixed32::from_int(2500), Fixed32::from_int(1400));
//! assert_eq!(bias, Fixed32::from_int(250));
//! ```
//!
//! ### 3. Loop plumbing
//!
//! [`hal`] traits for sensors, actuators, EEPROM and clocks,
//! [`sim`] emulators for desktop runs, and [`ControlLoop`] tying one tick
//! together.
//!
//! ## Features
//!
//! - `std` (default): serde support, POSIX clock, `test_harness` binary
//! - `defmt-log`: `defmt::Format` on public types

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![warn(missing_docs)]

// Core modules
pub mod types;
pub mod fixed32;
pub mod pid;
pub mod hal;
pub mod sim;
pub mod control;

// Re-exports for convenience
pub use types::*;
pub use fixed32::Fixed32;
pub use pid::{FixedPid, Limits, PidConfig, PidTerms, CONFIG_BYTES};
pub use hal::{Actuator, Clock, Eeprom, Sensor};
pub use control::{ControlLoop, TickReport, load_config, store_config};

/// Prelude - commonly used items
pub mod prelude {
    pub use crate::types::{Error, Result};
    pub use crate::fixed32::Fixed32;
    pub use crate::pid::{FixedPid, Limits, PidConfig};
    pub use crate::hal::{Actuator, Eeprom, Sensor};
    pub use crate::control::ControlLoop;
}

// ============================================================================
// Version
// ============================================================================

/// Major version
pub const VERSION_MAJOR: u32 = 0;
/// Minor version
pub const VERSION_MINOR: u32 = 1;
/// Patch version
pub const VERSION_PATCH: u32 = 0;
/// Version string
pub const VERSION_STRING: &str = "0.1.0";

/// Get version as packed integer (major << 16 | minor << 8 | patch)
pub const fn version() -> u32 {
    (VERSION_MAJOR << 16) | (VERSION_MINOR << 8) | VERSION_PATCH
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(version(), 0x000100);
        assert_eq!(VERSION_STRING, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_independent_controllers_on_threads() {
        let config = PidConfig::new(Fixed32::ONE, Fixed32::ZERO, Fixed32::ZERO, Fixed32::ONE)
            .with_output_limits(Fixed32::from_int(-100), Fixed32::from_int(100));

        let handles: std::vec::Vec<_> = (1..=4)
            .map(|n| {
                std::thread::spawn(move || {
                    let mut pid = FixedPid::with_config(&config);
                    pid.calculate(Fixed32::from_int(n), Fixed32::ZERO)
                })
            })
            .collect();

        for (n, handle) in (1..=4).zip(handles) {
            assert_eq!(handle.join().unwrap(), Fixed32::from_int(n));
        }
    }
}
