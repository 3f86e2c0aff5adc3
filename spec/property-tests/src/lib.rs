//! fxpid Property-Based Tests
//!
//! Standalone test suite using proptest for arithmetic and controller
//! invariants.
//!
//! # Usage
//!
//! ```bash
//! cargo test -p fxpid-property-tests              # All property tests
//! cargo test -p fxpid-property-tests fixed32      # Q16.16 primitives only
//! cargo test -p fxpid-property-tests pid          # Controller only
//! PROPTEST_CASES=1000 cargo test -p fxpid-property-tests
//! ```
//!
//! # Test Modules
//!
//! - `prop_fixed32`: conversions, identities, wrapping
//! - `prop_pid`: saturation, term isolation, integrator bookkeeping

// Re-export for convenience in tests
pub use fxpid::*;
