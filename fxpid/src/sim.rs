//! fxpid - Peripheral Emulators
//!
//! In-memory stand-ins for the ADC and EEPROM a board would provide, so
//! the control loop can run on a desktop or in tests.
//!
//! The emulator state lives in an [`AdcEmulator`] that is shared by
//! reference: [`SimAdc`] samples it, [`InputBias`] drives it. Nothing here
//! is global; every handle is passed explicitly.
//!
//! ```
//! use fxpid::sim::{AdcEmulator, InputBias, SimAdc};
//! use fxpid::hal::{Actuator, Sensor};
//! use fxpid::Fixed32;
//!
//! let emul = AdcEmulator::default();
//! let mut adc = SimAdc::new(&emul, 5).unwrap();
//! adc.setup(1500).unwrap();
//! let measured = adc.read().unwrap();
//!
//! let mut bias = InputBias::new(&emul);
//! bias.apply(Fixed32::from_int(100)).unwrap();
//! assert_eq!(emul.input_mv(), measured.to_int() + 100);
//! ```

use crate::fixed32::Fixed32;
use crate::hal::{check_range, Actuator, Eeprom, Sensor};
use crate::types::*;
use core::cell::Cell;
use heapless::Vec;

// ============================================================================
// ADC Emulator
// ============================================================================

/// Emulated single-channel ADC front end
///
/// Holds the analog input voltage and converts it at a fixed resolution
/// against the internal reference.
#[derive(Debug)]
pub struct AdcEmulator {
    input_mv: Cell<Millivolts>,
    last_read_mv: Cell<Millivolts>,
    ref_mv: Millivolts,
    resolution: u8,
}

impl AdcEmulator {
    /// Create emulator; resolution is capped at 15 bits
    pub const fn new(ref_mv: Millivolts, resolution: u8) -> Self {
        let resolution = if resolution > 15 { 15 } else { resolution };
        Self {
            input_mv: Cell::new(0),
            last_read_mv: Cell::new(0),
            ref_mv,
            resolution,
        }
    }

    /// Set the emulated analog input
    pub fn set_input_mv(&self, mv: Millivolts) {
        self.input_mv.set(mv);
    }

    /// Current emulated analog input
    pub fn input_mv(&self) -> Millivolts {
        self.input_mv.get()
    }

    /// Average returned by the most recent driver read
    pub fn last_read_mv(&self) -> Millivolts {
        self.last_read_mv.get()
    }

    /// Reference voltage
    pub fn ref_mv(&self) -> Millivolts {
        self.ref_mv
    }

    /// Resolution in bits
    pub fn resolution(&self) -> u8 {
        self.resolution
    }

    /// Convert the current input to a raw code
    pub fn sample(&self) -> i16 {
        let full_scale = (1i64 << self.resolution) - 1;
        if self.ref_mv <= 0 {
            return 0;
        }
        let raw = ((self.input_mv.get() as i64) << self.resolution) / self.ref_mv as i64;
        raw.clamp(0, full_scale) as i16
    }

    /// Convert a raw code back to millivolts
    pub fn raw_to_mv(&self, raw: i16) -> Millivolts {
        ((raw as i64 * self.ref_mv as i64) >> self.resolution) as Millivolts
    }

    fn record_read(&self, mv: Millivolts) {
        self.last_read_mv.set(mv);
    }
}

impl Default for AdcEmulator {
    fn default() -> Self {
        Self::new(ADC_REF_INTERNAL_MV, ADC_RESOLUTION)
    }
}

// ============================================================================
// ADC Driver
// ============================================================================

/// ADC driver handle averaging `nsamples` conversions per read
pub struct SimAdc<'a> {
    emul: &'a AdcEmulator,
    nsamples: usize,
    buffer: Vec<i16, ADC_BUFFER_SIZE>,
    ready: bool,
}

impl<'a> SimAdc<'a> {
    /// Create driver; `nsamples` must be in `1..=ADC_BUFFER_SIZE`
    pub fn new(emul: &'a AdcEmulator, nsamples: usize) -> Result<Self> {
        if nsamples == 0 || nsamples > ADC_BUFFER_SIZE {
            return Err(Error::InvalidArg);
        }
        Ok(Self {
            emul,
            nsamples,
            buffer: Vec::new(),
            ready: false,
        })
    }

    /// Invalidate the sample buffer and program the initial input
    pub fn setup(&mut self, initial_mv: Millivolts) -> Result<()> {
        self.buffer.clear();
        while self.buffer.push(INVALID_ADC_VALUE).is_ok() {}
        self.emul.set_input_mv(initial_mv);
        self.ready = true;
        Ok(())
    }

    /// Sample and return the averaged input in millivolts
    pub fn read_mv(&mut self) -> Result<Millivolts> {
        if !self.ready {
            return Err(Error::NotReady);
        }

        self.buffer.clear();
        for _ in 0..self.nsamples {
            self.buffer
                .push(self.emul.sample())
                .map_err(|_| Error::OutOfBounds)?;
        }

        let sum: i64 = self
            .buffer
            .iter()
            .map(|&raw| self.emul.raw_to_mv(raw) as i64)
            .sum();
        let avg = (sum / self.nsamples as i64) as Millivolts;

        self.emul.record_read(avg);
        Ok(avg)
    }

    /// Raw codes from the last read
    pub fn samples(&self) -> &[i16] {
        &self.buffer
    }

    /// Samples averaged per read
    pub fn nsamples(&self) -> usize {
        self.nsamples
    }
}

impl Sensor for SimAdc<'_> {
    fn read(&mut self) -> Result<Fixed32> {
        self.read_mv().map(Fixed32::from_int)
    }
}

// ============================================================================
// Feedback Actuator
// ============================================================================

/// Actuator closing the loop through the emulator
///
/// Sets the next input to the last measurement plus the controller output,
/// i.e. an integrating plant.
pub struct InputBias<'a> {
    emul: &'a AdcEmulator,
}

impl<'a> InputBias<'a> {
    /// Drive `emul`
    pub fn new(emul: &'a AdcEmulator) -> Self {
        Self { emul }
    }
}

impl Actuator for InputBias<'_> {
    fn apply(&mut self, output: Fixed32) -> Result<()> {
        let next = self.emul.last_read_mv().wrapping_add(output.to_int());
        self.emul.set_input_mv(next);
        Ok(())
    }
}

// ============================================================================
// EEPROM
// ============================================================================

/// RAM-backed EEPROM, erased to `0xFF`
#[derive(Debug, Clone)]
pub struct MemEeprom<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> MemEeprom<N> {
    /// Create erased device
    pub const fn new() -> Self {
        Self { data: [0xFF; N] }
    }

    /// Erase every byte to `0xFF`
    pub fn erase(&mut self) {
        self.data = [0xFF; N];
    }

    /// Raw contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl<const N: usize> Default for MemEeprom<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Eeprom for MemEeprom<N> {
    fn size(&self) -> usize {
        N
    }

    fn read(&self, offset: usize, buf: &mut [u8]) -> Result<()> {
        check_range(N, offset, buf.len())?;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        check_range(N, offset, data.len())?;
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }
}
