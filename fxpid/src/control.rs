//! fxpid - Control Loop
//!
//! One [`ControlLoop::tick`] is one iteration of the classic embedded
//! loop: sample the process variable, run the controller once, hand the
//! output to the actuator. The caller owns the cadence (timer interrupt,
//! RTOS thread, async interval).
//!
//! Tuning can be persisted in EEPROM with [`store_config`] and read back
//! at boot with [`load_config`].

use crate::fixed32::Fixed32;
use crate::hal::{Actuator, Clock, Eeprom, Sensor};
use crate::pid::{FixedPid, PidConfig, PidTerms, CONFIG_BYTES};
use crate::types::*;

// ============================================================================
// Tick Report
// ============================================================================

/// Outcome of one control loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-log", derive(defmt::Format))]
pub struct TickReport {
    /// Tick number, starting at 1
    pub tick: u32,
    /// Target value
    pub setpoint: Fixed32,
    /// Sampled process variable
    pub measured: Fixed32,
    /// Controller breakdown, including the applied output
    pub terms: PidTerms,
}

// ============================================================================
// Control Loop
// ============================================================================

/// Periodic PID loop over a sensor/actuator pair
#[derive(Debug, Clone)]
pub struct ControlLoop {
    pid: FixedPid,
    setpoint: Fixed32,
    ticks: u32,
    saturated_ticks: u32,
    last_tick_us: Option<TimeUs>,
    last_fault: Option<Error>,
}

impl ControlLoop {
    /// Create loop with a freshly configured controller
    pub fn new(config: &PidConfig, setpoint: Fixed32) -> Self {
        Self {
            pid: FixedPid::with_config(config),
            setpoint,
            ticks: 0,
            saturated_ticks: 0,
            last_tick_us: None,
            last_fault: None,
        }
    }

    /// Controller state
    pub fn pid(&self) -> &FixedPid {
        &self.pid
    }

    /// Mutable controller, e.g. to retune between ticks
    pub fn pid_mut(&mut self) -> &mut FixedPid {
        &mut self.pid
    }

    /// Current target
    pub fn setpoint(&self) -> Fixed32 {
        self.setpoint
    }

    /// Change target
    pub fn set_setpoint(&mut self, setpoint: Fixed32) {
        self.setpoint = setpoint;
    }

    /// Controller steps run, including ticks whose actuator failed
    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Ticks whose output hit a limit
    pub fn saturated_ticks(&self) -> u32 {
        self.saturated_ticks
    }

    /// Cause of the most recent sensor or actuator failure
    ///
    /// [`ControlLoop::tick`] reports failures as [`Error::Sensor`] or
    /// [`Error::Actuator`]; the peripheral's own error is kept here until
    /// the next successful tick.
    pub fn last_fault(&self) -> Option<Error> {
        self.last_fault
    }

    /// Sample, calculate, actuate
    ///
    /// A sensor failure returns before the controller runs, so its state is
    /// unchanged. An actuator failure happens after the state update and
    /// still counts as a tick.
    pub fn tick<S, A>(&mut self, sensor: &mut S, actuator: &mut A) -> Result<TickReport>
    where
        S: Sensor + ?Sized,
        A: Actuator + ?Sized,
    {
        let measured = self.sample(sensor)?;
        self.step_and_apply(measured, actuator)
    }

    /// Like [`ControlLoop::tick`], but sets `dt` from the time since the
    /// previous timed tick
    ///
    /// The configured `dt` is kept on the first timed tick and whenever the
    /// elapsed time is too short to be represented (under 16 us). A sensor
    /// failure leaves both `dt` and the period reference untouched.
    pub fn tick_timed<C, S, A>(
        &mut self,
        clock: &C,
        sensor: &mut S,
        actuator: &mut A,
    ) -> Result<TickReport>
    where
        C: Clock + ?Sized,
        S: Sensor + ?Sized,
        A: Actuator + ?Sized,
    {
        let measured = self.sample(sensor)?;

        let now = clock.time_us();
        if let Some(last) = self.last_tick_us {
            let dt = dt_from_us(now.saturating_sub(last));
            if !dt.is_zero() {
                self.pid.set_dt(dt);
            }
        }
        self.last_tick_us = Some(now);

        self.step_and_apply(measured, actuator)
    }

    fn sample<S>(&mut self, sensor: &mut S) -> Result<Fixed32>
    where
        S: Sensor + ?Sized,
    {
        sensor.read().map_err(|cause| {
            self.last_fault = Some(cause);
            Error::Sensor
        })
    }

    fn step_and_apply<A>(&mut self, measured: Fixed32, actuator: &mut A) -> Result<TickReport>
    where
        A: Actuator + ?Sized,
    {
        let terms = self.pid.step(self.setpoint, measured);

        self.ticks = self.ticks.wrapping_add(1);
        if terms.saturated {
            self.saturated_ticks = self.saturated_ticks.wrapping_add(1);
        }

        if let Err(cause) = actuator.apply(terms.output) {
            self.last_fault = Some(cause);
            return Err(Error::Actuator);
        }
        self.last_fault = None;

        Ok(TickReport {
            tick: self.ticks,
            setpoint: self.setpoint,
            measured,
            terms,
        })
    }
}

/// Convert a period in microseconds to Q16.16 seconds (truncated)
pub fn dt_from_us(us: TimeUs) -> Fixed32 {
    let bits = us.saturating_mul(1 << FRAC_BITS) / 1_000_000;
    Fixed32::from_bits(bits.min(i32::MAX as u64) as i32)
}

// ============================================================================
// Tuning Persistence
// ============================================================================

/// Validate and write `config` at `offset`
pub fn store_config<E>(eeprom: &mut E, offset: usize, config: &PidConfig) -> Result<()>
where
    E: Eeprom + ?Sized,
{
    config.validate()?;
    eeprom.write(offset, &config.encode())
}

/// Read and validate a config previously written by [`store_config`]
pub fn load_config<E>(eeprom: &E, offset: usize) -> Result<PidConfig>
where
    E: Eeprom + ?Sized,
{
    let mut buf = [0u8; CONFIG_BYTES];
    eeprom.read(offset, &mut buf)?;
    PidConfig::decode(&buf)
}
