//! fxpid Demo - Closed Loop on Emulated Peripherals
//!
//! Stores the tuning in an emulated EEPROM, reads it back, then drives an
//! emulated ADC toward the setpoint: sample, calculate, bias the input,
//! wait for the next tick.

mod config;

use clap::Parser;
use config::{DemoConfig, DemoError};
use fxpid::hal::posix::SystemClock;
use fxpid::hal::Eeprom;
use fxpid::sim::{AdcEmulator, InputBias, MemEeprom, SimAdc};
use fxpid::{load_config, store_config, ControlLoop, Fixed32, Millivolts, CONFIG_BYTES};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Emulated EEPROM capacity in bytes
const EEPROM_SIZE: usize = 256;

/// Fixed-point PID demo on an emulated ADC
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Stop after this many ticks (0 runs until Ctrl-C)
    #[arg(short, long)]
    ticks: Option<u64>,

    /// Loop period in milliseconds
    #[arg(long)]
    period_ms: Option<u64>,

    /// Target input in millivolts
    #[arg(long)]
    setpoint_mv: Option<i32>,

    /// Initial emulated input in millivolts
    #[arg(long)]
    initial_mv: Option<i32>,

    /// Derive dt from the measured tick period
    #[arg(long)]
    timed: bool,

    /// Log level (trace, debug, info, warn, error), RUST_LOG takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Command line flags win over the config file
fn apply_overrides(config: &mut DemoConfig, args: &Args) {
    if let Some(ticks) = args.ticks {
        config.ticks = ticks;
    }
    if let Some(period_ms) = args.period_ms {
        config.period_ms = period_ms;
    }
    if let Some(setpoint_mv) = args.setpoint_mv {
        config.setpoint_mv = setpoint_mv;
    }
    if let Some(initial_mv) = args.initial_mv {
        config.initial_mv = initial_mv;
    }
    if args.timed {
        config.timed = true;
    }
}

/// Outcome of a demo run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RunSummary {
    ticks: u32,
    saturated_ticks: u32,
    final_mv: Millivolts,
}

async fn run(config: &DemoConfig) -> Result<RunSummary, DemoError> {
    config.check()?;

    // EEPROM init
    let mut eeprom = MemEeprom::<EEPROM_SIZE>::new();
    info!("EEPROM size: {}", eeprom.size());

    store_config(&mut eeprom, config.eeprom_offset, &config.pid_config())?;
    debug!(
        "EEPROM write: {} bytes at {:#06x}",
        CONFIG_BYTES, config.eeprom_offset
    );

    let tuning = load_config(&eeprom, config.eeprom_offset)?;
    info!(
        "PID tuning from EEPROM: kp={} ki={} kd={} dt={} min={} max={}",
        tuning.kp, tuning.ki, tuning.kd, tuning.dt, tuning.output.min, tuning.output.max
    );

    // ADC init
    let emul = AdcEmulator::default();
    let mut adc = SimAdc::new(&emul, config.nsamples)?;
    adc.setup(config.initial_mv)?;
    let mut bias = InputBias::new(&emul);
    info!(
        "ADC ready: {} bit, {} mV reference, {} samples per read",
        emul.resolution(),
        emul.ref_mv(),
        adc.nsamples()
    );

    let mut ctl = ControlLoop::new(&tuning, Fixed32::from_int(config.setpoint_mv));
    let clock = SystemClock::new();

    let mut ticker = interval(Duration::from_millis(config.period_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Main loop
    loop {
        if config.ticks != 0 && u64::from(ctl.ticks()) >= config.ticks {
            break;
        }

        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut shutdown => {
                info!("Interrupted");
                break;
            }
        }

        let result = if config.timed {
            ctl.tick_timed(&clock, &mut adc, &mut bias)
        } else {
            ctl.tick(&mut adc, &mut bias)
        };
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                match ctl.last_fault() {
                    Some(cause) => warn!(steps = ctl.ticks(), "Tick failed: {} ({})", e, cause),
                    None => warn!(steps = ctl.ticks(), "Tick failed: {}", e),
                }
                return Err(e.into());
            }
        };

        info!(
            tick = report.tick,
            "Current temp: {}, Desired temp: {}, motor bias: {}",
            report.measured.to_int(),
            report.setpoint.to_int(),
            report.terms.output
        );
        if report.terms.saturated {
            debug!(
                p = %report.terms.p,
                i = %report.terms.i,
                d = %report.terms.d,
                "Output saturated"
            );
        }
    }

    Ok(RunSummary {
        ticks: ctl.ticks(),
        saturated_ticks: ctl.saturated_ticks(),
        final_mv: emul.last_read_mv(),
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("fxpid demo v{} starting", fxpid::VERSION_STRING);

    let mut config = match &args.config {
        Some(path) => DemoConfig::load(path)?,
        None => DemoConfig::default(),
    };
    apply_overrides(&mut config, &args);

    let summary = run(&config).await?;
    info!(
        "Stopped after {} ticks ({} saturated), last reading {} mV",
        summary.ticks, summary.saturated_ticks, summary.final_mv
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quick(ticks: u64) -> DemoConfig {
        DemoConfig {
            ticks,
            period_ms: 1,
            ..DemoConfig::default()
        }
    }

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "fxpid-demo",
            "--ticks",
            "25",
            "--period-ms",
            "5",
            "--setpoint-mv",
            "1800",
            "--timed",
        ]);
        let mut config = DemoConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.ticks, 25);
        assert_eq!(config.period_ms, 5);
        assert_eq!(config.setpoint_mv, 1800);
        assert_eq!(config.initial_mv, 1500);
        assert!(config.timed);
        assert_eq!(args.log_level, "info");
    }

    #[test]
    fn test_absent_flags_keep_file_values() {
        let args = Args::parse_from(["fxpid-demo"]);
        let mut config = DemoConfig {
            ticks: 7,
            timed: true,
            ..DemoConfig::default()
        };
        apply_overrides(&mut config, &args);

        assert_eq!(config.ticks, 7);
        assert!(config.timed);
    }

    #[tokio::test]
    async fn test_run_settles_at_setpoint() {
        let summary = run(&quick(200)).await.unwrap();

        assert_eq!(summary.ticks, 200);
        assert!(summary.saturated_ticks >= 1);
        assert!(
            (summary.final_mv - 2500).abs() <= 5,
            "settled at {} mV",
            summary.final_mv
        );
    }

    #[tokio::test]
    async fn test_run_rejects_zero_dt() {
        let config = DemoConfig { dt: 0.0, ..quick(1) };
        assert!(matches!(
            run(&config).await,
            Err(DemoError::Control(fxpid::Error::ZeroInterval))
        ));
    }

    #[tokio::test]
    async fn test_run_rejects_bad_sample_count() {
        let config = DemoConfig { nsamples: 0, ..quick(1) };
        assert!(matches!(
            run(&config).await,
            Err(DemoError::Control(fxpid::Error::InvalidArg))
        ));
    }

    #[tokio::test]
    async fn test_run_rejects_offset_past_eeprom() {
        let config = DemoConfig {
            eeprom_offset: EEPROM_SIZE,
            ..quick(1)
        };
        assert!(matches!(
            run(&config).await,
            Err(DemoError::Control(fxpid::Error::OutOfBounds))
        ));
    }
}
