//! Presence Player - ultrasonic presence detection with music playback
//!
//! Entry point: loads the config, wires the sensor (real or simulated) to
//! the control loop and runs until Ctrl+C.

use anyhow::{Context, Result};
use presence_player::config::{AppConfig, DEFAULT_CONFIG_PATH};
use presence_player::playback;
use presence_player::sensor::clock::{Clock, SimClock};
use presence_player::sensor::gpio::Gpio;
use presence_player::sensor::sim::{SimEcho, SimGpio};
use presence_player::telemetry::{ConsoleTelemetry, CsvRecorder, Telemetry};
use presence_player::{
    DistanceSampler, Orchestrator, PresenceDetector, PulseTimer, SignalFilter,
};
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Length of one simulated visit cycle
const SIM_CYCLE: Duration = Duration::from_secs(20);

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("presence_player=info".parse().unwrap()),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config_path = PathBuf::from(DEFAULT_CONFIG_PATH);
    let mut simulate = false;
    let mut music_dir: Option<PathBuf> = None;
    let mut log_dir: Option<PathBuf> = None;
    let mut no_audio = false;
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--version" | "-v" => {
                println!("presence-player {}", presence_player::VERSION);
                return Ok(());
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            "--simulate" | "-s" => simulate = true,
            "--no-audio" => no_audio = true,
            "--config" | "-c" | "--music-dir" | "-m" | "--log-dir" => {
                if i + 1 >= args.len() {
                    eprintln!("Error: {} requires a path", args[i]);
                    return Ok(());
                }
                let value = PathBuf::from(&args[i + 1]);
                match args[i].as_str() {
                    "--config" | "-c" => config_path = value,
                    "--music-dir" | "-m" => music_dir = Some(value),
                    _ => log_dir = Some(value),
                }
                i += 2;
                continue;
            }
            arg => {
                eprintln!("Unknown argument: {}", arg);
                print_help();
                return Ok(());
            }
        }
        i += 1;
    }

    let mut config = AppConfig::load(&config_path);
    if let Some(dir) = music_dir {
        config.music_dir = dir;
    }
    if let Some(dir) = log_dir {
        config.log_dir = Some(dir);
    }
    if no_audio {
        config.audio_enabled = false;
    }
    config.validate().context("Invalid configuration")?;

    println!(
        "Presence Player v{} - threshold {} cm, sustain {} ms",
        presence_player::VERSION,
        config.threshold_cm,
        config.sustain_ms
    );
    println!("Press Ctrl+C to stop.");
    println!();

    // Set up Ctrl+C handler
    let cancel = Arc::new(AtomicBool::new(false));
    let c = cancel.clone();
    ctrlc::set_handler(move || {
        c.store(true, Ordering::SeqCst);
    })
    .context("Failed to install Ctrl+C handler")?;

    let ticks = if simulate {
        run_simulated(&config, &cancel)?
    } else {
        run_hardware(&config, &cancel)?
    };

    info!(ticks, "Done");
    Ok(())
}

fn print_help() {
    println!("Usage: presence-player [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -c, --config PATH       Config file (default: {})", DEFAULT_CONFIG_PATH);
    println!("  -s, --simulate          Use a simulated sensor instead of GPIO");
    println!("  -m, --music-dir DIR     Directory with tracks to play");
    println!("      --log-dir DIR       Directory for CSV sensor logs");
    println!("      --no-audio          Log playback events instead of playing");
    println!("  -v, --version           Show version");
    println!("  -h, --help              Show this help");
    println!();
    println!("Examples:");
    println!("  presence-player --music-dir /home/pi/music");
    println!("  presence-player --simulate --no-audio");
}

/// Wire a pulse timer into the control loop and run it until cancelled
fn run_loop<G, C>(timer: PulseTimer<G, C>, config: &AppConfig, cancel: &AtomicBool) -> u64
where
    G: Gpio,
    C: Clock,
{
    let mut telemetry: Vec<Box<dyn Telemetry>> = vec![Box::new(ConsoleTelemetry::new())];
    if let Some(dir) = &config.log_dir {
        match CsvRecorder::create_in(dir) {
            Ok(recorder) => telemetry.push(Box::new(recorder)),
            Err(e) => {
                error!(path = %dir.display(), error = %e, "Could not create sensor log, continuing without it")
            }
        }
    }

    let playback = playback::open(&config.music_dir, config.audio_enabled);

    Orchestrator::new(
        DistanceSampler::new(timer),
        SignalFilter::with_params(config.filter_params()),
        PresenceDetector::with_params(config.threshold_cm, config.sustain()),
        playback,
        telemetry,
    )
    .with_poll_interval(config.poll_interval())
    .run(cancel)
}

#[cfg(feature = "gpio-hardware")]
fn run_hardware(config: &AppConfig, cancel: &AtomicBool) -> Result<u64> {
    use presence_player::sensor::clock::MonotonicClock;
    use presence_player::sensor::gpio::SysfsGpio;

    let timer = PulseTimer::new(SysfsGpio::new(), MonotonicClock::new(), config.sensor_config())
        .context("GPIO setup failed")?;
    Ok(run_loop(timer, config, cancel))
}

#[cfg(not(feature = "gpio-hardware"))]
fn run_hardware(_config: &AppConfig, _cancel: &AtomicBool) -> Result<u64> {
    anyhow::bail!(
        "Built without the `gpio-hardware` feature. Rebuild with `--features gpio-hardware` or pass --simulate"
    )
}

/// Simulated time that also passes in real time while the loop sleeps
struct PacedClock(SimClock);

impl Clock for PacedClock {
    fn now(&self) -> Duration {
        self.0.now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
        self.0.sleep(duration);
    }
}

fn run_simulated(config: &AppConfig, cancel: &AtomicBool) -> Result<u64> {
    info!("Running with a simulated sensor: a visitor walks up every 20 s");

    let clock = SimClock::new();
    let sensor = config.sensor_config();
    let mut rng = rand::thread_rng();
    let gpio = SimGpio::new(clock.clone(), sensor, move |at| {
        let phase = at.as_secs_f64() % SIM_CYCLE.as_secs_f64();
        let base = if (8.0..14.0).contains(&phase) { 60.0 } else { 250.0 };
        SimEcho::at_distance(base + rng.gen_range(-3.0..3.0))
    });

    let timer = PulseTimer::new(gpio, PacedClock(clock), sensor)
        .context("Simulated GPIO setup failed")?;
    Ok(run_loop(timer, config, cancel))
}
