//! Delaymeter - audio delay measurement between two inputs
//!
//! Entry point for the command line meter.

use anyhow::{bail, Result};
use crossbeam_channel::{bounded, select, tick};
use delaymeter::capture::{list_input_devices, DeviceCapture, Simulation, SimulationConfig};
use delaymeter::config::AppConfig;
use delaymeter::{DelayMeter, MeasurementResult, OffsetError, OffsetSink};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Command line options layered over the stored config
#[derive(Debug, Default)]
struct Options {
    reference: Option<String>,
    target: Option<String>,
    sample_rate: Option<u32>,
    window_ms: Option<u32>,
    max_lag_ms: Option<u32>,
    interval_secs: Option<u64>,
    simulate_delay_ms: Option<f64>,
    count: Option<u64>,
    debug: bool,
    json: bool,
    apply: bool,
    save_config: bool,
}

/// Outcome of argument parsing
enum Command {
    Run(Options),
    List,
    Version,
    Help,
}

/// Prints the applied offset; stands in for a playback sync control
#[derive(Debug, Default)]
struct ConsoleOffsetSink {
    current_ns: Option<i64>,
}

impl OffsetSink for ConsoleOffsetSink {
    fn apply_sync_offset(&mut self, offset_ns: i64) -> Result<(), OffsetError> {
        if self.current_ns == Some(offset_ns) {
            return Ok(());
        }
        println!("Sync offset set to {} ns", offset_ns);
        self.current_ns = Some(offset_ns);
        Ok(())
    }
}

/// Producers kept alive for the duration of the run
enum Source {
    Devices(DeviceCapture),
    Simulated(Simulation),
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("delaymeter=info".parse()?)
                .add_directive("delaymeter_core=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args) {
        Ok(Command::Run(options)) => run(options),
        Ok(Command::List) => list_devices(),
        Ok(Command::Version) => {
            println!(
                "delaymeter {} (built {})",
                delaymeter::VERSION,
                delaymeter_core::BUILD_DATE
            );
            Ok(())
        }
        Ok(Command::Help) => {
            print_help();
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help();
            std::process::exit(2);
        }
    }
}

fn parse_args(args: &[String]) -> Result<Command> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| -> Result<String> {
            match iter.next() {
                Some(v) => Ok(v.clone()),
                None => bail!("{} requires a value", flag),
            }
        };

        match arg.as_str() {
            "--list" | "-l" => return Ok(Command::List),
            "--version" | "-v" => return Ok(Command::Version),
            "--help" | "-h" => return Ok(Command::Help),
            "--reference" | "-r" => options.reference = Some(value(arg)?),
            "--target" | "-t" => options.target = Some(value(arg)?),
            "--sample-rate" => options.sample_rate = Some(parse_number(arg, &value(arg)?)?),
            "--window-ms" => options.window_ms = Some(parse_number(arg, &value(arg)?)?),
            "--max-lag-ms" => options.max_lag_ms = Some(parse_number(arg, &value(arg)?)?),
            "--interval-secs" => options.interval_secs = Some(parse_number(arg, &value(arg)?)?),
            "--simulate-delay-ms" => {
                options.simulate_delay_ms = Some(parse_number(arg, &value(arg)?)?)
            }
            "--count" | "-n" => options.count = Some(parse_number(arg, &value(arg)?)?),
            "--debug" => options.debug = true,
            "--json" => options.json = true,
            "--apply" => options.apply = true,
            "--save-config" => options.save_config = true,
            other => bail!("Unknown argument: {}", other),
        }
    }

    Ok(Command::Run(options))
}

fn parse_number<T: std::str::FromStr>(flag: &str, value: &str) -> Result<T> {
    match value.parse() {
        Ok(n) => Ok(n),
        Err(_) => bail!("Invalid value for {}: {}", flag, value),
    }
}

fn print_help() {
    println!("Usage: delaymeter [OPTIONS]");
    println!();
    println!("Options:");
    println!("  -l, --list                  List available input devices");
    println!("  -r, --reference NAME        Reference input device (default: system input)");
    println!("  -t, --target NAME           Target input device (default: system input)");
    println!("      --sample-rate RATE      Sample rate for both inputs (default: 48000)");
    println!("      --window-ms MS          Analysis window, 200-3000 (default: 1000)");
    println!("      --max-lag-ms MS         Largest delay searched, 50-1500 (default: 500)");
    println!("      --interval-secs N       Seconds between measurements (default: 2)");
    println!("      --simulate-delay-ms MS  Use a simulated source pair with this delay");
    println!("  -n, --count N               Stop after N measurements");
    println!("      --apply                 Apply each valid delay as sync offset");
    println!("      --json                  Print results as JSON lines");
    println!("      --debug                 Log per-measurement diagnostics");
    println!("      --save-config           Store the effective settings");
    println!("  -v, --version               Show version");
    println!("  -h, --help                  Show this help");
    println!();
    println!("Examples:");
    println!("  delaymeter -r \"Mixer Out\" -t \"USB Camera\" --max-lag-ms 300");
    println!("  delaymeter --simulate-delay-ms 42.5 -n 3");
}

fn list_devices() -> Result<()> {
    println!("Scanning for input devices...");
    println!();

    match list_input_devices() {
        Ok(devices) if devices.is_empty() => println!("No input devices found."),
        Ok(devices) => {
            println!("Found {} device(s):", devices.len());
            println!();
            for (i, device) in devices.iter().enumerate() {
                let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
                println!("  {}. {}{}", i + 1, device.name, default_marker);
                println!("     Channels: {} in", device.input_channels);
                if !device.sample_rates.is_empty() {
                    println!("     Sample rates: {:?}", device.sample_rates);
                }
                println!();
            }
        }
        Err(e) => {
            error!("Failed to list devices: {}", e);
            println!("Error: {}", e);
        }
    }

    Ok(())
}

/// Apply command line overrides to the stored config
fn effective_config(mut config: AppConfig, options: &Options) -> AppConfig {
    if options.reference.is_some() {
        config.reference_device = options.reference.clone();
    }
    if options.target.is_some() {
        config.target_device = options.target.clone();
    }
    if let Some(rate) = options.sample_rate {
        config.sample_rate = rate;
    }
    if let Some(window_ms) = options.window_ms {
        config.analysis.window_ms = window_ms;
    }
    if let Some(max_lag_ms) = options.max_lag_ms {
        config.analysis.max_lag_ms = max_lag_ms;
    }
    if let Some(interval) = options.interval_secs {
        config.interval_secs = interval.max(1);
    }
    config.analysis.debug |= options.debug;
    config
}

fn run(options: Options) -> Result<()> {
    let config = effective_config(AppConfig::load(), &options);

    if options.save_config {
        config.save(&AppConfig::path())?;
    }

    let meter = Arc::new(DelayMeter::new(config.sample_rate)?);
    meter.configure(
        config.analysis.window_ms,
        config.analysis.max_lag_ms,
        config.analysis.debug,
    );

    let source = match options.simulate_delay_ms {
        Some(delay_ms) => Source::Simulated(Simulation::start(
            &meter,
            SimulationConfig {
                delay_ms,
                ..SimulationConfig::default()
            },
        )?),
        None => Source::Devices(DeviceCapture::start(
            &meter,
            config.reference_device.as_deref(),
            config.target_device.as_deref(),
        )?),
    };

    if !options.json {
        println!("Delaymeter v{}", delaymeter::VERSION);
        match &source {
            Source::Devices(capture) => {
                println!("Reference: {}", capture.reference_name());
                let state = if capture.target_open() { "" } else { " (unavailable)" };
                println!("Target:    {}{}", capture.target_name(), state);
            }
            Source::Simulated(simulation) => {
                println!(
                    "Simulated source pair, target delayed by {} samples",
                    simulation.delay_samples()
                );
            }
        }
        println!(
            "Window {} ms, max lag {} ms, every {} s. Press Ctrl+C to stop.",
            meter.config().window_ms,
            meter.config().max_lag_ms,
            config.interval_secs
        );
        println!("────────────────────────────────────────");
    }

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = shutdown_tx.try_send(());
    })?;

    let ticker = tick(Duration::from_secs(config.interval_secs));
    let mut sink = ConsoleOffsetSink::default();
    let mut measured = 0u64;

    loop {
        select! {
            recv(ticker) -> _ => {
                let result = meter.measure();
                report(&result, options.json)?;
                measured += 1;

                if options.apply && result.valid {
                    let applied = meter.apply_offset(&mut sink);
                    report(&applied, options.json)?;
                }

                if options.count.is_some_and(|count| measured >= count) {
                    break;
                }
            }
            recv(shutdown_rx) -> _ => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    drop(source);
    if !options.json {
        println!("Stopped after {} measurement(s).", measured);
    }
    Ok(())
}

fn report(result: &MeasurementResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else if result.detail_text.is_empty() {
        println!("[{}] {}", result.time_text(), result.summary_text);
    } else {
        println!(
            "[{}] {} | {}",
            result.time_text(),
            result.summary_text,
            result.detail_text
        );
    }
    Ok(())
}
