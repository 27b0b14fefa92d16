use std::process::ExitCode;

use clap::{Parser, Subcommand};
use inquire::{Confirm, Select, Text};
use serialport::{ClearBuffer, DataBits, Parity, SerialPort, StopBits};

use rtd_collector::calibration::{self, CalibrationWriter, Readback, WriteOutcome};
use rtd_collector::clock::{CancelToken, Clock, Duration, StdClock};
use rtd_collector::codec;
use rtd_collector::config::{CalibrationConfig, ModuleConfig, PollConfig};
use rtd_collector::health::{DEFAULT_FAULT_THRESHOLD, FaultPolicy};
use rtd_collector::poll::{self, IterationStatus};
use rtd_collector::register::NUMBER_OF_CHANNELS;
use rtd_collector::transport::ModbusRtu;

const N: usize = NUMBER_OF_CHANNELS;

/// Longest poll session accepted on the command line, 31 days.
const MAX_DURATION_SECS: u64 = 31 * 24 * 60 * 60;

#[derive(Parser)]
#[command(version, about = "Poll and calibrate RTD temperature collector modules over Modbus RTU")]
struct Cli {
    /// Serial port, selected interactively when omitted.
    #[arg(short, long)]
    port: Option<String>,
    #[arg(long, default_value_t = 9600)]
    baud: u32,
    #[arg(long, default_value_t = 0x01)]
    unit_id: u8,
    /// The module can take a while to respond.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
    /// Readings above this (°C) quarantine the channel.
    #[arg(long, default_value_t = DEFAULT_FAULT_THRESHOLD)]
    fault_threshold: f32,
    /// Keep decoding faulted channels and restore them once they read plausibly again.
    #[arg(long)]
    reprobe: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Read all channels at a fixed interval for a fixed duration.
    Poll {
        #[arg(
            long,
            default_value_t = 60,
            value_parser = clap::value_parser!(u64).range(0..=MAX_DURATION_SECS)
        )]
        duration_secs: u64,
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Write temperature corrections (°C, -327.0 to +327.0). Prompts when none are given.
    Calibrate {
        #[arg(long, allow_negative_numbers = true)]
        ch0: Option<f32>,
        #[arg(long, allow_negative_numbers = true)]
        ch1: Option<f32>,
        #[arg(long, allow_negative_numbers = true)]
        ch2: Option<f32>,
        #[arg(long, allow_negative_numbers = true)]
        ch3: Option<f32>,
        /// Skip the confirmation prompt.
        #[arg(short, long)]
        yes: bool,
    },
}

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        // Drop anything left over from an earlier, timed out, exchange.
        self.0
            .clear(ClearBuffer::Input)
            .map_err(|e| IoError(e.into()))?;
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

type Rtu = ModbusRtu<PortWrapper, 128>;

fn select_port(requested: Option<String>) -> Result<String, String> {
    if let Some(port) = requested {
        return Ok(port);
    }
    let ports = serialport::available_ports().map_err(|e| e.to_string())?;
    if ports.is_empty() {
        return Err("No serial ports found!".into());
    }
    let port_names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
    Select::new("Select a serial port:", port_names)
        .prompt()
        .map_err(|e| e.to_string())
}

fn open(cli: &Cli, registers: rtd_collector::register::RegisterMap) -> Result<Rtu, String> {
    let port_name = select_port(cli.port.clone())?;
    println!("Using port: {port_name}");

    let port = serialport::new(&port_name, cli.baud)
        .data_bits(DataBits::Eight)
        .parity(Parity::None)
        .stop_bits(StopBits::One)
        .timeout(std::time::Duration::from_millis(cli.timeout_ms))
        .open()
        .map_err(|e| format!("Failed to open {port_name}: {e}"))?;

    Ok(ModbusRtu::with_registers(
        PortWrapper(port),
        cli.unit_id,
        registers,
    ))
}

/// Only an actual line counts. `Ok(0)` is end of input.
fn stop_requested(read: std::io::Result<usize>) -> bool {
    matches!(read, Ok(n) if n > 0)
}

fn run_poll(rtu: &mut Rtu, module: &ModuleConfig, config: PollConfig) -> ExitCode {
    let cancel = CancelToken::new();
    let mut clock = StdClock::new(cancel.clone());

    // Enter stops the session at the next wait. A closed stdin leaves it running.
    std::thread::spawn(move || {
        let mut line = String::new();
        if stop_requested(std::io::stdin().read_line(&mut line)) {
            cancel.cancel();
        }
    });

    println!(
        "Polling for {}s every {}ms, press Enter to stop",
        config.duration.to_secs(),
        config.interval.to_millis()
    );
    println!("{}", "-".repeat(40));

    let summary = poll::poll::<N, _, _, _>(rtu, &mut clock, &config, module, |record| {
        println!("Time: +{:.1}s", record.at.ticks() as f32 / 1000.0);
        match record.status {
            IterationStatus::TransportFailed => println!("Error reading temperatures"),
            IterationStatus::AllFaulted => println!("No channels remain"),
            IterationStatus::Acquired => {}
        }
        for (channel, reading) in record.channels.iter().enumerate() {
            println!("  CH{channel}: {reading}");
        }
        println!("{}", "-".repeat(40));
    });

    println!(
        "Done: {} iterations, {} failed reads{}",
        summary.iterations,
        summary.transport_failures,
        if summary.cancelled { ", stopped early" } else { "" }
    );
    for (channel, state) in summary.final_states.iter().enumerate() {
        println!("  CH{channel}: {state}");
    }
    ExitCode::SUCCESS
}

/// Ask for a correction per channel. Empty input skips the channel.
fn prompt_corrections() -> Result<Vec<(usize, f32)>, inquire::InquireError> {
    println!("Corrections:");
    println!("* Positive: the reading is low and should increase.");
    println!("* Negative: the reading is high and should decrease.");
    println!("* Range: -327.0°C to +327.0°C, 0.1°C resolution.");
    println!("Press Enter to skip a channel.");

    let mut corrections = Vec::new();
    for channel in 0..N {
        loop {
            let input = Text::new(&format!("CH{channel} correction (°C):")).prompt()?;
            let input = input.trim();
            if input.is_empty() {
                break;
            }
            match input.parse::<f32>() {
                Ok(value) => match codec::encode_correction(value) {
                    Ok(_) => {
                        corrections.push((channel, value));
                        break;
                    }
                    Err(e) => println!("{e}"),
                },
                Err(_) => println!("Enter a number, or nothing to skip"),
            }
        }
    }
    Ok(corrections)
}

fn run_calibrate(
    rtu: &mut Rtu,
    module: &ModuleConfig,
    given: [Option<f32>; N],
    yes: bool,
) -> ExitCode {
    let mut clock = StdClock::default();
    let writer = CalibrationWriter::new(module, CalibrationConfig::default());

    let before = match calibration::read_temperatures::<N, _>(rtu) {
        Ok(temperatures) => temperatures,
        Err(e) => {
            eprintln!("Unable to read temperatures, check the module connection: {e}");
            return ExitCode::FAILURE;
        }
    };
    println!("Current temperatures:");
    for (channel, temperature) in before.iter().enumerate() {
        println!("  CH{channel}: {temperature}");
    }

    let corrections: Vec<(usize, f32)> = if given.iter().any(Option::is_some) {
        given
            .iter()
            .enumerate()
            .filter_map(|(channel, value)| value.map(|v| (channel, v)))
            .collect()
    } else {
        match prompt_corrections() {
            Ok(corrections) => corrections,
            Err(e) => {
                eprintln!("{e}");
                return ExitCode::FAILURE;
            }
        }
    };
    if corrections.is_empty() {
        println!("No corrections entered");
        return ExitCode::SUCCESS;
    }

    let planned = match writer.plan::<N>(&corrections) {
        Ok(planned) => planned,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };
    println!("About to write:");
    for write in &planned {
        println!(
            "  CH{}: {:+.1}°C -> register {:#06X} ({:#06X})",
            write.channel, write.correction, write.address, write.raw
        );
    }
    println!("Note: correction registers are write-only, the written values can't be read back!");

    if !yes {
        let confirmed = Confirm::new("Apply corrections?")
            .with_default(false)
            .prompt()
            .unwrap_or(false);
        if !confirmed {
            println!("Calibration cancelled");
            return ExitCode::SUCCESS;
        }
    }

    let report = writer.write_planned::<N, _, _>(rtu, &mut clock, &planned);
    for (channel, outcome) in report.outcomes.iter().enumerate() {
        match outcome {
            WriteOutcome::Written { address, raw } => {
                println!("  CH{channel}: written, register {address:#06X} = {raw:#06X}")
            }
            WriteOutcome::Failed { address, .. } => {
                println!("  CH{channel}: FAILED writing register {address:#06X}")
            }
            WriteOutcome::Cancelled => println!("  CH{channel}: not written"),
            WriteOutcome::Skipped => {}
        }
    }
    println!(
        "Calibration finished: {}/{} channels",
        report.succeeded(),
        report.requested()
    );

    let settle = writer.config().settle_time;
    println!("Waiting {}s for the module to apply the corrections...", settle.to_secs());
    clock.wait(settle);

    match calibration::read_temperatures::<N, _>(rtu) {
        Ok(after) => {
            if report.readback == Readback::Unsupported {
                println!("Indirect check through the measurement registers:");
            }
            println!("Channel  Before     After      Change");
            for (channel, row) in calibration::compare_readings(&before, &after, &report)
                .iter()
                .enumerate()
            {
                let expected = match row.expected {
                    Some(expected) => format!("(expected {expected:+.1}°C)"),
                    None => "not corrected".to_string(),
                };
                println!(
                    "CH{channel}      {:6.1}°C  {:6.1}°C  {:+5.1}°C {expected}",
                    row.before.celsius(),
                    row.after.celsius(),
                    row.change()
                );
            }
        }
        Err(e) => eprintln!("Unable to read temperatures after calibration: {e}"),
    }

    if report.is_complete() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let module = ModuleConfig::default()
        .with_fault_threshold(cli.fault_threshold)
        .with_fault_policy(if cli.reprobe {
            FaultPolicy::Reprobe
        } else {
            FaultPolicy::Latch
        });

    // Without a transport there is nothing to retry.
    let mut rtu = match open(&cli, module.registers) {
        Ok(rtu) => rtu,
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Command::Poll {
            duration_secs,
            interval_ms,
        } => run_poll(
            &mut rtu,
            &module,
            PollConfig::new(Duration::secs(duration_secs), Duration::millis(interval_ms)),
        ),
        Command::Calibrate {
            ch0,
            ch1,
            ch2,
            ch3,
            yes,
        } => run_calibrate(&mut rtu, &module, [ch0, ch1, ch2, ch3], yes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_stdin_does_not_stop_polling() {
        assert!(!stop_requested(Ok(0)));
        assert!(!stop_requested(Err(std::io::ErrorKind::BrokenPipe.into())));
        assert!(stop_requested(Ok(1)));
    }

    #[test]
    fn duration_is_bounded() {
        let parse = |secs: &str| Cli::try_parse_from(["rtd-collector", "poll", "--duration-secs", secs]);

        assert!(parse("18446744073709551615").is_err());
        assert!(parse((MAX_DURATION_SECS + 1).to_string().as_str()).is_err());

        let cli = parse(MAX_DURATION_SECS.to_string().as_str()).unwrap();
        let Command::Poll { duration_secs, .. } = cli.command else {
            panic!("expected the poll command");
        };
        assert_eq!(Duration::secs(duration_secs).to_secs(), MAX_DURATION_SECS);
    }
}
