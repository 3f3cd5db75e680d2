use clap::{Parser, Subcommand};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::time::Duration;

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum CliCommands {
    /// Scan the fixed candidate list of serial ports for a responsive sensor.
    /// Probes /dev/ttyS0-20, /dev/ttyUSB0-4 and /dev/ttyACM0-4 in that order
    /// and prints the first port that answers a temperature read.
    #[clap(verbatim_doc_comment)]
    Scan {
        /// Timeout for each handshake read during the scan.
        #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
        probe_timeout: Duration,
    },

    /// Connect, optionally calibrate, then poll the sensor continuously.
    /// Shows the diagnostic registers once, runs the selected calibration
    /// sequence and enters the acquisition loop until interrupted (Ctrl+C).
    #[clap(verbatim_doc_comment)]
    Run {
        /// Serial port device name. Auto-discovered when omitted.
        /// Example: "/dev/ttyUSB0".
        #[arg(short, long)]
        device: Option<String>,

        /// Calibration mode (0 = skip, 1, 2 or 3).
        /// Prompted interactively when omitted; an invalid value also falls
        /// back to the interactive prompt.
        #[arg(short, long, verbatim_doc_comment)]
        mode: Option<u8>,

        /// Interval between acquisition cycles (e.g. "1s", "500ms").
        #[arg(long, default_value = "1s", value_parser = humantime::parse_duration)]
        poll_interval: Duration,
    },

    /// Perform a single acquisition cycle and print the reading.
    Read {
        /// Serial port device name. Auto-discovered when omitted.
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Execute one calibration sequence and exit.
    Calibrate {
        /// Calibration mode (0 = skip, 1, 2 or 3).
        #[arg(short, long)]
        mode: u8,

        /// Serial port device name. Auto-discovered when omitted.
        #[arg(short, long)]
        device: Option<String>,
    },

    /// Read and display the diagnostic and calibration registers once.
    Diagnostics {
        /// Serial port device name. Auto-discovered when omitted.
        #[arg(short, long)]
        device: Option<String>,
    },
}

const fn about_text() -> &'static str {
    "Smart EC logger for the BOQU IOT-485-EC4A conductivity sensor (Modbus RTU)."
}

#[derive(Parser, Debug)]
#[command(name="smartec", author, version, about=about_text(), long_about = None, propagate_version = true)]
pub struct CliArgs {
    /// Configure verbosity of logging output.
    /// -v for info, -vv for debug, -vvv for trace. Default is off.
    #[command(flatten)]
    pub verbose: Verbosity<WarnLevel>,

    #[command(subcommand)]
    pub command: CliCommands,

    /// Modbus I/O timeout for read/write operations.
    /// Examples: "1s", "500ms".
    #[arg(global = true, long, default_value = "1s", value_parser = humantime::parse_duration, verbatim_doc_comment)]
    pub timeout: Duration,
}
