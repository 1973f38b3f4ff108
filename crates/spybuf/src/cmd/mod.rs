use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use spybuf_acquire::{Mode, DEFAULT_CHUNK_HINT, DEFAULT_EXTENSION};
use spybuf_link::{connect_with_config, Link, LinkConfig};

use crate::exit::{link_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod acquire;
pub mod inspect;
pub mod simulate;
pub mod trigger;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire waveforms from the spy buffers into per-channel files.
    Acquire(AcquireArgs),
    /// Fire a software trigger.
    Trigger(TriggerArgs),
    /// Run a simulated device.
    Simulate(SimulateArgs),
    /// Summarize a channel file written by `acquire`.
    Inspect(InspectArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Acquire(args) => acquire::run(args, format),
        Command::Trigger(args) => trigger::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Inspect(args) => inspect::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Device control endpoint (e.g. tcp://10.73.137.104:9000).
    #[arg(long, short = 'e', env = "SPYBUF_ENDPOINT")]
    pub endpoint: String,
    /// Client identity presented to the device.
    #[arg(long, env = "SPYBUF_IDENTITY", default_value = "spybuf-cli")]
    pub identity: String,
    /// Connect and handshake timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
    /// Largest message accepted from the device, in MiB.
    #[arg(long, default_value = "64")]
    pub max_message_mib: u64,
}

impl ConnectArgs {
    pub fn max_message_bytes(&self) -> CliResult<usize> {
        if self.max_message_mib == 0 {
            return Err(CliError::new(USAGE, "message limit must be at least 1 MiB"));
        }
        self.max_message_mib
            .checked_mul(1024 * 1024)
            .and_then(|bytes| usize::try_from(bytes).ok())
            .ok_or_else(|| CliError::new(USAGE, "message limit is too large"))
    }

    pub fn connect(&self) -> CliResult<Link> {
        let config = LinkConfig {
            connect_timeout: parse_duration(&self.connect_timeout)?,
            max_payload_size: self.max_message_bytes()?,
            ..LinkConfig::default()
        };
        connect_with_config(&self.endpoint, &self.identity, &config)
            .map_err(|err| link_error("connect failed", err))
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum ModeArg {
    Legacy,
    Streaming,
}

impl From<ModeArg> for Mode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Legacy => Mode::Legacy,
            ModeArg::Streaming => Mode::Streaming,
        }
    }
}

#[derive(Args, Debug)]
pub struct AcquireArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Acquisition mode.
    #[arg(long, value_enum, default_value = "streaming")]
    pub mode: ModeArg,
    /// Channels to read (comma-separated, 0..=39).
    #[arg(long, short = 'c', value_delimiter = ',', required = true)]
    pub channels: Vec<u32>,
    /// Waveforms per channel.
    #[arg(long, short = 'n', default_value = "1")]
    pub waveforms: u32,
    /// Samples per waveform.
    #[arg(long, short = 'l', default_value = "2048")]
    pub samples: u32,
    /// Fire a software trigger before reading out.
    #[arg(long)]
    pub software_trigger: bool,
    /// Waveforms per streamed chunk.
    #[arg(long, default_value_t = DEFAULT_CHUNK_HINT)]
    pub chunk_size: u32,
    /// Memory budget for buffered chunks, in MiB.
    #[arg(long, default_value = "128")]
    pub memory_budget_mib: u64,
    /// Folder receiving one file per channel.
    #[arg(long, short = 'o', default_value = ".")]
    pub output: PathBuf,
    /// Channel file extension.
    #[arg(long, default_value = DEFAULT_EXTENSION)]
    pub ext: String,
    /// Append to existing channel files instead of truncating them.
    #[arg(long)]
    pub append: bool,
    /// Maximum wait for each reply or chunk (e.g. 30s, 500ms).
    #[arg(long, default_value = "30s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct TriggerArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Maximum wait for the reply (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:9000")]
    pub bind: String,
    /// Exit after serving N client sessions.
    #[arg(long)]
    pub sessions: Option<usize>,
    /// Stop each stream after this many waveforms.
    #[arg(long)]
    pub deliver_limit: Option<u32>,
    /// Interleave unrelated messages with streamed chunks.
    #[arg(long)]
    pub noise: bool,
    /// Refuse every dump with this message.
    #[arg(long, value_name = "MESSAGE")]
    pub fail_with: Option<String>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Channel file to read.
    pub path: PathBuf,
    /// Samples per waveform the file was written with.
    #[arg(long, short = 'l')]
    pub samples: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
