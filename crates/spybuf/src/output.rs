use std::io::IsTerminal;
use std::path::PathBuf;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use spybuf_acquire::{AcquisitionSummary, Completion};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct ChannelFile {
    pub channel: u32,
    pub path: PathBuf,
    pub samples: u64,
}

#[derive(Serialize)]
struct SummaryOutput<'a> {
    mode: &'static str,
    request_id: Option<&'a str>,
    channels: &'a [u32],
    samples_per_waveform: u32,
    expected_waveforms: u64,
    waveforms_written: u64,
    chunks: u64,
    discarded: u64,
    credit: Option<usize>,
    complete: bool,
    files: &'a [ChannelFile],
}

fn completion_label(completion: &Completion) -> String {
    match completion {
        Completion::Complete => "complete".to_string(),
        Completion::PartialDelivery { expected, received } => {
            format!("partial ({received} of {expected})")
        }
    }
}

pub fn print_summary(summary: &AcquisitionSummary, files: &[ChannelFile], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SummaryOutput {
                mode: summary.mode.as_str(),
                request_id: summary.request_id.as_deref(),
                channels: &summary.channels,
                samples_per_waveform: summary.samples_per_waveform,
                expected_waveforms: summary.expected_waveforms,
                waveforms_written: summary.waveforms_written,
                chunks: summary.chunks,
                discarded: summary.discarded,
                credit: summary.credit,
                complete: summary.is_complete(),
                files,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CHANNEL", "SAMPLES", "FILE"]);
            for file in files {
                table.add_row(vec![
                    file.channel.to_string(),
                    file.samples.to_string(),
                    file.path.display().to_string(),
                ]);
            }
            println!(
                "{} acquisition: {} of {} waveforms in {} chunk(s), {}",
                summary.mode,
                summary.waveforms_written,
                summary.expected_waveforms,
                summary.chunks,
                completion_label(&summary.completion)
            );
            if let Some(id) = &summary.request_id {
                println!("request {id}, credit {}", summary.credit.unwrap_or(0));
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "mode={} waveforms={}/{} chunks={} discarded={} status={}",
                summary.mode,
                summary.waveforms_written,
                summary.expected_waveforms,
                summary.chunks,
                summary.discarded,
                completion_label(&summary.completion)
            );
        }
    }
}

#[derive(Serialize)]
pub struct InspectOutput {
    pub path: PathBuf,
    pub samples_per_waveform: usize,
    pub waveforms: usize,
    pub min: Option<u16>,
    pub max: Option<u16>,
    pub mean_waveform: Vec<f64>,
}

pub fn print_inspect(out: &InspectOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("File:       {}", out.path.display());
            println!("Waveforms:  {} x {} samples", out.waveforms, out.samples_per_waveform);
            match (out.min, out.max) {
                (Some(min), Some(max)) => println!("Range:      {min}..={max}"),
                _ => println!("Range:      empty"),
            }
            let head = out
                .mean_waveform
                .iter()
                .take(8)
                .map(|v| format!("{v:.1}"))
                .collect::<Vec<_>>()
                .join(" ");
            println!("Mean head:  {head}");
        }
    }
}

#[derive(Serialize)]
struct CommandOutput<'a> {
    command: &'a str,
    success: bool,
    message: &'a str,
}

pub fn print_command(command: &str, message: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = CommandOutput {
                command,
                success: true,
                message,
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => println!("{command}: {message}"),
    }
}
