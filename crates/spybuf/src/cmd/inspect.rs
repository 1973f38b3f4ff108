use spybuf_acquire::{mean_waveform, read_waveforms};

use crate::cmd::InspectArgs;
use crate::exit::{io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_inspect, InspectOutput, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    if args.samples == 0 {
        return Err(CliError::new(USAGE, "samples per waveform must be at least 1"));
    }

    let waveforms = read_waveforms(&args.path, args.samples)
        .map_err(|err| io_error(&format!("cannot read {}", args.path.display()), err))?;

    let samples = waveforms.iter().flatten().copied();
    let out = InspectOutput {
        path: args.path.clone(),
        samples_per_waveform: args.samples,
        waveforms: waveforms.len(),
        min: samples.clone().min(),
        max: samples.max(),
        mean_waveform: mean_waveform(&waveforms),
    };

    print_inspect(&out, format);
    Ok(SUCCESS)
}
