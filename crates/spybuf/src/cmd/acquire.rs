use spybuf_acquire::{
    AcquisitionConfig, AcquisitionEngine, AcquisitionRequest, CancelToken, CreditConfig, FileSinks,
};
use tracing::info;

use crate::cmd::{parse_duration, AcquireArgs};
use crate::exit::{acquire_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE};
use crate::output::{print_summary, ChannelFile, OutputFormat};

const MIB: u64 = 1024 * 1024;

pub fn run(args: AcquireArgs, format: OutputFormat) -> CliResult<i32> {
    let reply_timeout = parse_duration(&args.timeout)?;
    if args.chunk_size == 0 {
        return Err(CliError::new(USAGE, "chunk size must be at least 1"));
    }
    if args.memory_budget_mib == 0 {
        return Err(CliError::new(USAGE, "memory budget must be at least 1 MiB"));
    }

    let request = AcquisitionRequest::new(args.channels.clone(), args.waveforms, args.samples)
        .map_err(|err| acquire_error("invalid request", err))?
        .with_software_trigger(args.software_trigger);

    let config = AcquisitionConfig {
        mode: args.mode.into(),
        chunk_hint: args.chunk_size,
        credit: CreditConfig {
            memory_budget_bytes: args.memory_budget_mib.saturating_mul(MIB),
            ..CreditConfig::default()
        },
        reply_timeout,
        max_message_bytes: args.connect.max_message_bytes()?,
    };
    config
        .check_request(&request)
        .map_err(|err| acquire_error("invalid request", err))?;

    let cancel = CancelToken::new();
    install_ctrlc_handler(cancel.clone())?;

    let mut link = args.connect.connect()?;
    info!(
        endpoint = %args.connect.endpoint,
        identity = %link.identity(),
        session = %link.session(),
        "connected"
    );

    let mut sinks = FileSinks::new(&args.output)
        .with_extension(args.ext.as_str())
        .with_append(args.append);

    let acquisition = AcquisitionEngine::new(&mut link, config)
        .with_cancel(cancel)
        .acquire(&request, &mut sinks)
        .map_err(|err| acquire_error("acquisition failed", err))?;

    let files: Vec<ChannelFile> = acquisition
        .sinks
        .iter()
        .map(|(channel, sink)| ChannelFile {
            channel: *channel,
            path: sink.path().to_path_buf(),
            samples: sink.samples_written(),
        })
        .collect();

    print_summary(&acquisition.summary, &files, format);
    Ok(SUCCESS)
}

fn install_ctrlc_handler(cancel: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || cancel.cancel())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
