use spybuf_acquire::software_trigger;

use crate::cmd::{parse_duration, TriggerArgs};
use crate::exit::{acquire_error, CliResult, SUCCESS};
use crate::output::{print_command, OutputFormat};

pub fn run(args: TriggerArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let mut link = args.connect.connect()?;

    let message =
        software_trigger(&mut link, timeout).map_err(|err| acquire_error("trigger failed", err))?;

    print_command("DO_SOFTWARE_TRIGGER", &message, format);
    Ok(SUCCESS)
}
