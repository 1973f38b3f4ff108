use serde::Serialize;
use spybuf_acquire::{Simulator, SimulatorConfig};

use crate::cmd::SimulateArgs;
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct ListeningOutput {
    endpoint: String,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let simulator = Simulator::bind(&args.bind)
        .map_err(|err| link_error("bind failed", err))?
        .with_config(SimulatorConfig {
            deliver_limit: args.deliver_limit,
            noise: args.noise,
            fail_with: args.fail_with,
        });

    // First stdout line announces the bound endpoint, so port 0 is usable.
    let endpoint = simulator.endpoint().to_string();
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string(&ListeningOutput { endpoint }).unwrap_or_else(|_| "{}".to_string())
        ),
        OutputFormat::Table | OutputFormat::Pretty => println!("listening on {endpoint}"),
    }

    simulator.serve(args.sessions);
    Ok(SUCCESS)
}
