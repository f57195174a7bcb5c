use std::env;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use offload_lab::{list_devices, parse_args, run, ReportFormat};

fn main() -> Result<()> {
    init_tracing();
    let config = parse_args(env::args().skip(1))?;

    if config.list_devices {
        let listing = list_devices(config.device)?;
        match config.report {
            ReportFormat::Text => print!("{listing}"),
            ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&listing)?),
        }
        return Ok(());
    }

    let report = run(&config)?;
    print!("{}", report.render(config.report)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
