use anyhow::Context;
use clap::Parser;
use dwplan::{Config, PlanRequest, init_planner, telemetry};
use std::io::Read;

fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = dwplan::config::Args::parse();

    // Load configuration
    let config = Config::load(&args)?;

    // If --validate flag is set, exit successfully after config validation
    if args.validate {
        println!("Configuration is valid.");
        return Ok(());
    }

    telemetry::init_telemetry(config.log_format)?;

    tracing::debug!("{:?}", args);

    let raw = match &args.request {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading request from {path}"))?,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf).context("reading request from stdin")?;
            buf
        }
    };
    let request: PlanRequest = serde_json::from_str(&raw).context("parsing plan request")?;

    let plan = init_planner(config)?.plan(&request)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}
