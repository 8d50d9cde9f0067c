//! Geometry server binary
//!
//! Usage: `geo_server [config.json] [--log-file PATH]`

use std::io;
use std::path::PathBuf;

use anyhow::Context;
use hiergeo::config::EngineConfig;
use hiergeo::server::{self, logger, ServerState};

struct Args {
    config: Option<PathBuf>,
    log_file: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args { config: None, log_file: None };
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--log-file" => {
                let path = it.next().context("--log-file needs a path")?;
                args.log_file = Some(PathBuf::from(path));
            }
            _ if args.config.is_none() => args.config = Some(PathBuf::from(arg)),
            _ => anyhow::bail!("Unexpected argument '{}'", arg),
        }
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    logger::init(args.log_file.as_deref())?;

    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path).with_context(|| format!("Failed to read config {}", path.display()))?,
        None => EngineConfig::default(),
    }
    .with_env_overrides();

    log::info!("[Server] Starting geometry server ({} threads)", config.threads);
    let mut state = ServerState::new(config);
    let stdin = io::stdin();
    server::serve(stdin.lock(), io::stdout(), &mut state)?;
    log::info!("[Server] Shutting down...");
    Ok(())
}
