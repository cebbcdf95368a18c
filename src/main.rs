use anyhow::Result;
use clap::Parser;
use rflink::cli::Cli;
use rflink::config::Config;
use rflink::policy::TxPolicy;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    }
    .with_env_overrides();

    if let Some(device) = cli.device {
        config.audio.device = Some(device);
    }
    if let Some(dir) = cli.transcript_dir {
        config.log.transcript_dir = Some(dir);
    }
    if cli.rx_only {
        config.tx.policy = TxPolicy::Never;
        config.tx.rts_enabled = false;
    }
    config.validate()?;

    rflink::app::run_pipe_gateway(config).await?;
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
