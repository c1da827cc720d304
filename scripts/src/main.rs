use std::{io, process::ExitCode};

use clap::Parser;
use scripts::{
    artifacts::ArtifactStore,
    cli::{Cli, Command},
    client::setup_client,
    config::{ConfigArgs, DeployConfig},
    errors::ScriptError,
};
use tracing::error;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let Cli {
        priv_key,
        rpc_url,
        config,
        command,
    } = Cli::parse();

    // Logs go to stderr, stdout carries only the deployed addresses
    tracing_subscriber::fmt().pretty().with_writer(io::stderr).init();

    match run(priv_key, rpc_url, config, command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(
    priv_key: String,
    rpc_url: String,
    config: ConfigArgs,
    command: Command,
) -> Result<(), ScriptError> {
    let config = DeployConfig::try_from(config)?;
    command.check(&config)?;

    let artifacts = ArtifactStore::new(config.artifacts_dir.clone());
    let client = setup_client(&priv_key, &rpc_url, artifacts).await?;

    command.run(&client, &config).await
}
