use avp::Commands;
use clap::Parser;

#[derive(Parser)]
#[command(name = "avp")]
#[command(about = "Replace secret placeholders in Kubernetes manifests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    // Parse command-line arguments
    let cli = Cli::parse();

    avp_utils::tracing::init(cli.command.verbose())
        .map_err(|e| eyre::eyre!("failed to initialize logging: {e}"))?;

    cli.command.execute().await?;
    Ok(())
}
