use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use feedback_recon::app::{ReconcileUseCase, RunInputs};
use feedback_recon::config::{OutputFormat, ReconConfig};
use feedback_recon::{infra, logging, server};

#[derive(Parser)]
#[command(name = "feedback_recon")]
#[command(about = "Weekly feedback reconciliation against historical extracts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass and write the results artifact
    Run {
        /// TOML configuration file (defaults to $RECON_CONFIG or recon.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Weekly feedback extract
        #[arg(long)]
        weekly: Option<PathBuf>,
        /// Historical feedback extract
        #[arg(long)]
        history: Option<PathBuf>,
        /// Error code mapping table
        #[arg(long)]
        mapping: Option<PathBuf>,
        /// Artifact path (a directory for csv output)
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
    /// Serve the HTTP wrapper
    Serve {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

fn run_once(
    mut config: ReconConfig,
    weekly: Option<PathBuf>,
    history: Option<PathBuf>,
    mapping: Option<PathBuf>,
    output: Option<PathBuf>,
    format: Option<OutputFormat>,
) -> anyhow::Result<()> {
    if let Some(p) = weekly {
        config.input.weekly = p;
    }
    if let Some(p) = history {
        config.input.history = p;
    }
    if let Some(p) = mapping {
        config.input.mapping = p;
    }
    if let Some(p) = output {
        config.output.path = p;
    }
    if let Some(f) = format {
        config.output.format = f;
    }

    let inputs = RunInputs::from(&config.input);
    let destination = config.output.path.clone();
    let use_case = ReconcileUseCase::new(
        Box::new(infra::WorkbookSource::new()),
        infra::table_sink(config.output.format),
        infra::pivot_builder(&config.pivot),
        config,
    );

    let report = use_case.run(&inputs, &destination)?;
    println!("{}", report.message);
    println!("   Loaded weekly:   {}", report.counts.weekly_loaded);
    println!("   Loaded history:  {}", report.counts.history_loaded);
    println!("   After filtering: {}", report.counts.filtered);
    println!("   Classified:      {}", report.counts.classified);
    println!("   Overrides:       {}", report.counts.overrides_triggered);
    println!("   Unmapped codes:  {}", report.counts.issues);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            weekly,
            history,
            mapping,
            output,
            format,
        } => {
            let config = ReconConfig::load(config.as_deref())?;
            let result = tokio::task::spawn_blocking(move || {
                run_once(config, weekly, history, mapping, output, format)
            })
            .await?;
            if let Err(e) = &result {
                error!("Run failed: {:#}", e);
            }
            result?;
        }
        Commands::Serve { config, host, port } => {
            let mut config = ReconConfig::load(config.as_deref())?;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            info!("Starting server on {}:{}", config.server.host, config.server.port);
            server::start_server(config).await?;
        }
    }

    Ok(())
}
