use anyhow::Context;
use clap::{Parser, Subcommand};
use hardship_map::{config, data, export, processing, render, server};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write map layers, legends and the map page
    Generate {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Serve the map and its API
    Serve {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
    /// Compare the configured legend labels against the loaded data
    CheckLegends {
        #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
        config: PathBuf,
    },
}

fn load_dataset(app_config: &config::AppConfig) -> anyhow::Result<processing::MapDataset> {
    let (records, features) = data::load_data(app_config)?;
    let dataset = processing::build_dataset(app_config, records, features)
        .context("Failed to build map dataset")?;
    Ok(dataset)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Generate { config } => {
            info!("Generating map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let dataset = load_dataset(&app_config)?;

            export::write_outputs(&app_config, &dataset, &app_config.output.dir)?;
            render::generate_previews(&app_config, &dataset, &app_config.output.dir)?;

            info!("Generation complete: {:?}", app_config.output.dir);
        }
        Commands::Serve { config } => {
            info!("Serving map with config: {:?}", config);
            let app_config = config::AppConfig::load_from_file(config)?;

            let dataset = load_dataset(&app_config)?;
            server::start_server(app_config, dataset).await?;
        }
        Commands::CheckLegends { config } => {
            let app_config = config::AppConfig::load_from_file(config)?;
            let dataset = load_dataset(&app_config)?;

            let drift = processing::check_legends(&app_config, &dataset.areas);
            for d in &drift {
                warn!(
                    "{} bucket {}: configured '{}', data gives '{}'",
                    d.indicator, d.bucket, d.configured, d.derived
                );
            }
            if drift.is_empty() {
                info!("All legend labels match the loaded data");
            } else {
                info!("{} legend labels differ from the loaded data", drift.len());
            }
        }
    }

    Ok(())
}
