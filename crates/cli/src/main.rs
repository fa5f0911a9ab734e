use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kindred::commands::{demo, describe, plan};
use kindred_core::{AppConfig, Environment, LogFormat, RunContext, Runner};

#[derive(Parser)]
#[command(name = "kindred")]
#[command(about = "Relationship metadata and integrity engine, shown on a family of classes")]
#[command(version)]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Environment preset (development, testing, production)
    #[arg(long, global = true)]
    env: Option<Environment>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log format (plain, pretty, json)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    /// Print the family descriptor table
    Describe {
        /// Only this class
        #[arg(long)]
        class: Option<String>,

        /// Describe children as left to the storage backend
        #[arg(long)]
        physical_children: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the family scenario and persist it to an in-memory store
    Demo {
        /// Leave children to the storage backend instead of cascading
        #[arg(long)]
        physical_children: bool,
    },

    /// Print the save plan of a parent with N children
    Plan {
        /// Number of children
        #[arg(long, default_value_t = 2)]
        children: usize,

        /// Leave children to the storage backend instead of cascading
        #[arg(long)]
        physical_children: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    fn app_config(&self) -> Result<AppConfig> {
        let mut builder = AppConfig::builder();
        if let Some(path) = &self.config {
            builder = builder.file(path);
        }
        if let Some(environment) = self.env {
            builder = builder.environment(environment);
        }
        if let Some(level) = &self.log_level {
            builder = builder.log_level(level);
        }
        if let Some(format) = self.log_format {
            builder = builder.log_format(format);
        }
        Ok(builder.load()?)
    }
}

async fn dispatch(command: Commands, context: RunContext) -> Result<()> {
    tracing::debug!(target: "kindred::cli", run_id = %context.run_id, "dispatching command");
    match command {
        Commands::Describe {
            class,
            physical_children,
            json,
        } => describe::run(class.as_deref(), json, !physical_children).await,
        Commands::Demo { physical_children } => demo::run(!physical_children).await,
        Commands::Plan {
            children,
            physical_children,
            json,
        } => plan::run(children, !physical_children, json).await,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.app_config()?;
    let runner = Runner::new(config);
    let command = cli.command.clone();

    runner.run_async(|context| dispatch(command, context)).await?;
    Ok(())
}
