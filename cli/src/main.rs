//! graphbench: command-line runner for the benchmark harness
//!
//! `run` executes the stage pipeline, `generate` writes a record file and
//! `stats` prints the current vertex counts.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use graphbench::{
    generate_file, open_adapter, AdapterKind, BenchConfig, BenchReport, BenchmarkEngine, EngineConfig, Stage,
    StageSet, StatsReporter,
};

#[derive(Parser)]
#[command(name = "graphbench", version, about = "Graph database CRUD and traversal benchmark")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true, env = "GRAPHBENCH_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

/// Flags shared by `run` and `stats`
#[derive(clap::Args)]
struct ConnectionArgs {
    /// Client API to drive
    #[arg(long)]
    adapter: Option<AdapterKind>,

    /// Server HTTP URL for the remote adapter
    #[arg(long, env = "GRAPHBENCH_URL")]
    url: Option<String>,

    /// Remote database name
    #[arg(long)]
    database: Option<String>,

    #[arg(long, env = "GRAPHBENCH_USER")]
    user: Option<String>,

    #[arg(long, env = "GRAPHBENCH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Run adapter operations without transactions
    #[arg(long)]
    no_transactions: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the benchmark stages
    Run {
        #[command(flatten)]
        connection: ConnectionArgs,

        /// Number of records to insert
        #[arg(long)]
        limit: Option<usize>,

        /// Items per adapter call
        #[arg(long)]
        batch_size: Option<usize>,

        /// Stage to run (repeatable); all stages when omitted
        #[arg(long = "stage")]
        stages: Vec<Stage>,

        /// Record file, one record per line
        #[arg(long)]
        data_file: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "text")]
        format: OutputFormat,
    },
    /// Write a record file filled with the embedded template
    Generate {
        #[arg(long)]
        output: PathBuf,

        #[arg(long, default_value_t = 10_000)]
        count: usize,
    },
    /// Print the vertex counts of a running server
    Stats {
        #[command(flatten)]
        connection: ConnectionArgs,
    },
}

impl ConnectionArgs {
    fn apply(self, config: &mut BenchConfig) {
        if let Some(adapter) = self.adapter {
            config.adapter = adapter;
        }
        if let Some(url) = self.url {
            config.remote.url = Some(url);
        }
        if let Some(database) = self.database {
            config.remote.database = database;
        }
        if let Some(user) = self.user {
            config.remote.user = user;
        }
        if let Some(password) = self.password {
            config.remote.password = password;
        }
        if self.no_transactions {
            config.transactions = false;
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<BenchConfig> {
    match path {
        Some(path) => BenchConfig::load(path).with_context(|| format!("loading {}", path.display())),
        None => Ok(BenchConfig::default()),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Run { connection, limit, batch_size, stages, data_file, format } => {
            let mut config = load_config(cli.config.as_ref())?;
            connection.apply(&mut config);
            if let Some(limit) = limit {
                config.limit = limit;
            }
            if let Some(batch_size) = batch_size {
                config.batch_size = batch_size;
            }
            if !stages.is_empty() {
                config.stages = stages.into_iter().collect::<StageSet>();
            }
            if data_file.is_some() {
                config.data_file = data_file;
            }
            run(config, format).await
        }
        Commands::Generate { output, count } => {
            generate_file(&output, count).with_context(|| format!("writing {}", output.display()))
        }
        Commands::Stats { connection } => {
            let mut config = load_config(cli.config.as_ref())?;
            connection.apply(&mut config);
            run_stats(config).await
        }
    }
}

async fn run(config: BenchConfig, format: OutputFormat) -> Result<()> {
    config.validate()?;
    info!(adapter = %config.adapter, limit = config.limit, batch_size = config.batch_size, "starting");

    let adapter = open_adapter(&config).await.context("opening adapter")?;
    let engine = BenchmarkEngine::new(adapter.as_ref(), EngineConfig::from(&config));

    match format {
        OutputFormat::Text => {
            let report = engine.run(&mut StatsReporter::stdout()).await.context("benchmark failed")?;
            println!();
            println!("{}", summary_table(&report));
        }
        OutputFormat::Json => {
            let report = engine
                .run(&mut StatsReporter::with_sink(std::io::stderr()))
                .await
                .context("benchmark failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}

/// In-process adapters start from an empty graph, so only a server has counts to report
fn require_server(config: &BenchConfig) -> Result<()> {
    if !matches!(config.adapter, AdapterKind::Remote) || config.remote.url.is_none() {
        bail!("stats reads a running server; pass --adapter remote --url <URL>");
    }
    Ok(())
}

async fn run_stats(config: BenchConfig) -> Result<()> {
    config.validate()?;
    require_server(&config)?;
    let adapter = open_adapter(&config).await.context("opening adapter")?;
    adapter.print_stats(&mut StatsReporter::stdout()).await?;
    Ok(())
}

fn summary_table(report: &BenchReport) -> Table {
    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["Stage", "Operation", "Items", "Total ms", "Avg ns/item"]);

    for timing in &report.timings {
        table.add_row(vec![
            timing.stage.to_string(),
            timing.operation.clone(),
            timing.items.to_string(),
            timing.elapsed.as_millis().to_string(),
            timing.average_ns().map(|ns| ns.to_string()).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_requires_remote_server() {
        let embedded = BenchConfig::default();
        assert!(require_server(&embedded).is_err());

        let traversal = BenchConfig { adapter: AdapterKind::Traversal, ..BenchConfig::default() };
        assert!(require_server(&traversal).is_err());

        let mut remote = BenchConfig { adapter: AdapterKind::Remote, ..BenchConfig::default() };
        assert!(require_server(&remote).is_err());

        remote.remote.url = Some("http://localhost:2480".to_string());
        assert!(require_server(&remote).is_ok());
    }

    #[test]
    fn test_stats_flags_apply() {
        let cli = Cli::try_parse_from(["graphbench", "stats", "--adapter", "remote", "--url", "http://db:2480"]).unwrap();
        let Commands::Stats { connection } = cli.command else {
            panic!("expected stats");
        };
        let mut config = BenchConfig::default();
        connection.apply(&mut config);
        assert!(require_server(&config).is_ok());
        assert_eq!(config.remote.url.as_deref(), Some("http://db:2480"));
    }
}
