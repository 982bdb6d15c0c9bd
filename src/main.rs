mod config;
mod output;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};

use nodescope_inventory::{NodeInventoryCache, NodesService};
use nodescope_k8s::{KubeClusterClient, KubeconfigResolver, MetricsMerger, NodeViewBuilder};

use crate::config::Config;

/// Nodescope - Inspect Kubernetes nodes, their usage and cloud console links
#[derive(Parser, Debug)]
#[command(name = "nodescope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Kubeconfig to use (defaults to KUBECONFIG, then ~/.kube/config)
    #[arg(long, global = true, value_name = "PATH")]
    kubeconfig: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the nodes of the current context (default)
    Nodes(NodesArgs),

    /// Print the current context
    Context,
}

#[derive(clap::Args, Debug, Default)]
struct NodesArgs {
    /// Label selector, e.g. "env=prod,env=staging" (a node matching any pair is shown)
    #[arg(short = 'l', long, default_value = "")]
    selector: String,

    /// Refetch from the cluster instead of using the cached inventory
    #[arg(long)]
    refresh: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// Also print the label index
    #[arg(long)]
    show_labels: bool,

    /// Re-list every N seconds until interrupted
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,

    /// Seconds to wait for node metrics before reporting zero usage
    #[arg(long, value_name = "SECS")]
    metrics_timeout: Option<u64>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Wide,
    Json,
}

type Service = NodesService<KubeconfigResolver, KubeClusterClient>;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run(args).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run(args: Args) -> Result<()> {
    let mut config = Config::load(args.config.as_deref())?;
    if args.kubeconfig.is_some() {
        config.kubeconfig = args.kubeconfig;
    }

    let command = args
        .command
        .unwrap_or_else(|| Command::Nodes(NodesArgs::default()));
    if let Command::Nodes(nodes_args) = &command
        && nodes_args.metrics_timeout.is_some()
    {
        config.metrics_timeout_secs = nodes_args.metrics_timeout;
    }

    let service = build_service(&config);

    match command {
        Command::Context => {
            let context = service
                .current_context()
                .context("Failed to resolve the current context")?;
            println!("{}", context);
            Ok(())
        }
        Command::Nodes(nodes_args) => match nodes_args.watch {
            Some(secs) => watch_nodes(&service, &nodes_args, Duration::from_secs(secs.max(1))).await,
            None => print_nodes(&service, &nodes_args, nodes_args.refresh).await,
        },
    }
}

fn build_service(config: &Config) -> Service {
    let resolver = KubeconfigResolver::new(config.kubeconfig.clone());
    let client = Arc::new(KubeClusterClient::new(resolver.clone()));
    let merger = MetricsMerger::new(client).with_metrics_timeout(config.metrics_timeout());
    let builder = NodeViewBuilder::new()
        .with_dashboard_base_url(config.dashboard_base_url())
        .with_policy(config.derivation_policy);

    NodesService::new(resolver, NodeInventoryCache::new(merger, builder))
}

async fn print_nodes(service: &Service, args: &NodesArgs, refresh: bool) -> Result<()> {
    let (snapshot, queried) = service
        .query(refresh, &args.selector)
        .await
        .context("Failed to list nodes")?;

    match args.output {
        OutputFormat::Json => println!("{}", output::render_json(&queried)?),
        format => {
            let age = snapshot.age().num_seconds().max(0);
            println!(
                "Context: {}  ({} nodes, fetched {}s ago)",
                snapshot.context,
                queried.nodes.len(),
                age
            );
            println!();
            println!("{}", output::render_table(&queried.nodes, format == OutputFormat::Wide));
            if args.show_labels && !queried.labels.is_empty() {
                println!();
                println!("{}", output::render_labels(&queried.labels));
            }
        }
    }

    Ok(())
}

async fn watch_nodes(service: &Service, args: &NodesArgs, every: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(every);
    let mut first = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),

            _ = ticker.tick() => {
                // Later ticks always refetch, otherwise the cache would never change
                let refresh = !first || args.refresh;
                first = false;
                if let Err(e) = print_nodes(service, args, refresh).await {
                    eprintln!("Error: {:#}", e);
                }
                println!();
            }
        }
    }
}
