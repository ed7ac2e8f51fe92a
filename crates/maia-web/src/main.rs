//! Maia Test Dashboard - Binary entry point

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use maia_report::{CollapseState, RunListView, RunQuery, StatusFilter};
use maia_web::client::ReportClient;
use maia_web::overview::load_run_list;
use maia_web::source::ReportSource;
use maia_web::store::FsReportStore;
use maia_web::{Config, serve};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "maia-web", version, about = "Maia test report dashboard")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the report API and dashboard (default)
    Serve(ServeArgs),
    /// Print the date-grouped run list
    Runs(RunsArgs),
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port to listen on
    #[arg(long, env = "MAIA_DASHBOARD_PORT", default_value = "3000")]
    port: u16,

    /// Address to bind
    #[arg(long, default_value = "127.0.0.1")]
    bind: IpAddr,

    /// Reports root, one subdirectory per run
    #[arg(long, env = "TEST_REPORTS_DIR", default_value = "test_reports")]
    reports_dir: PathBuf,

    /// Frontend build output to serve alongside the API
    #[arg(long, env = "MAIA_DASHBOARD_STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunsArgs {
    /// Read from a running dashboard instead of the local reports directory
    #[arg(long, value_name = "URL")]
    api: Option<String>,

    /// Reports root, one subdirectory per run
    #[arg(long, env = "TEST_REPORTS_DIR", default_value = "test_reports")]
    reports_dir: PathBuf,

    /// Case-insensitive match on run and test names
    #[arg(short, long, default_value = "")]
    search: String,

    /// Only runs with at least one test in this status
    #[arg(long, value_enum, default_value_t = StatusArg::All)]
    status: StatusArg,

    /// Expand every group instead of only the most recent one
    #[arg(long)]
    expand: bool,

    /// Print the run list as JSON
    #[arg(long)]
    json: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    All,
    Passed,
    Failed,
    Running,
}

impl From<StatusArg> for StatusFilter {
    fn from(status: StatusArg) -> Self {
        match status {
            StatusArg::All => Self::All,
            StatusArg::Passed => Self::Passed,
            StatusArg::Failed => Self::Failed,
            StatusArg::Running => Self::Running,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "maia_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Serve(cli.serve)) {
        Commands::Serve(args) => run_server(args).await,
        Commands::Runs(args) => print_runs(args).await,
    }
}

async fn run_server(args: ServeArgs) -> Result<()> {
    let config = Config {
        port: args.port,
        bind: args.bind,
        static_dir: args.static_dir,
        reports_dir: args.reports_dir,
    };

    tracing::info!(
        "Starting Maia Test Dashboard on http://{}:{}",
        config.bind,
        config.port
    );

    serve(config).await.context("Dashboard server failed")
}

async fn print_runs(args: RunsArgs) -> Result<()> {
    let source: Box<dyn ReportSource> = match &args.api {
        Some(url) => Box::new(ReportClient::new(url)?),
        None => Box::new(FsReportStore::new(&args.reports_dir)),
    };

    let query = RunQuery {
        search: args.search,
        status: args.status.into(),
    };
    let mut collapse = CollapseState::new();
    let view = load_run_list(source.as_ref(), &query, &mut collapse, &Local::now())
        .await
        .context("Failed to read test runs")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view, args.expand);
    }
    Ok(())
}

fn print_view(view: &RunListView, expand: bool) {
    if view.groups.is_empty() {
        println!("No runs found ({} total)", view.total_runs);
        return;
    }

    for group in &view.groups {
        println!("{} ({})", group.label, group.runs.len());
        if group.collapsed && !expand {
            continue;
        }
        for run in &group.runs {
            println!(
                "  {:<40} {:>3} passed {:>3} failed {:>3} running  {}",
                run.name,
                run.stats.passed,
                run.stats.failed,
                run.stats.running,
                run.stats.total_duration
            );
        }
    }
    println!("{} of {} runs shown", view.matching_runs, view.total_runs);
}
