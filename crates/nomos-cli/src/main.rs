use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tokio::sync::broadcast::{self, error::RecvError};

use nomos::{
    code_registry, BackgroundWatcher, CompileEvent, CompiledPolicies, Compiler, CompilerConfig,
    MultiError, NomosError, PolicyWatcher,
};

#[derive(Parser, Debug)]
#[command(name = "nomos", version, about = "Compile and check a hierarchical policy repository")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Compiler config file
    #[arg(long, global = true, env = "NOMOS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Root of the policy repository
    path: PathBuf,

    /// Cluster to compile for
    #[arg(long, env = "NOMOS_CLUSTER_NAME")]
    cluster: Option<String>,

    /// Discovery document listing the kinds the cluster serves
    #[arg(long, env = "NOMOS_DISCOVERY_FILE")]
    discovery: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Format::Text)]
    format: Format,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile once and report every error found
    Vet(Target),
    /// Recompile whenever the repository changes
    Watch(Target),
    /// Print the error code catalogue as Markdown
    Codes,
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Nomos(#[from] NomosError),
    #[error("Failed to write output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("Failed to resolve path '{path}': {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn init_tracing(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_ok() {
        let _ = tracing_log::LogTracer::init();
    }
}

/// Config file values, overridden by flags and environment.
fn load_config(config: Option<&Path>, target: &Target) -> Result<(CompilerConfig, PathBuf), CliError> {
    let (mut loaded, base_dir) = match config {
        Some(path) => (
            CompilerConfig::load(path)?,
            path.parent().map(Path::to_path_buf).unwrap_or_default(),
        ),
        None => (CompilerConfig::default(), PathBuf::new()),
    };
    if let Some(cluster) = &target.cluster {
        loaded.cluster_name = Some(cluster.clone());
    }
    if let Some(discovery) = &target.discovery {
        let absolute = std::path::absolute(discovery).map_err(|e| CliError::Path {
            path: discovery.clone(),
            source: e,
        })?;
        loaded.discovery_file = Some(absolute);
    }
    Ok((loaded, base_dir))
}

fn print_compiled(compiled: &CompiledPolicies, format: Format) -> Result<(), CliError> {
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(compiled)?),
        Format::Text => {
            println!(
                "OK: {} namespaces, {} cluster objects, {} resources in total",
                compiled.namespaces.len(),
                compiled.cluster.len(),
                compiled.resource_count()
            );
            println!("Kinds to sync:");
            for gvk in compiled.kinds_to_sync() {
                println!("  {}", gvk);
            }
        }
    }
    Ok(())
}

fn print_rejected(errors: &MultiError, format: Format) -> Result<(), CliError> {
    match format {
        Format::Json => {
            let reports: Vec<_> = errors.iter().map(|e| e.to_report()).collect();
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "errors": reports }))?);
        }
        Format::Text => println!("{}", errors),
    }
    Ok(())
}

fn print_event(event: &CompileEvent, format: Format) -> Result<(), CliError> {
    match format {
        Format::Json => println!("{}", serde_json::to_string(event)?),
        Format::Text => println!(
            "{} {:?} kinds_changed={} errors={}",
            event.at.to_rfc3339(),
            event.outcome,
            event.kinds_changed,
            event.error_count
        ),
    }
    Ok(())
}

fn vet(config: Option<&Path>, target: Target) -> Result<ExitCode, CliError> {
    let (loaded, base_dir) = load_config(config, &target)?;
    let compiler = Compiler::new(loaded.to_options(&base_dir)?);
    match compiler.compile_dir(&target.path) {
        Ok(compiled) => {
            print_compiled(&compiled, target.format)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(NomosError::Rejected(errors)) => {
            print_rejected(&errors, target.format)?;
            Ok(ExitCode::from(1))
        }
        Err(e) => Err(e.into()),
    }
}

fn watch(config: Option<&Path>, target: Target) -> Result<ExitCode, CliError> {
    if !target.path.is_dir() {
        return Err(NomosError::PolicyDirNotFound(target.path).into());
    }
    let (loaded, base_dir) = load_config(config, &target)?;
    let compiler = Compiler::new(loaded.to_options(&base_dir)?);
    let debounce = Duration::from_millis(loaded.watch.debounce_ms);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let mut background = BackgroundWatcher::new(PolicyWatcher::new(&target.path, compiler, debounce));
    let mut events = background.subscribe();
    background.start();

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received; stopping watcher"),
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    };
    let result = runtime.block_on(relay_events(&mut events, target.format, shutdown));
    background.stop()?;
    result?;
    Ok(ExitCode::SUCCESS)
}

/// Prints compile events until the watcher goes away or `shutdown` resolves.
async fn relay_events(
    events: &mut broadcast::Receiver<CompileEvent>,
    format: Format,
    shutdown: impl Future<Output = ()>,
) -> Result<(), CliError> {
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => print_event(&event, format)?,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "dropped compile events");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
            _ = &mut shutdown => return Ok(()),
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, CliError> {
    let config = cli.config.as_deref();
    match cli.command {
        Commands::Vet(target) => vet(config, target),
        Commands::Watch(target) => watch(config, target),
        Commands::Codes => {
            print!("{}", code_registry().map_err(NomosError::from)?.render_markdown());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "nomos failed");
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}
