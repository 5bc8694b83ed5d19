use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use docmigrate::config::AppConfig;
use docmigrate::{
    CancelFlag, ClassifierRegistry, CollectionSource, FileSource, JsonFileStore, MigrationError,
    MigrationOptions, MigrationRunner, MigrationSummary, RecordSource, RecordStore, ReportFormat,
    RetryingStore, exit_status,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, event};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

const FATAL_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "docmigrate")]
#[command(about = "Idempotent document migrations over a JSON document store")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply a classifier to every record of a collection
    Run {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        classifier: String,
        /// Fixture file or collection name to read records from (defaults to the target collection)
        #[arg(long)]
        source: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Create or update records from a JSON fixture
    Seed {
        #[command(flatten)]
        target: TargetArgs,
        #[arg(long)]
        fixture: PathBuf,
        #[command(flatten)]
        run: RunArgs,
    },
    /// List the available classifiers
    Classifiers,
}

#[derive(Args)]
struct TargetArgs {
    /// Database file (falls back to DOCMIGRATE_STORE)
    #[arg(long)]
    store: Option<PathBuf>,
    /// Collection to migrate (falls back to DOCMIGRATE_COLLECTION)
    #[arg(long)]
    collection: Option<String>,
}

#[derive(Args)]
struct RunArgs {
    #[arg(long)]
    dry_run: bool,
    #[arg(long, default_value_t = 1)]
    batch_size: usize,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    continue_on_error: bool,
    #[arg(long, default_value_t = docmigrate::source::DEFAULT_PAGE_SIZE)]
    page_size: usize,
    #[arg(long, default_value = "text")]
    format: ReportFormat,
    /// List every record's outcome
    #[arg(long)]
    verbose: bool,
}

impl RunArgs {
    fn options(&self) -> MigrationOptions {
        MigrationOptions::default()
            .dry_run(self.dry_run)
            .batch_size(self.batch_size)
            .continue_on_error(self.continue_on_error)
            .page_size(self.page_size)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match execute(cli).await {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(FATAL_EXIT)
        }
    }
}

async fn execute(cli: Cli) -> Result<u8> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    let registry = ClassifierRegistry::default();

    match cli.command {
        Command::Classifiers => {
            for (name, description) in registry.list() {
                println!("{name:<30} {description}");
            }
            Ok(0)
        }
        Command::Run {
            target,
            classifier,
            source,
            run,
        } => {
            let classifier = registry.build(&classifier).ok_or_else(|| {
                anyhow!(
                    "unknown classifier '{classifier}' (available: {})",
                    registry.names().join(", ")
                )
            })?;
            let (store_path, collection) = resolve_target(&target, &config)?;
            let store = open_store(&store_path, &collection, &config).await?;
            let mut source = open_source(source.as_deref(), &store_path, &store, &run, &config).await?;

            let (runner, cancel) = build_runner(store, &run)?;
            let result = runner
                .run_with_cancel(source.as_mut(), classifier.as_ref(), &cancel)
                .await;
            finish(result, &run)
        }
        Command::Seed {
            target,
            fixture,
            run,
        } => {
            let (store_path, collection) = resolve_target(&target, &config)?;
            let store = open_store(&store_path, &collection, &config).await?;
            let mut fixture = FileSource::load(&fixture)
                .await
                .with_context(|| format!("failed to load fixture '{}'", fixture.display()))?
                .chunk_size(run.page_size);

            let (runner, cancel) = build_runner(store, &run)?;
            let result = runner.seed_with_cancel(&mut fixture, &cancel).await;
            finish(result, &run)
        }
    }
}

fn resolve_target(target: &TargetArgs, config: &AppConfig) -> Result<(PathBuf, String)> {
    let store = target
        .store
        .clone()
        .or_else(|| config.store_path.clone())
        .context("no store given (use --store or DOCMIGRATE_STORE)")?;
    let collection = target
        .collection
        .clone()
        .or_else(|| config.collection.clone())
        .context("no collection given (use --collection or DOCMIGRATE_COLLECTION)")?;
    Ok((store, collection))
}

async fn open_store(
    path: &Path,
    collection: &str,
    config: &AppConfig,
) -> Result<Arc<dyn RecordStore>> {
    let store = JsonFileStore::open(path, collection)
        .await
        .with_context(|| format!("failed to open store '{}'", path.display()))?;
    Ok(Arc::new(RetryingStore::new(store, config.retry.clone())))
}

/// `--source` names a fixture file when it points at an existing file,
/// otherwise another collection of the same database.
async fn open_source(
    source: Option<&str>,
    store_path: &Path,
    store: &Arc<dyn RecordStore>,
    run: &RunArgs,
    config: &AppConfig,
) -> Result<Box<dyn RecordSource>> {
    let Some(source) = source else {
        return Ok(Box::new(
            CollectionSource::new(store.clone()).page_size(run.page_size),
        ));
    };

    if Path::new(source).is_file() {
        let file = FileSource::load(source)
            .await
            .with_context(|| format!("failed to load source file '{source}'"))?
            .chunk_size(run.page_size);
        return Ok(Box::new(file));
    }

    if source.ends_with(".json") {
        bail!("source file '{source}' does not exist");
    }
    let other = open_store(store_path, source, config).await?;
    Ok(Box::new(CollectionSource::new(other).page_size(run.page_size)))
}

/// Builds the runner and a cancel flag that Ctrl+C raises.
fn build_runner(store: Arc<dyn RecordStore>, run: &RunArgs) -> Result<(MigrationRunner, CancelFlag)> {
    let runner = MigrationRunner::new(store, run.options())?;
    let cancel = CancelFlag::new();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                event!(Level::WARN, "interrupt received, finishing the current record");
                interrupt.cancel();
            }
            Err(err) => {
                event!(Level::ERROR, error = %err, "unable to install Ctrl+C signal handler");
            }
        }
    });

    Ok((runner, cancel))
}

fn finish(result: Result<MigrationSummary, MigrationError>, run: &RunArgs) -> Result<u8> {
    let reporter = run.format.reporter(run.verbose);
    match result {
        Ok(summary) => {
            println!("{}", reporter.render(&summary).trim_end());
            Ok(exit_status(&summary))
        }
        Err(MigrationError::SourceInterrupted { error, summary }) => {
            println!("{}", reporter.render(&summary).trim_end());
            eprintln!("error: {error}");
            Ok(exit_status(&summary))
        }
        Err(err) => Err(err).context("migration did not start"),
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docmigrate=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
