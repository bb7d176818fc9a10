use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use collection_schema_core::SchemaSet;
use collection_schema_engine::output::{
    OutputFormat, enrich_collection, enrich_set, format_collection, format_schema_set,
};
use collection_schema_engine::source::{candidate_paths, resolve_source};
use collection_schema_engine::{EngineConfig, SchemaEngine};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "collection-schema")]
#[command(about = "Compile content collection schemas to JSON Schema")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Compile the schema-definition module and print the result.
    Compile(CompileArgs),
    /// Print which schema-definition file would be compiled.
    Resolve(ProjectArgs),
    /// Compile, then recompile whenever the schema definition changes.
    Watch(ProjectArgs),
}

#[derive(Debug, Args)]
struct ProjectArgs {
    /// Root of the host project.
    #[arg(long, default_value = ".")]
    project: PathBuf,
    /// Configuration file (default: <project>/.collection-schema.yml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// JavaScript runtime to run the bundler and loader with.
    #[arg(long)]
    node: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct CompileArgs {
    #[command(flatten)]
    project: ProjectArgs,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: OutputFormat,
    /// Print only this collection.
    #[arg(long)]
    collection: Option<String>,
    /// Attach block types to array fields holding discriminated unions.
    #[arg(long)]
    enrich: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(matches!(cli.command, Command::Watch(_)));

    let result = match cli.command {
        Command::Compile(args) => run_compile(args),
        Command::Resolve(args) => run_resolve(args),
        Command::Watch(args) => run_watch(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &ProjectArgs) -> Result<EngineConfig, String> {
    let root = std::fs::canonicalize(&args.project).map_err(|err| {
        format!(
            "Failed to open project directory '{}': {err}",
            args.project.display()
        )
    })?;
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path, root),
        None => EngineConfig::discover(root),
    }
    .map_err(|e| e.to_string())?;
    if let Some(node) = &args.node {
        config.node_binary = node.clone();
    }
    Ok(config)
}

fn run_compile(args: CompileArgs) -> Result<(), String> {
    let config = load_config(&args.project)?;
    let engine = SchemaEngine::new(config);
    let set = engine.load_schemas().map_err(|e| e.to_string())?;

    let rendered = match &args.collection {
        Some(name) => {
            let collection = set.get(name).ok_or_else(|| unknown_collection(name, &set))?;
            if args.enrich {
                format_collection(&enrich_collection(collection), args.format)?
            } else {
                format_collection(collection, args.format)?
            }
        }
        None if args.enrich => format_schema_set(&enrich_set(&set), args.format)?,
        None => format_schema_set(&set, args.format)?,
    };
    println!("{}", rendered.trim_end());

    for collection in set.collections.values() {
        for warning in &collection.warnings {
            eprintln!("warning: {}: {warning}", collection.name);
        }
    }
    Ok(())
}

fn unknown_collection(name: &str, set: &SchemaSet) -> String {
    let available: Vec<&str> = set.names().collect();
    if available.is_empty() {
        format!("Unknown collection '{name}': the schema module declares no collections")
    } else {
        format!(
            "Unknown collection '{name}'. Available: {}",
            available.join(", ")
        )
    }
}

fn run_resolve(args: ProjectArgs) -> Result<(), String> {
    let config = load_config(&args)?;
    match resolve_source(&config) {
        Ok(source) => {
            println!("{}", source.path().display());
            Ok(())
        }
        Err(err) => {
            info!(
                candidates = candidate_paths(&config).len(),
                "No schema definition found"
            );
            Err(err.to_string())
        }
    }
}

fn run_watch(args: ProjectArgs) -> Result<(), String> {
    let config = load_config(&args)?;
    let engine = SchemaEngine::new(config);

    match engine.load_schemas() {
        Ok(set) => info!(
            collections = set.len(),
            unions = set.union_count(),
            "Initial compilation finished"
        ),
        Err(err) => eprintln!("error: {err}"),
    }

    engine
        .watch_schema_config_with(|outcome| {
            if let Err(err) = outcome {
                eprintln!("error: {err}");
            }
        })
        .map_err(|err| format!("Failed to start watcher: {err}"))?;
    info!(paths = engine.watched_paths().len(), "Watching for changes (Ctrl-C to stop)");

    loop {
        std::thread::park();
    }
}
