use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use mdvdb::{Config, Engine, Error};

/// mdvdb — markdown corpus retrieval and relatedness engine
#[derive(Parser)]
#[command(name = "mdvdb", about)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Corpus root directory (overrides MDVDB_CORPUS_ROOT)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover and split corpus files into passages
    Ingest,
    /// Embed every passage lacking a current-model vector
    Embed,
    /// Rebuild topic clusters over the current embeddings
    Cluster,
    /// Ingest, embed, and cluster in one pass
    Build,
    /// Hybrid lexical + semantic search
    Search(SearchArgs),
    /// Print store status summary
    Status,
}

#[derive(clap::Args)]
struct SearchArgs {
    /// Query text
    query: String,
    /// Maximum number of results
    #[arg(long, default_value_t = 10)]
    limit: usize,
    /// Lexical candidate count fed into the reranker (defaults to config)
    #[arg(long)]
    fts_k: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = mdvdb::logging::init(cli.verbose) {
        eprintln!("failed to initialize logging: {e}");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let root = cli.root.unwrap_or_else(|| PathBuf::from("."));
    let root = root
        .canonicalize()
        .map_err(|e| Error::Config(format!("cannot canonicalize root '{}': {e}", root.display())))?;
    let config = Config::load(&root)?;
    let engine = Engine::open(config)?;

    match cli.command {
        Commands::Ingest => {
            let report = engine.ingest().await?;
            print_json(&report);
        }
        Commands::Embed => {
            let report = engine.embed_build().await?;
            print_json(&report);
        }
        Commands::Cluster => {
            let report = engine.cluster_build()?;
            print_json(&report);
        }
        Commands::Build => {
            let ingest_report = engine.ingest().await?;
            let embed_report = engine.embed_build().await?;
            let cluster_report = engine.cluster_build()?;
            print_json(&BuildReport {
                ingest: ingest_report,
                embed: embed_report,
                cluster: cluster_report,
            });
        }
        Commands::Search(args) => {
            let results = engine.search(&args.query, args.limit, args.fts_k, None).await?;
            print_json(&results);
        }
        Commands::Status => {
            print_json(&engine.status());
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct BuildReport {
    ingest: mdvdb::ingest::IngestReport,
    embed: mdvdb::EmbedBuildReport,
    cluster: mdvdb::ClusterBuildReport,
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}
