mod cli;
mod config;
mod report;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use medrag_lookup::{run_search, LookupQuery};
use medrag_rag::{
    EmbeddingClient, LlmClient, LlmGenerator, LoopConfig, RagStore, RetrievalLoop,
    RetrieverGateway, Table,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{AskArgs, Cli, Command, LookupArgs};
use crate::config::{load_config, resolve_ask, resolve_db_path, AppConfig, DEFAULT_CONFIG};
use crate::report::{exit_code, print_transcript, ConsoleObserver};

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let file_config = load_config(&config_path)?;
    let db_path = resolve_db_path(cli.db.clone());

    match cli.command {
        Command::Ask(args) => ask(&args, &file_config, db_path),
        Command::InitDb => {
            init_db(db_path)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Lookup(args) => {
            lookup(&args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn ask(args: &AskArgs, file_config: &AppConfig, db_path: PathBuf) -> Result<ExitCode> {
    let settings = resolve_ask(args, &file_config.ask, std::env::var("MEDRAG_PROVIDER").ok())?;
    let store = RagStore::open(&db_path)
        .with_context(|| format!("failed to open store {}", db_path.display()))?;
    let embeddings = EmbeddingClient::from_env()?;
    info!(
        provider = settings.provider.as_str(),
        model = %settings.model,
        embeddings = embeddings.backend_name(),
        db = %db_path.display(),
        "ask"
    );
    let client = LlmClient::new(settings.provider, settings.model.clone())?;
    let generator = LlmGenerator::with_max_tokens(client, settings.max_tokens);
    let gateway = RetrieverGateway::new(embeddings, store);
    let retrieval = RetrievalLoop::new(
        generator,
        gateway,
        LoopConfig {
            max_iterations: settings.max_iterations,
            top_k: settings.top_k,
        },
    )?;

    let (outcome, transcript) = retrieval.run_with_transcript(&args.question, &mut ConsoleObserver);
    if args.show_transcript {
        print_transcript(&transcript);
    }
    Ok(exit_code(&outcome))
}

fn init_db(db_path: PathBuf) -> Result<()> {
    let store = RagStore::open(&db_path)
        .with_context(|| format!("failed to open store {}", db_path.display()))?;
    println!("store ready at {}", store.path().display());
    for table in Table::ALL {
        println!("  {table}: {} row(s)", store.count(table)?);
    }
    Ok(())
}

fn lookup(args: &LookupArgs) -> Result<()> {
    let query = LookupQuery {
        first: args.first.clone(),
        last: args.last.clone(),
        middle: args.middle.clone(),
        state: String::new(),
    };
    let summary = run_search(&query, &args.state_list(), &args.out)?;
    if summary.rows == 0 {
        println!("No results found for {}.", query.full_name());
    } else {
        println!("Wrote {} row(s) to {}", summary.rows, args.out.display());
    }
    if !summary.skipped_states.is_empty() {
        println!("No adapter for: {}", summary.skipped_states.join(", "));
    }
    Ok(())
}
