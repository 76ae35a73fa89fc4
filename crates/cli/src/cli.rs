use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "medrag", version, about = "Grounded answers about physicians and hospitals")]
pub struct Cli {
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// SQLite store; falls back to $MEDRAG_DB, then medrag.sqlite.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Answer a question, retrieving records until the model is satisfied.
    Ask(AskArgs),
    /// Create the physicians and hospitals tables if missing.
    InitDb,
    /// Look up physician licenses on public boards.
    Lookup(LookupArgs),
}

#[derive(Args, Debug)]
pub struct AskArgs {
    pub question: String,
    #[arg(long)]
    pub provider: Option<String>,
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long = "max-iterations")]
    pub max_iterations: Option<usize>,
    /// Disable the retrieval round limit.
    #[arg(long, action = ArgAction::SetTrue, conflicts_with = "max_iterations")]
    pub unbounded: bool,
    #[arg(long = "top-k")]
    pub top_k: Option<usize>,
    #[arg(long = "max-tokens")]
    pub max_tokens: Option<u32>,
    /// Print the full transcript after the run.
    #[arg(long = "show-transcript", action = ArgAction::SetTrue)]
    pub show_transcript: bool,
}

#[derive(Args, Debug)]
pub struct LookupArgs {
    #[arg(long)]
    pub first: String,
    #[arg(long)]
    pub last: String,
    #[arg(long, default_value = "")]
    pub middle: String,
    /// Comma-separated state codes, e.g. "FL,TX".
    #[arg(long, default_value = "")]
    pub states: String,
    /// `.csv` writes CSV; anything else writes JSON Lines.
    #[arg(long, default_value = "results.csv")]
    pub out: PathBuf,
}

impl LookupArgs {
    pub fn state_list(&self) -> Vec<String> {
        self.states
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
