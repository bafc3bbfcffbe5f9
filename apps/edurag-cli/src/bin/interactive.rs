use anyhow::Result;
use clap::Parser;

use edurag_cli::{build_orchestrator, db_path, init_tracing, load_settings, run_interactive};

#[derive(Parser, Debug)]
#[command(name = "edurag-interactive", version, about = "Interactive Educational RAG System", long_about = None)]
struct Args {
    /// Ollama model to use
    #[arg(long)]
    model: Option<String>,
    /// Number of chunks to retrieve
    #[arg(long)]
    top_k: Option<usize>,
    /// Vector database path
    #[arg(long)]
    db_path: Option<String>,
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    let mut settings = load_settings()?;
    if let Some(m) = args.model { settings.query.model = m; }
    if let Some(k) = args.top_k { settings.query.top_k = k; }
    let db = db_path(&settings, args.db_path.as_deref());

    let rag = build_orchestrator(&settings, &db)?;
    let stdin = std::io::stdin();
    run_interactive(stdin.lock(), &mut std::io::stdout(), &settings.query.model, &db, |q| Ok(rag.ask(q)?))
}
