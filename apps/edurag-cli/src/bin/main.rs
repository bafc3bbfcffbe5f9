use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

use edurag_cli::{build_orchestrator, db_path, ingest_directory, init_tracing, load_settings, print_answer, run_interactive};
use edurag_core::config::expand_path;

#[derive(Parser, Debug)]
#[command(name = "edurag", version, about = "Educational RAG System", long_about = None)]
struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process documents
    Process {
        /// Directory containing documents
        directory: String,
        /// Chunk size
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Chunk overlap
        #[arg(long)]
        chunk_overlap: Option<usize>,
        /// Vector database path
        #[arg(long)]
        db_path: Option<String>,
    },
    /// Query the RAG system
    Query {
        /// Question to ask
        query: String,
        /// Ollama model to use
        #[arg(long)]
        model: Option<String>,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
        /// Vector database path
        #[arg(long)]
        db_path: Option<String>,
    },
    /// Ask questions until "exit"
    Interactive {
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        db_path: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut settings = load_settings()?;

    match cli.command {
        Some(Commands::Process { directory, chunk_size, chunk_overlap, db_path: db_flag }) => {
            if let Some(v) = chunk_size { settings.chunking.chunk_size = v; }
            if let Some(v) = chunk_overlap { settings.chunking.chunk_overlap = v; }
            let dir = expand_path(&directory);
            let db = db_path(&settings, db_flag.as_deref());
            println!("Processing documents in {}", dir.display());

            let summary = ingest_directory(&settings, &dir, &db, true)?;
            let report = &summary.report;
            for failure in &report.failures {
                println!("⚠️  {}", failure);
            }
            if report.chunks_created == 0 {
                println!("No documents were processed.");
                std::process::exit(1);
            }
            println!("✅ Loaded {} documents", report.documents_loaded);
            println!("📊 Created {} chunks", report.chunks_created);
            println!("✅ Stored {} chunks in {} ({} total)", report.chunks_stored, db.display(), summary.total_in_store);
        }
        Some(Commands::Query { query, model, top_k, db_path: db_flag }) => {
            if let Some(m) = model { settings.query.model = m; }
            if let Some(k) = top_k { settings.query.top_k = k; }
            let db = db_path(&settings, db_flag.as_deref());
            let rag = build_orchestrator(&settings, &db)?;
            let result = rag.ask(&query)?;
            print_answer(&mut std::io::stdout().lock(), &result)?;
        }
        Some(Commands::Interactive { model, top_k, db_path: db_flag }) => {
            if let Some(m) = model { settings.query.model = m; }
            if let Some(k) = top_k { settings.query.top_k = k; }
            let db = db_path(&settings, db_flag.as_deref());
            let rag = build_orchestrator(&settings, &db)?;
            let stdin = std::io::stdin();
            run_interactive(stdin.lock(), &mut std::io::stdout(), &settings.query.model, &db, |q| Ok(rag.ask(q)?))?;
        }
        None => {
            Cli::command().print_help()?;
            println!();
        }
    }
    Ok(())
}
