//! Shared plumbing for the `edurag` and `edurag-interactive` binaries.

use anyhow::Result;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use edurag_core::config::{expand_path, Config, Settings};
use edurag_core::types::{file_name_of, RagAnswer};
use edurag_embed::get_default_embedder;
use edurag_llm::OllamaGenerator;
use edurag_rag::{ensure_db_exists, index_chunks, prepare_chunks, IngestReport, QueryOrchestrator};
use edurag_vector::LanceVectorStore;

pub const EXIT_WORDS: [&str; 3] = ["exit", "quit", "q"];

/// Log to stderr. `RUST_LOG` wins; otherwise `warn`, `-v` info, `-vv` debug.
pub fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn load_settings() -> Result<Settings> {
    Config::load()?.settings()
}

pub fn db_path(settings: &Settings, flag: Option<&str>) -> PathBuf {
    expand_path(flag.unwrap_or(settings.store.db_path.as_str()))
}

pub struct IngestSummary {
    pub report: IngestReport,
    pub total_in_store: usize,
}

/// Load, chunk, embed and store everything under `dir`. Nothing is opened or
/// created at `db_path` when no chunk was produced.
pub fn ingest_directory(settings: &Settings, dir: &Path, db_path: &Path, show_progress: bool) -> Result<IngestSummary> {
    let (chunks, mut report) = prepare_chunks(dir, &settings.chunking)?;
    if chunks.is_empty() {
        return Ok(IngestSummary { report, total_in_store: 0 });
    }
    let embedder = get_default_embedder(&settings.embedding)?;
    let store = LanceVectorStore::open(db_path, &settings.store.table, embedder.dim())?;
    report.chunks_stored = index_chunks(&store, embedder.as_ref(), chunks, settings.embedding.batch_size, show_progress)?;
    let total_in_store = store.count()?;
    Ok(IngestSummary { report, total_in_store })
}

/// Check the store exists, then load the embedder and connect the generator.
pub fn build_orchestrator(settings: &Settings, db_path: &Path) -> Result<QueryOrchestrator<LanceVectorStore>> {
    ensure_db_exists(db_path)?;
    let embedder = get_default_embedder(&settings.embedding)?;
    let generator = OllamaGenerator::new(&settings.generation)?;
    Ok(QueryOrchestrator::open(
        db_path,
        &settings.store.table,
        settings.query.clone(),
        embedder,
        Box::new(generator),
    )?)
}

pub fn print_answer<W: Write>(out: &mut W, result: &RagAnswer) -> std::io::Result<()> {
    writeln!(out, "\nAnswer:")?;
    writeln!(out, "{}", result.answer)?;
    writeln!(out, "\nSources:")?;
    for (i, source) in result.sources.iter().enumerate() {
        writeln!(out, "[{}] {}", i + 1, file_name_of(source))?;
    }
    Ok(())
}

pub fn is_exit_word(line: &str) -> bool {
    let lowered = line.trim().to_lowercase();
    EXIT_WORDS.contains(&lowered.as_str())
}

/// Question/answer loop until an exit word or end of input. A failed question
/// is reported and the loop keeps going.
pub fn run_interactive<R, W, F>(input: R, out: &mut W, model: &str, db_path: &Path, mut ask: F) -> Result<()>
where
    R: BufRead,
    W: Write,
    F: FnMut(&str) -> Result<RagAnswer>,
{
    writeln!(out, "\n=== Educational RAG System Interactive Mode ===")?;
    writeln!(out, "Using model: {}", model)?;
    writeln!(out, "Database: {}", db_path.display())?;
    writeln!(out, "Type \"exit\" to quit\n")?;

    let mut lines = input.lines();
    loop {
        write!(out, "\nQuestion: ")?;
        out.flush()?;
        let line = match lines.next() {
            Some(line) => line?,
            None => break,
        };
        if is_exit_word(&line) {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        writeln!(out, "\nThinking...")?;
        match ask(question) {
            Ok(result) => print_answer(out, &result)?,
            Err(e) => writeln!(out, "\nError: {:#}", e)?,
        }
    }
    writeln!(out)?;
    Ok(())
}
