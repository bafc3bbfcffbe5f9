use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use edurag_core::config::{ChunkingConfig, CitationOrder, QueryConfig};
use edurag_core::error::Error;
use edurag_core::traits::{AnswerGenerator, Embedder, VectorIndex};
use edurag_core::types::{Chunk, ChunkMetadata, Generation, ScoredChunk};
use edurag_embed::FakeEmbedder;
use edurag_rag::{index_chunks, prepare_chunks, QueryOrchestrator, Retriever};
use edurag_vector::{LanceVectorStore, MemoryIndex};
use tempfile::TempDir;

const DIM: usize = 64;

/// FakeEmbedder that counts how many texts it was asked to embed.
struct CountingEmbedder {
    inner: FakeEmbedder,
    calls: Arc<AtomicUsize>,
}

impl CountingEmbedder {
    fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Self { inner: FakeEmbedder::new(DIM), calls: calls.clone() }, calls)
    }
}

impl Embedder for CountingEmbedder {
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

type Calls = Arc<Mutex<Vec<(String, String)>>>;

/// Records `(prompt, model)` and replies with a canned outcome.
struct StubGenerator {
    reply: Option<Generation>,
    calls: Calls,
}

impl StubGenerator {
    fn replying(reply: Generation) -> (Box<dyn AnswerGenerator>, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        (Box::new(Self { reply: Some(reply), calls: calls.clone() }), calls)
    }

    fn unreachable() -> (Box<dyn AnswerGenerator>, Calls) {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        (Box::new(Self { reply: None, calls: calls.clone() }), calls)
    }
}

impl AnswerGenerator for StubGenerator {
    fn generate(&self, prompt: &str, model: &str) -> anyhow::Result<Generation> {
        self.calls.lock().unwrap().push((prompt.to_string(), model.to_string()));
        self.reply.clone().ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}

/// Returns a fixed ranking regardless of the query vector.
struct FixedIndex(Vec<ScoredChunk>);

impl VectorIndex for FixedIndex {
    fn insert(&self, _chunks: Vec<Chunk>, _embeddings: Vec<Vec<f32>>) -> anyhow::Result<()> { Ok(()) }
    fn query(&self, _vector: &[f32], k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        Ok(self.0.iter().take(k).cloned().collect())
    }
}

struct BrokenIndex;

impl VectorIndex for BrokenIndex {
    fn insert(&self, _chunks: Vec<Chunk>, _embeddings: Vec<Vec<f32>>) -> anyhow::Result<()> {
        Err(anyhow::anyhow!("disk full"))
    }
    fn query(&self, _vector: &[f32], _k: usize) -> anyhow::Result<Vec<ScoredChunk>> {
        Err(anyhow::anyhow!("index unavailable"))
    }
}

fn scored(content: &str, source: Option<&str>, id: u64, score: f32) -> ScoredChunk {
    ScoredChunk {
        chunk: Chunk {
            content: content.to_string(),
            metadata: ChunkMetadata {
                source: source.map(str::to_string),
                file_name: source.map(edurag_core::types::file_name_of),
                chunk_id: id,
            },
        },
        score,
    }
}

fn ranked() -> Vec<ScoredChunk> {
    vec![
        scored("Cells divide by mitosis.", Some("course/week2/cells.txt"), 4, 0.9),
        scored("Mitosis has four phases.", Some("course/week1/bio.pdf"), 1, 0.8),
        scored("Prophase comes first.", Some("course/week2/cells.txt"), 5, 0.7),
    ]
}

fn orchestrator<V: VectorIndex>(index: V, config: QueryConfig, generator: Box<dyn AnswerGenerator>) -> QueryOrchestrator<V> {
    let (embedder, _) = CountingEmbedder::new();
    QueryOrchestrator::new(config, Retriever::new(index, Box::new(embedder)), generator).expect("orchestrator")
}

#[test]
fn answer_carries_text_and_deduplicated_sources() {
    let (generator, calls) = StubGenerator::replying(Generation::Text("Mitosis splits a cell.".into()));
    let rag = orchestrator(FixedIndex(ranked()), QueryConfig::default(), generator);
    let out = rag.answer("How do cells divide?", "llama3:8b", 5).expect("answer");

    assert_eq!(out.answer, "Mitosis splits a cell.");
    assert_eq!(out.sources, vec!["course/week1/bio.pdf", "course/week2/cells.txt"]);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "llama3:8b");
    assert!(calls[0].0.contains("SOURCES:\n[1] bio.pdf, [2] cells.txt\n"));
}

#[test]
fn prompt_matches_template_exactly() {
    let (generator, calls) = StubGenerator::replying(Generation::Text("ok".into()));
    let config = QueryConfig { citation_order: CitationOrder::FirstSeen, ..QueryConfig::default() };
    let rag = orchestrator(FixedIndex(ranked()), config, generator);
    let out = rag.answer("How do cells divide?", "mistral", 2).expect("answer");

    let expected = "You are an educational assistant that answers questions based on course materials.\n\
Use the following context to answer the question, and cite your sources where possible.\n\
\n\
CONTEXT:\n\
Document: cells.txt\nContent: Cells divide by mitosis.\n\n\
Document: bio.pdf\nContent: Mitosis has four phases.\n\
\n\
SOURCES:\n\
[1] cells.txt, [2] bio.pdf\n\
\n\
QUESTION:\n\
How do cells divide?\n\
\n\
ANSWER:\n";
    assert_eq!(calls.lock().unwrap()[0].0, expected);
    assert_eq!(out.sources, vec!["course/week2/cells.txt", "course/week1/bio.pdf"], "numbering order matches sources");
}

#[test]
fn chunks_without_metadata_use_unknown_and_are_not_cited() {
    let (generator, calls) = StubGenerator::replying(Generation::Text("ok".into()));
    let hits = vec![scored("Loose note.", None, 0, 0.9), scored("Real one.", Some("notes.txt"), 1, 0.5)];
    let rag = orchestrator(FixedIndex(hits), QueryConfig::default(), generator);
    let out = rag.answer("q", "llama3:8b", 5).expect("answer");
    assert_eq!(out.sources, vec!["notes.txt"]);
    let prompt = calls.lock().unwrap()[0].0.clone();
    assert!(prompt.contains("Document: Unknown\nContent: Loose note."));
    assert!(prompt.contains("SOURCES:\n[1] notes.txt\n"));
}

#[test]
fn service_errors_fold_into_answer_by_default() {
    let (generator, _) = StubGenerator::replying(Generation::ServiceError { status: 404, body: "model not found".into() });
    let rag = orchestrator(FixedIndex(ranked()), QueryConfig::default(), generator);
    let out = rag.ask("q").expect("folded");
    assert_eq!(out.answer, "Error: model not found");
    assert_eq!(out.sources.len(), 2);
}

#[test]
fn service_errors_surface_when_folding_is_off() {
    let (generator, _) = StubGenerator::replying(Generation::ServiceError { status: 500, body: "boom".into() });
    let config = QueryConfig { fold_service_errors: false, ..QueryConfig::default() };
    let rag = orchestrator(FixedIndex(ranked()), config, generator);
    match rag.ask("q") {
        Err(Error::GenerationService { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected GenerationService, got {other:?}"),
    }
}

#[test]
fn transport_failure_is_a_generation_error() {
    let (generator, calls) = StubGenerator::unreachable();
    let rag = orchestrator(FixedIndex(ranked()), QueryConfig::default(), generator);
    assert!(matches!(rag.ask("q"), Err(Error::Generation(_))));
    assert_eq!(calls.lock().unwrap().len(), 1);
}

#[test]
fn retrieval_failure_skips_generation() {
    let (generator, calls) = StubGenerator::replying(Generation::Text("never".into()));
    let rag = orchestrator(BrokenIndex, QueryConfig::default(), generator);
    assert!(matches!(rag.ask("q"), Err(Error::Retrieval(_))));
    assert!(calls.lock().unwrap().is_empty(), "generator must not be called");
}

#[test]
fn zero_top_k_is_a_configuration_error() {
    let (generator, calls) = StubGenerator::replying(Generation::Text("never".into()));
    let (embedder, embeds) = CountingEmbedder::new();
    let rag = QueryOrchestrator::new(QueryConfig::default(), Retriever::new(FixedIndex(ranked()), Box::new(embedder)), generator).unwrap();
    assert!(matches!(rag.answer("q", "llama3:8b", 0), Err(Error::Configuration(_))));
    assert_eq!(embeds.load(Ordering::SeqCst), 0);
    assert!(calls.lock().unwrap().is_empty());

    let (generator, _) = StubGenerator::replying(Generation::Text("x".into()));
    let config = QueryConfig { top_k: 0, ..QueryConfig::default() };
    let (embedder, _) = CountingEmbedder::new();
    assert!(QueryOrchestrator::new(config, Retriever::new(FixedIndex(vec![]), Box::new(embedder)), generator).is_err());
}

#[test]
fn ask_uses_configured_model_and_top_k() {
    let (generator, calls) = StubGenerator::replying(Generation::Text("ok".into()));
    let config = QueryConfig { model: "phi3".into(), top_k: 1, ..QueryConfig::default() };
    let rag = orchestrator(FixedIndex(ranked()), config, generator);
    let out = rag.ask("q").expect("answer");
    assert_eq!(out.sources, vec!["course/week2/cells.txt"]);
    let calls = calls.lock().unwrap();
    assert_eq!(calls[0].1, "phi3");
    assert_eq!(calls[0].0.matches("Document: ").count(), 1);
}

#[test]
fn missing_db_path_fails_before_any_work() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("chroma_db");
    let (embedder, embeds) = CountingEmbedder::new();
    let (generator, calls) = StubGenerator::replying(Generation::Text("never".into()));
    let result = QueryOrchestrator::open(&missing, "chunks", QueryConfig::default(), Box::new(embedder), generator);
    assert!(matches!(result, Err(Error::Configuration(_))));
    assert_eq!(embeds.load(Ordering::SeqCst), 0);
    assert!(calls.lock().unwrap().is_empty());
    assert!(!missing.exists(), "no store directory is created");
}

fn write_course(dir: &std::path::Path) {
    fs::write(dir.join("biology.txt"), "Photosynthesis converts light energy into chemical energy.\n\nChlorophyll absorbs light.").unwrap();
    fs::create_dir_all(dir.join("history")).unwrap();
    fs::write(dir.join("history/revolution.txt"), "The French Revolution began in 1789 with the storming of the Bastille.").unwrap();
}

#[test]
fn ingest_into_memory_index() {
    let tmp = TempDir::new().unwrap();
    write_course(tmp.path());
    fs::write(tmp.path().join("broken.pdf"), b"not a pdf").unwrap();

    let chunking = ChunkingConfig { chunk_size: 40, chunk_overlap: 10, ..ChunkingConfig::default() };
    let (chunks, mut report) = prepare_chunks(tmp.path(), &chunking).expect("prepare");
    assert_eq!(report.documents_loaded, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.chunks_created, chunks.len());
    assert!(chunks.len() > 2);

    let index = MemoryIndex::new();
    let embedder = FakeEmbedder::new(DIM);
    report.chunks_stored = index_chunks(&index, &embedder, chunks, 2, false).expect("index");
    assert_eq!(report.chunks_stored, report.chunks_created);
    assert_eq!(index.len(), report.chunks_created);
}

#[test]
fn ingest_reports_bad_parameters_and_store_failures() {
    let tmp = TempDir::new().unwrap();
    write_course(tmp.path());
    let bad = ChunkingConfig { chunk_size: 10, chunk_overlap: 10, ..ChunkingConfig::default() };
    assert!(matches!(prepare_chunks(tmp.path(), &bad), Err(Error::Configuration(_))));
    assert!(matches!(prepare_chunks(&tmp.path().join("missing"), &ChunkingConfig::default()), Err(Error::Configuration(_))));

    let (chunks, _) = prepare_chunks(tmp.path(), &ChunkingConfig::default()).expect("prepare");
    let embedder = FakeEmbedder::new(DIM);
    assert!(matches!(index_chunks(&BrokenIndex, &embedder, chunks, 8, false), Err(Error::Indexing(_))));
    assert_eq!(index_chunks(&BrokenIndex, &embedder, Vec::new(), 8, false).unwrap(), 0);
}

#[test]
fn empty_directory_yields_no_chunks() {
    let tmp = TempDir::new().unwrap();
    let (chunks, report) = prepare_chunks(tmp.path(), &ChunkingConfig::default()).expect("prepare");
    assert!(chunks.is_empty());
    assert_eq!(report.documents_loaded, 0);
}

#[test]
fn end_to_end_through_lance_store() {
    let docs = TempDir::new().unwrap();
    write_course(docs.path());
    let db = TempDir::new().unwrap();
    let db_path = db.path().join("chroma_db");

    let (chunks, _) = prepare_chunks(docs.path(), &ChunkingConfig::default()).expect("prepare");
    let created = chunks.len();
    {
        let embedder = FakeEmbedder::new(DIM);
        let store = LanceVectorStore::open(&db_path, "chunks", DIM).expect("store");
        assert_eq!(index_chunks(&store, &embedder, chunks, 32, false).expect("index"), created);
        assert_eq!(store.count().unwrap(), created);
    }

    let (generator, calls) = StubGenerator::replying(Generation::Text("Light becomes sugar.".into()));
    let (embedder, _) = CountingEmbedder::new();
    let rag = QueryOrchestrator::open(&db_path, "chunks", QueryConfig::default(), Box::new(embedder), generator).expect("open");
    let out = rag.answer("photosynthesis light energy", "llama3:8b", 5).expect("answer");
    eprintln!("sources: {:?}", out.sources);
    assert_eq!(out.answer, "Light becomes sugar.");
    assert_eq!(out.sources.len(), 2, "both files are cited once");
    assert!(out.sources.iter().any(|s| s.ends_with("biology.txt")));
    let prompt = calls.lock().unwrap()[0].0.clone();
    assert!(prompt.contains("Document: biology.txt"));
}
