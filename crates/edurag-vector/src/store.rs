//! Persistent chunk store on LanceDB.
//!
//! Lance is async; the store owns a tokio runtime and blocks on every call so
//! that it can implement the synchronous `VectorIndex` trait.
use anyhow::{anyhow, bail, Context, Result};
use arrow_array::{Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::{debug, info};

use edurag_core::traits::VectorIndex;
use edurag_core::types::{Chunk, ChunkMetadata, ScoredChunk};

use crate::schema::{build_chunk_schema, vector_dim, VECTOR_COLUMN};
use crate::table::{ensure_table, open_db, table_exists};

const INSERT_BATCH: usize = 1000;

pub struct LanceVectorStore {
	db: Connection,
	table_name: String,
	dim: usize,
	rt: Runtime,
}

impl LanceVectorStore {
	/// Connect to the database directory at `path`; Lance creates it on first write.
	pub fn open(path: &Path, table_name: &str, dim: usize) -> Result<Self> {
		let rt = Runtime::new().context("starting tokio runtime for LanceDB")?;
		let uri = path.to_string_lossy().to_string();
		let db = rt.block_on(open_db(&uri))?;
		debug!(uri = %uri, table = table_name, dim, "opened lance database");
		Ok(Self { db, table_name: table_name.to_string(), dim, rt })
	}

	pub fn dim(&self) -> usize { self.dim }

	pub fn table_exists(&self) -> Result<bool> {
		self.rt.block_on(table_exists(&self.db, &self.table_name))
	}

	/// Number of stored chunks; zero when the table was never created.
	pub fn count(&self) -> Result<usize> {
		self.rt.block_on(self.count_rows())
	}

	async fn count_rows(&self) -> Result<usize> {
		if !table_exists(&self.db, &self.table_name).await? {
			return Ok(0);
		}
		let table = self.db.open_table(&self.table_name).execute().await?;
		Ok(table.count_rows(None).await?)
	}

	async fn check_table_dim(&self, table: &lancedb::Table) -> Result<()> {
		let schema = table.schema().await?;
		match vector_dim(&schema) {
			Some(stored) if stored != self.dim => bail!(
				"table '{}' stores {}-dim vectors but the embedder produces {}",
				self.table_name, stored, self.dim
			),
			_ => Ok(()),
		}
	}

	async fn insert_all(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
		let dim = i32::try_from(self.dim).map_err(|_| anyhow!("vector dim {} too large", self.dim))?;
		ensure_table(&self.db, &self.table_name, build_chunk_schema(dim)).await?;
		let table = self.db.open_table(&self.table_name).execute().await?;
		self.check_table_dim(&table).await?;
		for (chunk_batch, vector_batch) in chunks.chunks(INSERT_BATCH).zip(embeddings.chunks(INSERT_BATCH)) {
			self.insert_batch(&table, chunk_batch, vector_batch).await?;
		}
		Ok(())
	}

	async fn search(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
		if !table_exists(&self.db, &self.table_name).await? {
			return Ok(Vec::new());
		}
		let table = self.db.open_table(&self.table_name).execute().await?;
		self.check_table_dim(&table).await?;
		let mut stream = table
			.vector_search(vector.to_vec())?
			.column(VECTOR_COLUMN)
			.distance_type(DistanceType::Cosine)
			.limit(k)
			.execute()
			.await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			hits.extend(rows_to_hits(&batch)?);
		}
		hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
		hits.truncate(k);
		Ok(hits)
	}

	async fn insert_batch(&self, table: &lancedb::Table, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<()> {
		if chunks.is_empty() { return Ok(()); }
		let record_batch = self.to_record_batch(chunks, embeddings)?;
		let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		table.add(reader).execute().await?;
		Ok(())
	}

	fn to_record_batch(&self, chunks: &[Chunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
		let dim = i32::try_from(self.dim).map_err(|_| anyhow!("vector dim {} too large", self.dim))?;
		let mut contents = Vec::with_capacity(chunks.len());
		let mut sources = Vec::with_capacity(chunks.len());
		let mut file_names = Vec::with_capacity(chunks.len());
		let mut chunk_ids = Vec::with_capacity(chunks.len());
		let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::with_capacity(chunks.len());
		for (chunk, vector) in chunks.iter().zip(embeddings) {
			contents.push(chunk.content.clone());
			sources.push(chunk.metadata.source.clone());
			file_names.push(chunk.metadata.file_name.clone());
			chunk_ids.push(chunk.metadata.chunk_id as i64);
			vectors.push(Some(vector.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(build_chunk_schema(dim), vec![
			Arc::new(StringArray::from(contents)),
			Arc::new(StringArray::from(sources)),
			Arc::new(StringArray::from(file_names)),
			Arc::new(Int64Array::from(chunk_ids)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim)),
		])?;
		Ok(record_batch)
	}
}

impl VectorIndex for LanceVectorStore {
	fn insert(&self, chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<()> {
		if chunks.len() != embeddings.len() {
			bail!("{} chunks but {} embeddings", chunks.len(), embeddings.len());
		}
		if let Some(bad) = embeddings.iter().find(|v| v.len() != self.dim) {
			bail!("embedding has {} dims, store expects {}", bad.len(), self.dim);
		}
		if chunks.is_empty() { return Ok(()); }
		self.rt.block_on(self.insert_all(&chunks, &embeddings))?;
		info!(rows = chunks.len(), table = %self.table_name, "stored chunks");
		Ok(())
	}

	fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
		if vector.len() != self.dim {
			bail!("query vector has {} dims, store expects {}", vector.len(), self.dim);
		}
		let hits = self.rt.block_on(self.search(vector, k))?;
		debug!(k, hits = hits.len(), "vector search");
		Ok(hits)
	}
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| anyhow!("column '{}' missing or not utf8", name))
}

fn optional_string(column: &StringArray, row: usize) -> Option<String> {
	if column.is_null(row) { None } else { Some(column.value(row).to_string()) }
}

fn rows_to_hits(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
	let contents = string_column(batch, "content")?;
	let sources = string_column(batch, "source")?;
	let file_names = string_column(batch, "file_name")?;
	let chunk_ids = batch
		.column_by_name("chunk_id")
		.and_then(|c| c.as_any().downcast_ref::<Int64Array>())
		.ok_or_else(|| anyhow!("column 'chunk_id' missing or not int64"))?;
	let distances = batch
		.column_by_name("_distance")
		.and_then(|c| c.as_any().downcast_ref::<Float32Array>());

	let mut hits = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let score = distances.map(|d| 1.0 - d.value(i)).unwrap_or(0.0);
		hits.push(ScoredChunk {
			chunk: Chunk {
				content: contents.value(i).to_string(),
				metadata: ChunkMetadata {
					source: optional_string(sources, i),
					file_name: optional_string(file_names, i),
					chunk_id: chunk_ids.value(i) as u64,
				},
			},
			score,
		});
	}
	Ok(hits)
}
