//! LanceDB-backed nearest-neighbour index over one artifact's commits

use crate::error::StoreError;
use crate::types::CommitRecord;
use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatch, RecordBatchIterator,
    StringArray, types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use futures::stream::TryStreamExt;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{DistanceType, Table};
use std::path::Path;
use std::sync::Arc;

const TABLE_NAME: &str = "commits";

/// A stored commit and its cosine distance to the query vector
#[derive(Debug, Clone)]
pub struct IndexHit {
    pub record: CommitRecord,
    pub distance: f32,
}

/// Vector index of a single artifact (one LanceDB database, one table)
pub struct CommitIndex {
    connection: Connection,
    db_path: String,
}

impl CommitIndex {
    /// Create the index at `dir` holding `records[i]` with `vectors[i]`
    pub async fn create(
        dir: &Path,
        records: &[CommitRecord],
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, StoreError> {
        Self::try_create(dir, records, vectors)
            .await
            .map_err(|e| StoreError::WriteFailure {
                path: dir.display().to_string(),
                reason: format!("{:#}", e),
            })
    }

    /// Open an existing index
    pub async fn open(dir: &Path) -> Result<Self, StoreError> {
        Self::connect(dir)
            .await
            .map_err(|e| StoreError::ReadFailed {
                path: dir.display().to_string(),
                reason: format!("{:#}", e),
            })
    }

    /// Number of rows in the commits table
    pub async fn count(&self) -> Result<usize, StoreError> {
        let run = async {
            let table = self.table().await?;
            let rows = table
                .count_rows(None)
                .await
                .context("Failed to count rows")?;
            Ok::<usize, anyhow::Error>(rows)
        };
        run.await.map_err(|e| self.read_error(e))
    }

    /// The `k` rows closest to `query` by cosine distance
    pub async fn nearest(&self, query: Vec<f32>, k: usize) -> Result<Vec<IndexHit>, StoreError> {
        self.try_nearest(query, k)
            .await
            .map_err(|e| self.read_error(e))
    }

    async fn connect(dir: &Path) -> Result<Self> {
        let db_path = dir.to_string_lossy().to_string();
        tracing::debug!("Connecting to LanceDB at: {}", db_path);

        let connection = lancedb::connect(&db_path)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            connection,
            db_path,
        })
    }

    async fn try_create(
        dir: &Path,
        records: &[CommitRecord],
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self> {
        anyhow::ensure!(!records.is_empty(), "Cannot create an empty index");
        anyhow::ensure!(
            records.len() == vectors.len(),
            "Got {} vectors for {} records",
            vectors.len(),
            records.len()
        );

        let index = Self::connect(dir).await?;
        let dimension = vectors[0].len();
        let schema = Self::create_schema(dimension);
        let batch = Self::create_record_batch(records, vectors, schema.clone())?;
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        index
            .connection
            .create_table(TABLE_NAME, Box::new(batches))
            .execute()
            .await
            .context("Failed to create table")?;

        tracing::debug!(
            "Created table '{}' with {} rows ({} dims) at {}",
            TABLE_NAME,
            records.len(),
            dimension,
            index.db_path
        );
        Ok(index)
    }

    /// Create schema for the commits table
    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new("author", DataType::Utf8, false),
            Field::new("author_email", DataType::Utf8, false),
            Field::new("timestamp", DataType::Int64, false),
            Field::new("message", DataType::Utf8, false),
            Field::new("branch", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
        ]))
    }

    /// Convert records and vectors to a RecordBatch
    fn create_record_batch(
        records: &[CommitRecord],
        vectors: Vec<Vec<f32>>,
        schema: Arc<Schema>,
    ) -> Result<RecordBatch> {
        let dimension = vectors[0].len();
        anyhow::ensure!(
            vectors.iter().all(|v| v.len() == dimension),
            "Vectors have mixed dimensions"
        );

        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            vectors.into_iter().map(|v| Some(v.into_iter().map(Some))),
            dimension as i32,
        );

        let strings = |f: fn(&CommitRecord) -> &str| {
            StringArray::from(records.iter().map(f).collect::<Vec<_>>())
        };

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(strings(|r| r.id.as_str())),
                Arc::new(strings(|r| r.author.as_str())),
                Arc::new(strings(|r| r.author_email.as_str())),
                Arc::new(Int64Array::from(
                    records.iter().map(|r| r.timestamp).collect::<Vec<_>>(),
                )),
                Arc::new(strings(|r| r.message.as_str())),
                Arc::new(strings(|r| r.branch.as_str())),
                Arc::new(vector_array),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn table(&self) -> Result<Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .context("Failed to open table")
    }

    async fn try_nearest(&self, query: Vec<f32>, k: usize) -> Result<Vec<IndexHit>> {
        let table = self.table().await?;

        let results: Vec<RecordBatch> = table
            .vector_search(query)
            .context("Failed to create vector search")?
            .distance_type(DistanceType::Cosine)
            .limit(k.max(1))
            .execute()
            .await
            .context("Failed to execute search")?
            .try_collect()
            .await
            .context("Failed to collect search results")?;

        let mut hits = Vec::new();
        for batch in &results {
            hits.extend(Self::parse_batch(batch)?);
        }
        Ok(hits)
    }

    fn parse_batch(batch: &RecordBatch) -> Result<Vec<IndexHit>> {
        let ids = string_column(batch, "id")?;
        let authors = string_column(batch, "author")?;
        let emails = string_column(batch, "author_email")?;
        let messages = string_column(batch, "message")?;
        let branches = string_column(batch, "branch")?;
        let timestamps = batch
            .column_by_name("timestamp")
            .context("Missing timestamp column")?
            .as_any()
            .downcast_ref::<Int64Array>()
            .context("Invalid timestamp type")?;
        let distances = batch
            .column_by_name("_distance")
            .context("Missing _distance column")?
            .as_any()
            .downcast_ref::<Float32Array>()
            .context("Invalid _distance type")?;

        Ok((0..batch.num_rows())
            .map(|i| IndexHit {
                record: CommitRecord {
                    id: ids.value(i).to_string(),
                    author: authors.value(i).to_string(),
                    author_email: emails.value(i).to_string(),
                    timestamp: timestamps.value(i),
                    message: messages.value(i).to_string(),
                    branch: branches.value(i).to_string(),
                },
                distance: if distances.is_null(i) {
                    f32::NAN
                } else {
                    distances.value(i)
                },
            })
            .collect())
    }

    fn read_error(&self, err: anyhow::Error) -> StoreError {
        StoreError::ReadFailed {
            path: self.db_path.clone(),
            reason: format!("{:#}", err),
        }
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .with_context(|| format!("Missing {} column", name))?
        .as_any()
        .downcast_ref::<StringArray>()
        .with_context(|| format!("Invalid {} type", name))
}
