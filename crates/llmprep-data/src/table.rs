//! Loading tabular datasets into Arrow record batches.

use arrow::datatypes::SchemaRef;
use arrow::record_batch::RecordBatch;
use llmprep_core::{PrepError, Result};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::io::{BufReader, Seek};
use std::path::Path;
use std::sync::Arc;

/// On-disk table formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    /// Apache Parquet.
    Parquet,
    /// Comma-separated values with a header row.
    Csv,
    /// One JSON object per line.
    JsonLines,
}

impl TableFormat {
    /// Pick the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("parquet") | Some("pq") => Ok(Self::Parquet),
            Some("csv") => Ok(Self::Csv),
            Some("jsonl") | Some("json") | Some("ndjson") => Ok(Self::JsonLines),
            _ => Err(PrepError::InvalidArgument(format!(
                "Unsupported table file '{}'. Expected .parquet, .csv or .jsonl",
                path.display()
            ))),
        }
    }
}

/// Load a table file into a single record batch.
///
/// The format follows the file extension; CSV and JSON Lines schemas are
/// inferred from the data.
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<RecordBatch> {
    let path = path.as_ref();
    let format = TableFormat::from_path(path)?;
    let file = File::open(path).map_err(|e| {
        PrepError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to open table file {}: {}", path.display(), e),
        ))
    })?;

    let (schema, batches) = match format {
        TableFormat::Parquet => read_parquet(file)?,
        TableFormat::Csv => read_csv(file)?,
        TableFormat::JsonLines => read_json_lines(file)?,
    };

    let table = arrow::compute::concat_batches(&schema, &batches)
        .map_err(|e| PrepError::Table(format!("Failed to combine batches: {}", e)))?;
    tracing::debug!(
        path = %path.display(),
        rows = table.num_rows(),
        columns = table.num_columns(),
        "Loaded table"
    );
    Ok(table)
}

fn read_parquet(file: File) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| PrepError::Table(format!("Failed to create Parquet reader: {}", e)))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .map_err(|e| PrepError::Table(format!("Failed to build Parquet reader: {}", e)))?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PrepError::Table(format!("Failed to read Parquet batch: {}", e)))?;
    Ok((schema, batches))
}

fn read_csv(mut file: File) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let format = arrow::csv::reader::Format::default().with_header(true);
    let (schema, _) = format
        .infer_schema(&mut file, None)
        .map_err(|e| PrepError::Table(format!("Failed to infer CSV schema: {}", e)))?;
    file.rewind()?;

    let schema = Arc::new(schema);
    let reader = arrow::csv::ReaderBuilder::new(schema.clone())
        .with_format(format)
        .build(file)
        .map_err(|e| PrepError::Table(format!("Failed to build CSV reader: {}", e)))?;

    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PrepError::Table(format!("Failed to read CSV batch: {}", e)))?;
    Ok((schema, batches))
}

fn read_json_lines(file: File) -> Result<(SchemaRef, Vec<RecordBatch>)> {
    let mut reader = BufReader::new(file);
    let (schema, _) = arrow::json::reader::infer_json_schema_from_seekable(&mut reader, None)
        .map_err(|e| PrepError::Table(format!("Failed to infer JSON schema: {}", e)))?;
    reader.rewind()?;

    let schema = Arc::new(schema);
    let json = arrow::json::ReaderBuilder::new(schema.clone())
        .build(reader)
        .map_err(|e| PrepError::Table(format!("Failed to build JSON reader: {}", e)))?;

    let batches = json
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| PrepError::Table(format!("Failed to read JSON batch: {}", e)))?;
    Ok((schema, batches))
}
