// 📥 Ingestion - Newline-delimited JSON expedition records
//
// Reads a whole file into a `Batch`, or hands it out in bounded chunks for
// the streaming mode. Lines that fail schema coercion are rejected and
// counted; only I/O failures abort the read.

use crate::model::{Batch, Expedition};
use crate::schema::{ExpeditionSchema, SchemaMismatch};
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// ============================================================================
// INGEST REPORT
// ============================================================================

/// Coerced expeditions plus what had to be rejected on the way
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub batch: Batch,
    pub rejected: Vec<SchemaMismatch>,
    pub lines_read: usize,
    pub rejected_lines: usize,
}

impl IngestReport {
    pub fn summary(&self) -> String {
        format!(
            "{} lines read, {} expeditions accepted, {} lines rejected ({} schema errors)",
            self.lines_read,
            self.batch.len(),
            self.rejected_lines,
            self.rejected.len()
        )
    }
}

/// One bounded slice of a record stream
#[derive(Debug, Clone, Default)]
pub struct Chunk {
    pub expeditions: Vec<Expedition>,
    pub rejected: Vec<SchemaMismatch>,
    pub rejected_lines: usize,
}

// ============================================================================
// RECORD SOURCE
// ============================================================================

/// Where raw expedition records come from. The engine only ever sees the
/// `Batch` or chunks a source produces.
pub trait RecordSource: Send + Sync {
    /// Human-readable location, for logs
    fn describe(&self) -> String;

    fn read_batch(&self) -> Result<IngestReport>;
}

/// A local `.jsonl` / `.ndjson` file
#[derive(Debug, Clone)]
pub struct NdjsonSource {
    path: PathBuf,
}

impl NdjsonSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        NdjsonSource { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<BufReader<File>> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open NDJSON file {}", self.path.display()))?;
        Ok(BufReader::new(file))
    }

    /// Stream the file in chunks of at most `chunk_size` accepted records
    pub fn chunks(&self, chunk_size: usize) -> Result<NdjsonChunks<BufReader<File>>> {
        Ok(NdjsonChunks::new(self.open()?, chunk_size))
    }
}

impl RecordSource for NdjsonSource {
    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn read_batch(&self) -> Result<IngestReport> {
        info!(path = %self.path.display(), "reading NDJSON records");
        read_ndjson(self.open()?)
    }
}

// ============================================================================
// READERS
// ============================================================================

/// Read every record from an NDJSON stream
pub fn read_ndjson<R: BufRead>(reader: R) -> Result<IngestReport> {
    let mut report = IngestReport::default();
    let mut expeditions = Vec::new();

    let mut chunks = NdjsonChunks::new(reader, usize::MAX);
    while let Some(chunk) = chunks.next().transpose()? {
        expeditions.extend(chunk.expeditions);
        report.rejected.extend(chunk.rejected);
        report.rejected_lines += chunk.rejected_lines;
    }

    report.lines_read = chunks.lines_read();
    report.batch = Batch::new(expeditions);

    info!("{}", report.summary());
    Ok(report)
}

/// Iterator of chunks over an NDJSON stream. Blank lines are ignored.
pub struct NdjsonChunks<R> {
    lines: Lines<R>,
    schema: ExpeditionSchema,
    chunk_size: usize,
    line_no: usize,
    finished: bool,
}

impl<R: BufRead> NdjsonChunks<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        NdjsonChunks {
            lines: reader.lines(),
            schema: ExpeditionSchema::new(),
            chunk_size: chunk_size.max(1),
            line_no: 0,
            finished: false,
        }
    }

    pub fn lines_read(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for NdjsonChunks<R> {
    type Item = Result<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let mut chunk = Chunk::default();

        while chunk.expeditions.len() < self.chunk_size {
            let text = match self.lines.next() {
                Some(Ok(text)) => text,
                Some(Err(e)) => {
                    self.finished = true;
                    let line = self.line_no + 1;
                    return Some(
                        Err::<Chunk, _>(e).with_context(|| format!("Failed to read line {}", line)),
                    );
                }
                None => {
                    self.finished = true;
                    break;
                }
            };
            self.line_no += 1;

            if text.trim().is_empty() {
                continue;
            }

            match self.schema.coerce_line(self.line_no, &text) {
                Ok(expedition) => chunk.expeditions.push(expedition),
                Err(errors) => {
                    for error in &errors {
                        warn!("rejecting record: {}", error);
                    }
                    chunk.rejected.extend(errors);
                    chunk.rejected_lines += 1;
                }
            }
        }

        if self.finished && chunk.expeditions.is_empty() && chunk.rejected_lines == 0 {
            return None;
        }

        debug!(
            accepted = chunk.expeditions.len(),
            rejected = chunk.rejected_lines,
            "chunk ready"
        );
        Some(Ok(chunk))
    }
}

// ============================================================================
// TESTS
// ============================================================================
