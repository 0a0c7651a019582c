//! Pipeline for curating JSONL product listings into a price dataset.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use walkdir::WalkDir;

use crate::curator::{CuratedItem, Curator, Rejection};
use crate::error::{CurationError, PipelineError, Result};
use crate::record::{parse_price, RawRecord};
use crate::Tokenizer;

/// Configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Listings priced below this are skipped.
    pub min_price: f64,
    /// Listings priced above this are skipped.
    pub max_price: f64,
    /// Fraction of included items held out as the test split.
    pub test_ratio: f64,
    pub seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_price: 0.5,
            max_price: 999.49,
            test_ratio: 0.05,
            seed: 42,
        }
    }
}

/// Lines read from disk and curated in parallel at a time.
const BATCH_LINES: usize = 4096;

/// Per-outcome record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CurationStats {
    pub records: usize,
    /// Files that could not be opened or read to the end.
    pub failed_files: usize,
    /// Lines that are not valid UTF-8.
    pub unreadable: usize,
    pub malformed: usize,
    pub invalid: usize,
    pub unpriced: usize,
    pub out_of_price_range: usize,
    pub too_few_chars: usize,
    pub too_few_tokens: usize,
    pub encoding_failures: usize,
    pub included: usize,
}

impl CurationStats {
    fn merge(&mut self, other: &CurationStats) {
        self.records += other.records;
        self.failed_files += other.failed_files;
        self.unreadable += other.unreadable;
        self.malformed += other.malformed;
        self.invalid += other.invalid;
        self.unpriced += other.unpriced;
        self.out_of_price_range += other.out_of_price_range;
        self.too_few_chars += other.too_few_chars;
        self.too_few_tokens += other.too_few_tokens;
        self.encoding_failures += other.encoding_failures;
        self.included += other.included;
    }
}

/// Result of curating a single file. Only included items are kept.
#[derive(Debug)]
pub struct FileResult {
    pub items: Vec<CuratedItem>,
    pub stats: CurationStats,
    pub source_path: String,
}

/// Summary of a written dataset.
#[derive(Debug, Serialize)]
pub struct DatasetSummary {
    pub total_files: usize,
    pub stats: CurationStats,
    pub train_items: usize,
    pub test_items: usize,
    pub total_tokens: usize,
}

/// A line of `train.jsonl` / `test.jsonl`.
#[derive(Debug, Serialize)]
pub struct TrainingRecord<'a> {
    pub text: &'a str,
    pub price: f64,
}

#[derive(Debug, Serialize)]
struct SummaryRow<'a> {
    title: &'a str,
    main_category: &'a str,
    price: f64,
    token_count: usize,
    split: &'static str,
}

enum LineOutcome {
    Malformed,
    Invalid,
    Unpriced,
    OutOfPriceRange,
    Rejected(Rejection),
    EncodingFailure,
    Included(CuratedItem),
}

/// Discover all JSONL files in a directory.
pub fn discover_jsonl_files(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
        .map(|e| e.path().to_path_buf())
        .collect();
    paths.sort();
    paths
}

fn curate_line<T>(
    path: &Path,
    line_no: usize,
    line: &str,
    curator: &Curator<T>,
    config: &PipelineConfig,
) -> LineOutcome
where
    T: Tokenizer,
{
    let record: RawRecord = match serde_json::from_str(line) {
        Ok(record) => record,
        Err(e) => {
            tracing::warn!(path = %path.display(), line = line_no, "Skipping malformed record: {e}");
            return LineOutcome::Malformed;
        }
    };

    let Some(price) = record.price.as_ref().and_then(parse_price) else {
        return LineOutcome::Unpriced;
    };
    if price < config.min_price || price > config.max_price {
        return LineOutcome::OutOfPriceRange;
    }

    match curator.curate(&record, price) {
        Ok(item) => match item.rejection() {
            Some(rejection) => {
                tracing::debug!(line = line_no, ?rejection, "Rejected {item}");
                LineOutcome::Rejected(rejection)
            }
            None => LineOutcome::Included(item),
        },
        Err(CurationError::InvalidRecord { field }) => {
            tracing::debug!(path = %path.display(), line = line_no, field, "Invalid record");
            LineOutcome::Invalid
        }
        Err(CurationError::Encoding(e)) => {
            tracing::warn!(path = %path.display(), line = line_no, "Tokenizer failed: {e}");
            LineOutcome::EncodingFailure
        }
    }
}

/// Curate a single JSONL file.
///
/// Lines are streamed in batches and each batch is curated in parallel; bad
/// lines are counted, never fatal. Only a failure to read the file is an error.
pub fn curate_file<T>(
    path: &Path,
    curator: &Curator<T>,
    config: &PipelineConfig,
) -> Result<FileResult>
where
    T: Tokenizer + Sync,
{
    let file = File::open(path).map_err(|e| PipelineError::io(path, e))?;
    let mut lines = BufReader::new(file).split(b'\n').enumerate();

    let mut stats = CurationStats::default();
    let mut items = Vec::new();
    let mut batch: Vec<(usize, String)> = Vec::with_capacity(BATCH_LINES);
    loop {
        let mut exhausted = true;
        for (idx, bytes) in lines.by_ref() {
            let bytes = bytes.map_err(|e| PipelineError::io(path, e))?;
            match String::from_utf8(bytes) {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => batch.push((idx + 1, line)),
                Err(_) => {
                    tracing::warn!(path = %path.display(), line = idx + 1, "Skipping non-UTF-8 line");
                    stats.records += 1;
                    stats.unreadable += 1;
                }
            }
            if batch.len() == BATCH_LINES {
                exhausted = false;
                break;
            }
        }

        let outcomes: Vec<LineOutcome> = batch
            .par_iter()
            .map(|(line_no, line)| curate_line(path, *line_no, line, curator, config))
            .collect();
        batch.clear();
        tally(outcomes, &mut stats, &mut items);

        if exhausted {
            break;
        }
    }

    Ok(FileResult {
        items,
        stats,
        source_path: path.to_string_lossy().to_string(),
    })
}

fn tally(outcomes: Vec<LineOutcome>, stats: &mut CurationStats, items: &mut Vec<CuratedItem>) {
    stats.records += outcomes.len();
    for outcome in outcomes {
        match outcome {
            LineOutcome::Malformed => stats.malformed += 1,
            LineOutcome::Invalid => stats.invalid += 1,
            LineOutcome::Unpriced => stats.unpriced += 1,
            LineOutcome::OutOfPriceRange => stats.out_of_price_range += 1,
            LineOutcome::Rejected(Rejection::TooFewChars { .. }) => stats.too_few_chars += 1,
            LineOutcome::Rejected(Rejection::TooFewTokens { .. }) => stats.too_few_tokens += 1,
            LineOutcome::EncodingFailure => stats.encoding_failures += 1,
            LineOutcome::Included(item) => {
                stats.included += 1;
                items.push(item);
            }
        }
    }
}

/// Curate all JSONL files in a directory in parallel.
///
/// The tokenizer must be `Sync` to be shared across threads.
pub fn curate_all<T>(
    root: &Path,
    curator: &Curator<T>,
    config: &PipelineConfig,
) -> Result<Vec<FileResult>>
where
    T: Tokenizer + Sync,
{
    let files = discover_jsonl_files(root);

    if files.is_empty() {
        return Err(PipelineError::NoInputFiles(root.to_path_buf()));
    }

    Ok(curate_files(files, curator, config))
}

/// Curate the given files in parallel.
///
/// A file that cannot be read yields an empty result counted in `failed_files`.
pub fn curate_files<T>(
    files: Vec<PathBuf>,
    curator: &Curator<T>,
    config: &PipelineConfig,
) -> Vec<FileResult>
where
    T: Tokenizer + Sync,
{
    let total_files = files.len();
    let processed_count = AtomicUsize::new(0);
    let error_count = AtomicUsize::new(0);

    let results: Vec<FileResult> = files
        .into_par_iter()
        .map(|path| {
            let result = curate_file(&path, curator, config);
            let count = processed_count.fetch_add(1, Ordering::Relaxed) + 1;

            match result {
                Ok(file_result) => {
                    tracing::info!(
                        included = file_result.stats.included,
                        records = file_result.stats.records,
                        "Processed {}/{} files ({})",
                        count,
                        total_files,
                        file_result.source_path
                    );
                    file_result
                }
                Err(e) => {
                    error_count.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(path = %path.display(), "Error processing file: {e}");
                    FileResult {
                        items: Vec::new(),
                        stats: CurationStats {
                            failed_files: 1,
                            ..Default::default()
                        },
                        source_path: path.to_string_lossy().to_string(),
                    }
                }
            }
        })
        .collect();

    let errors = error_count.load(Ordering::Relaxed);
    if errors > 0 {
        tracing::warn!("{} files failed to process", errors);
    }

    results
}

/// Shuffle included items and write `train.jsonl`, `test.jsonl` and `summary.csv`.
pub fn write_dataset(
    results: Vec<FileResult>,
    output_dir: &Path,
    config: &PipelineConfig,
) -> Result<DatasetSummary> {
    std::fs::create_dir_all(output_dir).map_err(|e| PipelineError::io(output_dir, e))?;

    let total_files = results.len();
    let mut stats = CurationStats::default();
    let mut items = Vec::new();
    for result in results {
        stats.merge(&result.stats);
        items.extend(result.items.into_iter().filter(CuratedItem::included));
    }

    fastrand::Rng::with_seed(config.seed).shuffle(&mut items);

    let test_count = ((items.len() as f64 * config.test_ratio).round() as usize).min(items.len());
    let train_count = items.len() - test_count;

    let train_path = output_dir.join("train.jsonl");
    let test_path = output_dir.join("test.jsonl");
    let summary_path = output_dir.join("summary.csv");

    let mut train_file = create_writer(&train_path)?;
    let mut test_file = create_writer(&test_path)?;
    let mut summary = csv::Writer::from_path(&summary_path)?;

    let mut total_tokens = 0;
    for (idx, item) in items.iter().enumerate() {
        let Some(prompt) = item.prompt() else {
            continue;
        };
        let is_test = idx >= train_count;

        let (text, file, path, split) = if is_test {
            let text = item.test_prompt().unwrap_or(prompt.text.as_str());
            (text, &mut test_file, &test_path, "test")
        } else {
            (prompt.text.as_str(), &mut train_file, &train_path, "train")
        };
        let line = serde_json::to_string(&TrainingRecord {
            text,
            price: item.price,
        })?;
        writeln!(file, "{}", line).map_err(|e| PipelineError::io(path, e))?;

        summary.serialize(SummaryRow {
            title: &item.title,
            main_category: &item.main_category,
            price: item.price,
            token_count: prompt.token_count,
            split,
        })?;
        total_tokens += prompt.token_count;
    }

    train_file.flush().map_err(|e| PipelineError::io(&train_path, e))?;
    test_file.flush().map_err(|e| PipelineError::io(&test_path, e))?;
    summary.flush().map_err(|e| PipelineError::io(&summary_path, e))?;

    Ok(DatasetSummary {
        total_files,
        stats,
        train_items: train_count,
        test_items: test_count,
        total_tokens,
    })
}

fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    Ok(BufWriter::new(file))
}
