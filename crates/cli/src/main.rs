//! CLI tool for curating product listings into price-prediction training data.
//!
//! This tool reads JSONL product listings, keeps the ones with enough text to
//! be useful, and writes train/test prompt files. It uses the HuggingFace
//! tokenizers Rust library for exact token counts.

use std::path::{Path, PathBuf};

use clap::Parser;
use tokenizers::Tokenizer as HfTokenizer;
use tracing_subscriber::EnvFilter;

use price_curator_core::{
    curate_all, write_dataset, Curator, DatasetSummary, EncodingError, PipelineConfig, Tokenizer,
    DEFAULT_TOKENIZER, MAX_TOKENS, MIN_CHARS, MIN_TOKENS,
};

/// Curate JSONL product listings into price-prediction prompts.
#[derive(Parser, Debug)]
#[command(name = "price-curate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Root directory containing JSONL listing files
    #[arg(long)]
    input: PathBuf,

    /// Output directory for the dataset files
    #[arg(long)]
    output_dir: PathBuf,

    /// HuggingFace tokenizer model name, or path to a tokenizer.json
    #[arg(long, default_value = DEFAULT_TOKENIZER)]
    tokenizer: String,

    /// Skip listings priced below this
    #[arg(long, default_value = "0.5")]
    min_price: f64,

    /// Skip listings priced above this
    #[arg(long, default_value = "999.49")]
    max_price: f64,

    /// Fraction of curated items held out for testing (0.0-1.0)
    #[arg(long, default_value = "0.05")]
    test_ratio: f64,

    /// Seed for the train/test shuffle
    #[arg(long, default_value = "42")]
    seed: u64,
}

/// Wrapper around HuggingFace tokenizers.
///
/// This uses the Rust-native tokenizers library, which is `Send + Sync`
/// and lets rayon curate records in parallel.
struct RustTokenizer {
    inner: HfTokenizer,
}

impl RustTokenizer {
    /// Load a tokenizer from a local tokenizer.json, or from the hub by model name.
    fn load(name_or_path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let inner = if Path::new(name_or_path).is_file() {
            HfTokenizer::from_file(name_or_path)
        } else {
            HfTokenizer::from_pretrained(name_or_path, None)
        }
        .map_err(|e| e as Box<dyn std::error::Error>)?;
        Ok(Self { inner })
    }
}

impl Tokenizer for RustTokenizer {
    fn encode(&self, text: &str, add_special_tokens: bool) -> Result<Vec<u32>, EncodingError> {
        let encoding = self
            .inner
            .encode(text, add_special_tokens)
            .map_err(|e| EncodingError::new(e.to_string()))?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, ids: &[u32]) -> Result<String, EncodingError> {
        self.inner
            .decode(ids, true)
            .map_err(|e| EncodingError::new(e.to_string()))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    tracing::info!("Loading tokenizer from {}...", args.tokenizer);
    let tokenizer = RustTokenizer::load(&args.tokenizer)?;
    let curator = Curator::new(&tokenizer);

    let config = PipelineConfig {
        min_price: args.min_price,
        max_price: args.max_price,
        test_ratio: args.test_ratio,
        seed: args.seed,
    };

    tracing::info!("Curating JSONL files from {:?}...", args.input);
    let results = curate_all(&args.input, &curator, &config)?;

    tracing::info!("Writing output to {:?}...", args.output_dir);
    let summary: DatasetSummary = write_dataset(results, &args.output_dir, &config)?;

    let included = summary.train_items + summary.test_items;
    let metadata_path = args.output_dir.join("metadata.json");
    let metadata = serde_json::json!({
        "config": {
            "input": args.input.to_string_lossy(),
            "output_dir": args.output_dir.to_string_lossy(),
            "tokenizer": args.tokenizer,
            "min_price": args.min_price,
            "max_price": args.max_price,
            "test_ratio": args.test_ratio,
            "seed": args.seed,
            "min_chars": MIN_CHARS,
            "min_tokens": MIN_TOKENS,
            "max_tokens": MAX_TOKENS,
        },
        "counts": {
            "total_files": summary.total_files,
            "records": summary.stats,
            "train_items": summary.train_items,
            "test_items": summary.test_items,
        },
        "stats": {
            "total_tokens": summary.total_tokens,
            "avg_tokens_per_item": if included > 0 {
                summary.total_tokens as f64 / included as f64
            } else {
                0.0
            },
        },
        "files": {
            "train_path": args.output_dir.join("train.jsonl").to_string_lossy(),
            "test_path": args.output_dir.join("test.jsonl").to_string_lossy(),
            "summary_path": args.output_dir.join("summary.csv").to_string_lossy(),
        },
    });
    std::fs::write(&metadata_path, serde_json::to_string_pretty(&metadata)?)?;

    println!("\n[summary]");
    println!("  Files processed: {}", summary.total_files);
    println!("  Records read: {}", summary.stats.records);
    println!(
        "  Unreadable: {} files failed, {} non-UTF-8 lines",
        summary.stats.failed_files, summary.stats.unreadable
    );
    println!(
        "  Rejected: {} too short, {} too few tokens",
        summary.stats.too_few_chars, summary.stats.too_few_tokens
    );
    println!(
        "  Skipped: {} malformed, {} invalid, {} unpriced, {} out of price range",
        summary.stats.malformed,
        summary.stats.invalid,
        summary.stats.unpriced,
        summary.stats.out_of_price_range
    );
    println!("  Train items: {}", summary.train_items);
    println!("  Test items: {}", summary.test_items);
    println!("  Total tokens: {}", summary.total_tokens);
    println!("  Output: {:?}/{{train,test}}.jsonl", args.output_dir);
    println!("  Metadata: {:?}", metadata_path);

    Ok(())
}
