use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use semantic_code_chunker::{
    Chunk, ChunkerConfig, DenoisePreprocessor, FrameworkPack, HfTokenizer, SemanticChunkingEngine,
    SourceDocument, Tokenizer,
};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

mod input;

#[derive(Parser)]
#[command(name = "semchunk")]
#[command(about = "Split JavaScript/TypeScript sources into semantic chunks", long_about = None)]
#[command(version)]
struct Cli {
    /// Source files to chunk
    files: Vec<PathBuf>,

    /// Read documents as JSON from stdin (array or one object per line)
    #[arg(long, conflicts_with = "files")]
    stdin_json: bool,

    /// TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Token budget per chunk
    #[arg(long)]
    max_tokens: Option<usize>,

    /// Chunks below this are merged with neighbours
    #[arg(long)]
    min_tokens: Option<usize>,

    /// Tokens carried between token windows
    #[arg(long)]
    overlap_tokens: Option<usize>,

    /// Maximum units packed into one chunk
    #[arg(long)]
    max_units: Option<usize>,

    /// Enable a built-in framework rule pack
    #[arg(long = "framework", value_enum, value_name = "PACK")]
    frameworks: Vec<PackArg>,

    /// HuggingFace tokenizer.json used for counting
    #[arg(long, value_name = "PATH", conflicts_with = "heuristic_tokens")]
    tokenizer: Option<PathBuf>,

    /// Count tokens by character ratio instead of BPE
    #[arg(long)]
    heuristic_tokens: bool,

    /// Drop single-line log statements before chunking
    #[arg(long)]
    denoise: bool,

    /// Keep duplicate chunks
    #[arg(long)]
    no_dedupe: bool,

    /// Do not prepend referenced imports to chunks
    #[arg(long)]
    no_imports: bool,

    /// Per-document time budget before falling back to token windows
    #[arg(long, value_name = "MS")]
    timeout_ms: Option<u64>,

    /// Print chunking statistics to stderr
    #[arg(long)]
    stats: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Copy, Clone, ValueEnum)]
enum PackArg {
    Fastify,
    Express,
}

impl PackArg {
    const fn as_domain(self) -> FrameworkPack {
        match self {
            Self::Fastify => FrameworkPack::Fastify,
            Self::Express => FrameworkPack::Express,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let documents = if cli.stdin_json {
        input::read_stdin_json()?
    } else if cli.files.is_empty() {
        bail!("No input: pass source files or --stdin-json");
    } else {
        input::read_files(&cli.files)?
    };

    let engine = build_engine(&cli)?;
    let timeout = cli.timeout_ms.map(Duration::from_millis);

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let mut all_chunks: Vec<Chunk> = Vec::new();

    for document in &documents {
        let chunks = chunk_document(&engine, document, timeout);
        log::info!("{}: {} chunks", document.source_path, chunks.len());
        for chunk in &chunks {
            serde_json::to_writer(&mut out, chunk).context("Failed to serialize chunk")?;
            out.write_all(b"\n")?;
        }
        if cli.stats {
            all_chunks.extend(chunks);
        }
    }
    out.flush()?;

    if cli.stats {
        eprintln!("{}", SemanticChunkingEngine::get_stats(&all_chunks));
    }
    Ok(())
}

fn chunk_document(
    engine: &SemanticChunkingEngine,
    document: &SourceDocument,
    timeout: Option<Duration>,
) -> Vec<Chunk> {
    match timeout {
        Some(timeout) => engine.split_until(document, Instant::now() + timeout),
        None => engine.split(document),
    }
}

fn load_config(cli: &Cli) -> Result<ChunkerConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?;
            ChunkerConfig::from_toml_str(&raw)
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => ChunkerConfig::default(),
    };

    if let Some(max) = cli.max_tokens {
        config.max_tokens = max;
    }
    if let Some(min) = cli.min_tokens {
        config.min_tokens = min;
    }
    if let Some(overlap) = cli.overlap_tokens {
        config.overlap_tokens = overlap;
    }
    if let Some(units) = cli.max_units {
        config.max_units_per_chunk = units;
    }
    for pack in cli.frameworks.iter().map(|p| p.as_domain()) {
        if !config.framework_packs.contains(&pack) {
            config.framework_packs.push(pack);
        }
    }
    if cli.no_dedupe {
        config.dedupe = false;
    }
    if cli.no_imports {
        config.include_imports_in_context = false;
    }
    Ok(config)
}

fn build_engine(cli: &Cli) -> Result<SemanticChunkingEngine> {
    let config = load_config(cli)?;

    let engine = if let Some(path) = &cli.tokenizer {
        let tokenizer: Arc<dyn Tokenizer> = Arc::new(HfTokenizer::from_file(path)?);
        SemanticChunkingEngine::with_tokenizer(config, Some(tokenizer))?
    } else if cli.heuristic_tokens {
        SemanticChunkingEngine::with_tokenizer(config, None)?
    } else {
        SemanticChunkingEngine::new(config)?
    };

    Ok(if cli.denoise {
        engine.with_preprocessor(DenoisePreprocessor::default())
    } else {
        engine
    })
}
